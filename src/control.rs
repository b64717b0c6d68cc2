//! The host-facing control surface: one `write()` that accepts a batch
//! of query lines and one `read()` that reports current descriptor
//! state, the same two operations a `/proc`- or `sysfs`-style control
//! file would expose.

use alloc::string::String;
use alloc::vec::Vec;

use crate::error::Error;
use crate::registry::Registry;

/// Thin façade over a [`Registry`] for a host that wants to wire up a
/// single read/write control file rather than call registry methods
/// directly.
pub struct ControlSurface<'a> {
    registry: &'a Registry,
}

impl<'a> ControlSurface<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        ControlSurface { registry }
    }

    /// Execute a batch of subcommands separated by newlines, `;`, or `%`.
    /// A failing subcommand does not stop the rest from running (the
    /// same best-effort semantics as writing several lines to a control
    /// file one at a time). Returns the total number of descriptors
    /// matched and the first error seen, if any.
    pub fn write(&self, text: &str) -> (usize, Option<Error>) {
        self.registry.exec_queries(text)
    }

    /// One line per live descriptor, in registration order, each as
    /// produced by [`crate::matcher::describe`]. A leading header line
    /// brackets the body; when the `trace` feature is enabled, a trailer
    /// reports the current default trace destination and every open
    /// trace instance, the same summary a trace-instance listing control
    /// file would show alongside the per-site table.
    pub fn read(&self) -> String {
        let mut out = String::new();
        out.push_str("# <file>:<line> [<module>]<func> =<flags> \"<format>\"\n");
        for line in self.registry.describe_all() {
            out.push_str(&line);
            out.push('\n');
        }
        #[cfg(feature = "trace")]
        {
            let (default_name, open) = self.registry.trace_summary();
            out.push_str("# trace default: ");
            match default_name {
                Some(name) => out.push_str(&name),
                None => out.push_str("(trace events)"),
            }
            out.push('\n');
            out.push_str("# trace open:");
            for name in open {
                out.push(' ');
                out.push_str(&name);
            }
            out.push('\n');
        }
        out
    }

    pub fn describe_all(&self) -> Vec<String> {
        self.registry.describe_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ClassId, Flags};
    use crate::registry::SiteSpec;

    #[test]
    fn write_then_read_reflects_matches() {
        let reg = Registry::new();
        reg.add_module(
            "usb_core",
            alloc::vec![SiteSpec {
                function: "probe".into(),
                filename: "core.c".into(),
                format: "probing".into(),
                lineno: 10,
                class_id: ClassId::Default,
                default_flags: Flags::empty(),
            }],
        );
        let surface = ControlSurface::new(&reg);
        let (matched, err) = surface.write("module usb_core +p");
        assert_eq!(matched, 1);
        assert!(err.is_none());

        let report = surface.read();
        assert!(report.starts_with('#'));
        assert!(report.contains("probing"));
    }

    #[cfg(feature = "trace")]
    #[test]
    fn read_reports_trace_trailer() {
        let reg = Registry::new();
        reg.add_module(
            "usb_core",
            alloc::vec![SiteSpec {
                function: "probe".into(),
                filename: "core.c".into(),
                format: "probing".into(),
                lineno: 10,
                class_id: ClassId::Default,
                default_flags: Flags::empty(),
            }],
        );
        let surface = ControlSurface::new(&reg);
        surface.write("open tbt\nmodule usb_core +T");
        let report = surface.read();
        assert!(report.contains("# trace default: tbt"));
        assert!(report.contains("# trace open: tbt"));
    }
}
