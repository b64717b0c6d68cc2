//! Prefix composition and dispatch to the host's actual output sinks.
//!
//! The four emission entry points in the original (plain, `device`,
//! `netdevice`, `ibdevice`) differ only in what extra label gets woven
//! into the prefix ahead of the `INCL_*` fields; here that's one
//! [`DeviceLabel`] capability instead of four near-duplicate functions.

use alloc::sync::Arc;
use core::fmt;
use core::fmt::Write as _;

use arrayvec::ArrayString;
use hashbrown::HashMap;
use spinning_top::Spinlock;

use crate::descriptor::{Descriptor, Flags};

/// Prefixes never exceed this; anything that would overflow is
/// truncated rather than allocated around, since a prefix is diagnostic
/// text, not data the host depends on being complete.
pub const MAX_PREFIX: usize = 128;

/// What extra device identity, if any, goes into the prefix ahead of
/// the `INCL_*` fields.
pub enum DeviceLabel<'a> {
    None,
    Device(&'a str),
    NetDevice(&'a str),
    IbDevice(&'a str),
}

impl<'a> DeviceLabel<'a> {
    fn write(&self, out: &mut ArrayString<MAX_PREFIX>) {
        let _ = match self {
            DeviceLabel::None => Ok(()),
            DeviceLabel::Device(name) => write!(out, "{name}: "),
            DeviceLabel::NetDevice(name) => write!(out, "{name}: "),
            DeviceLabel::IbDevice(name) => write!(out, "{name}: "),
        };
    }
}

/// A sink that accepts a composed prefix plus the caller's formatted
/// arguments. Implemented by the host for its actual console/log
/// backend; kept as a trait (rather than a function pointer) so the
/// host can carry whatever state it needs (a lock, a ring buffer handle,
/// ...).
pub trait PrintSink {
    fn emit(&self, prefix: &str, args: fmt::Arguments<'_>);
}

/// A sink that accepts a trace destination id alongside the composed
/// prefix and arguments.
#[cfg(feature = "trace")]
pub trait TraceSink {
    fn emit(&self, dst: u8, prefix: &str, args: fmt::Arguments<'_>);
}

/// Caches the result of stripping a configured source-path prefix off a
/// descriptor's filename, since the same filename is composed into a
/// prefix on every enabled call at that site. Guarded by its own
/// spinlock, independent of the registry's lock, so a hot emission path
/// never contends with query execution.
pub struct PrefixCache {
    cache: Spinlock<HashMap<alloc::boxed::Box<str>, Arc<str>>>,
}

impl PrefixCache {
    pub fn new() -> Self {
        PrefixCache {
            cache: Spinlock::new(HashMap::new()),
        }
    }

    /// The filename with `strip` (the configured source prefix, if any)
    /// removed from its front.
    pub fn stripped(&self, filename: &str, strip: Option<&str>) -> Arc<str> {
        let Some(strip) = strip else {
            return Arc::from(filename);
        };
        if let Some(hit) = self.cache.lock().get(filename) {
            return hit.clone();
        }
        let stripped = filename.strip_prefix(strip).unwrap_or(filename);
        let arc: Arc<str> = Arc::from(stripped);
        self.cache
            .lock()
            .insert(alloc::boxed::Box::from(filename), arc.clone());
        arc
    }
}

impl Default for PrefixCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Compose the prefix for one emission, honoring the descriptor's
/// `INCL_*` flags. `tid` is supplied by the host (thread/task id lookup
/// is host policy, not something this crate can know); `None` stands
/// for interrupt context, the same distinction the host would otherwise
/// make with `in_interrupt()`.
///
/// Order matches the original composer exactly: the thread/interrupt
/// tag comes first as its own `[<tid>] ` / `<intr> ` token (not
/// colon-suffixed, and not grouped with the fields below), then
/// `module:`, `func:`, `file:`, `lineno:` each suffixed with its own
/// colon, then a single trailing space if any of those four fields was
/// written.
pub fn compose_prefix(
    d: &Descriptor,
    modname: &str,
    filename: &str,
    label: DeviceLabel<'_>,
    tid: Option<u64>,
) -> ArrayString<MAX_PREFIX> {
    let mut out = ArrayString::new();
    label.write(&mut out);

    if d.flags.contains(Flags::INCL_TID) {
        match tid {
            Some(tid) => {
                let _ = write!(out, "[{tid}] ");
            }
            None => {
                let _ = out.try_push_str("<intr> ");
            }
        }
    }

    let before_fields = out.len();
    if d.flags.contains(Flags::INCL_MODNAME) {
        let _ = write!(out, "{modname}:");
    }
    if d.flags.contains(Flags::INCL_FUNCNAME) {
        let _ = write!(out, "{}:", d.function);
    }
    if d.flags.contains(Flags::INCL_SOURCENAME) {
        let _ = write!(out, "{filename}:");
    }
    if d.flags.contains(Flags::INCL_LINENO) {
        let _ = write!(out, "{}:", d.lineno);
    }
    if out.len() > before_fields {
        let _ = out.try_push(' ');
    }
    out
}

/// Emit through `sink` if the descriptor is currently enabled for print.
/// Returns `false` without touching `sink` if the site is disabled,
/// mirroring the original's "most calls are no-ops" fast path.
pub fn emit(
    d: &Descriptor,
    modname: &str,
    filename: &str,
    label: DeviceLabel<'_>,
    tid: Option<u64>,
    sink: &dyn PrintSink,
    args: fmt::Arguments<'_>,
) -> bool {
    if !d.flags.contains(Flags::PRINT) {
        return false;
    }
    let prefix = compose_prefix(d, modname, filename, label, tid);
    sink.emit(&prefix, args);
    true
}

#[cfg(feature = "trace")]
pub fn emit_trace(
    d: &Descriptor,
    modname: &str,
    filename: &str,
    label: DeviceLabel<'_>,
    tid: Option<u64>,
    sink: &dyn TraceSink,
    args: fmt::Arguments<'_>,
) -> bool {
    if !d.flags.contains(Flags::TRACE) {
        return false;
    }
    let prefix = compose_prefix(d, modname, filename, label, tid);
    sink.emit(d.trace_dst, &prefix, args);
    true
}

/// Hex-dump entry point: same enabled-gating and prefix composition as
/// [`emit`], but the payload is rendered as space-separated hex octets
/// in chunks of 16 rather than caller-supplied `Arguments`.
pub fn emit_hex_dump(
    d: &Descriptor,
    modname: &str,
    filename: &str,
    label: DeviceLabel<'_>,
    tid: Option<u64>,
    sink: &dyn PrintSink,
    buf: &[u8],
) -> bool {
    if !d.flags.contains(Flags::PRINT) {
        return false;
    }
    let prefix = compose_prefix(d, modname, filename, label, tid);
    for chunk in buf.chunks(16) {
        let mut line = ArrayString::<48>::new();
        for (i, byte) in chunk.iter().enumerate() {
            if i > 0 {
                let _ = line.try_push(' ');
            }
            let _ = write!(line, "{byte:02x}");
        }
        sink.emit(&prefix, format_args!("{line}"));
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DescriptorBuilder;
    use core::cell::RefCell;

    struct RecordingSink {
        lines: RefCell<alloc::vec::Vec<alloc::string::String>>,
    }

    impl PrintSink for RecordingSink {
        fn emit(&self, prefix: &str, args: fmt::Arguments<'_>) {
            self.lines
                .borrow_mut()
                .push(alloc::format!("{prefix}{args}"));
        }
    }

    #[test]
    fn disabled_site_never_calls_sink() {
        let (d, _k) = DescriptorBuilder::new("m", "f", "f.c", "fmt", 1).build();
        let sink = RecordingSink {
            lines: RefCell::new(alloc::vec::Vec::new()),
        };
        let did = emit(&d, "m", "f.c", DeviceLabel::None, None, &sink, format_args!("hi"));
        assert!(!did);
        assert!(sink.lines.borrow().is_empty());
    }

    #[test]
    fn enabled_site_composes_prefix_fields() {
        let (mut d, _k) = DescriptorBuilder::new("usb", "probe", "core.c", "fmt", 7).build();
        d.flags = Flags::PRINT | Flags::INCL_MODNAME | Flags::INCL_LINENO;
        let sink = RecordingSink {
            lines: RefCell::new(alloc::vec::Vec::new()),
        };
        let did = emit(
            &d,
            "usb",
            "core.c",
            DeviceLabel::None,
            None,
            &sink,
            format_args!("hello"),
        );
        assert!(did);
        let lines = sink.lines.borrow();
        assert_eq!(lines[0], "usb:7: hello");
    }

    #[test]
    fn tid_field_comes_first_and_is_not_colon_suffixed() {
        let (mut d, _k) = DescriptorBuilder::new("usb", "probe", "core.c", "fmt", 7).build();
        d.flags = Flags::PRINT | Flags::INCL_TID | Flags::INCL_MODNAME;
        let sink = RecordingSink {
            lines: RefCell::new(alloc::vec::Vec::new()),
        };
        emit(
            &d,
            "usb",
            "core.c",
            DeviceLabel::None,
            Some(42),
            &sink,
            format_args!("hello"),
        );
        assert_eq!(sink.lines.borrow()[0], "[42] usb: hello");
    }

    #[test]
    fn missing_tid_renders_as_interrupt_tag() {
        let (mut d, _k) = DescriptorBuilder::new("usb", "probe", "core.c", "fmt", 7).build();
        d.flags = Flags::PRINT | Flags::INCL_TID;
        let sink = RecordingSink {
            lines: RefCell::new(alloc::vec::Vec::new()),
        };
        emit(
            &d,
            "usb",
            "core.c",
            DeviceLabel::None,
            None,
            &sink,
            format_args!("hello"),
        );
        assert_eq!(sink.lines.borrow()[0], "<intr> hello");
    }

    #[test]
    fn device_label_prepended() {
        let (mut d, _k) = DescriptorBuilder::new("usb", "probe", "core.c", "fmt", 7).build();
        d.flags = Flags::PRINT;
        let sink = RecordingSink {
            lines: RefCell::new(alloc::vec::Vec::new()),
        };
        emit(
            &d,
            "usb",
            "core.c",
            DeviceLabel::Device("usb1"),
            None,
            &sink,
            format_args!("hi"),
        );
        assert_eq!(sink.lines.borrow()[0], "usb1: hi");
    }

    #[test]
    fn prefix_cache_strips_configured_prefix() {
        let cache = PrefixCache::new();
        let s = cache.stripped("/build/src/core.c", Some("/build/"));
        assert_eq!(&*s, "src/core.c");
        let s2 = cache.stripped("/build/src/core.c", Some("/build/"));
        assert_eq!(&*s2, "src/core.c");
    }

    #[test]
    fn hex_dump_chunks_at_sixteen_bytes() {
        let (mut d, _k) = DescriptorBuilder::new("m", "f", "f.c", "fmt", 1).build();
        d.flags = Flags::PRINT;
        let sink = RecordingSink {
            lines: RefCell::new(alloc::vec::Vec::new()),
        };
        let buf: alloc::vec::Vec<u8> = (0..20u8).collect();
        emit_hex_dump(&d, "m", "f.c", DeviceLabel::None, None, &sink, &buf);
        assert_eq!(sink.lines.borrow().len(), 2);
        assert!(sink.lines.borrow()[0].contains("00 01 02"));
    }
}
