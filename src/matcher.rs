//! Pure, lock-free matching and mutation of a single descriptor against a
//! parsed query. Kept separate from [`crate::registry`] so the actual
//! locking/iteration strategy can change without touching match
//! semantics, and so it's trivially unit-testable without a registry.
//!
//! Class resolution and trace-destination-by-name lookup both need
//! registry state (class maps, the trace table) that a single descriptor
//! doesn't carry, so those are resolved once per module table by the
//! caller and handed in here as plain values (`resolved_class`,
//! `explicit_dst`) rather than this module reaching back into the
//! registry.

use alloc::string::String;

use crate::descriptor::{ClassId, Descriptor, Flags};
use crate::query::{FlagOp, Query};

/// `true` if `d` satisfies every selector term present in `query`,
/// given the class id this query resolved to within `d`'s module table
/// (`None` when the query carried no `class` term at all) and
/// `protected_classes`, a bitmask (bit `i` set means raw class id `i`
/// is protected) of every class id that falls inside a map with a bound
/// class parameter. Protection is scoped per map, not per module: a
/// module can own one map with a bound parameter and another without,
/// and only sites in the former are shielded from class-less flag
/// changes.
pub fn is_match(
    query: &Query,
    d: &Descriptor,
    resolved_class: Option<ClassId>,
    protected_classes: u64,
    source_prefix: Option<&str>,
) -> bool {
    match resolved_class {
        Some(cid) => {
            if d.class_id != cid {
                return false;
            }
        }
        None => {
            if let ClassId::Id(id) = d.class_id {
                if protected_classes & (1u64 << id) != 0 {
                    return false;
                }
            }
        }
    }
    if let Some(file) = &query.file {
        if !file_matches(file, &d.filename, source_prefix) {
            return false;
        }
    }
    if let Some(f) = &query.func {
        if !crate::wildcard::glob_match(f, &d.function) {
            return false;
        }
    }
    if let Some(fmt) = &query.format {
        let hit = if query.format_anchor {
            d.format.starts_with(fmt.as_str())
        } else {
            d.format.contains(fmt.as_str())
        };
        if !hit {
            return false;
        }
    }
    if let Some(line) = query.line {
        if !line.contains(d.lineno) {
            return false;
        }
    }
    true
}

/// `pattern` matches `filename` itself, its basename, or `filename` with
/// `source_prefix` stripped off the front — whichever the operator
/// happened to write the query against.
fn file_matches(pattern: &str, filename: &str, source_prefix: Option<&str>) -> bool {
    if crate::wildcard::glob_match(pattern, filename) {
        return true;
    }
    if let Some(base) = filename.rsplit('/').next() {
        if base != filename && crate::wildcard::glob_match(pattern, base) {
            return true;
        }
    }
    if let Some(prefix) = source_prefix {
        if let Some(stripped) = filename.strip_prefix(prefix) {
            if crate::wildcard::glob_match(pattern, stripped) {
                return true;
            }
        }
    }
    false
}

/// Resolve a query's `:<name>` / `T` destination intent against a
/// descriptor's current destination. `explicit_dst` is the slot the
/// `:<name>` suffix resolved to, if the query had one.
fn select_trace_dst(explicit_dst: Option<u8>, trace_letter: bool, current: u8, default_dst: u8) -> u8 {
    if let Some(dst) = explicit_dst {
        return dst;
    }
    if trace_letter && current == 0 {
        return default_dst;
    }
    current
}

/// The result of applying a query's flag/trace-dst modification to one
/// descriptor.
pub struct Applied {
    /// Whether the `PRINT | TRACE` "enabled" predicate changed, meaning
    /// the caller must flip the fast-branch gate.
    pub enabled_changed: bool,
    /// The destination before this application.
    pub old_dst: u8,
    /// The destination after this application.
    pub new_dst: u8,
}

/// Apply `query`'s flag-spec and trace-destination intent to `d`.
/// `explicit_dst` is the already-resolved slot for a `:<name>` suffix
/// (the caller looks the name up in the trace table before calling,
/// since an unknown name aborts the whole command rather than being
/// silently skipped per descriptor). `default_dst` is the trace table's
/// current default destination, used when `T` is set with no explicit
/// destination. Clearing `TRACE` with no `:<name>` suffix restores the
/// destination to none, undoing whatever auto-assignment turning `T` on
/// had done; an explicit `:<name>` always overrides both the assignment
/// and the reversion.
pub fn apply(query: &Query, explicit_dst: Option<u8>, default_dst: u8, d: &mut Descriptor) -> Applied {
    let before_enabled = d.flags.is_enabled();
    let before_traced = d.flags.contains(Flags::TRACE);
    d.flags = match query.op {
        FlagOp::Add => d.flags | query.flags,
        FlagOp::Remove => d.flags & !query.flags,
        FlagOp::Set => query.flags,
    };
    let after_traced = d.flags.contains(Flags::TRACE);
    let old_dst = d.trace_dst;
    let new_dst = if explicit_dst.is_none() && before_traced && !after_traced {
        0
    } else {
        select_trace_dst(explicit_dst, query.trace_letter, old_dst, default_dst)
    };
    d.trace_dst = new_dst;
    let after_enabled = d.flags.is_enabled();
    Applied {
        enabled_changed: before_enabled != after_enabled,
        old_dst,
        new_dst,
    }
}

const FLAG_SLOTS: &[(char, Flags)] = &[
    ('p', Flags::PRINT),
    ('T', Flags::TRACE),
    ('m', Flags::INCL_MODNAME),
    ('f', Flags::INCL_FUNCNAME),
    ('s', Flags::INCL_SOURCENAME),
    ('l', Flags::INCL_LINENO),
    ('t', Flags::INCL_TID),
];

fn escape_format(format: &str) -> String {
    let mut out = String::with_capacity(format.len());
    for c in format.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    out
}

/// Render a descriptor's current state the way a read of the control
/// surface would: `<file>:<line> [<module>]<function> =<flag-chars>
/// "<escaped format>"`, with the flag segment listing only the letters
/// whose bit is set (in canonical order) and a single `_` when none are
/// set — never a placeholder for a clear bit, matching the original's
/// `ddebug_describe_flags` and keeping `describe` output re-parseable
/// as a flagspec — an optional `:<name>` trace-destination suffix
/// truncated to 24 characters with an ellipsis, and an optional
/// trailing ` class:<name>` / ` class:_UNKNOWN_ _id:<n>`.
pub fn describe(
    d: &Descriptor,
    modname: &str,
    class_name: Option<&str>,
    trace_name: Option<&str>,
) -> String {
    use core::fmt::Write;

    let mut out = String::new();
    let _ = write!(
        out,
        "{}:{} [{}]{} =",
        d.filename, d.lineno, modname, d.function
    );
    let before_flags = out.len();
    for (letter, bit) in FLAG_SLOTS {
        if d.flags.contains(*bit) {
            out.push(*letter);
        }
    }
    if out.len() == before_flags {
        out.push('_');
    }
    if d.trace_dst != 0 {
        if let Some(name) = trace_name {
            let mut suffix = String::new();
            let _ = write!(suffix, ":{name}");
            if suffix.len() > 24 {
                suffix.truncate(21);
                suffix.push_str("...");
            }
            out.push_str(&suffix);
        }
    }
    let _ = write!(out, " \"{}\"", escape_format(&d.format));
    match (d.class_id, class_name) {
        (ClassId::Id(_), Some(name)) => {
            let _ = write!(out, " class:{name}");
        }
        (ClassId::Id(id), None) => {
            let _ = write!(out, " class:_UNKNOWN_ _id:{id}");
        }
        (ClassId::Default, _) => {}
    }
    out
}
