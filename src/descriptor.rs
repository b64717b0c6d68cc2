//! Per-callsite descriptors: identity, flags, class, trace destination,
//! and the fast-branch gate that keeps a disabled site inline-cheap.

use alloc::string::String;
use alloc::sync::Arc;
use bitfield::bitfield;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::intern::Sym;

bitflags::bitflags! {
    /// Behaviour bits attached to a callsite. Mirrors `_DPRINTK_FLAGS_*`.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct Flags: u8 {
        /// emit to the printk-like sink
        const PRINT          = 1 << 0;
        /// emit to the trace sink
        const TRACE           = 1 << 1;
        const INCL_MODNAME    = 1 << 2;
        const INCL_FUNCNAME   = 1 << 3;
        const INCL_SOURCENAME = 1 << 4;
        const INCL_LINENO     = 1 << 5;
        const INCL_TID        = 1 << 6;
    }
}

impl Flags {
    /// Any of the `INCL_*` bits.
    pub const INCL_ANY: Flags = Flags::INCL_MODNAME
        .union(Flags::INCL_FUNCNAME)
        .union(Flags::INCL_SOURCENAME)
        .union(Flags::INCL_LINENO)
        .union(Flags::INCL_TID);

    /// `PRINT | TRACE` together define whether the callsite is "enabled".
    pub fn is_enabled(self) -> bool {
        self.intersects(Flags::PRINT | Flags::TRACE)
    }
}

/// A class-id, with the sentinel pulled out into its own variant instead
/// of a magic `63`. Only encoded to the raw 6-bit form at the packed
/// storage boundary (`DescriptorCtrl`) or when talking to the class-user
/// resolution code, which still deals in raw ids internally.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ClassId {
    /// The site was declared without a class (`_DPRINTK_CLASS_ANY` /
    /// `_DPRINTK_CLASS_DFLT` in the original).
    #[default]
    Default,
    /// A concrete class, in `0..=62`.
    Id(u8),
}

/// Raw sentinel value for [`ClassId::Default`] in the packed 6-bit field.
pub const CLASS_SENTINEL: u8 = 63;
/// Highest concrete class id.
pub const CLASS_MAX: u8 = 62;

impl ClassId {
    pub fn from_raw(raw: u8) -> Self {
        if raw >= CLASS_SENTINEL {
            ClassId::Default
        } else {
            ClassId::Id(raw)
        }
    }

    pub fn to_raw(self) -> u8 {
        match self {
            ClassId::Default => CLASS_SENTINEL,
            ClassId::Id(n) => n,
        }
    }
}

bitfield! {
    /// The compact, 8-byte-aligned packed form of a descriptor's mutable
    /// control word, matching the layout external macro scaffolding would
    /// produce: `lineno:18 | class_id:6 | trace_dst:6 | flags:8`.
    ///
    /// The matcher and parser never operate on this directly; it exists
    /// for hosts that want to mirror the link-time record layout (e.g. to
    /// serialize descriptors compactly). [`Descriptor`] keeps the
    /// unpacked, ergonomic fields as the source of truth.
    pub struct DescriptorCtrl(u64);
    impl Debug;
    u32;
    pub lineno, set_lineno: 17, 0;
    u8;
    pub class_id_raw, set_class_id_raw: 23, 18;
    pub trace_dst, set_trace_dst: 29, 24;
    pub flags_raw, set_flags_raw: 37, 30;
}

impl DescriptorCtrl {
    pub fn pack(lineno: u32, class_id: ClassId, trace_dst: u8, flags: Flags) -> Self {
        let mut ctrl = DescriptorCtrl(0);
        ctrl.set_lineno(lineno & 0x3_ffff);
        ctrl.set_class_id_raw(class_id.to_raw());
        ctrl.set_trace_dst(trace_dst & 0x3f);
        ctrl.set_flags_raw(flags.bits());
        ctrl
    }

    pub fn unpack(&self) -> (u32, ClassId, u8, Flags) {
        (
            self.lineno(),
            ClassId::from_raw(self.class_id_raw()),
            self.trace_dst(),
            Flags::from_bits_truncate(self.flags_raw()),
        )
    }
}

/// The per-site atomic gate read at the (host-owned) call site and
/// toggled by the matcher on enable-state transitions only.
///
/// Shared via `Arc` rather than a raw pointer into a linker section: the
/// host clones the handle returned by [`DescriptorBuilder::build`] into
/// wherever its inline check lives, and that read never touches the
/// registry mutex.
#[derive(Debug)]
pub struct FastBranch(AtomicBool);

impl FastBranch {
    pub fn new(enabled: bool) -> Arc<Self> {
        Arc::new(FastBranch(AtomicBool::new(enabled)))
    }

    /// Read with acquire ordering, as done at the (inlined) call site.
    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Write with release ordering; only called by the matcher, and only
    /// on an actual enabled-state transition.
    pub(crate) fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Release);
    }
}

/// One record per emission site.
#[derive(Debug)]
pub struct Descriptor {
    pub(crate) modname: Sym,
    pub function: String,
    pub filename: String,
    pub format: String,
    pub lineno: u32,
    pub class_id: ClassId,
    pub flags: Flags,
    pub trace_dst: u8,
    pub(crate) enabled_key: Arc<FastBranch>,
}

impl Descriptor {
    pub fn modname(&self) -> alloc::string::String {
        self.modname.as_str()
    }

    /// Fast-branch handle for this site, to be stashed next to the host's
    /// inline enabled-check. Lock-free, independent of the registry.
    pub fn fast_branch(&self) -> Arc<FastBranch> {
        self.enabled_key.clone()
    }
}

/// Builds a [`Descriptor`] plus the [`FastBranch`] handle the host should
/// keep next to its inline call-site check.
pub struct DescriptorBuilder {
    modname: Sym,
    function: String,
    filename: String,
    format: String,
    lineno: u32,
    class_id: ClassId,
    flags: Flags,
    trace_dst: u8,
}

impl DescriptorBuilder {
    pub fn new(
        modname: &str,
        function: impl Into<String>,
        filename: impl Into<String>,
        format: impl Into<String>,
        lineno: u32,
    ) -> Self {
        DescriptorBuilder {
            modname: Sym::intern(modname),
            function: function.into(),
            filename: filename.into(),
            format: format.into(),
            lineno: lineno & 0x3_ffff,
            class_id: ClassId::Default,
            flags: Flags::empty(),
            trace_dst: 0,
        }
    }

    pub fn class_id(mut self, class_id: ClassId) -> Self {
        self.class_id = class_id;
        self
    }

    pub fn default_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    pub fn build(self) -> (Descriptor, Arc<FastBranch>) {
        let key = FastBranch::new(self.flags.is_enabled());
        let d = Descriptor {
            modname: self.modname,
            function: self.function,
            filename: self.filename,
            format: self.format,
            lineno: self.lineno,
            class_id: self.class_id,
            flags: self.flags,
            trace_dst: self.trace_dst,
            enabled_key: key.clone(),
        };
        (d, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabled_tracks_print_or_trace() {
        assert!(!Flags::empty().is_enabled());
        assert!(Flags::PRINT.is_enabled());
        assert!(Flags::TRACE.is_enabled());
        assert!((Flags::PRINT | Flags::INCL_LINENO).is_enabled());
        assert!(!Flags::INCL_LINENO.is_enabled());
    }

    #[test]
    fn class_id_sentinel_round_trips() {
        assert_eq!(ClassId::from_raw(63), ClassId::Default);
        assert_eq!(ClassId::from_raw(62), ClassId::Id(62));
        assert_eq!(ClassId::Default.to_raw(), 63);
        assert_eq!(ClassId::Id(5).to_raw(), 5);
    }

    #[test]
    fn ctrl_word_packs_and_unpacks() {
        let ctrl = DescriptorCtrl::pack(123456, ClassId::Id(7), 9, Flags::PRINT | Flags::TRACE);
        let (lineno, class_id, trace_dst, flags) = ctrl.unpack();
        assert_eq!(lineno, 123456 & 0x3_ffff);
        assert_eq!(class_id, ClassId::Id(7));
        assert_eq!(trace_dst, 9);
        assert_eq!(flags, Flags::PRINT | Flags::TRACE);
    }

    #[test]
    fn fast_branch_toggles() {
        let key = FastBranch::new(false);
        assert!(!key.is_enabled());
        key.set(true);
        assert!(key.is_enabled());
    }

    #[test]
    fn builder_sets_initial_fast_branch_from_flags() {
        let (d, key) = DescriptorBuilder::new("m1", "do_a", "a.c", "alpha %d", 10)
            .default_flags(Flags::PRINT)
            .build();
        assert!(key.is_enabled());
        assert_eq!(d.flags, Flags::PRINT);
        assert_eq!(d.modname(), "m1");
    }
}
