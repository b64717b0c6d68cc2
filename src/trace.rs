//! The trace-destination table: up to 63 named trace sinks (plus the
//! reserved slot 0, "trace events") that descriptors can be routed to
//! instead of the plain printk-like sink. A destination is reference-
//! counted by the descriptors currently routed to it; [`Self::close`]
//! refuses to free a slot still in use.

use crate::error::{Error, Result};
use crate::intern::Sym;

/// Number of slots, including the reserved slot 0. Also the packed
/// field width in [`crate::descriptor::DescriptorCtrl`].
pub const MAX_TRACE_DST: usize = 64;

struct Slot {
    name: Sym,
    use_count: u32,
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Fixed-capacity table of named trace destinations. Never allocates
/// past its initial fixed array, so a runaway `open` loop fails closed
/// with [`Error::no_space`] instead of growing without bound. Slot 0 is
/// permanently reserved for "trace events" (the default sink) and is
/// never handed out by `open`.
pub struct TraceTable {
    slots: [Option<Slot>; MAX_TRACE_DST],
    default_dst: u8,
}

impl TraceTable {
    pub fn new() -> Self {
        TraceTable {
            slots: core::array::from_fn(|_| None),
            default_dst: 0,
        }
    }

    /// The destination a bare `+T` (no `:name`) should route new sites
    /// to, i.e. the most recently opened (or explicitly re-opened)
    /// instance, or 0 if none has ever been opened.
    pub fn default_dst(&self) -> u8 {
        self.default_dst
    }

    /// `open <name>`: allocate a fresh destination, or if `name` names
    /// an already-open one (or is the literal `"0"`), just repoint
    /// `default_dst` at it.
    pub fn open(&mut self, name: &str) -> Result<u8> {
        if name == "0" {
            self.default_dst = 0;
            return Ok(0);
        }
        if !valid_name(name) {
            return Err(Error::invalid());
        }
        if let Some(id) = self.find(name) {
            self.default_dst = id;
            return Ok(id);
        }
        let sym = Sym::intern(name);
        for (i, slot) in self.slots.iter_mut().enumerate().skip(1) {
            if slot.is_none() {
                *slot = Some(Slot {
                    name: sym,
                    use_count: 0,
                });
                self.default_dst = i as u8;
                return Ok(i as u8);
            }
        }
        Err(Error::no_space())
    }

    /// `close <name>`: refuses while any descriptor still routes to it.
    pub fn close(&mut self, name: &str) -> Result<()> {
        let dst = self.find(name).ok_or_else(Error::not_found)?;
        let slot = self.slots[dst as usize].as_ref().unwrap();
        if slot.use_count > 0 {
            return Err(Error::busy());
        }
        self.slots[dst as usize] = None;
        if self.default_dst == dst {
            self.default_dst = 0;
        }
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<u8> {
        self.slots
            .iter()
            .position(|s| matches!(s, Some(slot) if slot.name.as_str() == name))
            .map(|i| i as u8)
    }

    pub fn name_of(&self, dst: u8) -> Option<alloc::string::String> {
        if dst == 0 {
            return None;
        }
        self.slots
            .get(dst as usize)
            .and_then(|s| s.as_ref())
            .map(|s| s.name.as_str())
    }

    /// Number of descriptors currently routed to `dst`. Slot 0 (the
    /// default "trace events" sink) has no use-count bookkeeping, since
    /// it is never closed.
    pub fn use_count(&self, dst: u8) -> u32 {
        self.slots
            .get(dst as usize)
            .and_then(|s| s.as_ref())
            .map(|s| s.use_count)
            .unwrap_or(0)
    }

    /// Called by the matcher/registry whenever a descriptor starts or
    /// stops routing to `dst` (never called for slot 0).
    pub fn inc_use(&mut self, dst: u8) {
        if dst == 0 {
            return;
        }
        if let Some(slot) = self.slots.get_mut(dst as usize).and_then(|s| s.as_mut()) {
            slot.use_count += 1;
        }
    }

    pub fn dec_use(&mut self, dst: u8) {
        if dst == 0 {
            return;
        }
        if let Some(slot) = self.slots.get_mut(dst as usize).and_then(|s| s.as_mut()) {
            slot.use_count = slot.use_count.saturating_sub(1);
        }
    }

    /// Every currently-open instance name, in slot order, for a control
    /// surface summary trailer.
    pub fn open_names(&self) -> alloc::vec::Vec<alloc::string::String> {
        self.slots
            .iter()
            .filter_map(|s| s.as_ref().map(|slot| slot.name.as_str()))
            .collect()
    }
}

impl Default for TraceTable {
    fn default() -> Self {
        Self::new()
    }
}
