//! Sysfs-style class parameters: a single host-visible knob ("write this
//! integer") that fans out to every descriptor in one module whose class
//! falls inside a given [`crate::classmap::ClassMap`].
//!
//! The binding from a parameter to its module and map is by name, not by
//! a pointer or table index: every write re-resolves both through the
//! registry, so a module unload invalidates the binding for free instead
//! of leaving a dangling reference for the registry to track down.

use alloc::string::String;
use alloc::vec::Vec;

use crate::classmap::{ClassMap, MapType};
use crate::descriptor::Flags;
use crate::error::{Error, Result};
use crate::intern::Sym;

/// A named knob bound to one module's use of one classmap. Remembers
/// the last value written (`state_word` in the data model) so that a
/// freshly-added module can be synchronized to the parameter's current
/// value without the host having to re-issue the write.
pub struct ClassParameter {
    pub name: Sym,
    pub(crate) module: Sym,
    pub(crate) map_name: Sym,
    /// Flag letters each synthesized `class <name> (+|-)<flags>` query
    /// uses; almost always just `p`.
    pub(crate) flags: Flags,
    pub(crate) value: u64,
}

impl ClassParameter {
    pub fn new(name: &str, module: Sym, map_name: Sym) -> Self {
        ClassParameter {
            name: Sym::intern(name),
            module,
            map_name,
            flags: Flags::PRINT,
            value: 0,
        }
    }

    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    pub fn module(&self) -> Sym {
        self.module
    }

    pub fn map_name(&self) -> Sym {
        self.map_name
    }

    pub fn value(&self) -> u64 {
        self.value
    }
}

fn parse_nonneg(value: &str) -> Result<u64> {
    value.trim().parse::<u64>().map_err(|_| Error::invalid())
}

/// Compute the desired per-class enabled state (indexed by raw class id
/// relative to `map.base`; `desired[i]` says whether class `map.base + i`
/// should end up enabled) for a write of `value` against `map`, honoring
/// its [`MapType`].
///
/// * [`MapType::DisjointBits`]: `value` is a non-negative integer
///   interpreted as a bit vector of length `map.length()`; bit `i` set
///   means class `i` ends up enabled. Bits past `map.length()` are a
///   warned-and-masked no-op, not an error (the original treats a stale
///   or overshooting bitmap as forward-compatible input).
/// * [`MapType::LevelNum`]: `value` is a non-negative integer `v`; the
///   enabled set is bits `[0, v)` (classes below the level, exclusive),
///   clamped to `map.length()` if `v` overshoots it.
pub fn desired_state(map: &ClassMap, value: &str) -> Result<Vec<bool>> {
    let raw = parse_nonneg(value)?;
    let len = map.len();
    let mut desired = alloc::vec![false; len];
    match map.map_type {
        MapType::DisjointBits => {
            if len < u64::BITS as usize && raw >> len != 0 {
                log::warn!(
                    "class parameter for {:?}: value {raw:#x} has bits beyond the map's {len} classes, masking them off",
                    map.name(),
                );
            }
            for (i, slot) in desired.iter_mut().enumerate() {
                *slot = (raw >> i) & 1 == 1;
            }
        }
        MapType::LevelNum => {
            let v = if (raw as usize) > len { len } else { raw as usize };
            for (i, slot) in desired.iter_mut().enumerate() {
                *slot = i < v;
            }
        }
    }
    Ok(desired)
}

/// Render the current enabled-set back out as the integer a write would
/// accept, for read-back of the parameter's live value.
pub fn describe_state(map: &ClassMap, enabled: &[bool]) -> String {
    match map.map_type {
        MapType::DisjointBits => {
            let mut bits: u64 = 0;
            for (i, on) in enabled.iter().enumerate() {
                if *on {
                    bits |= 1 << i;
                }
            }
            alloc::format!("{bits}")
        }
        MapType::LevelNum => {
            let level = enabled.iter().take_while(|on| **on).count();
            alloc::format!("{level}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec;

    fn map(map_type: MapType) -> ClassMap {
        ClassMap::new(
            "m",
            Sym::intern("classparam_test_mod"),
            0,
            map_type,
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn disjoint_bits_reads_value_as_bitmask() {
        let m = map(MapType::DisjointBits);
        // binary 101 => class 0 and class 2
        let d = desired_state(&m, "5").unwrap();
        assert_eq!(d, vec![true, false, true]);
    }

    #[test]
    fn disjoint_bits_masks_surplus_bits() {
        let m = map(MapType::DisjointBits);
        let d = desired_state(&m, "15").unwrap(); // 0b1111, only 3 classes
        assert_eq!(d, vec![true, true, true]);
    }

    #[test]
    fn level_num_enables_strictly_below_level() {
        let m = map(MapType::LevelNum);
        let d = desired_state(&m, "2").unwrap();
        assert_eq!(d, vec![true, true, false]);
    }

    #[test]
    fn level_num_clamps_overshoot() {
        let m = map(MapType::LevelNum);
        let d = desired_state(&m, "99").unwrap();
        assert_eq!(d, vec![true, true, true]);
    }

    #[test]
    fn zero_disables_everything() {
        let m = map(MapType::DisjointBits);
        let d = desired_state(&m, "0").unwrap();
        assert_eq!(d, vec![false, false, false]);
        let m2 = map(MapType::LevelNum);
        let d2 = desired_state(&m2, "0").unwrap();
        assert_eq!(d2, vec![false, false, false]);
    }

    #[test]
    fn non_numeric_value_is_invalid() {
        let m = map(MapType::DisjointBits);
        assert!(desired_state(&m, "zzz").is_err());
    }

    #[test]
    fn describe_round_trips_disjoint() {
        let m = map(MapType::DisjointBits);
        let d = desired_state(&m, "5").unwrap();
        assert_eq!(describe_state(&m, &d), "5");
    }

    #[test]
    fn describe_round_trips_level() {
        let m = map(MapType::LevelNum);
        let d = desired_state(&m, "2").unwrap();
        assert_eq!(describe_state(&m, &d), "2");
    }
}
