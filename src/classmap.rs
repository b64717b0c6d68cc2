//! Named class-id spaces.
//!
//! A module `DEFINE`s a classmap giving a name to each of its `class=`
//! ids; other modules can `USE` the same map by name so that a single
//! `class=<name>` query addresses every module that shares it. Two
//! layouts are supported, matching the two class-parameter write forms
//! in [`crate::classparam`]: a disjoint bitmap (each class is its own
//! independent bit) or a threshold level (enabling class N implies
//! every class below it).

use alloc::string::String;
use alloc::vec::Vec;

use crate::descriptor::CLASS_MAX;
use crate::error::{Error, Result};
use crate::intern::Sym;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MapType {
    /// Each named class is independently on or off.
    DisjointBits,
    /// Classes are ordered; enabling level N enables 0..=N.
    LevelNum,
}

/// A classmap: an ordered list of class names occupying `[base, base +
/// length)` of the 6-bit class-id space, owned by one module. Class-id
/// of `class_names[i]` is `base + i`.
pub struct ClassMap {
    pub(crate) name: Sym,
    pub(crate) owning_module: Sym,
    pub base: u8,
    pub map_type: MapType,
    class_names: Vec<String>,
}

impl ClassMap {
    /// Build a classmap. Fails if `base + class_names.len()` would run
    /// past the 6-bit class-id space (`CLASS_MAX + 1`); does not check
    /// for overlap against other maps of the same module — that check
    /// needs visibility into the module's existing maps and is done by
    /// [`check_no_overlap`] at registration time.
    pub fn new(
        name: &str,
        owning_module: Sym,
        base: u8,
        map_type: MapType,
        class_names: Vec<String>,
    ) -> Result<Self> {
        let length = class_names.len();
        if base as usize + length > CLASS_MAX as usize + 1 {
            return Err(Error::too_big());
        }
        Ok(ClassMap {
            name: Sym::intern(name),
            owning_module,
            base,
            map_type,
            class_names,
        })
    }

    pub fn name(&self) -> Sym {
        self.name
    }

    pub fn owning_module(&self) -> Sym {
        self.owning_module
    }

    pub fn length(&self) -> u8 {
        self.class_names.len() as u8
    }

    pub fn id_of(&self, name: &str) -> Option<u8> {
        self.class_names
            .iter()
            .position(|n| n == name)
            .map(|i| self.base + i as u8)
    }

    pub fn name_of(&self, id: u8) -> Option<&str> {
        let idx = id.checked_sub(self.base)? as usize;
        self.class_names.get(idx).map(|s| s.as_str())
    }

    /// Number of class names in this map (its `length`, distinct from
    /// the raw class-id range it occupies).
    pub fn len(&self) -> usize {
        self.class_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.class_names.is_empty()
    }
}

/// Validate that `candidate` does not overlap `[base, base+length)` with
/// any existing map owned by the same module. Per the data model, two
/// maps of one module must not share a class-id; maps of *different*
/// modules may freely overlap (their ids are only ever interpreted
/// relative to that module's own descriptors).
pub fn check_no_overlap(existing: &[ClassMap], candidate: &ClassMap) -> Result<()> {
    let (cand_lo, cand_hi) = (candidate.base, candidate.base + candidate.length());
    for m in existing {
        if m.owning_module != candidate.owning_module {
            continue;
        }
        let (lo, hi) = (m.base, m.base + m.length());
        if cand_lo < hi && lo < cand_hi {
            return Err(Error::invalid());
        }
    }
    Ok(())
}

/// A module's binding to a [`ClassMap`]: which map it uses, and which of
/// its own descriptor class-ids fall inside that map versus being private
/// to the module (a module may `DEFINE` a map and not every one of its
/// own callsites needs to participate in it).
pub struct ClassUser {
    pub(crate) module: Sym,
    pub(crate) map_name: Sym,
}

impl ClassUser {
    pub fn new(module: Sym, map_name: Sym) -> Self {
        ClassUser { module, map_name }
    }

    pub fn module(&self) -> Sym {
        self.module
    }

    pub fn map_name(&self) -> Sym {
        self.map_name
    }
}

/// Resolve a class name to a concrete id in the context of module
/// `modname`: search the maps `modname` itself owns first, then fall
/// back to maps it declared as a user of (`USE`). Mirrors the matcher's
/// `resolve_class`.
pub fn resolve(
    classmaps: &[ClassMap],
    class_users: &[ClassUser],
    modname: Sym,
    class_name: &str,
) -> Option<(Sym, u8)> {
    for m in classmaps.iter().filter(|m| m.owning_module == modname) {
        if let Some(id) = m.id_of(class_name) {
            return Some((m.name(), id));
        }
    }
    for user in class_users.iter().filter(|u| u.module == modname) {
        if let Some(m) = classmaps.iter().find(|m| m.name() == user.map_name) {
            if let Some(id) = m.id_of(class_name) {
                return Some((m.name(), id));
            }
        }
    }
    None
}
