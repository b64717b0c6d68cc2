//! Module-name interning.
//!
//! Module tables are looked up and removed by name. The host hands us a
//! `&str` it owns for the lifetime of the module (its own module struct),
//! but we want removal to compare by identity rather than by content, the
//! same way a kernel compares `dt->mod_name == mod->name` by pointer: two
//! calls with the textually-identical name from two different load cycles
//! of the same module should not collide, and comparing by id is O(1)
//! instead of O(len).

use alloc::boxed::Box;
use alloc::string::String;
use hashbrown::HashMap;
use spin::Mutex;

/// An opaque, `Copy` handle to an interned module name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Sym(u32);

struct Interner {
    names: HashMap<Box<str>, Sym>,
    strs: alloc::vec::Vec<Box<str>>,
}

impl Interner {
    const fn new() -> Self {
        Interner {
            names: HashMap::new(),
            strs: alloc::vec::Vec::new(),
        }
    }

    fn intern(&mut self, name: &str) -> Sym {
        if let Some(sym) = self.names.get(name) {
            return *sym;
        }
        let boxed: Box<str> = String::from(name).into_boxed_str();
        let sym = Sym(self.strs.len() as u32);
        self.strs.push(boxed.clone());
        self.names.insert(boxed, sym);
        sym
    }

    fn resolve(&self, sym: Sym) -> &str {
        &self.strs[sym.0 as usize]
    }
}

static INTERNER: Mutex<Option<Interner>> = Mutex::new(None);

fn with_interner<R>(f: impl FnOnce(&mut Interner) -> R) -> R {
    let mut guard = INTERNER.lock();
    let interner = guard.get_or_insert_with(Interner::new);
    f(interner)
}

impl Sym {
    /// Intern `name`, returning a handle that compares in O(1) and is
    /// stable for the lifetime of the process.
    pub fn intern(name: &str) -> Sym {
        with_interner(|i| i.intern(name))
    }

    /// Recover the original string. Panics never happen in practice since
    /// `Sym`s are only ever produced by `intern`.
    pub fn as_str(self) -> alloc::string::String {
        with_interner(|i| alloc::string::String::from(i.resolve(self)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_same_symbol() {
        let a = Sym::intern("net");
        let b = Sym::intern("net");
        assert_eq!(a, b);
    }

    #[test]
    fn different_text_different_symbol() {
        let a = Sym::intern("net");
        let b = Sym::intern("usb");
        assert_ne!(a, b);
    }

    #[test]
    fn round_trips_text() {
        let a = Sym::intern("scsi_core");
        assert_eq!(a.as_str(), "scsi_core");
    }
}
