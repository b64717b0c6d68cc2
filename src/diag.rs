//! The crate's own diagnostic chatter, independent of the host's `log`
//! level filtering: a tiered `verbose` knob (0..=4, see
//! [`crate::registry::Registry::set_verbose`]) gates whether a message
//! is even built, and anything that clears the gate still goes through
//! the ordinary `log` facade so the host's existing logger configuration
//! decides where it ends up.

use crate::registry::Registry;

/// Emit `args` at `log::Level::Trace` if `registry`'s verbosity is at
/// least `level`. Mirrors the `vN pr_info` ladder in the original: `v1`
/// is the least chatty, `v4` the most.
pub fn emit(registry: &Registry, level: u8, args: core::fmt::Arguments<'_>) {
    if registry.verbose() >= level {
        log::trace!("{args}");
    }
}

/// `emit` at level 1.
#[macro_export]
macro_rules! v1pr {
    ($registry:expr, $($arg:tt)+) => {
        $crate::diag::emit($registry, 1, format_args!($($arg)+))
    };
}

/// `emit` at level 2.
#[macro_export]
macro_rules! v2pr {
    ($registry:expr, $($arg:tt)+) => {
        $crate::diag::emit($registry, 2, format_args!($($arg)+))
    };
}

/// `emit` at level 3.
#[macro_export]
macro_rules! v3pr {
    ($registry:expr, $($arg:tt)+) => {
        $crate::diag::emit($registry, 3, format_args!($($arg)+))
    };
}

/// `emit` at level 4.
#[macro_export]
macro_rules! v4pr {
    ($registry:expr, $($arg:tt)+) => {
        $crate::diag::emit($registry, 4, format_args!($($arg)+))
    };
}
