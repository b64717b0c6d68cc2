//! Boot/command-line query ingestion: `dyndbg=<query>` applies globally,
//! `<module>.dyndbg=<query>` applies only to one module's descriptors.
//! Neither of these is anything the crate can discover on its own (there
//! is no command line to scan in a library); the host passes each
//! recognized parameter in as it walks its own boot argument list or
//! per-module unknown-parameter callback.

use alloc::string::{String, ToString};

use crate::error::Error;
use crate::registry::Registry;

/// Where a boot parameter's query line should be applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BootTarget {
    /// `dyndbg=<query>` (also accepted as the legacy `ddebug_query=`).
    Global,
    /// `<module>.dyndbg=<query>`.
    Module(String),
}

/// A recognized dynamic-debug boot parameter, not yet applied.
#[derive(Clone, Debug)]
pub struct BootParam {
    pub target: BootTarget,
    pub query: String,
}

/// Recognize `key=value` as a dynamic-debug boot parameter. Returns
/// `None` for any key this subsystem doesn't own, so the host can chain
/// this into its existing "unknown parameter" dispatch without this
/// crate needing to know about every other parameter in the system.
/// `<module>.dyndbg` splits on the *first* `.`, so a module whose own
/// name contains a dot is not recognized by this global form (it still
/// gets picked up through its own per-module callback and
/// [`handle_module_param`]).
pub fn parse_param(key: &str, value: &str) -> Option<BootParam> {
    if key == "dyndbg" || key == "ddebug_query" {
        return Some(BootParam {
            target: BootTarget::Global,
            query: value.to_string(),
        });
    }
    if let Some((module, rest)) = key.split_once('.') {
        if rest == "dyndbg" && !module.is_empty() {
            return Some(BootParam {
                target: BootTarget::Module(module.to_string()),
                query: value.to_string(),
            });
        }
    }
    None
}

/// Apply one already-recognized boot parameter against `registry`.
/// Errors are swallowed into the returned matched-count being zero: a
/// malformed boot argument shouldn't be able to abort the rest of boot,
/// the same tolerance [`Registry::exec_queries`] gives a bad subcommand.
pub fn apply(registry: &Registry, param: &BootParam) -> Result<usize, Error> {
    match &param.target {
        BootTarget::Global => registry.exec_query(&param.query),
        #[cfg(feature = "boot-params")]
        BootTarget::Module(modname) => registry.exec_query_for_module(modname, &param.query),
        #[cfg(not(feature = "boot-params"))]
        BootTarget::Module(_) => Err(Error::invalid()),
    }
}

/// Apply every recognized boot parameter in order, ignoring individual
/// failures, and report the total matched-descriptor count.
pub fn apply_all(registry: &Registry, params: &[BootParam]) -> usize {
    params
        .iter()
        .filter_map(|p| apply(registry, p).ok())
        .sum()
}

/// A module's own unrecognized-parameter callback routes any parameter
/// named `dyndbg` here, whatever its value: an empty value just enables
/// plain printing (`+p`) for the whole module, a non-empty value is run
/// as a full query line scoped to that module. Returns `Ok(0)` (not an
/// error) for a parameter name other than `dyndbg`, since a module's
/// callback sees every one of its own parameters and most aren't this
/// subsystem's concern.
#[cfg(feature = "boot-params")]
pub fn handle_module_param(
    registry: &Registry,
    modname: &str,
    param_name: &str,
    value: &str,
) -> Result<usize, Error> {
    if param_name != "dyndbg" {
        return Ok(0);
    }
    let query = if value.is_empty() { "+p" } else { value };
    registry.exec_query_for_module(modname, query)
}
