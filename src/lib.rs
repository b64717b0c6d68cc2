//! A runtime-configurable debug-logging engine: per-callsite descriptors
//! that start disabled, a query language to select and flip subsets of
//! them, and destinations (plain sink, trace sink) each descriptor can
//! be routed to instead.
//!
//! The host owns the actual call sites and the actual output backends;
//! this crate owns the registry, the query language, and the matching/
//! mutation logic in between.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod boot;
#[cfg(feature = "classes")]
pub mod classmap;
#[cfg(feature = "classes")]
pub mod classparam;
pub mod control;
pub mod descriptor;
pub mod diag;
pub mod emit;
mod error;
mod intern;
pub mod matcher;
pub mod query;
pub mod registry;
mod table;
#[cfg(feature = "trace")]
pub mod trace;
mod wildcard;

pub use descriptor::{ClassId, Descriptor, DescriptorBuilder, FastBranch, Flags};
pub use error::{Error, Result};
pub use registry::{Registry, SiteSpec};
