//! Concurrent scoped rewrite-record registry.
//!
//! # Role
//!
//! Producers file [`ScopedRecord`]s — descriptions of how a named artifact
//! should be rewritten — tagged with the loading [`Scope`] that defined them.
//! Load-time consumers call [`ScopedRegistry::query`] with their own scope and
//! get back every record whose owner is visible to them under the ancestry
//! rule: the owner is the requester, one of its ancestors, or unscoped.
//!
//! The registry is a passive shared structure: any thread may add, remove,
//! and query with no coordination. It associates with scopes weakly, so a
//! retired loading context is reclaimed together with its records without an
//! explicit removal pass.
//!
//! What the payloads mean is the consumer's business; the registry only
//! answers "which records apply here".

pub mod error;
mod record;
mod store;

pub use error::RegistryError;
pub use record::{RecordPayload, ScopedRecord};
// Re-export scope types from the canonical crate so embedders depending on
// the registry alone get the full surface.
pub use refit_scope::{Ancestors, Scope, ScopeAddr, WeakScope, visible_from};
pub use store::{RecordsByName, ScopedRegistry};

#[cfg(test)]
mod tests;
