//! Registry error types.
//!
//! Absence is never an error here: removing a name that was never added or
//! querying an empty store both succeed with empty results. Only caller
//! contract violations surface, and they are rejected before any store
//! mutation.

/// Errors returned by [`ScopedRegistry::add`](crate::ScopedRegistry::add).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
	/// Record names identify rewrite targets; an empty name can never match one.
	#[error("record name must not be empty")]
	EmptyName,

	/// The record's owning scope was already retired when the add was filed.
	/// Producers must hold the scope alive across registration.
	#[error("owning scope was retired before registration")]
	ScopeGone,
}
