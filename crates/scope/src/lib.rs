//! Loading-scope identity and ancestry.
//!
//! A [`Scope`] stands for one isolated loading context: the sandbox, plugin
//! host, or module loader that defined an artifact. Scopes are created by the
//! embedding loader, compare by identity rather than by label, and form a
//! forest through an optional parent link.
//!
//! The absence of a scope (`None` in an `Option<Scope>` or
//! `Option<&Scope>`) is the *unscoped* position: records owned by no scope
//! are visible to every requester, and a requester with no scope sees only
//! those. [`visible_from`] implements the ancestry rule on top of this.

mod scope;
mod visibility;

pub use scope::{Ancestors, Scope, ScopeAddr, WeakScope};
pub use visibility::visible_from;
