//! Scope handles and identity keys.
//!
//! # Role
//!
//! This module owns the handle types. A [`Scope`] is a cheap `Arc` clone;
//! dropping the last clone outside a registry retires the context, which is
//! what the registry's weak associations key off.
//!
//! # Invariants
//!
//! - Two `Scope` handles are equal iff they share a backing allocation.
//!   Labels never participate in equality or hashing.
//! - [`WeakScope::addr`] stays stable after the scope dies, so a dead weak
//!   handle can still be located under its map key.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

/// Identity key of a scope: the address of its backing allocation.
///
/// Only meaningful for locating an entry keyed while the scope was alive; an
/// address may be reused after the scope is dropped, so holders must pair it
/// with a liveness check before trusting it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeAddr(usize);

impl fmt::Debug for ScopeAddr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "ScopeAddr({:#x})", self.0)
	}
}

struct ScopeInner {
	label: Box<str>,
	parent: Option<Scope>,
}

/// Handle to one isolated loading context.
///
/// Children hold their parent alive, mirroring how loaders reference their
/// delegation parent; nothing holds children.
#[derive(Clone)]
pub struct Scope {
	inner: Arc<ScopeInner>,
}

impl Scope {
	/// Creates a top-of-forest scope with no parent.
	pub fn new(label: impl Into<Box<str>>) -> Self {
		Self {
			inner: Arc::new(ScopeInner {
				label: label.into(),
				parent: None,
			}),
		}
	}

	/// Creates a child of this scope.
	pub fn child(&self, label: impl Into<Box<str>>) -> Self {
		Self {
			inner: Arc::new(ScopeInner {
				label: label.into(),
				parent: Some(self.clone()),
			}),
		}
	}

	/// Diagnostic label. Carries no identity.
	pub fn label(&self) -> &str {
		&self.inner.label
	}

	/// Parent scope, if this scope is not at the top of its tree.
	pub fn parent(&self) -> Option<&Scope> {
		self.inner.parent.as_ref()
	}

	/// Iterates `self`, then each ancestor up to the top of the tree.
	pub fn ancestors(&self) -> Ancestors<'_> {
		Ancestors { next: Some(self) }
	}

	/// Identity key for this scope.
	pub fn addr(&self) -> ScopeAddr {
		ScopeAddr(Arc::as_ptr(&self.inner) as usize)
	}

	/// Non-owning handle to this scope.
	pub fn downgrade(&self) -> WeakScope {
		WeakScope {
			inner: Arc::downgrade(&self.inner),
		}
	}
}

impl PartialEq for Scope {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}
}

impl Eq for Scope {}

impl Hash for Scope {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.addr().hash(state);
	}
}

impl fmt::Debug for Scope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Scope")
			.field("label", &self.label())
			.field("addr", &self.addr())
			.field("parent", &self.parent().map(Scope::label))
			.finish()
	}
}

impl fmt::Display for Scope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.label())
	}
}

/// Non-owning counterpart of [`Scope`].
#[derive(Clone)]
pub struct WeakScope {
	inner: Weak<ScopeInner>,
}

impl WeakScope {
	/// Attempts to restore a strong handle; `None` once the scope is retired.
	pub fn upgrade(&self) -> Option<Scope> {
		self.inner.upgrade().map(|inner| Scope { inner })
	}

	/// Identity key of the referenced scope, valid even after it dies.
	pub fn addr(&self) -> ScopeAddr {
		ScopeAddr(self.inner.as_ptr() as usize)
	}
}

impl fmt::Debug for WeakScope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WeakScope")
			.field("addr", &self.addr())
			.field("live", &(self.inner.strong_count() > 0))
			.finish()
	}
}

/// Self-inclusive walk up the parent chain. See [`Scope::ancestors`].
pub struct Ancestors<'a> {
	next: Option<&'a Scope>,
}

impl<'a> Iterator for Ancestors<'a> {
	type Item = &'a Scope;

	fn next(&mut self) -> Option<&'a Scope> {
		let cur = self.next?;
		self.next = cur.parent();
		Some(cur)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn identity_ignores_labels() {
		let a = Scope::new("sandbox");
		let b = Scope::new("sandbox");
		assert_ne!(a, b, "equal labels must not imply equal scopes");
		assert_eq!(a, a.clone());
		assert_eq!(a.addr(), a.clone().addr());
	}

	#[test]
	fn ancestors_walk_self_first() {
		let root = Scope::new("host");
		let mid = root.child("plugin");
		let leaf = mid.child("module");

		let labels: Vec<&str> = leaf.ancestors().map(Scope::label).collect();
		assert_eq!(labels, ["module", "plugin", "host"]);
		assert_eq!(root.ancestors().count(), 1);
	}

	#[test]
	fn weak_addr_survives_drop() {
		let scope = Scope::new("short-lived");
		let weak = scope.downgrade();
		let addr = scope.addr();

		assert_eq!(weak.addr(), addr);
		assert!(weak.upgrade().is_some());

		drop(scope);
		assert!(weak.upgrade().is_none());
		assert_eq!(weak.addr(), addr, "addr must stay readable after death");
	}

	#[test]
	fn children_keep_parents_alive() {
		let child;
		let weak_parent;
		{
			let parent = Scope::new("host");
			weak_parent = parent.downgrade();
			child = parent.child("plugin");
		}
		assert!(weak_parent.upgrade().is_some(), "child holds parent");
		assert_eq!(child.parent().map(Scope::label), Some("host"));
	}
}
