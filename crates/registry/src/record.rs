//! Scoped record wrapper.
//!
//! # Role
//!
//! Pairs a rewrite payload with the scope that owns it. The pair is immutable
//! once built, and equality is owner identity plus payload value, so filing
//! an equal record twice collapses to one set member.
//!
//! # Invariants
//!
//! - The owner is held weakly: a stored record must never be the reason its
//!   scope stays alive. The strong reference lives with the embedding loader.

use std::fmt;
use std::hash::{Hash, Hasher};

use refit_scope::{Scope, ScopeAddr, WeakScope, visible_from};

/// Marker bound for values a registry can store.
pub trait RecordPayload: Clone + Eq + Hash + Send + Sync + 'static {}
impl<T> RecordPayload for T where T: Clone + Eq + Hash + Send + Sync + 'static {}

#[derive(Clone)]
enum RecordOwner {
	/// No owning scope; visible to every requester.
	Unscoped,
	Scoped(WeakScope),
}

/// A rewrite payload tagged with its owning scope.
#[derive(Clone)]
pub struct ScopedRecord<T> {
	owner: RecordOwner,
	payload: T,
}

impl<T> ScopedRecord<T> {
	/// Record owned by `scope`.
	pub fn scoped(scope: &Scope, payload: T) -> Self {
		Self {
			owner: RecordOwner::Scoped(scope.downgrade()),
			payload,
		}
	}

	/// Record owned by no scope, visible to every requester.
	pub fn unscoped(payload: T) -> Self {
		Self {
			owner: RecordOwner::Unscoped,
			payload,
		}
	}

	/// Dispatches on the optional-scope form used throughout the query API.
	pub fn new(owner: Option<&Scope>, payload: T) -> Self {
		match owner {
			Some(scope) => Self::scoped(scope, payload),
			None => Self::unscoped(payload),
		}
	}

	/// The owning scope, if any and still alive.
	///
	/// `None` means the record is unscoped *or* its owner has been retired;
	/// [`is_unscoped`](Self::is_unscoped) distinguishes the two.
	pub fn owner(&self) -> Option<Scope> {
		match &self.owner {
			RecordOwner::Unscoped => None,
			RecordOwner::Scoped(weak) => weak.upgrade(),
		}
	}

	/// True when the record was filed without an owning scope.
	pub fn is_unscoped(&self) -> bool {
		matches!(self.owner, RecordOwner::Unscoped)
	}

	/// The wrapped payload.
	pub fn payload(&self) -> &T {
		&self.payload
	}

	/// Unwraps the payload, discarding the owner tag.
	pub fn into_payload(self) -> T {
		self.payload
	}

	/// True when this record's owner is visible from `requester`.
	///
	/// A scoped record whose owner has been retired is visible to no one.
	pub fn visible_to(&self, requester: Option<&Scope>) -> bool {
		match &self.owner {
			RecordOwner::Unscoped => true,
			RecordOwner::Scoped(weak) => match weak.upgrade() {
				Some(owner) => visible_from(requester, Some(&owner)),
				None => false,
			},
		}
	}

	/// Identity key of the owner; `None` for unscoped records.
	pub(crate) fn owner_addr(&self) -> Option<ScopeAddr> {
		match &self.owner {
			RecordOwner::Unscoped => None,
			RecordOwner::Scoped(weak) => Some(weak.addr()),
		}
	}
}

impl<T: PartialEq> PartialEq for ScopedRecord<T> {
	fn eq(&self, other: &Self) -> bool {
		self.owner_addr() == other.owner_addr() && self.payload == other.payload
	}
}

impl<T: Eq> Eq for ScopedRecord<T> {}

impl<T: Hash> Hash for ScopedRecord<T> {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.owner_addr().hash(state);
		self.payload.hash(state);
	}
}

impl<T: fmt::Debug> fmt::Debug for ScopedRecord<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let owner = match &self.owner {
			RecordOwner::Unscoped => None,
			RecordOwner::Scoped(weak) => Some(weak.addr()),
		};
		f.debug_struct("ScopedRecord")
			.field("owner", &owner)
			.field("payload", &self.payload)
			.finish()
	}
}
