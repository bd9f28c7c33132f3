//! Scoped registry container.
//!
//! # Role
//!
//! This module provides the thread-safe store mapping scopes to their named
//! record sets and the consolidated ancestry-filtered query over all of them.
//!
//! # Invariants
//!
//! - A record is filed only under its own owner's bucket (see
//!   `tests::properties`).
//! - Concurrent adds are linearizable with respect to set membership: the
//!   compare-and-swap loop re-reads the table on every conflict, so no
//!   committed record is lost (see `tests::concurrency`).
//! - Buckets hold their scope weakly. A retired scope's bucket is skipped by
//!   queries and dropped opportunistically; the registry never extends a
//!   scope's lifetime.

use std::collections::HashSet;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::RwLock;
use refit_scope::{Scope, ScopeAddr, WeakScope};
use rustc_hash::FxHashMap;

use crate::error::RegistryError;
use crate::record::{RecordPayload, ScopedRecord};

/// Query result: visible payloads unioned by record name.
pub type RecordsByName<T> = FxHashMap<Box<str>, HashSet<T>>;

type RecordSet<T> = HashSet<ScopedRecord<T>>;
type NameTable<T> = FxHashMap<Box<str>, Arc<RecordSet<T>>>;

/// Key of one bucket in the top-level scope map.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
enum BucketKey {
	/// Records filed without an owning scope.
	Unscoped,
	Scoped(ScopeAddr),
}

impl BucketKey {
	fn for_owner(owner: Option<&Scope>) -> Self {
		match owner {
			Some(scope) => Self::Scoped(scope.addr()),
			None => Self::Unscoped,
		}
	}
}

/// One scope's named record sets.
///
/// The name table is published copy-on-write: readers load an immutable
/// snapshot and never see a set mid-mutation.
struct ScopeBucket<T: RecordPayload> {
	/// `None` for the unscoped bucket, which can never die.
	owner: Option<WeakScope>,
	names: ArcSwap<NameTable<T>>,
}

impl<T: RecordPayload> ScopeBucket<T> {
	fn new(owner: Option<WeakScope>) -> Self {
		Self {
			owner,
			names: ArcSwap::from_pointee(NameTable::default()),
		}
	}

	/// True once the owning scope has been retired.
	fn is_dead(&self) -> bool {
		self.owner
			.as_ref()
			.is_some_and(|weak| weak.upgrade().is_none())
	}

	fn insert(&self, name: &str, record: &ScopedRecord<T>) {
		loop {
			let old = self.names.load_full();
			if old.get(name).is_some_and(|set| set.contains(record)) {
				// Membership already holds; re-adding an equal record is a no-op.
				return;
			}
			let mut next = NameTable::clone(&old);
			let mut records = next
				.get(name)
				.map(|set| RecordSet::clone(set))
				.unwrap_or_default();
			records.insert(record.clone());
			next.insert(Box::from(name), Arc::new(records));

			let prev = self.names.compare_and_swap(&old, Arc::new(next));
			if Arc::ptr_eq(&prev, &old) {
				return;
			}
			// Lost the publication race; retry against the fresh table.
		}
	}

	/// Removes records under `name` owned by exactly `owner` (identity match).
	fn remove(&self, name: &str, owner: Option<&Scope>) -> usize {
		let owner_addr = owner.map(Scope::addr);
		loop {
			let old = self.names.load_full();
			let Some(set) = old.get(name) else {
				return 0;
			};
			let keep: RecordSet<T> = set
				.iter()
				.filter(|record| record.owner_addr() != owner_addr)
				.cloned()
				.collect();
			let dropped = set.len() - keep.len();
			if dropped == 0 {
				return 0;
			}

			let mut next = NameTable::clone(&old);
			if keep.is_empty() {
				next.remove(name);
			} else {
				next.insert(Box::from(name), Arc::new(keep));
			}

			let prev = self.names.compare_and_swap(&old, Arc::new(next));
			if Arc::ptr_eq(&prev, &old) {
				return dropped;
			}
		}
	}

	/// Unions this bucket's visible payloads into `out`, keyed by name.
	fn collect_visible(&self, requester: Option<&Scope>, out: &mut RecordsByName<T>) {
		let table = self.names.load();
		for (name, records) in table.iter() {
			let mut visible = records
				.iter()
				.filter(|record| record.visible_to(requester))
				.peekable();
			if visible.peek().is_none() {
				// Names with nothing visible are omitted entirely.
				continue;
			}
			let set = out.entry(name.clone()).or_default();
			for record in visible {
				set.insert(record.payload().clone());
			}
		}
	}

	fn record_count(&self) -> usize {
		self.names.load().values().map(|set| set.len()).sum()
	}
}

/// Concurrent store of scoped rewrite records.
///
/// Shared freely across threads; all operations take `&self`. See the crate
/// docs for the visibility rule served by [`query`](Self::query).
pub struct ScopedRegistry<T: RecordPayload> {
	scopes: RwLock<FxHashMap<BucketKey, Arc<ScopeBucket<T>>>>,
}

impl<T: RecordPayload> ScopedRegistry<T> {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self {
			scopes: RwLock::new(FxHashMap::default()),
		}
	}

	/// Files `record` under `(record.owner(), name)`.
	///
	/// Idempotent for value-equal records. Fails fast, without touching the
	/// store, when `name` is empty or the record's owner is already retired;
	/// absence conditions are never errors.
	pub fn add(&self, name: &str, record: ScopedRecord<T>) -> Result<(), RegistryError> {
		if name.is_empty() {
			return Err(RegistryError::EmptyName);
		}
		// Pin the owner for the duration so the bucket cannot die between
		// lookup and insert.
		let owner = record.owner();
		if owner.is_none() && !record.is_unscoped() {
			return Err(RegistryError::ScopeGone);
		}

		let bucket = self.bucket_for(owner.as_ref());
		bucket.insert(name, &record);
		tracing::trace!(name, owner = owner.as_ref().map_or("<unscoped>", Scope::label), "record added");
		Ok(())
	}

	/// Removes every record under `name` in `scope`'s bucket whose owner is
	/// identity-equal to `scope`.
	///
	/// An absent scope or name is a no-op. Records under the same name owned
	/// by a different scope — even one with an equal label — are untouched.
	pub fn remove(&self, name: &str, scope: Option<&Scope>) {
		let key = BucketKey::for_owner(scope);
		let bucket = {
			let scopes = self.scopes.read();
			scopes.get(&key).cloned()
		};
		let Some(bucket) = bucket else {
			return;
		};
		let dropped = bucket.remove(name, scope);
		if dropped > 0 {
			tracing::trace!(name, dropped, "records removed");
		}
	}

	/// Returns every record name visible to `requester`, with the union of
	/// visible payloads per name.
	///
	/// The result is a detached snapshot: weakly consistent with concurrent
	/// adds and removes, and never affected by (or affecting) later store
	/// mutations. Buckets whose scope has been retired are skipped and
	/// reclaimed on the way.
	pub fn query(&self, requester: Option<&Scope>) -> RecordsByName<T> {
		let buckets: Vec<(BucketKey, Arc<ScopeBucket<T>>)> = {
			let scopes = self.scopes.read();
			scopes
				.iter()
				.map(|(key, bucket)| (*key, Arc::clone(bucket)))
				.collect()
		};

		let mut out = RecordsByName::default();
		let mut dead: Vec<(BucketKey, Arc<ScopeBucket<T>>)> = Vec::new();
		for (key, bucket) in buckets {
			// Hold the owner alive across the scan so per-record upgrades
			// inside stay coherent.
			let owner = bucket.owner.as_ref().map(WeakScope::upgrade);
			if matches!(owner, Some(None)) {
				dead.push((key, bucket));
				continue;
			}
			bucket.collect_visible(requester, &mut out);
		}

		if !dead.is_empty() {
			self.drop_dead(&dead);
		}
		out
	}

	/// Drops the entire bucket for `scope` immediately.
	///
	/// Deterministic teardown for loaders that retire a scope eagerly; with
	/// no call, the bucket is still reclaimed once the scope itself is.
	pub fn clear_scope(&self, scope: Option<&Scope>) {
		let key = BucketKey::for_owner(scope);
		let removed = self.scopes.write().remove(&key);
		if let Some(bucket) = removed {
			tracing::debug!(
				owner = scope.map_or("<unscoped>", Scope::label),
				records = bucket.record_count(),
				"scope bucket cleared"
			);
		}
	}

	/// Sweeps buckets whose scope has been retired; returns how many were
	/// dropped. Queries do this opportunistically, so calling it is optional.
	pub fn prune(&self) -> usize {
		let mut scopes = self.scopes.write();
		let before = scopes.len();
		scopes.retain(|_, bucket| !bucket.is_dead());
		let dropped = before - scopes.len();
		if dropped > 0 {
			tracing::debug!(dropped, "pruned retired scope buckets");
		}
		dropped
	}

	/// Total records across live buckets.
	pub fn len(&self) -> usize {
		let scopes = self.scopes.read();
		scopes
			.values()
			.filter(|bucket| !bucket.is_dead())
			.map(|bucket| bucket.record_count())
			.sum()
	}

	/// True when no live bucket holds a record.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Number of live scopes currently holding a bucket. The unscoped bucket
	/// is not counted; it belongs to no scope.
	pub fn scope_count(&self) -> usize {
		let scopes = self.scopes.read();
		scopes
			.iter()
			.filter(|(key, bucket)| matches!(key, BucketKey::Scoped(_)) && !bucket.is_dead())
			.count()
	}

	/// Fetches the bucket for `owner`, creating it atomically on first use.
	fn bucket_for(&self, owner: Option<&Scope>) -> Arc<ScopeBucket<T>> {
		let key = BucketKey::for_owner(owner);
		{
			let scopes = self.scopes.read();
			if let Some(bucket) = scopes.get(&key)
				&& !bucket.is_dead()
			{
				return Arc::clone(bucket);
			}
		}

		let mut scopes = self.scopes.write();
		match scopes.entry(key) {
			Entry::Occupied(mut entry) => {
				if entry.get().is_dead() {
					// The address was recycled after its previous scope died;
					// the stale bucket's records are unreachable anyway.
					let fresh = Arc::new(ScopeBucket::new(owner.map(Scope::downgrade)));
					entry.insert(Arc::clone(&fresh));
					fresh
				} else {
					// A racing first-inserter won; use the surviving bucket.
					Arc::clone(entry.get())
				}
			}
			Entry::Vacant(entry) => {
				tracing::debug!(
					owner = owner.map_or("<unscoped>", Scope::label),
					"created scope bucket"
				);
				Arc::clone(entry.insert(Arc::new(ScopeBucket::new(owner.map(Scope::downgrade)))))
			}
		}
	}

	/// Removes the given buckets if they are still the installed, dead ones.
	fn drop_dead(&self, dead: &[(BucketKey, Arc<ScopeBucket<T>>)]) {
		let mut scopes = self.scopes.write();
		for (key, observed) in dead {
			if let Some(current) = scopes.get(key)
				&& Arc::ptr_eq(current, observed)
				&& current.is_dead()
			{
				scopes.remove(key);
			}
		}
	}
}

impl<T: RecordPayload> Default for ScopedRegistry<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: RecordPayload> fmt::Debug for ScopedRegistry<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ScopedRegistry")
			.field("scopes", &self.scope_count())
			.field("records", &self.len())
			.finish()
	}
}
