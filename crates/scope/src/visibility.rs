//! Ancestry visibility resolution.
//!
//! # Role
//!
//! Pure answer to "may a requester in this scope see a record owned by that
//! scope". No registry state is consulted; the walk reads only the parent
//! links the embedding loader wired at scope construction.

use crate::scope::Scope;

/// Returns true when `owner` is visible from `requester`.
///
/// An unscoped owner (`None`) is visible everywhere. Otherwise the owner must
/// be the requester itself or one of its ancestors — the walk goes strictly
/// upward, so records owned by a descendant or a sibling of the requester are
/// not visible. A requester with no scope (`None`) has no ancestors and sees
/// only unscoped records.
///
/// Cost is O(depth of the requester's chain). The chain has no assumed bound;
/// the walk ends only at a scope with no parent.
pub fn visible_from(requester: Option<&Scope>, owner: Option<&Scope>) -> bool {
	let Some(owner) = owner else {
		return true;
	};
	let Some(requester) = requester else {
		return false;
	};
	requester.ancestors().any(|scope| scope == owner)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ancestor_chain_is_visible_downward_only() {
		let a = Scope::new("a");
		let b = a.child("b");
		let c = b.child("c");

		// A record owned by `a` is visible from a, b, and c.
		for requester in [&a, &b, &c] {
			assert!(visible_from(Some(requester), Some(&a)));
		}

		// A record owned by `c` is visible only from c.
		assert!(visible_from(Some(&c), Some(&c)));
		assert!(!visible_from(Some(&b), Some(&c)));
		assert!(!visible_from(Some(&a), Some(&c)));
	}

	#[test]
	fn unscoped_owner_is_visible_everywhere() {
		let a = Scope::new("a");
		let b = Scope::new("b");
		let leaf = b.child("leaf");

		assert!(visible_from(None, None));
		assert!(visible_from(Some(&a), None));
		assert!(visible_from(Some(&leaf), None));
	}

	#[test]
	fn siblings_are_mutually_invisible() {
		let host = Scope::new("host");
		let left = host.child("left");
		let right = host.child("right");

		assert!(!visible_from(Some(&left), Some(&right)));
		assert!(!visible_from(Some(&right), Some(&left)));
		// ...but both see their shared parent.
		assert!(visible_from(Some(&left), Some(&host)));
		assert!(visible_from(Some(&right), Some(&host)));
	}

	#[test]
	fn unscoped_requester_sees_only_unscoped() {
		let a = Scope::new("a");
		assert!(!visible_from(None, Some(&a)));
		assert!(visible_from(None, None));
	}

	#[test]
	fn unrelated_trees_are_invisible() {
		let a = Scope::new("a");
		let b = Scope::new("b");
		assert!(!visible_from(Some(&a), Some(&b)));
	}

	#[test]
	fn deep_chains_terminate() {
		let mut scope = Scope::new("root");
		let top = scope.clone();
		for depth in 0..512 {
			scope = scope.child(format!("level-{depth}"));
		}
		assert!(visible_from(Some(&scope), Some(&top)));
		assert!(!visible_from(Some(&top), Some(&scope)));
	}
}
