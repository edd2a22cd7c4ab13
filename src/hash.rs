//! Fixed-seed hash collections for internal bookkeeping.
//!
//! Subscriber sets, source sets and the pending set are internal data
//! structures keyed by small arena indices; HashDoS resistance is not a
//! concern there, so they all use foldhash with one fixed seed. The fixed
//! seed keeps iteration order stable between runs.

use std::collections::HashSet;

use foldhash::fast::FixedState;
use indexmap::IndexSet;

const SEED: u64 = 0x9e37_79b9_7f4a_7c15;

/// `HashSet` keyed with the crate-wide fixed-seed hasher.
pub(crate) type FastSet<T> = HashSet<T, FixedState>;

/// Insertion-ordered set keyed with the crate-wide fixed-seed hasher.
pub(crate) type FastIndexSet<T> = IndexSet<T, FixedState>;

pub(crate) fn fixed_state() -> FixedState {
    FixedState::with_seed(SEED)
}

pub(crate) fn fast_set<T>() -> FastSet<T> {
    HashSet::with_hasher(fixed_state())
}

pub(crate) fn fast_index_set<T>() -> FastIndexSet<T> {
    IndexSet::with_hasher(fixed_state())
}
