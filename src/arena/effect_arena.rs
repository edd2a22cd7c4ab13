// Effect arena - storage for effect callbacks and dependency bookkeeping.
//
// An effect is a callback plus the set of cells it read on its last run.
// Pending effects are tracked in a global insertion-ordered set so a flush is
// O(pending) rather than a scan of the whole arena, and so marking the same
// effect twice in one tick queues it once.

use std::cell::Cell;
use std::sync::LazyLock;

use parking_lot::{Mutex, RwLock};
use slab::Slab;

use crate::hash::{FastIndexSet, FastSet, fast_index_set, fast_set};

use super::CellId;

/// Boxed effect callback as stored in the arena.
pub type EffectCallback = Box<dyn FnMut() + Send>;

/// Global effect arena.
static EFFECT_ARENA: RwLock<Slab<EffectMeta>> = RwLock::new(Slab::new());

/// Global set of pending effect ids, in marking order.
static PENDING: LazyLock<RwLock<FastIndexSet<EffectId>>> =
    LazyLock::new(|| RwLock::new(fast_index_set()));

thread_local! {
    // Effect currently executing on this thread; reads subscribe to it.
    static CURRENT_EFFECT: Cell<Option<EffectId>> = const { Cell::new(None) };
}

/// The effect currently executing on this thread, if any.
pub fn current_effect() -> Option<EffectId> {
    CURRENT_EFFECT.with(Cell::get)
}

/// RAII guard that restores the previous current effect when dropped, even if
/// the callback panics.
pub struct CurrentEffectGuard {
    previous: Option<EffectId>,
}

impl CurrentEffectGuard {
    /// Set `CURRENT_EFFECT` to `effect`, remembering the previous value.
    pub fn new(effect: Option<EffectId>) -> Self {
        let previous = CURRENT_EFFECT.with(|c| c.replace(effect));
        Self { previous }
    }
}

impl Drop for CurrentEffectGuard {
    fn drop(&mut self) {
        CURRENT_EFFECT.with(|c| c.set(self.previous));
    }
}

/// Unique identifier for an effect node in the arena.
///
/// Zero-cost wrapper around a slab index; stale after the owning `Effect` is
/// dropped, in which case every accessor returns `None`.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct EffectId(u32);

impl EffectId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Access the effect metadata (read-only). `None` on stale access.
    pub fn with<F, R>(self, f: F) -> Option<R>
    where
        F: FnOnce(&EffectMeta) -> R,
    {
        let arena = EFFECT_ARENA.read();
        arena.get(self.index()).map(f)
    }

    pub fn add_source(self, source: CellId) {
        self.with(|meta| {
            meta.sources.write().insert(source);
        });
    }

    /// Drop one source without unsubscribing; used when a cell is destroyed
    /// and has already forgotten this effect.
    pub fn remove_source(self, source: CellId) {
        self.with(|meta| {
            meta.sources.write().remove(&source);
        });
    }

    /// Take the whole source set, leaving it empty.
    ///
    /// Collected into a Vec so no arena lock is held while the caller
    /// unsubscribes from each cell.
    pub fn take_sources(self) -> Vec<CellId> {
        self.with(|meta| {
            let mut sources = meta.sources.write();
            sources.drain().collect()
        })
        .unwrap_or_default()
    }

    /// Run the stored callback.
    ///
    /// The callback is taken out of the arena for the duration of the call so
    /// no lock is held while user code runs; a reentrant call on the same
    /// effect finds the slot empty and returns. If the effect is destroyed
    /// while its callback runs, the callback is simply not restored.
    pub fn run_callback(self) {
        let Some(mut callback) = self.with(|meta| meta.callback.lock().take()).flatten() else {
            return;
        };

        callback();

        let mut callback = Some(callback);
        self.with(|meta| {
            *meta.callback.lock() = callback.take();
        });
        // If the effect vanished while running, the callback (and whatever
        // state it owns) is dropped here, outside the arena lock.
    }
}

/// Metadata for one effect: its callback and the cells it currently reads.
pub struct EffectMeta {
    pub(crate) callback: Mutex<Option<EffectCallback>>,
    pub(crate) sources: RwLock<FastSet<CellId>>,
}

impl EffectMeta {
    pub fn new(callback: EffectCallback) -> Self {
        Self {
            callback: Mutex::new(Some(callback)),
            sources: RwLock::new(fast_set()),
        }
    }
}

/// Insert an effect into the arena and return its id.
pub fn effect_arena_insert(meta: EffectMeta) -> EffectId {
    let mut arena = EFFECT_ARENA.write();
    let entry = arena.vacant_entry();
    let key = entry.key();
    entry.insert(meta);
    EffectId::new(key as u32)
}

/// Remove an effect from the arena. `None` if it was already removed.
pub fn effect_arena_remove(id: EffectId) -> Option<EffectMeta> {
    let mut arena = EFFECT_ARENA.write();
    if arena.contains(id.index()) {
        Some(arena.remove(id.index()))
    } else {
        None
    }
}

/// Queue an effect for the next flush. Marking an already-pending effect is a
/// no-op, which is what coalesces rapid notifications.
pub fn mark_effect_pending(id: EffectId) {
    PENDING.write().insert(id);
}

/// Remove an effect from the pending set (on teardown).
pub fn remove_from_pending(id: EffectId) {
    PENDING.write().shift_remove(&id);
}

/// Atomically take every pending effect, in marking order.
pub fn take_pending_effects() -> Vec<EffectId> {
    let mut pending = PENDING.write();
    pending.drain(..).collect()
}

/// Number of effects currently queued for the next flush.
pub fn pending_effects_count() -> usize {
    PENDING.read().len()
}
