// Cell arena - storage for cell metadata.
//
// A cell's value lives in the Cell<T> struct itself; the arena only holds the
// reactive bookkeeping (the subscriber set). This keeps the arena untyped and
// lets ids stay plain u32 indices.

use parking_lot::RwLock;
use slab::Slab;

use crate::hash::{FastSet, fast_set};

use super::EffectId;
use super::effect_arena::{current_effect, mark_effect_pending};

/// Global cell arena.
static CELL_ARENA: RwLock<Slab<CellMeta>> = RwLock::new(Slab::new());

/// Unique identifier for a cell node in the arena.
///
/// Zero-cost wrapper around a slab index. When the owning cell is dropped it
/// removes itself from the arena, making the id stale; accessors on a stale
/// id return `None`.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct CellId(u32);

impl CellId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Access the cell metadata (read-only). `None` on stale access.
    pub fn with<F, R>(self, f: F) -> Option<R>
    where
        F: FnOnce(&CellMeta) -> R,
    {
        let arena = CELL_ARENA.read();
        arena.get(self.index()).map(f)
    }

    /// Record the currently running effect as a subscriber of this cell.
    ///
    /// Called on the read path. Outside of any effect this is a no-op.
    pub fn track_dependency(self) {
        if let Some(effect_id) = current_effect() {
            effect_id.add_source(self);
            self.add_subscriber(effect_id);
        }
    }

    pub fn add_subscriber(self, effect_id: EffectId) {
        self.with(|meta| {
            meta.subscribers.write().insert(effect_id);
        });
    }

    pub fn remove_subscriber(self, effect_id: EffectId) {
        self.with(|meta| {
            meta.subscribers.write().remove(&effect_id);
        });
    }

    /// Snapshot of the current subscriber set.
    ///
    /// Collected into a Vec so no arena lock is held while the caller acts on
    /// the subscribers.
    pub fn subscribers(self) -> Vec<EffectId> {
        self.with(|meta| meta.subscribers.read().iter().copied().collect())
            .unwrap_or_default()
    }

    /// Mark every subscriber pending.
    ///
    /// Actual execution is deferred to `flush_effects`, which is what batches
    /// several same-tick notifications into one run per effect.
    pub fn notify_subscribers(self) {
        for effect_id in self.subscribers() {
            mark_effect_pending(effect_id);
        }
    }
}

/// Reactive bookkeeping for one cell: the effects subscribed to it.
#[derive(Debug)]
pub struct CellMeta {
    pub(crate) subscribers: RwLock<FastSet<EffectId>>,
}

impl CellMeta {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(fast_set()),
        }
    }
}

impl Default for CellMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// Insert a cell into the arena and return its id.
pub fn cell_arena_insert(meta: CellMeta) -> CellId {
    let mut arena = CELL_ARENA.write();
    let entry = arena.vacant_entry();
    let key = entry.key();
    entry.insert(meta);
    CellId::new(key as u32)
}

/// Remove a cell from the arena. `None` if it was already removed.
pub fn cell_arena_remove(id: CellId) -> Option<CellMeta> {
    let mut arena = CELL_ARENA.write();
    if arena.contains(id.index()) {
        Some(arena.remove(id.index()))
    } else {
        None
    }
}
