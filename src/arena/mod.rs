// Arena-based storage for reactive node metadata.
//
// Two arenas: the cell arena stores subscriber sets, the effect arena stores
// callbacks and source sets. Both use global static slabs behind RwLocks;
// CellId and EffectId are lightweight newtypes indexing into them. A stale id
// (node already removed) makes every accessor return None.

pub mod cell_arena;
pub mod effect_arena;

pub use cell_arena::{CellId, CellMeta, cell_arena_insert, cell_arena_remove};
pub use effect_arena::{
    CurrentEffectGuard, EffectCallback, EffectId, EffectMeta, current_effect,
    effect_arena_insert, effect_arena_remove, mark_effect_pending, pending_effects_count,
    remove_from_pending, take_pending_effects,
};
