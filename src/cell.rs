use std::sync::Arc;

use parking_lot::RwLock;

use crate::arena::{CellId, CellMeta, cell_arena_insert, cell_arena_remove, current_effect};
use crate::effect::schedule_flush;

type Comparator<T> = Box<dyn Fn(&T, &T) -> bool + Send + Sync>;

/// Writable reactive cell owning a value of type `T`.
///
/// A cell pairs its value with a change comparator. Writing through
/// [`set`](Cell::set) or [`update`](Cell::update) first asks the comparator
/// whether the new value differs from the old one; only then are subscribed
/// effects marked pending. Reading through [`get`](Cell::get) inside an
/// effect subscribes that effect to the cell.
///
/// Cells are cheaply cloneable handles to shared state; the arena node is
/// released when the last handle drops.
///
/// # Usage
/// ```ignore
/// let count = Cell::new(0u32);
///
/// let effect = Effect::new({
///     let count = count.clone();
///     move || println!("count is {}", count.get())
/// });
///
/// count.set(1);       // marks the effect pending
/// count.set(1);       // comparator no-op, nothing marked
/// flush_effects();    // effect runs once
/// ```
pub struct Cell<T> {
    inner: Arc<CellInner<T>>,
}

struct CellInner<T> {
    node: CellNode,
    value: RwLock<T>,
    equal: Comparator<T>,
}

/// Owns the arena node; detaches subscribers and frees the slot on drop.
struct CellNode {
    id: CellId,
}

impl Drop for CellNode {
    fn drop(&mut self) {
        for effect_id in self.id.subscribers() {
            effect_id.remove_source(self.id);
        }
        cell_arena_remove(self.id);
    }
}

impl<T> Clone for Cell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Cell<T> {
    /// Create a cell that compares values with `PartialEq`.
    pub fn new(initial: T) -> Self
    where
        T: PartialEq,
    {
        Self::with_comparator(initial, T::eq)
    }

    /// Create a cell with a custom change comparator.
    ///
    /// The comparator returns `true` when two values are to be treated as
    /// equal, in which case a write is suppressed entirely.
    pub fn with_comparator<F>(initial: T, equal: F) -> Self
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        let id = cell_arena_insert(CellMeta::new());
        Self {
            inner: Arc::new(CellInner {
                node: CellNode { id },
                value: RwLock::new(initial),
                equal: Box::new(equal),
            }),
        }
    }

    /// Create a cell whose every write notifies, even when the new value
    /// compares equal to the old one.
    ///
    /// Needed for accumulator-style cells that are reset to a prior value and
    /// must still signal the reset.
    pub fn always_notify(initial: T) -> Self {
        Self::with_comparator(initial, |_, _| false)
    }

    /// Read the current value, subscribing the running effect (if any).
    pub fn get(&self) -> T {
        self.inner.node.id.track_dependency();
        self.inner.value.read().clone()
    }

    /// Read the current value without subscribing.
    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Borrow the current value without subscribing or cloning.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.read())
    }

    /// Replace the value. A comparator-equal write changes nothing and
    /// notifies nobody.
    pub fn set(&self, value: T) {
        let changed = {
            let mut guard = self.inner.value.write();
            if (self.inner.equal)(&guard, &value) {
                false
            } else {
                *guard = value;
                true
            }
        };
        if changed {
            self.notify();
        }
    }

    /// Mutate the value in place, atomically with respect to other writers.
    ///
    /// The comparator decides afterwards whether the mutation counts as a
    /// change.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let changed = {
            let mut guard = self.inner.value.write();
            let old = guard.clone();
            f(&mut guard);
            !(self.inner.equal)(&old, &guard)
        };
        if changed {
            self.notify();
        }
    }

    fn notify(&self) {
        self.inner.node.id.notify_subscribers();
        // Inside an effect the surrounding flush picks the marks up on its
        // next fixed-point iteration; outside one, a new flush is needed.
        if current_effect().is_none() {
            schedule_flush();
        }
    }

    pub(crate) fn id(&self) -> CellId {
        self.inner.node.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{Effect, flush_effects};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn comparator_suppresses_equal_writes() {
        let _serial = crate::tests::serial();
        let cell = Cell::new(5i32);
        let runs = Arc::new(AtomicUsize::new(0));

        let _effect = Effect::new({
            let cell = cell.clone();
            let runs = runs.clone();
            move || {
                let _ = cell.get();
                runs.fetch_add(1, Ordering::Relaxed);
            }
        });
        assert_eq!(runs.load(Ordering::Relaxed), 1);

        cell.set(5);
        flush_effects();
        assert_eq!(runs.load(Ordering::Relaxed), 1);

        cell.set(6);
        flush_effects();
        assert_eq!(runs.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn always_notify_fires_on_equal_writes() {
        let _serial = crate::tests::serial();
        let cell = Cell::always_notify(0u8);
        let runs = Arc::new(AtomicUsize::new(0));

        let _effect = Effect::new({
            let cell = cell.clone();
            let runs = runs.clone();
            move || {
                let _ = cell.get();
                runs.fetch_add(1, Ordering::Relaxed);
            }
        });
        assert_eq!(runs.load(Ordering::Relaxed), 1);

        cell.set(0);
        flush_effects();
        assert_eq!(runs.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn update_is_a_read_modify_write() {
        let _serial = crate::tests::serial();
        let cell = Cell::new(vec![1u32]);
        cell.update(|v| v.push(2));
        assert_eq!(cell.get_untracked(), vec![1, 2]);
        assert_eq!(cell.with_untracked(Vec::len), 2);
    }

    #[test]
    fn node_lives_while_any_handle_does() {
        let _serial = crate::tests::serial();
        let cell = Cell::new(1u32);
        let id = cell.id();

        let _effect = Effect::new({
            let cell = cell.clone();
            move || {
                let _ = cell.get();
            }
        });
        assert_eq!(id.subscribers().len(), 1);

        drop(cell);
        // One handle is still captured by the effect; the node lives on.
        assert_eq!(id.subscribers().len(), 1);
    }
}
