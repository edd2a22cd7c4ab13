use std::cell::Cell;

use crate::arena::{
    CurrentEffectGuard, EffectId, EffectMeta, current_effect, effect_arena_insert,
    effect_arena_remove, mark_effect_pending, remove_from_pending, take_pending_effects,
};

thread_local! {
    // Set when a notification has requested a flush that has not run yet.
    // Lets multiple same-tick notifications request a single flush.
    static FLUSH_SCHEDULED: Cell<bool> = const { Cell::new(false) };
}

/// Request a flush without running it.
///
/// Called from cell notifications; repeated calls before the flush are
/// coalesced. The actual work happens when [`flush_effects`] runs, either
/// called by the host at its tick boundary or driven by the background
/// [`EffectLoop`](crate::EffectLoop).
pub(crate) fn schedule_flush() {
    FLUSH_SCHEDULED.with(|scheduled| scheduled.set(true));
    crate::executor::notify_effect_loop();
}

/// Whether a flush has been requested but not yet run on this thread.
pub fn is_flush_scheduled() -> bool {
    FLUSH_SCHEDULED.with(Cell::get)
}

/// Run every pending effect until none remain.
///
/// This is the scheduling tick: all writes that happened since the previous
/// flush are observed by their dependent effects now, each effect at most
/// once per iteration. Effects that mark further effects while running (or
/// re-mark themselves) are handled by fixed-point iteration — the loop keeps
/// draining until the pending set stays empty.
///
/// Returns the number of effect runs performed.
pub fn flush_effects() -> usize {
    FLUSH_SCHEDULED.with(|scheduled| scheduled.set(false));

    let mut total = 0;
    loop {
        let pending = take_pending_effects();
        if pending.is_empty() {
            break;
        }
        for effect_id in pending {
            run_effect(effect_id);
            total += 1;
        }
    }
    total
}

/// Run a closure without dependency tracking.
///
/// Cell reads inside `f` do not subscribe the surrounding effect. Useful for
/// peeking at values that must not become dependencies.
pub fn untracked<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = CurrentEffectGuard::new(None);
    f()
}

/// Re-run one effect: drop last run's subscriptions, then execute the
/// callback with dependency tracking active so this run's reads re-subscribe.
fn run_effect(effect_id: EffectId) {
    for source in effect_id.take_sources() {
        source.remove_subscriber(effect_id);
    }

    let _guard = CurrentEffectGuard::new(Some(effect_id));
    effect_id.run_callback();
}

/// Side-effectful computation that re-runs when any cell it reads changes.
///
/// The callback runs once at construction to establish its dependencies;
/// afterwards, any change to a cell it read marks it pending, and the next
/// [`flush_effects`] runs it again. Several changes between flushes produce a
/// single run.
///
/// Dropping the `Effect` unsubscribes it everywhere and frees its arena slot.
///
/// # Usage
/// ```ignore
/// let label = Cell::new(String::from("a"));
///
/// let effect = Effect::new({
///     let label = label.clone();
///     move || println!("label: {}", label.get())
/// });   // prints "label: a"
///
/// label.set("b".into());
/// label.set("c".into());
/// flush_effects();   // prints "label: c" once
/// ```
pub struct Effect {
    id: EffectId,
}

impl Effect {
    /// Create the effect and run it immediately.
    pub fn new<F>(f: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let id = effect_arena_insert(EffectMeta::new(Box::new(f)));
        run_effect(id);
        Self { id }
    }

    /// Create the effect without running it; the first run happens at the
    /// next flush, after every other same-tick mark queued before it.
    ///
    /// Use this when the callback observes state that the rest of the
    /// current tick is still setting up, so its first observation should see
    /// the settled values rather than the construction-time ones.
    pub fn new_deferred<F>(f: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let id = effect_arena_insert(EffectMeta::new(Box::new(f)));
        mark_effect_pending(id);
        if current_effect().is_none() {
            schedule_flush();
        }
        Self { id }
    }
}

impl Drop for Effect {
    fn drop(&mut self) {
        remove_from_pending(self.id);
        for source in self.id.take_sources() {
            source.remove_subscriber(self.id);
        }
        effect_arena_remove(self.id);
    }
}

// NOTE: Effect intentionally does not implement Clone; it is the single owner
// of its arena slot and cleans it up on drop.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn rapid_writes_batch_into_one_run() {
        let _serial = crate::tests::serial();
        let counter = Cell::new(0u32);
        let runs = Arc::new(AtomicUsize::new(0));

        let _effect = Effect::new({
            let counter = counter.clone();
            let runs = runs.clone();
            move || {
                let _ = counter.get();
                runs.fetch_add(1, Ordering::Relaxed);
            }
        });
        assert_eq!(runs.load(Ordering::Relaxed), 1);

        for i in 1..=20 {
            counter.set(i);
        }
        assert_eq!(runs.load(Ordering::Relaxed), 1);

        flush_effects();
        assert_eq!(runs.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn deferred_effect_first_runs_at_flush() {
        let _serial = crate::tests::serial();
        let cell = Cell::new(0u32);
        let runs = Arc::new(AtomicUsize::new(0));

        let _effect = Effect::new_deferred({
            let cell = cell.clone();
            let runs = runs.clone();
            move || {
                let _ = cell.get();
                runs.fetch_add(1, Ordering::Relaxed);
            }
        });
        assert_eq!(runs.load(Ordering::Relaxed), 0);
        assert!(is_flush_scheduled());

        flush_effects();
        assert_eq!(runs.load(Ordering::Relaxed), 1);

        // Dependencies were established by the first run.
        cell.set(1);
        flush_effects();
        assert_eq!(runs.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn untracked_reads_do_not_subscribe() {
        let _serial = crate::tests::serial();
        let tracked = Cell::new(0u32);
        let peeked = Cell::new(0u32);
        let runs = Arc::new(AtomicUsize::new(0));

        let _effect = Effect::new({
            let tracked = tracked.clone();
            let peeked = peeked.clone();
            let runs = runs.clone();
            move || {
                let _ = tracked.get();
                let _ = untracked(|| peeked.get());
                runs.fetch_add(1, Ordering::Relaxed);
            }
        });
        assert_eq!(runs.load(Ordering::Relaxed), 1);

        peeked.set(1);
        flush_effects();
        assert_eq!(runs.load(Ordering::Relaxed), 1);

        tracked.set(1);
        flush_effects();
        assert_eq!(runs.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn dropped_effect_stops_reacting() {
        let _serial = crate::tests::serial();
        let cell = Cell::new(0u32);
        let runs = Arc::new(AtomicUsize::new(0));

        let effect = Effect::new({
            let cell = cell.clone();
            let runs = runs.clone();
            move || {
                let _ = cell.get();
                runs.fetch_add(1, Ordering::Relaxed);
            }
        });
        assert_eq!(runs.load(Ordering::Relaxed), 1);
        assert_eq!(cell.id().subscribers().len(), 1);

        drop(effect);
        assert!(cell.id().subscribers().is_empty());

        cell.set(1);
        flush_effects();
        assert_eq!(runs.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn scheduled_flag_tracks_notifications() {
        let _serial = crate::tests::serial();
        flush_effects();
        assert!(!is_flush_scheduled());

        let cell = Cell::new(0u32);
        let _effect = Effect::new({
            let cell = cell.clone();
            move || {
                let _ = cell.get();
            }
        });

        cell.set(1);
        assert!(is_flush_scheduled());

        flush_effects();
        assert!(!is_flush_scheduled());
    }

    #[test]
    fn effect_rewiring_follows_current_reads() {
        let _serial = crate::tests::serial();
        let gate = Cell::new(true);
        let a = Cell::new(0u32);
        let b = Cell::new(0u32);
        let runs = Arc::new(AtomicUsize::new(0));

        let _effect = Effect::new({
            let gate = gate.clone();
            let a = a.clone();
            let b = b.clone();
            let runs = runs.clone();
            move || {
                if gate.get() {
                    let _ = a.get();
                } else {
                    let _ = b.get();
                }
                runs.fetch_add(1, Ordering::Relaxed);
            }
        });
        assert_eq!(runs.load(Ordering::Relaxed), 1);

        gate.set(false);
        flush_effects();
        assert_eq!(runs.load(Ordering::Relaxed), 2);

        // `a` is no longer a dependency after the rewire.
        a.set(7);
        flush_effects();
        assert_eq!(runs.load(Ordering::Relaxed), 2);

        b.set(7);
        flush_effects();
        assert_eq!(runs.load(Ordering::Relaxed), 3);
    }
}
