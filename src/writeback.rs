//! Batched write-back of locally changed parameter values to the URL.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::cell::Cell;
use crate::effect::Effect;
use crate::equal::ParamValue;
use crate::nav::{NavigateRequest, NavigationSink};
use crate::snapshot::{QuerySnapshot, SnapshotSource};

/// Pending key → latest locally-written value, in report order.
type PendingWrites = IndexMap<String, ParamValue>;

/// Accumulates parameter writes and flushes them as one merged navigation.
///
/// Every binding created from one application root reports into the same
/// batcher, which is what lets independently-created bindings coalesce:
/// however many of them write within one tick, the flush issues at most one
/// navigation carrying all of the pending pairs, later writes winning per
/// key.
///
/// The accumulator is a [`Cell`] with the always-notify comparator — its
/// "writes arrived" signal must fire even when the net mapping equals one it
/// held before (it is reset to empty on every flush). The flush itself is an
/// [`Effect`] reading that cell: it empties the accumulator synchronously,
/// drops writes the URL already reflects, and hands the remainder to the
/// sink. The reset re-marks the effect, whose next run finds the accumulator
/// empty and stops — that empty-check is what terminates the self-wakeup.
///
/// A sink failure is logged and dropped: the pending set is already cleared,
/// and the URL's actual state wins on the next snapshot emission.
pub struct WriteBatcher {
    inner: Arc<BatcherInner>,
}

struct BatcherInner {
    pending: Cell<PendingWrites>,
    _flush: Effect,
}

impl Clone for WriteBatcher {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl WriteBatcher {
    /// Create the batcher and its flush effect.
    pub fn new(
        source: Arc<dyn SnapshotSource + Send + Sync>,
        sink: Arc<dyn NavigationSink + Send + Sync>,
    ) -> Self {
        let pending = Cell::always_notify(PendingWrites::new());

        // Deferred: the first run belongs to the first flush, after the
        // bindings created in the same tick have filed their reports.
        let flush = Effect::new_deferred({
            let pending = pending.clone();
            move || {
                let writes = pending.get();
                if writes.is_empty() {
                    return;
                }
                pending.set(PendingWrites::new());

                let snapshot = source.snapshot();
                let outgoing: PendingWrites = writes
                    .into_iter()
                    .filter(|(key, value)| {
                        let fresh = !already_reflected(&snapshot, key, value);
                        if !fresh {
                            cov_mark::hit!(write_already_reflected);
                        }
                        fresh
                    })
                    .collect();

                if outgoing.is_empty() {
                    cov_mark::hit!(flush_without_navigation);
                    return;
                }

                if let Err(err) = sink.navigate(NavigateRequest::merge(outgoing)) {
                    log::warn!("query parameter write-back dropped: {err}");
                }
            }
        });

        Self {
            inner: Arc::new(BatcherInner {
                pending,
                _flush: flush,
            }),
        }
    }

    /// Merge one write into the pending set; the latest report for a key
    /// wins. Never blocks on navigation — the flush runs at the next tick.
    pub fn report(&self, key: impl Into<String>, value: ParamValue) {
        self.inner.pending.update(|map| {
            map.insert(key.into(), value);
        });
    }
}

/// Whether the URL already carries exactly this value for the key, in which
/// case writing it back would only echo a change that arrived from the URL.
fn already_reflected(snapshot: &QuerySnapshot, key: &str, value: &ParamValue) -> bool {
    match value.url_values() {
        None => !snapshot.contains(key),
        Some(values) => snapshot.get_all(key) == values.as_slice(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::flush_effects;
    use crate::memory::MemoryRouter;

    fn batcher_over(router: &Arc<MemoryRouter>) -> WriteBatcher {
        WriteBatcher::new(router.clone(), router.clone())
    }

    #[test]
    fn reports_coalesce_into_one_navigation() {
        let _serial = crate::tests::serial();
        let router = Arc::new(MemoryRouter::new());
        let batcher = batcher_over(&router);

        batcher.report("page", ParamValue::text(2));
        batcher.report("q", ParamValue::text("rust"));
        assert_eq!(router.navigations(), 0);

        flush_effects();

        assert_eq!(router.navigations(), 1);
        let params = router.params();
        assert_eq!(params["page"], vec!["2"]);
        assert_eq!(params["q"], vec!["rust"]);
    }

    #[test]
    fn later_report_wins_per_key() {
        let _serial = crate::tests::serial();
        let router = Arc::new(MemoryRouter::new());
        let batcher = batcher_over(&router);

        batcher.report("page", ParamValue::text(2));
        batcher.report("page", ParamValue::text(3));
        flush_effects();

        assert_eq!(router.navigations(), 1);
        assert_eq!(router.params()["page"], vec!["3"]);
    }

    #[test]
    fn already_reflected_writes_issue_no_navigation() {
        let _serial = crate::tests::serial();
        let router = Arc::new(MemoryRouter::with_params([("page", "5")]));
        let batcher = batcher_over(&router);

        cov_mark::check!(flush_without_navigation);
        batcher.report("page", ParamValue::text(5));
        flush_effects();

        assert_eq!(router.navigations(), 0);
    }

    #[test]
    fn absent_report_for_missing_key_is_dropped() {
        let _serial = crate::tests::serial();
        let router = Arc::new(MemoryRouter::new());
        let batcher = batcher_over(&router);

        cov_mark::check!(write_already_reflected);
        batcher.report("page", ParamValue::Absent);
        batcher.report("q", ParamValue::text("rust"));
        flush_effects();

        assert_eq!(router.navigations(), 1);
        assert!(!router.last_request().unwrap().query_params.contains_key("page"));
    }

    #[test]
    fn each_tick_flushes_independently() {
        let _serial = crate::tests::serial();
        let router = Arc::new(MemoryRouter::new());
        let batcher = batcher_over(&router);

        batcher.report("page", ParamValue::text(1));
        flush_effects();
        batcher.report("page", ParamValue::text(2));
        flush_effects();

        assert_eq!(router.navigations(), 2);
        assert_eq!(router.params()["page"], vec!["2"]);
    }

    #[test]
    fn failed_navigation_is_dropped_not_retried() {
        use crate::nav::{NavigateError, NavigationSink};

        struct RejectingSink;
        impl NavigationSink for RejectingSink {
            fn navigate(&self, _request: NavigateRequest) -> Result<(), NavigateError> {
                Err(NavigateError::Rejected("guard".into()))
            }
        }

        let _serial = crate::tests::serial();
        let router = Arc::new(MemoryRouter::new());
        let batcher = WriteBatcher::new(router.clone(), Arc::new(RejectingSink));

        batcher.report("page", ParamValue::text(1));
        flush_effects();

        // The pending set was cleared before the failure; a second flush has
        // nothing to send.
        assert_eq!(flush_effects(), 0);
    }
}
