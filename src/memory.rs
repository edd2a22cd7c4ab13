//! In-memory routing collaborator.
//!
//! Implements both halves of the router contract over a plain
//! `{params, fragment}` state: [`SnapshotSource`] for reads and change
//! notification, [`NavigationSink`] for merged write-backs. Hosts embedding
//! a real router write an adapter instead; tests and headless hosts use this
//! directly.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use indexmap::IndexMap;
use parking_lot::RwLock;
use slab::Slab;

use crate::nav::{NavigateError, NavigateRequest, NavigationSink, QueryParamsHandling};
use crate::snapshot::{QuerySnapshot, SnapshotObserver, SnapshotSource, Subscription};

#[derive(Default)]
struct UrlState {
    params: IndexMap<String, Vec<String>>,
    fragment: Option<String>,
}

/// In-memory implementation of the routing collaborator.
///
/// # Usage
/// ```ignore
/// let router = Arc::new(MemoryRouter::with_params([("page", "5")]));
/// let params = QueryParams::from_router(router.clone());
///
/// let page = params.number("page", 1.0);
/// assert_eq!(page.get_untracked(), 5.0);
///
/// page.set(7.0);
/// flush_effects();
/// assert_eq!(router.params()["page"], vec!["7"]);
/// ```
#[derive(Default)]
pub struct MemoryRouter {
    state: RwLock<UrlState>,
    observers: Arc<RwLock<Slab<SnapshotObserver>>>,
    navigations: AtomicUsize,
    last_request: RwLock<Option<NavigateRequest>>,
}

impl MemoryRouter {
    /// Router with an empty query string and no fragment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Router seeded from `(key, value)` pairs; a repeated key carries
    /// multiple values.
    pub fn with_params<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let router = Self::new();
        {
            let mut state = router.state.write();
            for (key, value) in pairs {
                state.params.entry(key.into()).or_default().push(value.into());
            }
        }
        router
    }

    /// Current parameters as a grouped multi-map.
    pub fn params(&self) -> IndexMap<String, Vec<String>> {
        self.state.read().params.clone()
    }

    /// Current fragment.
    pub fn fragment(&self) -> Option<String> {
        self.state.read().fragment.clone()
    }

    /// Replace the whole query string, as an external navigation would
    /// (back/forward, link click), and notify subscribers.
    pub fn set_params<K, V>(&self, pairs: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        {
            let mut state = self.state.write();
            state.params.clear();
            for (key, value) in pairs {
                state.params.entry(key.into()).or_default().push(value.into());
            }
        }
        self.emit();
    }

    /// Set the fragment. Not a query-string change, so nothing is emitted.
    pub fn set_fragment(&self, fragment: Option<String>) {
        self.state.write().fragment = fragment;
    }

    /// Number of navigations applied so far.
    pub fn navigations(&self) -> usize {
        self.navigations.load(Ordering::Relaxed)
    }

    /// The most recent request passed to [`navigate`](NavigationSink::navigate).
    pub fn last_request(&self) -> Option<NavigateRequest> {
        self.last_request.read().clone()
    }

    fn emit(&self) {
        let snapshot = self.snapshot();
        // Observers must not subscribe or unsubscribe from inside the
        // callback; the registry lock is held across the emission.
        let observers = self.observers.read();
        for (_, observer) in observers.iter() {
            observer(&snapshot);
        }
    }
}

impl SnapshotSource for MemoryRouter {
    fn snapshot(&self) -> QuerySnapshot {
        QuerySnapshot::from_params(self.state.read().params.clone())
    }

    fn subscribe(&self, observer: SnapshotObserver) -> Subscription {
        let key = self.observers.write().insert(observer);
        let registry = Arc::downgrade(&self.observers);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.write().try_remove(key);
            }
        })
    }
}

impl NavigationSink for MemoryRouter {
    fn navigate(&self, request: NavigateRequest) -> Result<(), NavigateError> {
        {
            let mut state = self.state.write();
            match request.handling {
                QueryParamsHandling::Merge => {
                    for (key, value) in &request.query_params {
                        match value.url_values() {
                            // Absent and the empty list both mean "no values
                            // for this key": the parameter disappears.
                            None => {
                                state.params.shift_remove(key);
                            }
                            Some(values) if values.is_empty() => {
                                state.params.shift_remove(key);
                            }
                            Some(values) => {
                                state.params.insert(key.clone(), values);
                            }
                        }
                    }
                }
                QueryParamsHandling::Replace => {
                    let mut params = IndexMap::new();
                    for (key, value) in &request.query_params {
                        if let Some(values) = value.url_values()
                            && !values.is_empty()
                        {
                            params.insert(key.clone(), values);
                        }
                    }
                    state.params = params;
                }
            }
            if !request.preserve_fragment {
                state.fragment = None;
            }
        }

        self.navigations.fetch_add(1, Ordering::Relaxed);
        *self.last_request.write() = Some(request);
        self.emit();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equal::ParamValue;

    fn merge_request(pairs: &[(&str, ParamValue)]) -> NavigateRequest {
        NavigateRequest::merge(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn merge_keeps_unrelated_params_and_fragment() {
        let router = MemoryRouter::with_params([("q", "rust"), ("page", "1")]);
        router.set_fragment(Some("results".into()));

        router
            .navigate(merge_request(&[("page", ParamValue::text(2))]))
            .unwrap();

        let params = router.params();
        assert_eq!(params["q"], vec!["rust"]);
        assert_eq!(params["page"], vec!["2"]);
        assert_eq!(router.fragment(), Some("results".to_string()));
        assert_eq!(router.navigations(), 1);
    }

    #[test]
    fn absent_removes_the_key() {
        let router = MemoryRouter::with_params([("q", "rust"), ("page", "1")]);

        router
            .navigate(merge_request(&[("page", ParamValue::Absent)]))
            .unwrap();

        let params = router.params();
        assert!(!params.contains_key("page"));
        assert_eq!(params["q"], vec!["rust"]);
    }

    #[test]
    fn lists_become_repeated_values() {
        let router = MemoryRouter::new();

        router
            .navigate(merge_request(&[(
                "tag",
                ParamValue::list([ParamValue::text("a"), ParamValue::text("b")]),
            )]))
            .unwrap();

        assert_eq!(router.params()["tag"], vec!["a", "b"]);
    }

    #[test]
    fn replace_drops_unrelated_params() {
        let router = MemoryRouter::with_params([("q", "rust")]);

        let mut request = merge_request(&[("page", ParamValue::text(1))]);
        request.handling = QueryParamsHandling::Replace;
        router.navigate(request).unwrap();

        let params = router.params();
        assert!(!params.contains_key("q"));
        assert_eq!(params["page"], vec!["1"]);
    }

    #[test]
    fn unpreserved_fragment_is_cleared() {
        let router = MemoryRouter::new();
        router.set_fragment(Some("top".into()));

        let mut request = merge_request(&[("page", ParamValue::text(1))]);
        request.preserve_fragment = false;
        router.navigate(request).unwrap();

        assert_eq!(router.fragment(), None);
    }

    #[test]
    fn observers_see_external_changes_until_unsubscribed() {
        use std::sync::atomic::AtomicUsize;

        let router = MemoryRouter::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let subscription = router.subscribe(Box::new({
            let seen = seen.clone();
            move |snapshot| {
                if snapshot.contains("page") {
                    seen.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));

        router.set_params([("page", "1")]);
        assert_eq!(seen.load(Ordering::Relaxed), 1);

        subscription.unsubscribe();
        router.set_params([("page", "2")]);
        assert_eq!(seen.load(Ordering::Relaxed), 1);
    }
}
