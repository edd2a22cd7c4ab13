//! Query-parameter snapshots and the source contract that produces them.

use indexmap::IndexMap;

/// Immutable read of all query parameters at one instant.
///
/// A key maps to zero or more ordered string values (a key may repeat in a
/// query string). The snapshot is owned by the routing collaborator; the
/// synchronization core only reads it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuerySnapshot {
    params: IndexMap<String, Vec<String>>,
}

impl QuerySnapshot {
    /// Empty snapshot (no parameters).
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from `(key, value)` pairs; a repeated key accumulates
    /// multiple values in order.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut params: IndexMap<String, Vec<String>> = IndexMap::new();
        for (key, value) in pairs {
            params.entry(key.into()).or_default().push(value.into());
        }
        Self { params }
    }

    /// Build a snapshot from an already-grouped multi-map.
    pub fn from_params(params: IndexMap<String, Vec<String>>) -> Self {
        Self { params }
    }

    /// First value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values for `key`, in order; empty slice when absent.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.params.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `key` carries at least one value.
    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    /// The parameter keys, in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the snapshot has no parameters at all.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Callback invoked with every new snapshot.
pub type SnapshotObserver = Box<dyn Fn(&QuerySnapshot) + Send + Sync>;

/// Producer of query-parameter snapshots: a synchronous current read plus a
/// change stream.
///
/// Implemented by the routing collaborator ([`MemoryRouter`](crate::MemoryRouter)
/// in-crate, or an adapter over a host router).
pub trait SnapshotSource {
    /// The current snapshot.
    fn snapshot(&self) -> QuerySnapshot;

    /// Register an observer for future snapshots. Dropping the returned
    /// [`Subscription`] unregisters it.
    fn subscribe(&self, observer: SnapshotObserver) -> Subscription;
}

/// Handle to an active snapshot subscription; unsubscribes when dropped.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap a cancellation action.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Cancel now instead of at drop time.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
