//! Typed, bidirectional bindings between reactive values and query
//! parameters.

use std::str::FromStr;
use std::sync::Arc;

use crate::cell::Cell;
use crate::effect::Effect;
use crate::equal::{ToParamValue, param_comparator};
use crate::nav::NavigationSink;
use crate::snapshot::{QuerySnapshot, SnapshotSource, Subscription};
use crate::writeback::WriteBatcher;

/// Application-root handle for creating parameter bindings.
///
/// Owns the write-back batcher shared by every binding it creates — that
/// sharing is what coalesces simultaneous writes from independent bindings
/// into one navigation. Create one per application root and clone it freely;
/// clones share the same batcher.
///
/// # Usage
/// ```ignore
/// let router = Arc::new(MemoryRouter::with_params([("page", "5")]));
/// let params = QueryParams::from_router(router);
///
/// let page = params.number("page", 1.0);       // 5.0, live
/// let query = params.string("q", "");
/// let tags = params.strings("tag");
///
/// page.set(7.0);                               // marks a write-back
/// query.set("rust".into());
/// flush_effects();                             // one merged navigation
/// ```
pub struct QueryParams {
    inner: Arc<ParamsInner>,
}

struct ParamsInner {
    source: Arc<dyn SnapshotSource + Send + Sync>,
    batcher: WriteBatcher,
}

impl Clone for QueryParams {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl QueryParams {
    /// Build a root over separate snapshot and navigation collaborators.
    pub fn new(
        source: Arc<dyn SnapshotSource + Send + Sync>,
        sink: Arc<dyn NavigationSink + Send + Sync>,
    ) -> Self {
        let batcher = WriteBatcher::new(source.clone(), sink);
        Self {
            inner: Arc::new(ParamsInner { source, batcher }),
        }
    }

    /// Build a root over a router implementing both collaborator traits.
    pub fn from_router<R>(router: Arc<R>) -> Self
    where
        R: SnapshotSource + NavigationSink + Send + Sync + 'static,
    {
        Self::new(router.clone(), router)
    }

    /// Bind `key` through an arbitrary projection over its raw values.
    ///
    /// The generic form every typed constructor routes through:
    ///
    /// 1. the cell is initialized to `project(snapshot.get_all(key))` with
    ///    coerced equality as its comparator;
    /// 2. every snapshot emission re-projects; an equal result changes
    ///    nothing;
    /// 3. a write-back effect reports the cell's value to the batcher on
    ///    every change, whatever caused it — writes from application code
    ///    and updates from the URL share that single code path;
    /// 4. dropping the returned [`Param`] cancels the subscription and the
    ///    effect.
    ///
    /// `project` must be total over any list of raw values, including the
    /// empty list (parameter absent). A panicking projection aborts binding
    /// construction.
    ///
    /// # Panics
    /// If `key` is empty.
    pub fn map<T, F>(&self, key: &str, project: F) -> Param<T>
    where
        T: ToParamValue + Clone + Send + Sync + 'static,
        F: Fn(&[String]) -> T + Send + Sync + 'static,
    {
        assert!(!key.is_empty(), "query parameter key must be non-empty");

        let initial = project(self.inner.source.snapshot().get_all(key));
        let cell = Cell::with_comparator(initial, param_comparator::<T>());

        let subscription = self.inner.source.subscribe(Box::new({
            let cell = cell.clone();
            let key = key.to_string();
            move |snapshot: &QuerySnapshot| {
                cell.set(project(snapshot.get_all(&key)));
            }
        }));

        // Deferred: the first report happens at the first flush, carrying
        // whatever value the cell holds by then — a write issued between
        // construction and the flush replaces the initial value instead of
        // chasing it with a second navigation.
        let writeback = Effect::new_deferred({
            let cell = cell.clone();
            let batcher = self.inner.batcher.clone();
            let key = key.to_string();
            move || {
                let value = cell.get();
                batcher.report(key.clone(), value.to_param_value());
            }
        });

        Param {
            key: key.to_string(),
            cell,
            _writeback: writeback,
            _subscription: subscription,
        }
    }

    /// Bind a single-valued parameter: `f` over the raw value when exactly
    /// one is present, `default` otherwise (absent or repeated).
    pub fn map_first<T, F>(&self, key: &str, f: F, default: T) -> Param<T>
    where
        T: ToParamValue + Clone + Send + Sync + 'static,
        F: Fn(&str) -> T + Send + Sync + 'static,
    {
        self.map(key, move |values| match values {
            [value] => f(value),
            _ => default.clone(),
        })
    }

    /// Single string value, verbatim.
    pub fn string(&self, key: &str, default: impl Into<String>) -> Param<String> {
        self.map_first(key, |raw| raw.to_owned(), default.into())
    }

    /// Single numeric value. Non-numeric text coerces to `f64::NAN`, the
    /// not-a-number sentinel — never an error.
    pub fn number(&self, key: &str, default: f64) -> Param<f64> {
        self.map_first(key, |raw| raw.trim().parse().unwrap_or(f64::NAN), default)
    }

    /// Single boolean value: `true` iff the raw text is exactly `"true"`.
    /// `"True"`, `"1"` and everything else read as `false`.
    pub fn boolean(&self, key: &str, default: bool) -> Param<bool> {
        self.map_first(key, |raw| raw == "true", default)
    }

    /// Single value parsed into any `FromStr` target (an enum of string
    /// literals, an id type). A failed parse yields the default, like an
    /// absent parameter.
    pub fn parsed<T>(&self, key: &str, default: T) -> Param<T>
    where
        T: FromStr + ToParamValue + Clone + Send + Sync + 'static,
    {
        let fallback = default.clone();
        self.map_first(
            key,
            move |raw| raw.parse().unwrap_or_else(|_| fallback.clone()),
            default,
        )
    }

    /// Multi-valued parameter: `f` over every raw value, in order. Absent
    /// means the empty list.
    pub fn map_each<T, F>(&self, key: &str, f: F) -> Param<Vec<T>>
    where
        T: ToParamValue + Clone + Send + Sync + 'static,
        F: Fn(&str) -> T + Send + Sync + 'static,
    {
        self.map(key, move |values| {
            values.iter().map(|value| f(value)).collect()
        })
    }

    /// Multi-valued parameter, raw strings verbatim.
    pub fn strings(&self, key: &str) -> Param<Vec<String>> {
        self.map_each(key, str::to_owned)
    }
}

/// One live binding: a typed reactive cell wired to its query parameter.
///
/// Reading yields the current projected value; writing updates the cell
/// immediately (subject to coerced equality) and enqueues the new value for
/// the next merged navigation. The binding stays live until dropped, at
/// which point its snapshot subscription and write-back effect are torn
/// down.
pub struct Param<T> {
    key: String,
    cell: Cell<T>,
    _writeback: Effect,
    _subscription: Subscription,
}

impl<T: ToParamValue + Clone + Send + Sync + 'static> Param<T> {
    /// The parameter key this binding is bound to.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current value, subscribing the running effect (if any).
    pub fn get(&self) -> T {
        self.cell.get()
    }

    /// Current value, without subscribing.
    pub fn get_untracked(&self) -> T {
        self.cell.get_untracked()
    }

    /// Write a new value. A coerced-equal write is a no-op: no notification,
    /// no write-back, no navigation.
    pub fn set(&self, value: T) {
        self.cell.set(value);
    }

    /// Mutate the value in place; coerced equality of the result decides
    /// whether anything changed.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.cell.update(f);
    }
}

impl<T> std::fmt::Debug for Param<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Param").field("key", &self.key).finish()
    }
}
