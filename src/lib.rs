#![deny(missing_docs)]

//! Reactive two-way synchronization between typed values and URL query
//! parameters.
//!
//! Reading a parameter yields a live, typed value that follows the URL
//! (back/forward navigation, link clicks); writing that value updates the
//! URL — without a reload and without feedback loops. Redundant updates are
//! suppressed by a coerced structural equality, and however many bindings
//! write within one tick, at most one merged navigation goes out.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use querysync::{MemoryRouter, QueryParams, flush_effects};
//!
//! let router = Arc::new(MemoryRouter::with_params([("page", "5"), ("tag", "a")]));
//! let params = QueryParams::from_router(router.clone());
//!
//! let page = params.number("page", 1.0);   // 5.0, follows the URL
//! let open = params.boolean("open", false);
//! let tags = params.strings("tag");        // ["a"]
//!
//! page.set(7.0);                           // value updates immediately...
//! open.set(true);
//! flush_effects();                         // ...one merged navigation: ?page=7&tag=a&open=true
//!
//! router.set_params([("page", "8")]);      // external change (back button)
//! assert_eq!(page.get_untracked(), 8.0);   // binding followed, no echo navigation
//! ```
//!
//! # Core Types
//!
//! - [`QueryParams`] — application-root handle; its typed constructors
//!   ([`number`](QueryParams::number), [`boolean`](QueryParams::boolean),
//!   [`string`](QueryParams::string), [`parsed`](QueryParams::parsed),
//!   [`strings`](QueryParams::strings), [`map_each`](QueryParams::map_each))
//!   are thin specializations of one generic [`map`](QueryParams::map).
//! - [`Param<T>`] — one live binding: read, write, torn down on drop.
//! - [`WriteBatcher`] — collects every binding's writes and issues at most
//!   one merged navigation per flush (merge handling, history entry
//!   replaced, fragment preserved).
//! - [`ParamValue`] / [`ToParamValue`] / [`coerced_equal`] — the coerced
//!   value model: lists compare pairwise, leaves by textual form. This is
//!   both the change-suppression discipline and the URL serialization.
//! - [`Cell`] / [`Effect`] — the underlying reactive primitive: cells carry
//!   a change comparator, effects re-run on [`flush_effects`].
//!
//! # Collaborators
//!
//! The routing side is two traits: [`SnapshotSource`] (current parameters +
//! change stream) and [`NavigationSink`] (apply a merged update).
//! [`MemoryRouter`] implements both for tests and headless hosts; embedding
//! a real router means writing those two adapters.
//!
//! # Ticks
//!
//! Writes only mark work; [`flush_effects`] is the tick boundary where
//! bindings re-run and the batcher navigates. Call it from the host's event
//! loop, or spawn an [`EffectLoop`] to drive it from a background thread.

pub(crate) mod arena;
mod cell;
mod effect;
mod equal;
mod executor;
mod hash;
mod memory;
mod nav;
mod params;
mod snapshot;
mod writeback;

pub use cell::Cell;
pub use effect::{Effect, flush_effects, is_flush_scheduled, untracked};
pub use equal::{ParamValue, ToParamValue, coerced_equal};
pub use executor::{DEFAULT_DEBOUNCE, DEFAULT_MAX_DEBOUNCE, EffectLoop};
pub use memory::MemoryRouter;
pub use nav::{NavigateError, NavigateRequest, NavigationSink, QueryParamsHandling};
pub use params::{Param, QueryParams};
pub use snapshot::{QuerySnapshot, SnapshotObserver, SnapshotSource, Subscription};
pub use writeback::WriteBatcher;
