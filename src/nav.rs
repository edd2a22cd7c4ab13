//! Navigation requests and the sink contract that applies them.

use indexmap::IndexMap;
use thiserror::Error;

use crate::equal::ParamValue;

/// How a request's parameters combine with the URL's existing ones.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum QueryParamsHandling {
    /// Keep existing parameters, overlaying the request's keys. The
    /// write-back coordinator always uses this mode.
    Merge,
    /// Discard existing parameters, keeping only the request's.
    Replace,
}

/// One query-parameter navigation, targeting the current route.
///
/// The sink serializes each [`ParamValue`]: a list becomes a repeated
/// parameter, [`ParamValue::Absent`] removes the key.
#[derive(Clone, Debug)]
pub struct NavigateRequest {
    /// Key/value pairs to apply, in report order.
    pub query_params: IndexMap<String, ParamValue>,
    /// Combination mode for existing parameters.
    pub handling: QueryParamsHandling,
    /// Replace the current history entry instead of pushing a new one.
    pub replace_url: bool,
    /// Keep the URL fragment untouched.
    pub preserve_fragment: bool,
    /// Bypass the application's reload/guard pipeline.
    pub skip_guards: bool,
}

impl NavigateRequest {
    /// The non-destructive update the coordinator issues: merge handling,
    /// history entry replaced, fragment preserved, guards skipped.
    pub fn merge(query_params: IndexMap<String, ParamValue>) -> Self {
        Self {
            query_params,
            handling: QueryParamsHandling::Merge,
            replace_url: true,
            preserve_fragment: true,
            skip_guards: true,
        }
    }
}

/// Failure reported by a navigation sink.
///
/// The coordinator logs and drops these — write-back is fire-and-forget —
/// but sink adapters have something precise to return.
#[derive(Debug, Error)]
pub enum NavigateError {
    /// The router refused the navigation.
    #[error("navigation rejected: {0}")]
    Rejected(String),
    /// The router is gone (application shutting down, view destroyed).
    #[error("router is no longer available")]
    Closed,
}

/// Consumer of navigation requests: the routing collaborator's write side.
pub trait NavigationSink {
    /// Apply one request to the URL.
    fn navigate(&self, request: NavigateRequest) -> Result<(), NavigateError>;
}
