//! Request filters and the ordered chain that applies them.

use std::sync::Arc;

use crate::error::FilterError;
use crate::http::HttpRequest;

/// A transform applied to every built request before it is sent.
///
/// Filters may only depend on their own configuration and the request they
/// are given. A failing filter aborts the invocation.
pub trait RequestFilter: Send + Sync {
    fn filter(&self, request: HttpRequest) -> Result<HttpRequest, FilterError>;
}

impl<F> RequestFilter for F
where
    F: Fn(HttpRequest) -> Result<HttpRequest, FilterError> + Send + Sync,
{
    fn filter(&self, request: HttpRequest) -> Result<HttpRequest, FilterError> {
        self(request)
    }
}

/// Filters in registration order; each sees the previous one's output.
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn RequestFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: impl RequestFilter + 'static) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    pub fn push(&mut self, filter: Arc<dyn RequestFilter>) {
        self.filters.push(filter);
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn apply(&self, request: HttpRequest) -> Result<HttpRequest, FilterError> {
        self.filters
            .iter()
            .try_fold(request, |request, filter| filter.filter(request))
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain")
            .field("filters", &self.len())
            .finish()
    }
}
