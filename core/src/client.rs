//! The invocation pipeline: build, filter, send, resolve.
//!
//! # Design
//! `CommandClient` owns everything an invocation needs and nothing that
//! changes between calls: the request builder (endpoint), the filter chain
//! (signing credentials), and the transport. It is cheap to clone and safe to
//! share across threads. Building and filtering happen on the caller's thread
//! for both the blocking and the async path, so contract violations and
//! filter failures are reported before anything is dispatched.

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::debug;

use crate::builder::{resolve, RequestBuilder};
use crate::config::ClientConfig;
use crate::error::{ApiResult, FilterError, TransportError};
use crate::filter::{FilterChain, RequestFilter};
use crate::future::PendingResult;
use crate::http::{HttpRequest, HttpResponse};
use crate::operation::Operation;
use crate::options::QueryOptions;
use crate::parser::Payload;
use crate::signer::QuerySigner;
use crate::transport::{Transport, UreqTransport};

/// Pending result of a dispatched command.
pub type PendingCall<T> = PendingResult<HttpResponse, T>;

#[derive(Clone)]
pub struct CommandClient {
    builder: RequestBuilder,
    filters: FilterChain,
    transport: Arc<dyn Transport>,
}

impl CommandClient {
    /// Client with the `ureq` transport and the query signer.
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_transport(config, Arc::new(UreqTransport::from_config(config)))
    }

    /// Client with the default filters over a caller-supplied transport.
    pub fn with_transport(config: &ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let mut filters = FilterChain::new();
        if let Some(user_agent) = config.user_agent.clone() {
            filters.push(Arc::new(move |mut request: HttpRequest| -> Result<HttpRequest, FilterError> {
                request.headers.push(("User-Agent".to_string(), user_agent.clone()));
                Ok(request)
            }));
        }
        filters.push(Arc::new(QuerySigner::new(config.credentials.clone())));
        Self::from_parts(RequestBuilder::new(&config.endpoint), filters, transport)
    }

    pub fn from_parts(builder: RequestBuilder, filters: FilterChain, transport: Arc<dyn Transport>) -> Self {
        Self {
            builder,
            filters,
            transport,
        }
    }

    /// Append a filter after the ones already registered.
    pub fn with_filter(mut self, filter: impl RequestFilter + 'static) -> Self {
        self.filters = self.filters.with(filter);
        self
    }

    pub fn endpoint(&self) -> &str {
        self.builder.endpoint()
    }

    /// Build and filter the request without sending it.
    pub fn prepare(
        &self,
        op: &Operation,
        args: &[Option<&str>],
        options: Option<&QueryOptions>,
    ) -> ApiResult<HttpRequest> {
        let request = self.builder.build(op, args, options)?;
        Ok(self.filters.apply(request)?)
    }

    /// Blocking invocation.
    pub fn invoke(
        &self,
        op: &Operation,
        args: &[Option<&str>],
        options: Option<&QueryOptions>,
    ) -> ApiResult<Payload> {
        let request = self.prepare(op, args, options)?;
        debug!(command = op.command, "invoking");
        let response = self.transport.execute(&request)?;
        resolve(op, response)
    }

    /// Dispatch onto the runtime's blocking pool and return immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(
        &self,
        op: &Operation,
        args: &[Option<&str>],
        options: Option<&QueryOptions>,
    ) -> ApiResult<PendingCall<Payload>> {
        self.submit_with(op, args, options, Ok)
    }

    /// Like `submit`, with a typed conversion applied when the result is read.
    pub fn submit_with<T, F>(
        &self,
        op: &Operation,
        args: &[Option<&str>],
        options: Option<&QueryOptions>,
        convert: F,
    ) -> ApiResult<PendingCall<T>>
    where
        T: 'static,
        F: FnOnce(Payload) -> ApiResult<T> + Send + 'static,
    {
        let request = self.prepare(op, args, options)?;
        let runtime = Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        let transport = Arc::clone(&self.transport);
        let op = *op;
        debug!(command = op.command, "submitting");

        let handle = runtime.spawn_blocking(move || -> ApiResult<HttpResponse> { Ok(transport.execute(&request)?) });
        Ok(PendingResult::new(handle, move |response| convert(resolve(&op, response)?)))
    }
}

impl std::fmt::Debug for CommandClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandClient")
            .field("endpoint", &self.builder.endpoint())
            .field("filters", &self.filters)
            .finish()
    }
}
