//! Declarative command client for CloudStack-style query APIs.
//!
//! # Overview
//! Every remote command is a constant `Operation` descriptor: its command
//! name, positional parameters, response parser, and fallback for error
//! statuses. One pipeline serves them all: `RequestBuilder` turns a
//! descriptor plus arguments into an `HttpRequest`, the `FilterChain` (ending
//! in `QuerySigner`) rewrites it, a `Transport` sends it, and `resolve` turns
//! the `HttpResponse` into a `Payload` or an `ApiError`.
//!
//! # Design
//! - `CommandClient` is the untyped pipeline; `CloudStackApi` layers typed
//!   methods over it. Resource types are the caller's choice.
//! - Requests and responses are plain values. Everything except
//!   `UreqTransport` is deterministic and tested without a network.
//! - Async calls run the blocking transport on Tokio's blocking pool and hand
//!   back a `PendingResult`, which applies parsing only when read.
//! - `JobComplete` polls `queryAsyncJobResult` under a `RetryPolicy` until the
//!   job leaves the in-progress state.

pub mod api;
pub mod builder;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod fallback;
pub mod filter;
pub mod future;
pub mod http;
pub mod job;
pub mod operation;
pub mod options;
pub mod parser;
pub mod signer;
pub mod transport;
pub mod types;

pub use api::CloudStackApi;
pub use builder::{resolve, RequestBuilder};
pub use client::{CommandClient, PendingCall};
pub use config::{ClientConfig, Credentials};
pub use error::{ApiError, ApiResult, FilterError, ParseError, TransportError};
pub use fallback::Fallback;
pub use filter::{FilterChain, RequestFilter};
pub use future::PendingResult;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use job::{retry, JobComplete, JobStatusSource, RetryPolicy};
pub use operation::{Operation, Param};
pub use options::{
    DeleteIsoOptions, DeployVirtualMachineOptions, ListOptions, PermissionOperation, QueryOptions,
    UpdateIsoPermissionsOptions,
};
pub use parser::{Payload, ResponseParser};
pub use signer::QuerySigner;
pub use transport::{Transport, UreqTransport};
pub use types::{AsyncCreateResponse, AsyncJob, AsyncJobError, JobStatus};
