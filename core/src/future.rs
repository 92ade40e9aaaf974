//! Pending results with a lazily applied transform.
//!
//! # Design
//! `PendingResult` owns the join handle of an in-flight call and the
//! transform that turns its raw output into the caller's type. The state
//! machine (`Pending`, `Cancelled`, `Taken`) guarantees the transform runs at
//! most once, and only from `get`/`get_timeout`. Inspection and
//! cancellation never touch it.

use std::fmt;
use std::time::Duration;

use tokio::task::{JoinError, JoinHandle};

use crate::error::{ApiError, ApiResult};

type Transform<I, T> = Box<dyn FnOnce(I) -> ApiResult<T> + Send>;

enum State<I, T> {
    Pending {
        handle: JoinHandle<ApiResult<I>>,
        transform: Transform<I, T>,
    },
    Cancelled,
    Taken,
}

/// An in-flight call whose output `I` is transformed into `T` on demand.
pub struct PendingResult<I, T> {
    state: State<I, T>,
}

impl<I, T> PendingResult<I, T>
where
    I: Send + 'static,
    T: 'static,
{
    pub fn new<F>(handle: JoinHandle<ApiResult<I>>, transform: F) -> Self
    where
        F: FnOnce(I) -> ApiResult<T> + Send + 'static,
    {
        Self {
            state: State::Pending {
                handle,
                transform: Box::new(transform),
            },
        }
    }

    /// Abort the call. Returns false if it already finished or was taken.
    ///
    /// A blocking transport call that has already started keeps running, so
    /// the request may already have been sent; the transform will not run.
    pub fn cancel(&mut self) -> bool {
        match &self.state {
            State::Pending { handle, .. } if !handle.is_finished() => {
                handle.abort();
                self.state = State::Cancelled;
                true
            }
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.state, State::Cancelled)
    }

    pub fn is_done(&self) -> bool {
        match &self.state {
            State::Pending { handle, .. } => handle.is_finished(),
            State::Cancelled | State::Taken => true,
        }
    }

    /// Wait for the call and apply the transform.
    ///
    /// Dropping the returned future before it completes leaves the call
    /// pending; a later `get` still reads the result.
    pub async fn get(&mut self) -> ApiResult<T> {
        let joined = match &mut self.state {
            State::Pending { handle, .. } => handle.await,
            State::Cancelled => return Err(ApiError::Cancelled),
            State::Taken => return Err(ApiError::ResultTaken),
        };
        self.take(joined)
    }

    /// Like `get`, but gives up after `timeout`. On timeout the call stays
    /// pending and the transform has not run.
    pub async fn get_timeout(&mut self, timeout: Duration) -> ApiResult<T> {
        let joined = match &mut self.state {
            State::Pending { handle, .. } => match tokio::time::timeout(timeout, handle).await {
                Ok(joined) => joined,
                Err(_) => return Err(ApiError::Timeout),
            },
            State::Cancelled => return Err(ApiError::Cancelled),
            State::Taken => return Err(ApiError::ResultTaken),
        };
        self.take(joined)
    }

    /// Move to `Taken` once the join has completed, then run the transform.
    fn take(&mut self, joined: Result<ApiResult<I>, JoinError>) -> ApiResult<T> {
        let State::Pending { transform, .. } = std::mem::replace(&mut self.state, State::Taken) else {
            return Err(ApiError::ResultTaken);
        };
        finish(joined, transform)
    }

    /// Compose another transform after the current one, still lazily.
    pub fn map<U, F>(self, f: F) -> PendingResult<I, U>
    where
        U: 'static,
        F: FnOnce(T) -> ApiResult<U> + Send + 'static,
    {
        let state = match self.state {
            State::Pending { handle, transform } => State::Pending {
                handle,
                transform: Box::new(move |input| transform(input).and_then(f)) as Transform<I, U>,
            },
            State::Cancelled => State::Cancelled,
            State::Taken => State::Taken,
        };
        PendingResult { state }
    }
}

fn finish<I, T>(joined: Result<ApiResult<I>, JoinError>, transform: Transform<I, T>) -> ApiResult<T> {
    let input = joined.map_err(join_error)??;
    transform(input)
}

fn join_error(err: JoinError) -> ApiError {
    if err.is_cancelled() {
        ApiError::Cancelled
    } else {
        ApiError::TaskFailed(err.to_string())
    }
}

impl<I, T> fmt::Debug for PendingResult<I, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::Pending { .. } => "pending",
            State::Cancelled => "cancelled",
            State::Taken => "taken",
        };
        f.debug_struct("PendingResult").field("state", &state).finish()
    }
}
