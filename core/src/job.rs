//! Polling async jobs to a terminal state.
//!
//! # Design
//! `retry` is the generic retryable predicate: it probes immediately, then
//! sleeps `interval` between probes until the probe succeeds, the attempt
//! budget is spent, or the time limit (policy timeout or caller deadline,
//! whichever is earlier) passes. It blocks the calling thread.
//!
//! `JobComplete::apply` keeps the classic predicate contract: `true` means
//! the job is terminal, which includes failure. `wait` and `wait_for_result`
//! return the terminal job itself so callers cannot mistake a failed job for
//! a successful one.
//!
//! Only transport failures and 5xx responses are retried. Any other poll
//! error (a filter or contract failure, a 4xx, a malformed body) ends polling
//! at once: `wait` returns it and `apply` returns false.

use std::thread;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};

use crate::client::CommandClient;
use crate::commands::QUERY_ASYNC_JOB_RESULT;
use crate::error::{ApiError, ApiResult, TransportError};
use crate::types::{AsyncJob, JobStatus};

/// Polling budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    pub timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 1800,
            timeout: Some(Duration::from_secs(1800)),
        }
    }
}

impl RetryPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Probe until `probe` returns true. Returns false once the budget is spent.
pub fn retry<F>(policy: &RetryPolicy, deadline: Option<Instant>, mut probe: F) -> bool
where
    F: FnMut(u32) -> bool,
{
    let started = Instant::now();
    let limit = match (policy.timeout.map(|t| started + t), deadline) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };

    for attempt in 1..=policy.max_attempts {
        if probe(attempt) {
            return true;
        }
        if attempt == policy.max_attempts {
            break;
        }
        let mut pause = policy.interval;
        if let Some(limit) = limit {
            let now = Instant::now();
            if now >= limit {
                break;
            }
            pause = pause.min(limit - now);
        }
        thread::sleep(pause);
    }
    false
}

/// Whether a failed poll is worth repeating.
fn is_transient(err: &ApiError) -> bool {
    match err {
        ApiError::Transport(TransportError::NoRuntime) => false,
        ApiError::Transport(_) => true,
        ApiError::Http { status, .. } => *status >= 500,
        _ => false,
    }
}

/// Where job status records come from.
pub trait JobStatusSource {
    /// `Ok(None)` when the job is unknown.
    fn job(&self, jobid: &str) -> ApiResult<Option<AsyncJob>>;
}

impl<S: JobStatusSource + ?Sized> JobStatusSource for &S {
    fn job(&self, jobid: &str) -> ApiResult<Option<AsyncJob>> {
        (**self).job(jobid)
    }
}

impl JobStatusSource for CommandClient {
    fn job(&self, jobid: &str) -> ApiResult<Option<AsyncJob>> {
        Ok(self
            .invoke(&QUERY_ASYNC_JOB_RESULT, &[Some(jobid)], None)?
            .into_option()?)
    }
}

/// Retryable predicate over a job id.
#[derive(Debug, Clone)]
pub struct JobComplete<S> {
    source: S,
    policy: RetryPolicy,
    deadline: Option<Instant>,
}

impl<S: JobStatusSource> JobComplete<S> {
    pub fn new(source: S, policy: RetryPolicy) -> Self {
        Self {
            source,
            policy,
            deadline: None,
        }
    }

    /// Stop polling at `deadline` even if the policy allows more.
    pub fn until(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// True once the job is terminal, successful or not. False when the
    /// budget runs out or a poll fails with a non-transient error.
    pub fn apply(&self, jobid: &str) -> bool {
        match self.poll(jobid) {
            Ok(terminal) => {
                let completed = terminal.is_some();
                trace!(jobid, completed, "job predicate finished");
                completed
            }
            Err(err) => {
                warn!(jobid, error = %err, "job predicate stopped on error");
                false
            }
        }
    }

    /// The terminal job record, `JobTimeout`, or the first non-transient
    /// poll error.
    pub fn wait(&self, jobid: &str) -> ApiResult<AsyncJob> {
        self.poll(jobid)?.ok_or_else(|| ApiError::JobTimeout {
            jobid: jobid.to_string(),
        })
    }

    /// The typed job result; a failed job is `JobFailed`.
    pub fn wait_for_result<T: DeserializeOwned>(&self, jobid: &str) -> ApiResult<Option<T>> {
        let job = self.wait(jobid)?;
        if let Some(error) = job.error() {
            return Err(ApiError::JobFailed {
                jobid: job.jobid,
                code: error.errorcode,
                text: error.errortext,
            });
        }
        Ok(job.result_as()?)
    }

    fn poll(&self, jobid: &str) -> ApiResult<Option<AsyncJob>> {
        let mut terminal = None;
        let mut fatal = None;
        retry(&self.policy, self.deadline, |attempt| match self.source.job(jobid) {
            Ok(Some(job)) if job.status.is_terminal() => {
                debug!(jobid, attempt, status = ?job.status, "job reached terminal state");
                terminal = Some(job);
                true
            }
            Ok(Some(job)) => {
                trace!(jobid, attempt, progress = ?job.progress, "job still in progress");
                false
            }
            Ok(None) => {
                debug!(jobid, attempt, "job not found yet");
                false
            }
            Err(err) if is_transient(&err) => {
                warn!(jobid, attempt, error = %err, "job poll failed, retrying");
                false
            }
            Err(err) => {
                debug!(jobid, attempt, error = %err, "job poll failed, giving up");
                fatal = Some(err);
                true
            }
        });
        if let Some(err) = fatal {
            return Err(err);
        }
        if let Some(job) = &terminal {
            if job.status == JobStatus::Failed {
                debug!(jobid, code = job.result_code, "job failed");
            }
        }
        Ok(terminal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::config::ClientConfig;
    use crate::error::FilterError;
    use crate::http::{HttpRequest, HttpResponse};
    use crate::transport::Transport;

    enum Step {
        Pending,
        Done,
        Failed,
        Error,
        ServerError,
        Unauthorized,
        Missing,
    }

    struct ScriptedJobs {
        steps: Mutex<VecDeque<Step>>,
        polls: Mutex<u32>,
    }

    impl ScriptedJobs {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: Mutex::new(steps.into()),
                polls: Mutex::new(0),
            }
        }

        fn polls(&self) -> u32 {
            *self.polls.lock().unwrap()
        }
    }

    fn job(status: i64, result: serde_json::Value) -> AsyncJob {
        serde_json::from_value(serde_json::json!({
            "jobid": "1138",
            "jobstatus": status,
            "jobresult": result,
        }))
        .unwrap()
    }

    impl JobStatusSource for ScriptedJobs {
        fn job(&self, _jobid: &str) -> ApiResult<Option<AsyncJob>> {
            *self.polls.lock().unwrap() += 1;
            let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step::Pending);
            match step {
                Step::Pending => Ok(Some(job(0, serde_json::Value::Null))),
                Step::Done => Ok(Some(job(1, serde_json::json!({"virtualmachine": {"id": "54"}})))),
                Step::Failed => Ok(Some(job(2, serde_json::json!({"errorcode": 530, "errortext": "no capacity"})))),
                Step::Error => Err(ApiError::Transport(TransportError::Timeout("poll".to_string()))),
                Step::ServerError => Err(ApiError::Http {
                    status: 503,
                    body: "maintenance".to_string(),
                }),
                Step::Unauthorized => Err(ApiError::Forbidden {
                    status: 401,
                    message: "unable to verify user credentials".to_string(),
                }),
                Step::Missing => Ok(None),
            }
        }
    }

    fn fast(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(20), attempts)
    }

    #[test]
    fn completes_within_attempt_budget() {
        let source = ScriptedJobs::new(vec![Step::Pending, Step::Pending, Step::Done]);
        let predicate = JobComplete::new(&source, fast(5));
        let started = Instant::now();
        assert!(predicate.apply("1138"));
        let elapsed = started.elapsed();
        assert_eq!(source.polls(), 3);
        // Three polls, two pauses.
        assert!(elapsed >= Duration::from_millis(40), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(40 + 20 + 200), "{elapsed:?}");
    }

    #[test]
    fn never_resolving_job_returns_false_after_budget() {
        let source = ScriptedJobs::new(Vec::new());
        let predicate = JobComplete::new(&source, fast(4));
        assert!(!predicate.apply("1138"));
        assert_eq!(source.polls(), 4);
    }

    #[test]
    fn transient_errors_are_retried() {
        let source = ScriptedJobs::new(vec![Step::Error, Step::Missing, Step::Done]);
        let predicate = JobComplete::new(&source, fast(5));
        assert!(predicate.apply("1138"));
        assert_eq!(source.polls(), 3);
    }

    #[test]
    fn server_errors_are_retried() {
        let source = ScriptedJobs::new(vec![Step::ServerError, Step::Done]);
        let predicate = JobComplete::new(&source, fast(5));
        assert!(predicate.apply("1138"));
        assert_eq!(source.polls(), 2);
    }

    #[test]
    fn client_errors_stop_polling_at_once() {
        let source = ScriptedJobs::new(vec![Step::Pending, Step::Unauthorized]);
        let predicate = JobComplete::new(&source, fast(20));
        let err = predicate.wait("1138").unwrap_err();
        assert!(matches!(err, ApiError::Forbidden { status: 401, .. }), "{err:?}");
        assert_eq!(source.polls(), 2);

        let source = ScriptedJobs::new(vec![Step::Unauthorized]);
        assert!(!JobComplete::new(&source, fast(20)).apply("1138"));
        assert_eq!(source.polls(), 1);
    }

    /// Fails the test if anything reaches the network.
    struct Unreachable;

    impl Transport for Unreachable {
        fn execute(&self, _request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            panic!("nothing should be sent without credentials");
        }
    }

    #[test]
    fn missing_credentials_surface_without_polling() {
        let client = CommandClient::with_transport(
            &ClientConfig::new("http://localhost:8080/client/api"),
            std::sync::Arc::new(Unreachable),
        );
        let predicate = JobComplete::new(&client, RetryPolicy::new(Duration::from_millis(10), 20));
        let started = Instant::now();
        let err = predicate.wait("1138").unwrap_err();
        assert!(matches!(err, ApiError::Filter(FilterError::MissingCredential)), "{err:?}");
        assert!(started.elapsed() < Duration::from_millis(100), "{:?}", started.elapsed());
        assert!(!predicate.apply("1138"));
    }

    #[test]
    fn failed_job_is_terminal_for_the_predicate() {
        let source = ScriptedJobs::new(vec![Step::Failed]);
        let predicate = JobComplete::new(&source, fast(5));
        assert!(predicate.apply("1138"));
    }

    #[test]
    fn wait_for_result_surfaces_failure() {
        let source = ScriptedJobs::new(vec![Step::Pending, Step::Failed]);
        let predicate = JobComplete::new(&source, fast(5));
        let err = predicate.wait_for_result::<serde_json::Value>("1138").unwrap_err();
        match err {
            ApiError::JobFailed { code, text, .. } => {
                assert_eq!(code, 530);
                assert_eq!(text, "no capacity");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn wait_for_result_unwraps_success() {
        let source = ScriptedJobs::new(vec![Step::Done]);
        let predicate = JobComplete::new(&source, fast(5));
        let vm: serde_json::Value = predicate.wait_for_result("1138").unwrap().unwrap();
        assert_eq!(vm["id"], "54");
    }

    #[test]
    fn wait_times_out_with_error() {
        let source = ScriptedJobs::new(Vec::new());
        let predicate = JobComplete::new(&source, fast(2));
        assert!(matches!(predicate.wait("1138"), Err(ApiError::JobTimeout { .. })));
    }

    #[test]
    fn deadline_stops_polling_early() {
        let source = ScriptedJobs::new(Vec::new());
        let predicate = JobComplete::new(&source, RetryPolicy::new(Duration::from_millis(50), 1000))
            .until(Instant::now() + Duration::from_millis(120));
        let started = Instant::now();
        assert!(!predicate.apply("1138"));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(source.polls() < 10);
    }

    #[test]
    fn policy_timeout_stops_polling() {
        let policy = RetryPolicy::new(Duration::from_millis(30), 1000).with_timeout(Duration::from_millis(100));
        let mut probes = 0;
        assert!(!retry(&policy, None, |_| {
            probes += 1;
            false
        }));
        assert!(probes < 10, "{probes}");
    }

    #[test]
    fn zero_attempts_never_probes() {
        let mut probes = 0;
        assert!(!retry(&RetryPolicy::new(Duration::ZERO, 0), None, |_| {
            probes += 1;
            true
        }));
        assert_eq!(probes, 0);
    }
}
