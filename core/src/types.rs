//! Async-job DTOs shared by every provider command.
//!
//! # Design
//! Resource payloads (virtual machines, zones...) stay untyped in this crate
//! and are deserialized by the caller. Only the job handle and the job status
//! record are modeled here because the polling machinery depends on them.
//! Identifiers are accepted as JSON strings or numbers, since older API
//! versions emit numeric ids.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ParseError;

/// Job handle returned by commands whose effect completes asynchronously.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncCreateResponse {
    /// Identifier of the resource being created, when known up front.
    #[serde(default, deserialize_with = "optional_id")]
    pub id: Option<String>,
    #[serde(deserialize_with = "id")]
    pub jobid: String,
}

/// Lifecycle state of an async job. Only `InProgress` is retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum JobStatus {
    InProgress,
    Succeeded,
    Failed,
    Unknown(i64),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::InProgress)
    }
}

impl From<i64> for JobStatus {
    fn from(code: i64) -> Self {
        match code {
            0 => JobStatus::InProgress,
            1 => JobStatus::Succeeded,
            2 => JobStatus::Failed,
            other => JobStatus::Unknown(other),
        }
    }
}

impl From<JobStatus> for i64 {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::InProgress => 0,
            JobStatus::Succeeded => 1,
            JobStatus::Failed => 2,
            JobStatus::Unknown(code) => code,
        }
    }
}

/// Error detail carried by a failed job's `jobresult`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncJobError {
    #[serde(default)]
    pub errorcode: i64,
    #[serde(default)]
    pub errortext: String,
}

/// One `queryAsyncJobResult` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsyncJob {
    #[serde(deserialize_with = "id")]
    pub jobid: String,
    #[serde(rename = "jobstatus")]
    pub status: JobStatus,
    #[serde(rename = "jobresultcode", default)]
    pub result_code: i64,
    #[serde(rename = "jobresulttype", default)]
    pub result_type: Option<String>,
    #[serde(rename = "jobresult", default)]
    pub result: Option<Value>,
    #[serde(rename = "jobprocstatus", default)]
    pub progress: Option<i64>,
    #[serde(default)]
    pub cmd: Option<String>,
    #[serde(rename = "accountid", default, deserialize_with = "optional_id")]
    pub account_id: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
}

impl AsyncJob {
    /// Error detail of a failed job.
    pub fn error(&self) -> Option<AsyncJobError> {
        if self.status != JobStatus::Failed {
            return None;
        }
        let detail = self
            .result
            .as_ref()
            .and_then(|result| serde_json::from_value::<AsyncJobError>(result.clone()).ok());
        Some(detail.unwrap_or(AsyncJobError {
            errorcode: self.result_code,
            errortext: String::new(),
        }))
    }

    /// The job result with its single wrapper key removed, deserialized.
    ///
    /// `{"virtualmachine": {...}}` yields the inner object; results that are
    /// not single-key objects are deserialized as they are.
    pub fn result_as<T: serde::de::DeserializeOwned>(&self) -> Result<Option<T>, ParseError> {
        let value = match &self.result {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Object(map)) if map.len() == 1 => map.values().next().cloned().unwrap_or(Value::Null),
            Some(other) => other.clone(),
        };
        Ok(Some(serde_json::from_value(value)?))
    }
}

fn id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected an id, found {other}"))),
    }
}

fn optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(serde::de::Error::custom(format!("expected an id, found {other}"))),
    }
}
