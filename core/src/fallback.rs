//! Exception parser strategies for non-2xx responses.
//!
//! # Design
//! Each operation binds one `Fallback`. The not-found variants turn a 404
//! into the empty outcome of the operation (`None`, an empty list, or
//! nothing at all) and defer every other status to the 4xx mapping, which
//! passes unmapped statuses through as `ApiError::Http`.

use serde_json::Value;

use crate::error::ApiError;
use crate::http::HttpResponse;
use crate::parser::Payload;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// 400, 401/403, 404, 409 become typed errors.
    MapHttp4xxToError,
    /// 404 → `Payload::Absent`; used by "get by id".
    NullOnNotFound,
    /// 404 → empty `Payload::Set`; used by "list".
    EmptySetOnNotFound,
    /// 404 → `Payload::Void`; the delete or update is already satisfied.
    VoidOnNotFound,
}

impl Fallback {
    pub fn recover(&self, response: HttpResponse) -> Result<Payload, ApiError> {
        if response.status == 404 {
            match self {
                Fallback::NullOnNotFound => return Ok(Payload::Absent),
                Fallback::EmptySetOnNotFound => return Ok(Payload::Set(Vec::new())),
                Fallback::VoidOnNotFound => return Ok(Payload::Void),
                Fallback::MapHttp4xxToError => {}
            }
        }
        Err(map_status(response))
    }
}

/// Translate a non-2xx response into its error kind.
pub fn map_status(response: HttpResponse) -> ApiError {
    let status = response.status;
    match status {
        400 => ApiError::BadRequest {
            status,
            message: error_text(&response.body),
        },
        401 | 403 => ApiError::Forbidden {
            status,
            message: error_text(&response.body),
        },
        404 => ApiError::NotFound {
            status,
            message: error_text(&response.body),
        },
        409 => ApiError::Conflict {
            status,
            message: error_text(&response.body),
        },
        _ => ApiError::Http {
            status,
            body: response.body,
        },
    }
}

/// `errortext` from `{"<command>response":{"errorcode":..,"errortext":..}}`,
/// falling back to the raw body.
fn error_text(body: &str) -> String {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };
    if let Some(Value::String(text)) = map.get("errortext") {
        return text.clone();
    }
    map.values()
        .find_map(|inner| inner.get("errortext").and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}
