//! Response parser strategies and the untyped `Payload` they produce.
//!
//! # Design
//! Each operation binds exactly one `ResponseParser` for 2xx bodies. Parsers
//! only validate the envelope and pull out the JSON that matters; the typed
//! conversion happens afterwards through `Payload::into_*`, so the same
//! strategy serves every resource type. Fallbacks produce the same
//! `Payload`, which is how a 404 turns into `None` or an empty list.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::trace;

use crate::error::ParseError;
use crate::http::HttpResponse;

/// Strategy that turns a 2xx body into a `Payload`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseParser {
    /// The whole body as JSON (an empty body is `null`).
    Identity,
    /// `{"wrapper": value}` → `value`.
    UnwrapOnlyValue,
    /// `{"wrapper": {"count": 1, "items": [value]}}` → `value`.
    UnwrapNestedValue,
    /// `{"wrapper": {"count": n, "items": [..]}}` → all items.
    UnwrapNestedSet,
    /// Discard the body.
    ReleaseAndReturnVoid,
}

impl ResponseParser {
    pub fn parse(&self, response: &HttpResponse) -> Result<Payload, ParseError> {
        match self {
            ResponseParser::Identity => {
                if response.body.trim().is_empty() {
                    return Ok(Payload::Value(Value::Null));
                }
                Ok(Payload::Value(serde_json::from_str(&response.body)?))
            }
            ResponseParser::UnwrapOnlyValue => match only_value(parse_object(&response.body)?)? {
                Some(value) => Ok(Payload::Value(value)),
                None => Ok(Payload::Absent),
            },
            ResponseParser::UnwrapNestedValue => {
                let mut items = nested_items(&response.body)?;
                match items.len() {
                    0 => Ok(Payload::Absent),
                    1 => Ok(Payload::Value(items.remove(0))),
                    n => Err(ParseError::Shape(format!("expected a single nested value, found {n}"))),
                }
            }
            ResponseParser::UnwrapNestedSet => Ok(Payload::Set(nested_items(&response.body)?)),
            ResponseParser::ReleaseAndReturnVoid => {
                trace!(bytes = response.body.len(), "releasing response body");
                Ok(Payload::Void)
            }
        }
    }
}

fn parse_object(body: &str) -> Result<Map<String, Value>, ParseError> {
    match serde_json::from_str::<Value>(body)? {
        Value::Object(map) => Ok(map),
        other => Err(ParseError::Shape(format!("expected an object envelope, found {}", kind(&other)))),
    }
}

/// The single value of a one-key object. An empty object yields `None`.
fn only_value(map: Map<String, Value>) -> Result<Option<Value>, ParseError> {
    if map.len() > 1 {
        let keys: Vec<_> = map.keys().cloned().collect();
        return Err(ParseError::Shape(format!("expected one wrapper key, found {keys:?}")));
    }
    Ok(map.into_iter().next().map(|(_, value)| value))
}

/// Items inside `{"wrapper": {"count": n, "<name>": [...]}}`.
///
/// A missing wrapper body or a wrapper without a collection means no items;
/// a lone object in place of the array counts as one item.
fn nested_items(body: &str) -> Result<Vec<Value>, ParseError> {
    let inner = match only_value(parse_object(body)?)? {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Object(inner)) => inner,
        Some(other) => {
            return Err(ParseError::Shape(format!("expected an object inside the wrapper, found {}", kind(&other))))
        }
    };

    let mut collections = inner.into_iter().filter(|(key, _)| key != "count");
    let collection = collections.next();
    if let Some((extra, _)) = collections.next() {
        return Err(ParseError::Shape(format!("unexpected second collection `{extra}`")));
    }
    match collection {
        None => Ok(Vec::new()),
        Some((_, Value::Array(items))) => Ok(items),
        Some((_, value @ Value::Object(_))) => Ok(vec![value]),
        Some((name, other)) => Err(ParseError::Shape(format!("`{name}` is {}, not a collection", kind(&other)))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Untyped outcome of a parser or fallback.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Value(Value),
    Set(Vec<Value>),
    /// No value; a `get` that found nothing.
    Absent,
    Void,
}

impl Payload {
    /// Deserialize a value that must be present.
    pub fn into_value<T: DeserializeOwned>(self) -> Result<T, ParseError> {
        match self {
            Payload::Value(value) => Ok(serde_json::from_value(value)?),
            Payload::Set(items) => Ok(serde_json::from_value(Value::Array(items))?),
            Payload::Absent => Err(ParseError::Shape("expected a value, response was empty".to_string())),
            Payload::Void => Err(ParseError::Shape("expected a value, operation returns nothing".to_string())),
        }
    }

    /// Deserialize a value that may be missing.
    pub fn into_option<T: DeserializeOwned>(self) -> Result<Option<T>, ParseError> {
        match self {
            Payload::Absent | Payload::Void | Payload::Value(Value::Null) => Ok(None),
            Payload::Value(value) => Ok(Some(serde_json::from_value(value)?)),
            Payload::Set(mut items) => match items.len() {
                0 => Ok(None),
                1 => Ok(Some(serde_json::from_value(items.remove(0))?)),
                n => Err(ParseError::Shape(format!("expected at most one value, found {n}"))),
            },
        }
    }

    /// Deserialize a collection; absence is an empty collection.
    pub fn into_set<T: DeserializeOwned>(self) -> Result<Vec<T>, ParseError> {
        let items = match self {
            Payload::Set(items) => items,
            Payload::Absent | Payload::Void | Payload::Value(Value::Null) => Vec::new(),
            Payload::Value(Value::Array(items)) => items,
            Payload::Value(other) => {
                return Err(ParseError::Shape(format!("expected a collection, found {}", kind(&other))))
            }
        };
        items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(ParseError::from))
            .collect()
    }

    pub fn into_void(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Zone {
        id: String,
        name: String,
    }

    fn ok(body: &str) -> HttpResponse {
        HttpResponse::new(200, body)
    }

    #[test]
    fn identity_returns_whole_body() {
        let payload = ResponseParser::Identity.parse(&ok(r#"{"a":1}"#)).unwrap();
        assert_eq!(payload, Payload::Value(serde_json::json!({"a": 1})));
    }

    #[test]
    fn identity_empty_body_is_null() {
        let payload = ResponseParser::Identity.parse(&ok("")).unwrap();
        assert_eq!(payload, Payload::Value(Value::Null));
    }

    #[test]
    fn unwrap_only_value() {
        let body = r#"{"deployvirtualmachineresponse":{"id":"54","jobid":"1138"}}"#;
        let payload = ResponseParser::UnwrapOnlyValue.parse(&ok(body)).unwrap();
        assert_eq!(payload, Payload::Value(serde_json::json!({"id": "54", "jobid": "1138"})));
    }

    #[test]
    fn unwrap_only_value_rejects_two_keys() {
        let err = ResponseParser::UnwrapOnlyValue
            .parse(&ok(r#"{"a":{},"b":{}}"#))
            .unwrap_err();
        assert!(matches!(err, ParseError::Shape(_)));
    }

    #[test]
    fn unwrap_only_value_rejects_non_object() {
        let err = ResponseParser::UnwrapOnlyValue.parse(&ok("[1,2]")).unwrap_err();
        assert!(matches!(err, ParseError::Shape(_)));
    }

    #[test]
    fn invalid_json_is_a_json_error() {
        let err = ResponseParser::UnwrapNestedSet.parse(&ok("not json")).unwrap_err();
        assert!(matches!(err, ParseError::Json(_)));
    }

    #[test]
    fn nested_set_extracts_collection() {
        let body = r#"{"listzonesresponse":{"count":2,"zone":[{"id":"1","name":"a"},{"id":"2","name":"b"}]}}"#;
        let zones: Vec<Zone> = ResponseParser::UnwrapNestedSet
            .parse(&ok(body))
            .unwrap()
            .into_set()
            .unwrap();
        assert_eq!(zones.len(), 2);
        assert_eq!(zones[1].name, "b");
    }

    #[test]
    fn nested_set_empty_wrapper_is_empty() {
        let payload = ResponseParser::UnwrapNestedSet
            .parse(&ok(r#"{ "listzonesresponse" : { } }"#))
            .unwrap();
        assert_eq!(payload, Payload::Set(Vec::new()));
    }

    #[test]
    fn nested_set_rejects_two_collections() {
        let body = r#"{"listzonesresponse":{"count":1,"zone":[],"pod":[]}}"#;
        let err = ResponseParser::UnwrapNestedSet.parse(&ok(body)).unwrap_err();
        assert!(matches!(err, ParseError::Shape(_)));
    }

    #[test]
    fn nested_set_rejects_scalar_collection() {
        let body = r#"{"listzonesresponse":{"zone":"nope"}}"#;
        let err = ResponseParser::UnwrapNestedSet.parse(&ok(body)).unwrap_err();
        assert!(matches!(err, ParseError::Shape(_)));
    }

    #[test]
    fn nested_value_single_element() {
        let body = r#"{"listzonesresponse":{"count":1,"zone":[{"id":"1","name":"a"}]}}"#;
        let zone: Option<Zone> = ResponseParser::UnwrapNestedValue
            .parse(&ok(body))
            .unwrap()
            .into_option()
            .unwrap();
        assert_eq!(zone.unwrap().id, "1");
    }

    #[test]
    fn nested_value_empty_is_absent() {
        let payload = ResponseParser::UnwrapNestedValue
            .parse(&ok(r#"{"listvirtualmachinesresponse":{}}"#))
            .unwrap();
        assert_eq!(payload, Payload::Absent);
    }

    #[test]
    fn nested_value_rejects_many() {
        let body = r#"{"listzonesresponse":{"count":2,"zone":[{"id":"1"},{"id":"2"}]}}"#;
        let err = ResponseParser::UnwrapNestedValue.parse(&ok(body)).unwrap_err();
        assert!(matches!(err, ParseError::Shape(_)));
    }

    #[test]
    fn release_ignores_body() {
        let payload = ResponseParser::ReleaseAndReturnVoid
            .parse(&ok("<html>whatever</html>"))
            .unwrap();
        assert_eq!(payload, Payload::Void);
    }

    #[test]
    fn into_value_of_absent_is_shape_error() {
        let err = Payload::Absent.into_value::<Zone>().unwrap_err();
        assert!(matches!(err, ParseError::Shape(_)));
    }

    #[test]
    fn into_set_rejects_scalar() {
        let err = Payload::Value(serde_json::json!(3)).into_set::<Zone>().unwrap_err();
        assert!(matches!(err, ParseError::Shape(_)));
    }

    #[test]
    fn into_option_of_null_is_none() {
        let zone: Option<Zone> = Payload::Value(Value::Null).into_option().unwrap();
        assert!(zone.is_none());
    }
}
