//! HTTP transport types shared by the builder, filters, and transports.
//!
//! # Design
//! Requests and responses are plain data. The endpoint and the query string
//! are kept apart so filters can read and rewrite individual parameters
//! (the signer needs the decoded values), and the wire form is produced only
//! when a transport asks for `url()`. Query parameters keep insertion order
//! and may repeat.

use std::fmt;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request described as plain data.
///
/// Built by `RequestBuilder::build`, rewritten by the filter chain, and then
/// handed by shared reference to a `Transport`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub endpoint: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, endpoint: &str) -> Self {
        Self {
            method,
            endpoint: endpoint.to_string(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// First value of the named query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set `name` to `value`, keeping the position of the first occurrence
    /// and dropping any duplicates. Appends when the name is absent.
    pub fn replace_query_param(&mut self, name: &str, value: &str) {
        match self.query.iter().position(|(key, _)| key == name) {
            Some(index) => {
                self.query[index].1 = value.to_string();
                let mut seen = 0usize;
                self.query.retain(|(key, _)| {
                    if key != name {
                        return true;
                    }
                    seen += 1;
                    seen == 1
                });
            }
            None => self.query.push((name.to_string(), value.to_string())),
        }
    }

    pub fn remove_query_param(&mut self, name: &str) {
        self.query.retain(|(key, _)| key != name);
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Percent-encoded query string, parameters in insertion order.
    pub fn query_string(&self) -> String {
        encode_query(&self.query)
    }

    /// Full request URL as sent on the wire.
    pub fn url(&self) -> String {
        if self.query.is_empty() {
            self.endpoint.clone()
        } else {
            format!("{}?{}", self.endpoint, self.query_string())
        }
    }

    /// `GET http://host/path?query HTTP/1.1`
    pub fn request_line(&self) -> String {
        format!("{} {} HTTP/1.1", self.method, self.url())
    }
}

/// Encode `name=value` pairs joined by `&`. Spaces become `%20`.
pub fn encode_query(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(name, value)| format!("{}={}", urlencoding::encode(name), urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
