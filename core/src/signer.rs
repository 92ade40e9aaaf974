//! CloudStack query signing.
//!
//! # Design
//! The signature covers every query parameter except `signature` itself,
//! including the `apiKey` the signer adds. Each value is percent-encoded,
//! the `name=value` pairs are sorted, joined with `&`, and the whole string
//! is lower-cased before HMAC-SHA1 with the secret key. The base64 digest is
//! appended as the final `signature` parameter.

use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use tracing::trace;

use crate::config::Credentials;
use crate::error::FilterError;
use crate::filter::RequestFilter;
use crate::http::HttpRequest;

type HmacSha1 = Hmac<Sha1>;

/// Request filter that appends `apiKey` and `signature`.
#[derive(Debug, Clone)]
pub struct QuerySigner {
    credentials: Option<Credentials>,
}

impl QuerySigner {
    pub fn new(credentials: Option<Credentials>) -> Self {
        Self { credentials }
    }

    /// Canonical form of the parameters, ready to be signed.
    pub fn string_to_sign(params: &[(String, String)]) -> String {
        let mut pairs: Vec<String> = params
            .iter()
            .filter(|(name, _)| name != "signature")
            .map(|(name, value)| format!("{name}={}", urlencoding::encode(value)))
            .collect();
        pairs.sort();
        pairs.join("&").to_lowercase()
    }

    /// Base64 HMAC-SHA1 of `string_to_sign` keyed by `secret`.
    pub fn sign(secret: &str, string_to_sign: &str) -> Result<String, FilterError> {
        let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
            .map_err(|e| FilterError::InvalidRequest(e.to_string()))?;
        mac.update(string_to_sign.as_bytes());
        Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
    }
}

impl RequestFilter for QuerySigner {
    fn filter(&self, mut request: HttpRequest) -> Result<HttpRequest, FilterError> {
        let credentials = self.credentials.as_ref().ok_or(FilterError::MissingCredential)?;
        if request.query_param("command").is_none() {
            return Err(FilterError::InvalidRequest("no command parameter".to_string()));
        }

        request.remove_query_param("signature");
        request.replace_query_param("apiKey", &credentials.identity);

        let string_to_sign = Self::string_to_sign(&request.query);
        trace!(%string_to_sign, "signing request");
        let signature = Self::sign(&credentials.credential, &string_to_sign)?;
        request.query.push(("signature".to_string(), signature));
        Ok(request)
    }
}
