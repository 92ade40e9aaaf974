//! Client configuration: endpoint, credentials, timeouts.
//!
//! Read-only after the client is constructed and shared by every in-flight
//! invocation.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// API key pair used by the query signer.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// The API key, sent as `apiKey`.
    pub identity: String,
    /// The secret key; never sent, only used to sign.
    pub credential: String,
}

impl Credentials {
    pub fn new(identity: &str, credential: &str) -> Self {
        Self {
            identity: identity.to_string(),
            credential: credential.to_string(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("credential", &"<redacted>")
            .finish()
    }
}

/// Configuration for a `CommandClient`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Command endpoint, e.g. `http://localhost:8080/client/api`.
    pub endpoint: String,

    /// Signing credentials. Without them the signer rejects every request.
    #[serde(default)]
    pub credentials: Option<Credentials>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_timeout() -> u64 {
    30
}

impl ClientConfig {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            credentials: None,
            timeout_secs: default_timeout(),
            user_agent: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = Some(user_agent.to_string());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
