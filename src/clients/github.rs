#![allow(async_fn_in_trait)]

use std::fmt::Display;

#[cfg(test)]
use mockall::automock;
use serde_json::Value;

// -----------------------------------------------------------------------------
// GithubOps trait

/// Raw access to the GitHub REST API.
///
/// Implementations never fail: HTTP error statuses are returned as-is and
/// transport failures are folded into synthetic statuses (408 for timeouts,
/// 500 for everything else) so callers interpret every outcome the same way.
#[cfg_attr(test, automock)]
pub trait GithubOps {
    /// Issue `method` against `path` (relative to the API root, starting with
    /// `/`) with an optional JSON payload.
    async fn request(&self, method: Method, path: &str, payload: Option<Value>) -> ApiResponse;
}

// -----------------------------------------------------------------------------
// Types

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
}

impl Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Put => f.write_str("PUT"),
            Self::Post => f.write_str("POST"),
            Self::Delete => f.write_str("DELETE"),
        }
    }
}

/// Rate-limit counters reported by GitHub on every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub limit: u64,
    pub remaining: u64,
    /// Unix timestamp at which the window resets
    pub reset: u64,
}

impl Display for RateLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} API requests left", self.remaining, self.limit)
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
    pub rate_limit: Option<RateLimit>,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            body,
            rate_limit: None,
        }
    }

    pub fn is(&self, status: u16) -> bool {
        self.status == status
    }

    /// The `message` GitHub attaches to error bodies
    pub fn message(&self) -> String {
        self.body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error")
            .to_string()
    }

    /// Read a string field from an object body
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.body.get(key).and_then(Value::as_str)
    }
}
