use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use reqwest::header;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use serde_json::Value;
use serde_json::json;
use tracing::debug;
use tracing::instrument;
use tracing::warn;

use super::github::ApiResponse;
use super::github::GithubOps;
use super::github::Method;
use super::github::RateLimit;

/// Upper bound on a single API round trip
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = "gitbot";
const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

/// HTTP client for making GitHub API requests
pub struct RealGithub {
    base_url: String,
    client: reqwest::Client,
}

impl RealGithub {
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .context("GitHub token contains invalid header characters")?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(API_VERSION),
        );

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn transport_failure(err: reqwest::Error) -> ApiResponse {
        if err.is_timeout() {
            warn!("GitHub request timed out: {}", err);
            ApiResponse::new(
                408,
                json!({"message": format!(
                    "Request to GitHub timed out after {}s",
                    REQUEST_TIMEOUT.as_secs()
                )}),
            )
        } else {
            warn!("GitHub request failed: {}", err);
            ApiResponse::new(
                500,
                json!({"message": format!("Request to GitHub failed: {}", err)}),
            )
        }
    }
}

impl GithubOps for RealGithub {
    #[instrument(skip(self, payload))]
    async fn request(&self, method: Method, path: &str, payload: Option<Value>) -> ApiResponse {
        let url = format!("{}{}", self.base_url, path);
        let method = match method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &url);
        if let Some(payload) = &payload {
            builder = builder.json(payload);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => return Self::transport_failure(err),
        };

        let status = response.status().as_u16();
        let rate_limit = parse_rate_limit(response.headers());
        debug!(status, ?rate_limit, "GitHub responded");

        if status == 204 {
            return ApiResponse {
                status,
                body: json!({}),
                rate_limit,
            };
        }

        let text = match response.text().await {
            Ok(text) => text,
            Err(err) => return Self::transport_failure(err),
        };

        ApiResponse {
            status,
            body: parse_body(&text),
            rate_limit,
        }
    }
}

/// Parse a response body, keeping non-JSON text as the error message
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(text).unwrap_or_else(|_| json!({"message": text.trim()}))
}

fn parse_rate_limit(headers: &HeaderMap) -> Option<RateLimit> {
    let read = |name: &str| -> Option<u64> { headers.get(name)?.to_str().ok()?.parse().ok() };
    Some(RateLimit {
        limit: read("x-ratelimit-limit")?,
        remaining: read("x-ratelimit-remaining")?,
        reset: read("x-ratelimit-reset").unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(""), json!({}));
        assert_eq!(parse_body("  \n"), json!({}));
        assert_eq!(parse_body(r#"{"sha":"abc"}"#), json!({"sha": "abc"}));
        assert_eq!(parse_body("[1,2]"), json!([1, 2]));
        assert_eq!(
            parse_body("Bad Gateway\n"),
            json!({"message": "Bad Gateway"})
        );
    }

    #[test]
    fn test_parse_rate_limit() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_rate_limit(&headers), None);

        headers.insert("x-ratelimit-limit", HeaderValue::from_static("5000"));
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("4321"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1700000000"));
        assert_eq!(
            parse_rate_limit(&headers),
            Some(RateLimit {
                limit: 5000,
                remaining: 4321,
                reset: 1_700_000_000,
            })
        );
    }

    #[test]
    fn test_new_rejects_bad_token() {
        assert!(RealGithub::new("https://api.github.com", "bad\ntoken").is_err());
    }

    #[tokio::test]
    async fn test_connection_failure_is_synthesized_as_500() {
        // Nothing listens on port 9 (discard) on loopback in the test environment.
        let gh = RealGithub::new("http://127.0.0.1:9", "token").unwrap();
        let resp = gh.request(Method::Get, "/repos/a/b", None).await;
        assert_eq!(resp.status, 500);
        assert!(resp.message().starts_with("Request to GitHub failed"));
    }
}
