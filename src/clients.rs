//! Clients for the systems the bot talks to.
//!
//! - [`github`]: the [`GithubOps`](github::GithubOps) seam and the response types every caller sees
//! - [`github_http`]: reqwest-backed implementation against the GitHub REST API
//!
//! Tests swap in a mock of the trait, or an in-memory GitHub that keeps
//! real sha semantics.

pub mod github;
pub mod github_http;

#[cfg(test)]
pub mod fake;
