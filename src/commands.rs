//! User-facing command handlers.
//!
//! Each handler runs one operation for one user, prints a single ✓/✗ status
//! line followed by any payload, and appends the command to the user's
//! command log.

mod activity;
mod branch;
mod create;
mod delete;
mod edit;
mod list;
mod repo;
mod settings;
mod view;

pub use activity::DEFAULT_HISTORY_LIMIT;
