pub mod clients;
pub mod commands;
pub mod config;
pub mod confirm;
pub mod context;
pub mod error;
pub mod ops;
pub mod sanitize;

mod app;

// Re-export App and Config from modules
pub use app::App;
pub use app::CLI_CHANNEL;
pub use config::Config;

// Disable colors for all tests to get clean output
#[cfg(test)]
#[ctor::ctor]
fn init_tests() {
    colored::control::set_override(false);
}
