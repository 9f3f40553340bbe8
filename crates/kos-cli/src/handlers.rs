//! Command handlers for the CLI

mod auth;
mod completions;
pub mod request;

pub use auth::{handle_login, handle_logout, handle_profile};
pub use completions::handle_completions;
pub use request::{handle_request, Verb};
