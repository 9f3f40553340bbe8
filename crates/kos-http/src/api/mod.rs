//! Typed helpers over the rental API endpoints

pub mod auth;
pub mod kos;

pub use auth::{AuthApi, LoginOutcome};
pub use kos::{KosApi, LikeState};

use serde_json::Value;

/// JavaScript-style truthiness of a JSON value
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
