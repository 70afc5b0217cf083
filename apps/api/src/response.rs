use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

/// Wraps handler output in the `{"success": true, "data": ...}` envelope
/// every endpoint returns on the happy path.
pub fn success<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": data
    }))
}
