use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// Health check handler.
/// Returns JSON with status and config summary.
pub fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "status": "chatbridge is running",
        "config": {
            "model": state.upstream.model(),
            "upstream_host": state.upstream.messages_url().host_str(),
            "api_version": config.upstream.api_version,
            "default_max_tokens": config.upstream.default_max_tokens,
            "timeout_secs": config.upstream.timeout_secs,
            "client_keys_count": config.client_authentication.allowed_keys.len(),
            "features": {
                "log_level": config.features.log_level,
                "log_format": config.features.log_format.to_string(),
            }
        }
    }))
}
