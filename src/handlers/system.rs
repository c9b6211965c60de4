// handlers/system.rs - GET / and GET /health

use axum::extract::State;
use serde_json::{json, Value};

use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;

/// GET / - Service description and endpoint map
pub async fn root(State(state): State<AppState>) -> ApiResult<Value> {
    let forms = state.webforms.forms().len();

    Ok(ApiResponse::success(json!({
        "name": "Web Form API (Rust)",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Declarative web forms over a document store, built with Rust (Axum)",
        "web_forms": forms,
        "endpoints": {
            "home": "/ (public)",
            "health": "/health (public)",
            "forms": "/forms/*route (guest or session)",
            "accept": "/api/method/web_form/accept (guest or session)",
            "delete": "/api/method/web_form/delete (session)",
            "files": format!("{}/* (public)", state.files_url_prefix),
        }
    })))
}

/// GET /health - Liveness probe
pub async fn health() -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now(),
    })))
}
