// handlers/web_form/delete.rs - POST /api/method/web_form/delete handler

use axum::extract::{rejection::JsonRejection, Extension, Json, State};
use serde::{Deserialize, Serialize};

use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;
use crate::types::Identity;
use crate::webform::RequestContext;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub web_form: String,
    pub name: String,
}

/// POST /api/method/web_form/delete - Delete a record the caller owns
pub async fn post(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    payload: Result<Json<DeleteRequest>, JsonRejection>,
) -> ApiResult<DeleteRequest> {
    let Json(payload) = payload?;
    let request = RequestContext::new(caller, Default::default());
    state
        .webforms
        .delete(&payload.web_form, &payload.name, &request)
        .await?;
    Ok(ApiResponse::success(payload))
}
