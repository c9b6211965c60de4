// handlers/web_form/accept.rs - POST /api/method/web_form/accept handler

use axum::extract::{rejection::JsonRejection, Extension, Json, State};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;
use crate::types::Identity;
use crate::webform::RequestContext;

/**
 * POST /api/method/web_form/accept - Insert or update a record through a web form
 *
 * Expected Input:
 * ```json
 * {
 *   "web_form": "job-application",   // Required: web form name
 *   "doctype": "Job Application",    // Required: must match the form
 *   "name": "a1b2c3d4e5",            // Optional: present for updates
 *   "applicant_name": "Ann",
 *   "resume": "{\"__file_attachment\": true, \"filename\": \"cv.pdf\", \"dataurl\": \"data:...\"}"
 * }
 * ```
 *
 * Returns the saved record; 201 for inserts, 200 for updates.
 */
pub async fn post(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(payload) = payload?;
    let params = form_params(payload);
    let is_insert = params.get("name").map(|n| n.is_empty()).unwrap_or(true);

    let request = RequestContext::new(caller, params);
    let doc = state.webforms.accept(&request).await?;

    let data = doc.to_api_output();
    Ok(if is_insert { ApiResponse::created(data) } else { ApiResponse::success(data) })
}

/// Flatten a JSON body into form parameters. Strings pass through, `null`
/// becomes empty, anything else is carried as its JSON text.
pub(crate) fn form_params(payload: Map<String, Value>) -> BTreeMap<String, String> {
    payload
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (key, value)
        })
        .collect()
}
