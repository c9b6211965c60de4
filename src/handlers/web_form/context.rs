// handlers/web_form/context.rs - GET /forms/*route handler

use axum::extract::{Extension, Path, Query, State};
use std::collections::BTreeMap;

use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;
use crate::types::Identity;
use crate::webform::{RenderContext, RequestContext};

/// GET /forms/*route - Page context for the web form published at `route`
///
/// Query parameters are passed through as `params`; `name` selects a record,
/// `start`/`page_length` page the list view.
pub async fn get(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(route): Path<String>,
    Query(params): Query<BTreeMap<String, String>>,
) -> ApiResult<RenderContext> {
    let request = RequestContext::new(caller, params);
    let context = state.webforms.get_context(&route, &request).await?;
    Ok(ApiResponse::success(context))
}
