use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::handlers;
use crate::middleware::session_middleware;
use crate::services::WebFormService;
use crate::webform::FORMS_PREFIX;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub webforms: WebFormService,
    pub jwt_secret: Arc<str>,
    pub files_root: PathBuf,
    pub files_url_prefix: String,
    pub max_request_size_bytes: usize,
    pub cors_origins: Option<Vec<String>>,
}

impl AppState {
    pub fn new(webforms: WebFormService, config: &AppConfig) -> Self {
        Self {
            webforms,
            jwt_secret: Arc::from(config.security.jwt_secret.as_str()),
            files_root: PathBuf::from(&config.files.root_dir),
            files_url_prefix: config.files.url_prefix.clone(),
            max_request_size_bytes: config.api.max_request_size_bytes,
            cors_origins: config
                .security
                .enable_cors
                .then(|| config.security.cors_origins.clone()),
        }
    }
}

/// Build the application router
pub fn app(state: AppState) -> Router {
    let files = ServeDir::new(&state.files_root);
    let files_prefix = state.files_url_prefix.clone();
    let body_limit = state.max_request_size_bytes;
    let cors = cors_layer(state.cors_origins.as_deref());

    Router::new()
        // Public
        .route("/", get(handlers::system::root))
        .route("/health", get(handlers::system::health))
        // Guest or session
        .merge(web_form_routes(state.clone()))
        .nest_service(&files_prefix, files)
        // Global middleware, outermost first
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

fn web_form_routes(state: AppState) -> Router<AppState> {
    use handlers::web_form;

    Router::new()
        .route(&format!("{}/*route", FORMS_PREFIX), get(web_form::context))
        .route("/api/method/web_form/accept", post(web_form::accept))
        .route("/api/method/web_form/delete", post(web_form::delete))
        .route_layer(from_fn_with_state(state, session_middleware))
}

fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let Some(origins) = origins else {
        return CorsLayer::new();
    };

    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}
