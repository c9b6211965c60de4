use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use webform_api_rust::{
    auth::{generate_jwt, Claims},
    config::config,
    database::MemoryStore,
    files::LocalFileManager,
    is_development, is_production,
    server::{app, AppState},
    services::WebFormService,
    webform::{SiteDefinition, WebFormRegistry},
};

#[derive(Debug, Parser)]
#[command(name = "webform-api", version, about = "Web Form API server")]
struct Args {
    /// Port to listen on (overrides WEBFORM_API_PORT / PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Site definition file with doctypes and web forms (overrides WEBFORM_SITE_FILE)
    #[arg(short, long)]
    site: Option<String>,

    /// Print a session token for USER and exit
    #[arg(long, value_name = "USER")]
    issue_token: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up JWT_SECRET, WEBFORM_SITE_FILE, etc.
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    // Initialize configuration (this loads the config singleton)
    let config = config();

    let default_filter = if config.api.enable_request_logging {
        "webform_api_rust=info,tower_http=debug"
    } else {
        "webform_api_rust=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    tracing::info!("Starting Web Form API in {:?} mode", config.environment);

    if is_production!() && config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set in production");
    }
    if is_development!() {
        tracing::warn!("Development mode: using the built-in session secret");
    }

    if let Some(user) = args.issue_token {
        let claims = Claims::new(user, config.security.jwt_expiry_hours);
        println!("{}", generate_jwt(&claims, &config.security.jwt_secret)?);
        return Ok(());
    }

    let store = Arc::new(MemoryStore::new());
    let site_file = args.site.or_else(|| config.forms.site_file.clone());
    let registry = match site_file {
        Some(path) if Path::new(&path).exists() => {
            let site = SiteDefinition::load(&path)
                .await
                .with_context(|| format!("loading site definition {}", path))?;
            let registry = site.install(&store).await?;
            tracing::info!("Loaded {} web forms from {}", registry.len(), path);
            registry
        }
        Some(path) => {
            tracing::warn!("Site definition {} not found; no web forms published", path);
            WebFormRegistry::default()
        }
        None => {
            tracing::warn!("No site definition configured; no web forms published");
            WebFormRegistry::default()
        }
    };

    let files = Arc::new(LocalFileManager::from_config(&config.files));
    let webforms = WebFormService::new(
        store,
        files,
        Arc::new(registry),
        config.forms.list_page_length,
    );
    let state = AppState::new(webforms, config);

    let port = args.port.unwrap_or(config.api.port);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    println!("🚀 Web Form API server listening on http://{}", bind_addr);

    axum::serve(listener, app(state)).await?;
    Ok(())
}
