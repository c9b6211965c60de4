#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::Value;
use tempfile::TempDir;

use webform_api_rust::{
    auth::{generate_jwt, Claims},
    config::AppConfig,
    database::MemoryStore,
    files::LocalFileManager,
    server::{app, AppState},
    services::WebFormService,
    webform::SiteDefinition,
};

pub const JWT_SECRET: &str = "integration-test-secret";

/// Site used by the integration tests: a login-free job application form
/// with attachments, and a login-required profile form.
pub const SITE: &str = r#"
doctypes:
  - name: Job Application
    title_field: applicant_name
    writers: [hr@example.com]
  - name: Profile
    title_field: full_name
web_forms:
  - name: job-application
    title: Apply for a Job
    route: jobs/apply
    doc_type: Job Application
    allow_edit: true
    allow_delete: true
    breadcrumbs: '[{"route": "jobs", "title": "Jobs"}]'
    web_form_fields:
      - { fieldname: applicant_name, fieldtype: Data, label: Name, reqd: true }
      - { fieldname: email, fieldtype: Data, label: Email }
      - { fieldtype: Column Break }
      - { fieldname: resume, fieldtype: Attach, label: Resume }
      - { fieldtype: Section Break }
      - { fieldname: notes, fieldtype: Text, label: Notes }
  - name: profile
    title: My Profile
    route: profile
    doc_type: Profile
    login_required: true
    allow_edit: true
    allow_multiple: true
    web_form_fields:
      - { fieldname: full_name, fieldtype: Data, label: Full Name }
"#;

/// In-process server bound to a free port, with its own file root
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub store: Arc<MemoryStore>,
    pub files_dir: TempDir,
    client: reqwest::Client,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Session token for `user`
    pub fn token(&self, user: &str) -> String {
        generate_jwt(&Claims::new(user, 1), JWT_SECRET).expect("token")
    }

    pub async fn accept(&self, user: Option<&str>, body: Value) -> Result<(StatusCode, Value)> {
        let mut req = self.client.post(self.url("/api/method/web_form/accept")).json(&body);
        if let Some(user) = user {
            req = req.bearer_auth(self.token(user));
        }
        let res = req.send().await?;
        Ok((res.status(), res.json().await?))
    }

    pub async fn delete(&self, user: Option<&str>, web_form: &str, name: &str) -> Result<(StatusCode, Value)> {
        let mut req = self
            .client
            .post(self.url("/api/method/web_form/delete"))
            .json(&serde_json::json!({ "web_form": web_form, "name": name }));
        if let Some(user) = user {
            req = req.bearer_auth(self.token(user));
        }
        let res = req.send().await?;
        Ok((res.status(), res.json().await?))
    }

    pub async fn context(&self, user: Option<&str>, path: &str) -> Result<(StatusCode, Value)> {
        let mut req = self.client.get(self.url(path));
        if let Some(user) = user {
            req = req.bearer_auth(self.token(user));
        }
        let res = req.send().await?;
        Ok((res.status(), res.json().await?))
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

/// Spawn a fresh server on the current test runtime
pub async fn spawn_server() -> Result<TestServer> {
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let base_url = format!("http://127.0.0.1:{}", port);
    let files_dir = tempfile::tempdir()?;

    let mut config = AppConfig::development();
    config.security.jwt_secret = JWT_SECRET.to_string();
    config.files.root_dir = files_dir.path().display().to_string();

    let store = Arc::new(MemoryStore::new());
    let registry = SiteDefinition::parse(SITE)?.install(&store).await?;
    let files = Arc::new(LocalFileManager::from_config(&config.files));
    let webforms = WebFormService::new(store.clone(), files, Arc::new(registry), 20);
    let router = app(AppState::new(webforms, &config));

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    let server = TestServer { port, base_url, store, files_dir, client: reqwest::Client::new() };
    server.wait_ready(Duration::from_secs(5)).await?;
    Ok(server)
}
