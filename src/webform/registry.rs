use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::database::{DocTypeMeta, MemoryStore};
use crate::webform::model::WebFormConfig;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to read site definition {path}: {source}")]
    Io { path: String, source: std::io::Error },

    #[error("Invalid site definition: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Duplicate web form name: {0}")]
    DuplicateName(String),

    #[error("Duplicate web form route: {0}")]
    DuplicateRoute(String),

    #[error("Web form {form} targets unknown doctype {doctype}")]
    UnknownDoctype { form: String, doctype: String },
}

/// Site file contents: doctype metadata plus the web forms bound to them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteDefinition {
    #[serde(default)]
    pub doctypes: Vec<DocTypeMeta>,
    #[serde(default)]
    pub web_forms: Vec<WebFormConfig>,
}

impl SiteDefinition {
    /// Parse YAML (JSON is accepted too, being a YAML subset)
    pub fn parse(source: &str) -> Result<Self, RegistryError> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let source = tokio::fs::read_to_string(path).await.map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&source)
    }

    /// Register the doctypes with `store` and index the forms
    pub async fn install(self, store: &MemoryStore) -> Result<WebFormRegistry, RegistryError> {
        for form in &self.web_forms {
            if !self.doctypes.iter().any(|d| d.name == form.doc_type) {
                return Err(RegistryError::UnknownDoctype {
                    form: form.name.clone(),
                    doctype: form.doc_type.clone(),
                });
            }
        }

        let registry = WebFormRegistry::new(self.web_forms)?;
        for meta in self.doctypes {
            store.register_doctype(meta).await;
        }
        Ok(registry)
    }
}

/// Published web forms, indexed by name and by route
#[derive(Debug, Clone, Default)]
pub struct WebFormRegistry {
    forms: HashMap<String, WebFormConfig>,
    routes: HashMap<String, String>,
}

impl WebFormRegistry {
    pub fn new(forms: Vec<WebFormConfig>) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for form in forms {
            registry.add(form)?;
        }
        Ok(registry)
    }

    pub fn add(&mut self, form: WebFormConfig) -> Result<(), RegistryError> {
        if self.forms.contains_key(&form.name) {
            return Err(RegistryError::DuplicateName(form.name));
        }
        let route = normalize_route(&form.route);
        if self.routes.contains_key(&route) {
            return Err(RegistryError::DuplicateRoute(route));
        }

        info!("Registered web form '{}' at /{} for {}", form.name, route, form.doc_type);
        self.routes.insert(route, form.name.clone());
        self.forms.insert(form.name.clone(), form);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&WebFormConfig> {
        self.forms.get(name)
    }

    pub fn by_route(&self, route: &str) -> Option<&WebFormConfig> {
        self.routes
            .get(&normalize_route(route))
            .and_then(|name| self.forms.get(name))
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }
}

fn normalize_route(route: &str) -> String {
    route.trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DocumentStore;

    const SITE: &str = r#"
doctypes:
  - name: Job Application
    title_field: applicant_name
web_forms:
  - name: job-application
    title: Apply
    route: /jobs/apply/
    doc_type: Job Application
"#;

    #[tokio::test]
    async fn installs_doctypes_and_indexes_routes() {
        let store = MemoryStore::new();
        let registry = SiteDefinition::parse(SITE).unwrap().install(&store).await.unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.by_route("jobs/apply").unwrap().name, "job-application");
        assert!(registry.get("job-application").is_some());
        assert_eq!(store.meta("Job Application").await.unwrap().title_field(), "applicant_name");
    }

    #[tokio::test]
    async fn rejects_form_for_unknown_doctype() {
        let site = SiteDefinition {
            doctypes: vec![],
            web_forms: vec![WebFormConfig::new("orphan", "Nothing")],
        };
        let err = site.install(&MemoryStore::new()).await;
        assert!(matches!(err, Err(RegistryError::UnknownDoctype { .. })));
    }

    #[test]
    fn rejects_duplicate_routes() {
        let mut a = WebFormConfig::new("a", "ToDo");
        a.route = "todo".into();
        let mut b = WebFormConfig::new("b", "ToDo");
        b.route = "/todo".into();
        assert!(matches!(WebFormRegistry::new(vec![a, b]), Err(RegistryError::DuplicateRoute(_))));
    }
}
