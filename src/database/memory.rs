use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::document::Document;
use crate::database::store::{Comment, DocTypeMeta, DocumentStore, ListWindow, StoreError};
use crate::types::{Identity, Operation};

/// Length of generated document names
const AUTONAME_LENGTH: usize = 10;

#[derive(Default)]
struct Tables {
    meta: HashMap<String, DocTypeMeta>,
    docs: HashMap<String, HashMap<String, Document>>,
    comments: HashMap<(String, String), Vec<Comment>>,
}

/// Process-local document store. Doctypes must be registered before use.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) doctype metadata
    pub async fn register_doctype(&self, meta: DocTypeMeta) {
        let mut tables = self.tables.write().await;
        info!("Registered doctype: {}", meta.name);
        tables.docs.entry(meta.name.clone()).or_default();
        tables.meta.insert(meta.name.clone(), meta);
    }

    /// Append a comment to an existing document
    pub async fn add_comment(
        &self,
        doctype: &str,
        name: &str,
        comment_by: &str,
        content: &str,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        Self::existing(&tables, doctype, name)?;
        tables
            .comments
            .entry((doctype.to_string(), name.to_string()))
            .or_default()
            .push(Comment {
                comment_by: comment_by.to_string(),
                content: content.to_string(),
                creation: Utc::now(),
            });
        Ok(())
    }

    pub async fn count(&self, doctype: &str) -> usize {
        let tables = self.tables.read().await;
        tables.docs.get(doctype).map(HashMap::len).unwrap_or(0)
    }

    fn autoname() -> String {
        let mut name = Uuid::new_v4().simple().to_string();
        name.truncate(AUTONAME_LENGTH);
        name
    }

    fn meta_of<'a>(tables: &'a Tables, doctype: &str) -> Result<&'a DocTypeMeta, StoreError> {
        tables
            .meta
            .get(doctype)
            .ok_or_else(|| StoreError::UnknownDoctype(doctype.to_string()))
    }

    fn existing<'a>(tables: &'a Tables, doctype: &str, name: &str) -> Result<&'a Document, StoreError> {
        Self::meta_of(tables, doctype)?;
        tables
            .docs
            .get(doctype)
            .and_then(|docs| docs.get(name))
            .ok_or_else(|| StoreError::NotFound {
                doctype: doctype.to_string(),
                name: name.to_string(),
            })
    }

    /// Writers listed on the doctype may write; guests never may
    fn check_permission(
        meta: &DocTypeMeta,
        caller: &Identity,
        operation: Operation,
    ) -> Result<(), StoreError> {
        let allowed = match caller {
            Identity::Guest => false,
            Identity::User(user) => meta.writers.iter().any(|w| w == user),
        };
        if allowed {
            Ok(())
        } else {
            debug!("Denied {} on {} for {}", operation, meta.name, caller.name());
            Err(StoreError::PermissionDenied {
                operation,
                doctype: meta.name.clone(),
            })
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_doc(&self, doctype: &str, name: &str) -> Result<Document, StoreError> {
        let tables = self.tables.read().await;
        Self::existing(&tables, doctype, name).cloned()
    }

    async fn find_owned(&self, doctype: &str, owner: &str) -> Result<Option<String>, StoreError> {
        let tables = self.tables.read().await;
        Self::meta_of(&tables, doctype)?;
        // Oldest first so the same record keeps coming back
        let found = tables
            .docs
            .get(doctype)
            .into_iter()
            .flat_map(HashMap::values)
            .filter(|doc| doc.owner() == owner)
            .min_by_key(|doc| doc.creation())
            .and_then(|doc| doc.name().map(str::to_string));
        Ok(found)
    }

    async fn get_owner(&self, doctype: &str, name: &str) -> Result<Option<String>, StoreError> {
        let tables = self.tables.read().await;
        match Self::existing(&tables, doctype, name) {
            Ok(doc) => Ok(Some(doc.owner().to_string())),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn insert(
        &self,
        doc: &mut Document,
        caller: &Identity,
        ignore_permissions: bool,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let meta = Self::meta_of(&tables, doc.doctype())?;
        if !ignore_permissions {
            Self::check_permission(meta, caller, Operation::Insert)?;
        }

        let name = doc.name().map(str::to_string).unwrap_or_else(Self::autoname);
        let docs = tables.docs.entry(doc.doctype().to_string()).or_default();
        if docs.contains_key(&name) {
            return Err(StoreError::Duplicate {
                doctype: doc.doctype().to_string(),
                name,
            });
        }

        let now = Utc::now();
        doc.set_name(name.clone())
            .set_owner(caller.name())
            .set_creation(now)
            .touch(now)
            .mark_clean();
        docs.insert(name, doc.clone());

        info!("Inserted {} (owner: {})", doc, caller.name());
        Ok(())
    }

    async fn save(
        &self,
        doc: &mut Document,
        caller: &Identity,
        ignore_permissions: bool,
    ) -> Result<(), StoreError> {
        let name = doc.name().map(str::to_string).ok_or(StoreError::Unsaved)?;
        let mut tables = self.tables.write().await;
        let meta = Self::meta_of(&tables, doc.doctype())?;
        if !ignore_permissions {
            Self::check_permission(meta, caller, Operation::Update)?;
        }

        let stored = tables
            .docs
            .get_mut(doc.doctype())
            .and_then(|docs| docs.get_mut(&name))
            .ok_or_else(|| StoreError::NotFound {
                doctype: doc.doctype().to_string(),
                name: name.clone(),
            })?;

        if !doc.has_changes() {
            debug!("Nothing to save for {}", doc);
            return Ok(());
        }

        // Ownership and creation time belong to the stored copy
        doc.set_owner(stored.owner().to_string());
        if let Some(creation) = stored.creation() {
            doc.set_creation(creation);
        }
        doc.touch(Utc::now()).mark_clean();
        *stored = doc.clone();

        info!("Saved {} (by: {})", doc, caller.name());
        Ok(())
    }

    async fn delete_doc(
        &self,
        doctype: &str,
        name: &str,
        caller: &Identity,
        ignore_permissions: bool,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let meta = Self::meta_of(&tables, doctype)?;
        if !ignore_permissions {
            Self::check_permission(meta, caller, Operation::Delete)?;
        }

        let removed = tables.docs.get_mut(doctype).and_then(|docs| docs.remove(name));
        if removed.is_none() {
            return Err(StoreError::NotFound {
                doctype: doctype.to_string(),
                name: name.to_string(),
            });
        }
        tables.comments.remove(&(doctype.to_string(), name.to_string()));

        info!("Deleted {} {} (by: {})", doctype, name, caller.name());
        Ok(())
    }

    async fn list_owned(
        &self,
        doctype: &str,
        owner: &str,
        window: ListWindow,
    ) -> Result<Vec<Document>, StoreError> {
        let tables = self.tables.read().await;
        Self::meta_of(&tables, doctype)?;

        let mut owned: Vec<&Document> = tables
            .docs
            .get(doctype)
            .into_iter()
            .flat_map(HashMap::values)
            .filter(|doc| doc.owner() == owner)
            .collect();
        owned.sort_by(|a, b| b.modified().cmp(&a.modified()).then_with(|| a.name().cmp(&b.name())));

        Ok(owned
            .into_iter()
            .skip(window.start)
            .take(window.page_length)
            .cloned()
            .collect())
    }

    async fn meta(&self, doctype: &str) -> Result<DocTypeMeta, StoreError> {
        let tables = self.tables.read().await;
        Self::meta_of(&tables, doctype).cloned()
    }

    async fn comments(&self, doctype: &str, name: &str) -> Result<Vec<Comment>, StoreError> {
        let tables = self.tables.read().await;
        Self::existing(&tables, doctype, name)?;
        Ok(tables
            .comments
            .get(&(doctype.to_string(), name.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> MemoryStore {
        let store = MemoryStore::new();
        let mut meta = DocTypeMeta::new("Job Application");
        meta.title_field = Some("applicant_name".to_string());
        meta.writers = vec!["hr@example.com".to_string()];
        store.register_doctype(meta).await;
        store
    }

    #[tokio::test]
    async fn insert_assigns_name_and_owner() {
        let store = store().await;
        let caller = Identity::user("ann@example.com");
        let mut doc = Document::new("Job Application");
        doc.set_field("applicant_name", "Ann");

        store.insert(&mut doc, &caller, true).await.unwrap();

        let name = doc.name().unwrap().to_string();
        assert_eq!(name.len(), AUTONAME_LENGTH);
        let loaded = store.get_doc("Job Application", &name).await.unwrap();
        assert_eq!(loaded.owner(), "ann@example.com");
        assert_eq!(loaded.get_str("applicant_name"), Some("Ann"));
    }

    #[tokio::test]
    async fn save_without_bypass_requires_writer() {
        let store = store().await;
        let owner = Identity::user("ann@example.com");
        let mut doc = Document::new("Job Application");
        store.insert(&mut doc, &owner, true).await.unwrap();

        doc.set_field("applicant_name", "Changed");
        let err = store.save(&mut doc, &Identity::user("bob@example.com"), false).await;
        assert!(matches!(err, Err(StoreError::PermissionDenied { .. })));

        store.save(&mut doc, &Identity::user("hr@example.com"), false).await.unwrap();
        let name = doc.name().unwrap();
        let loaded = store.get_doc("Job Application", name).await.unwrap();
        assert_eq!(loaded.get_str("applicant_name"), Some("Changed"));
        assert_eq!(loaded.owner(), "ann@example.com");
    }

    #[tokio::test]
    async fn unchanged_save_keeps_modified() {
        let store = store().await;
        let owner = Identity::user("ann@example.com");
        let mut doc = Document::new("Job Application");
        doc.set_field("applicant_name", "Ann");
        store.insert(&mut doc, &owner, true).await.unwrap();
        let name = doc.name().unwrap().to_string();

        let mut loaded = store.get_doc("Job Application", &name).await.unwrap();
        loaded.set_field("applicant_name", "Ann");
        store.save(&mut loaded, &owner, true).await.unwrap();

        let after = store.get_doc("Job Application", &name).await.unwrap();
        assert_eq!(after.modified(), doc.modified());
    }

    #[tokio::test]
    async fn unknown_doctype_is_rejected() {
        let store = store().await;
        let mut doc = Document::new("Nope");
        let err = store.insert(&mut doc, &Identity::Guest, true).await;
        assert!(matches!(err, Err(StoreError::UnknownDoctype(_))));
    }

    #[tokio::test]
    async fn list_owned_filters_and_pages() {
        let store = store().await;
        let ann = Identity::user("ann@example.com");
        let bob = Identity::user("bob@example.com");
        for _ in 0..3 {
            store.insert(&mut Document::new("Job Application"), &ann, true).await.unwrap();
        }
        store.insert(&mut Document::new("Job Application"), &bob, true).await.unwrap();

        let window = ListWindow { start: 0, page_length: 2 };
        let page = store.list_owned("Job Application", "ann@example.com", window).await.unwrap();
        assert_eq!(page.len(), 2);
        assert!(page.iter().all(|d| d.owner() == "ann@example.com"));

        let window = ListWindow { start: 2, page_length: 2 };
        let rest = store.list_owned("Job Application", "ann@example.com", window).await.unwrap();
        assert_eq!(rest.len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_document_and_comments() {
        let store = store().await;
        let ann = Identity::user("ann@example.com");
        let mut doc = Document::new("Job Application");
        store.insert(&mut doc, &ann, true).await.unwrap();
        let name = doc.name().unwrap().to_string();
        store.add_comment("Job Application", &name, "hr@example.com", "Thanks!").await.unwrap();

        store.delete_doc("Job Application", &name, &ann, true).await.unwrap();

        assert_eq!(store.get_owner("Job Application", &name).await.unwrap(), None);
        assert!(matches!(
            store.comments("Job Application", &name).await,
            Err(StoreError::NotFound { .. })
        ));
    }
}
