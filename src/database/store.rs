use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::database::document::Document;
use crate::types::{Identity, Operation};

/// Errors from a DocumentStore
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{doctype} {name} not found")]
    NotFound { doctype: String, name: String },

    #[error("Unknown doctype: {0}")]
    UnknownDoctype(String),

    #[error("Insufficient permission to {operation} {doctype}")]
    PermissionDenied { operation: Operation, doctype: String },

    #[error("{doctype} {name} already exists")]
    Duplicate { doctype: String, name: String },

    #[error("Document has not been inserted yet")]
    Unsaved,

    #[error("Storage error: {0}")]
    Backend(String),
}

/// Doctype metadata the form layer needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocTypeMeta {
    pub name: String,
    /// Field holding a human readable title
    #[serde(default)]
    pub title_field: Option<String>,
    /// Users allowed to write records without ownership bypass
    #[serde(default)]
    pub writers: Vec<String>,
}

impl DocTypeMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), title_field: None, writers: Vec::new() }
    }

    /// Title field, falling back to `name`
    pub fn title_field(&self) -> &str {
        self.title_field.as_deref().unwrap_or("name")
    }
}

/// Comment attached to a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub comment_by: String,
    pub content: String,
    pub creation: DateTime<Utc>,
}

/// Pagination window for list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListWindow {
    pub start: usize,
    pub page_length: usize,
}

/// Document store collaborator. Single-document operations are atomic;
/// nothing spans several calls.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Load a document by identity
    async fn get_doc(&self, doctype: &str, name: &str) -> Result<Document, StoreError>;

    /// Name of the first document of `doctype` owned by `owner`
    async fn find_owned(&self, doctype: &str, owner: &str) -> Result<Option<String>, StoreError>;

    /// Current owner of a document, `None` when it does not exist
    async fn get_owner(&self, doctype: &str, name: &str) -> Result<Option<String>, StoreError>;

    /// Assign a name and persist a new document owned by `caller`
    async fn insert(
        &self,
        doc: &mut Document,
        caller: &Identity,
        ignore_permissions: bool,
    ) -> Result<(), StoreError>;

    /// Persist changes to an existing document
    async fn save(
        &self,
        doc: &mut Document,
        caller: &Identity,
        ignore_permissions: bool,
    ) -> Result<(), StoreError>;

    async fn delete_doc(
        &self,
        doctype: &str,
        name: &str,
        caller: &Identity,
        ignore_permissions: bool,
    ) -> Result<(), StoreError>;

    /// Documents of `doctype` owned by `owner`, most recently modified first
    async fn list_owned(
        &self,
        doctype: &str,
        owner: &str,
        window: ListWindow,
    ) -> Result<Vec<Document>, StoreError>;

    async fn meta(&self, doctype: &str) -> Result<DocTypeMeta, StoreError>;

    /// Comments on a document, oldest first
    async fn comments(&self, doctype: &str, name: &str) -> Result<Vec<Comment>, StoreError>;
}
