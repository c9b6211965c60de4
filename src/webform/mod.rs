//! Web forms: declarative forms bound to a doctype.
//!
//! - `context`: page context for rendering a form, a record or a list
//! - `layout`: sections/columns grid built from the flat field list
//! - `submit`: insert/update a record from a submission, with attachments
//! - `delete`: owner-only record deletion
//! - `registry`: forms loaded from the site definition

pub mod context;
pub mod delete;
pub mod error;
pub mod layout;
pub mod model;
pub mod registry;
pub mod submit;

use std::collections::BTreeMap;

use crate::types::Identity;

pub use context::{build_context, record_url, ListContext, RenderContext, FORMS_PREFIX, MAX_PAGE_LENGTH};
pub use delete::delete;
pub use error::WebFormError;
pub use layout::Layout;
pub use model::{FieldDefinition, FieldType, Parent, WebFormConfig};
pub use registry::{RegistryError, SiteDefinition, WebFormRegistry};
pub use submit::{accept, Submission};

/// Caller identity and request parameters, passed explicitly to every operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub caller: Identity,
    pub params: BTreeMap<String, String>,
}

impl RequestContext {
    pub fn new(caller: Identity, params: BTreeMap<String, String>) -> Self {
        Self { caller, params }
    }

    /// Parameter value, treating empty strings as absent
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}
