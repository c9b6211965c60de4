use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::database::{Comment, DocTypeMeta, Document, DocumentStore, ListWindow};
use crate::webform::layout::Layout;
use crate::webform::model::{FieldType, Parent, WebFormConfig};
use crate::webform::{RequestContext, WebFormError};

/// Everything the page renderer needs for one request
#[derive(Debug, Clone, Serialize)]
pub struct RenderContext {
    pub params: BTreeMap<String, String>,
    pub web_form: FormSummary,
    pub doc: Option<Document>,
    pub title: String,
    pub parents: Vec<Parent>,
    pub comment_doctype: Option<String>,
    pub comment_docname: Option<String>,
    pub comment_list: Vec<Comment>,
    pub layout: Option<Layout>,
    pub is_list: bool,
    pub list: Option<ListContext>,
    pub types: Vec<FieldType>,
    /// Set when the form needs a login the caller does not have
    pub login_required: bool,
}

/// Form settings the renderer shows or branches on
#[derive(Debug, Clone, Serialize)]
pub struct FormSummary {
    pub name: String,
    pub title: String,
    pub route: String,
    pub doc_type: String,
    pub allow_edit: bool,
    pub allow_multiple: bool,
    pub allow_comments: bool,
    pub allow_delete: bool,
    pub introduction_text: Option<String>,
    pub success_url: Option<String>,
}

impl From<&WebFormConfig> for FormSummary {
    fn from(form: &WebFormConfig) -> Self {
        Self {
            name: form.name.clone(),
            title: form.title.clone(),
            route: form.route.clone(),
            doc_type: form.doc_type.clone(),
            allow_edit: form.allow_edit,
            allow_multiple: form.allow_multiple,
            allow_comments: form.allow_comments,
            allow_delete: form.allow_delete,
            introduction_text: form.introduction_text.clone(),
            success_url: form.success_url.clone(),
        }
    }
}

/// The caller's records when a form allows several per user
#[derive(Debug, Clone, Serialize)]
pub struct ListContext {
    pub doctype: String,
    pub items: Vec<ListItem>,
    pub start: usize,
    pub page_length: usize,
    /// `start` of the following page, if there is one
    pub next_start: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListItem {
    pub name: String,
    pub title: String,
    pub route: String,
    pub modified: Option<chrono::DateTime<chrono::Utc>>,
}

/// Build the render context for `form`.
///
/// Decides between the list view, the caller's single record, an explicitly
/// requested record, and an empty new-record form. Without a resolved record
/// the context has no document and no comment identifiers.
pub async fn build_context(
    form: &WebFormConfig,
    request: &RequestContext,
    store: &dyn DocumentStore,
    list_page_length: usize,
) -> Result<RenderContext, WebFormError> {
    if !form.published {
        return Err(WebFormError::NotFound(format!("Web Form {} not found", form.name)));
    }

    let mut context = RenderContext {
        params: request.params.clone(),
        web_form: FormSummary::from(form),
        doc: None,
        title: form.title.clone(),
        parents: Vec::new(),
        comment_doctype: None,
        comment_docname: None,
        comment_list: Vec::new(),
        layout: None,
        is_list: false,
        list: None,
        types: form.field_types(),
        login_required: false,
    };

    let mut name = request.param("name").map(str::to_string);

    if form.login_required && request.caller.is_guest() {
        // Owner lookup and list view need a session; a named record still loads
        debug!("Guest on login-only form {}", form.name);
        context.login_required = true;
    } else if form.login_required && form.allow_edit {
        if form.allow_multiple {
            if name.is_none() {
                context.list = Some(list_context(form, request, store, list_page_length).await?);
                context.is_list = true;
            }
        } else if let Some(owned) = store.find_owned(&form.doc_type, request.caller.name()).await? {
            name = Some(owned);
        }
    }

    if let Some(name) = name.filter(|_| !context.is_list) {
        let doc = store.get_doc(&form.doc_type, &name).await?;
        let meta = store.meta(&form.doc_type).await?;

        context.title = document_title(&doc, &meta);
        context.parents = vec![Parent { name: form.route.clone(), title: form.title.clone() }];
        context.comment_doctype = Some(doc.doctype().to_string());
        context.comment_docname = Some(name.clone());
        if form.allow_comments {
            context.comment_list = store.comments(&form.doc_type, &name).await?;
        }
        context.doc = Some(doc);
    }

    if !context.is_list {
        context.layout = Some(Layout::build(&form.web_form_fields));
    }

    context.parents = get_parents(form, &context.parents);
    Ok(context)
}

/// Path prefix the forms are served under
pub const FORMS_PREFIX: &str = "/forms";

/// Upper bound on a requested list page
pub const MAX_PAGE_LENGTH: usize = 100;

/// Page URL of record `name` on `form`
pub fn record_url(form: &WebFormConfig, name: &str) -> String {
    let name: String = url::form_urlencoded::byte_serialize(name.as_bytes()).collect();
    format!("{}/{}?name={}", FORMS_PREFIX, form.route.trim_matches('/'), name)
}

/// Record parents win; otherwise the form's configured breadcrumbs
fn get_parents(form: &WebFormConfig, parents: &[Parent]) -> Vec<Parent> {
    if !parents.is_empty() {
        return parents.to_vec();
    }
    let Some(breadcrumbs) = form.breadcrumbs.as_deref().filter(|b| !b.trim().is_empty()) else {
        return Vec::new();
    };
    match serde_json::from_str(breadcrumbs) {
        Ok(parents) => parents,
        Err(e) => {
            warn!("Ignoring malformed breadcrumbs on web form {}: {}", form.name, e);
            Vec::new()
        }
    }
}

fn document_title(doc: &Document, meta: &DocTypeMeta) -> String {
    doc.get_str(meta.title_field())
        .filter(|t| !t.is_empty())
        .or_else(|| doc.name())
        .unwrap_or_default()
        .to_string()
}

async fn list_context(
    form: &WebFormConfig,
    request: &RequestContext,
    store: &dyn DocumentStore,
    page_length: usize,
) -> Result<ListContext, WebFormError> {
    let start = request
        .param("start")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    let page_length = request
        .param("page_length")
        .and_then(|s| s.parse().ok())
        .filter(|n: &usize| *n > 0)
        .unwrap_or(page_length)
        .min(MAX_PAGE_LENGTH);

    // One extra row tells us whether another page exists
    let window = ListWindow { start, page_length: page_length + 1 };
    let mut docs = store.list_owned(&form.doc_type, request.caller.name(), window).await?;
    let next_start = if docs.len() > page_length {
        docs.truncate(page_length);
        start.checked_add(page_length)
    } else {
        None
    };

    let meta = store.meta(&form.doc_type).await?;
    let items = docs
        .iter()
        .filter_map(|doc| {
            let name = doc.name()?;
            Some(ListItem {
                name: name.to_string(),
                title: document_title(doc, &meta),
                route: record_url(form, name),
                modified: doc.modified(),
            })
        })
        .collect();

    Ok(ListContext {
        doctype: form.doc_type.clone(),
        items,
        start,
        page_length,
        next_start,
    })
}
