use std::sync::Arc;

use crate::database::{Document, DocumentStore};
use crate::files::FileManager;
use crate::webform::{
    self, RenderContext, RequestContext, WebFormConfig, WebFormError, WebFormRegistry,
};

/// Resolves web forms from the registry and runs the form operations
/// against the configured store and file manager.
#[derive(Clone)]
pub struct WebFormService {
    store: Arc<dyn DocumentStore>,
    files: Arc<dyn FileManager>,
    forms: Arc<WebFormRegistry>,
    list_page_length: usize,
}

impl WebFormService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        files: Arc<dyn FileManager>,
        forms: Arc<WebFormRegistry>,
        list_page_length: usize,
    ) -> Self {
        Self { store, files, forms, list_page_length }
    }

    pub fn forms(&self) -> &WebFormRegistry {
        &self.forms
    }

    fn form(&self, name: &str) -> Result<&WebFormConfig, WebFormError> {
        self.forms
            .get(name)
            .ok_or_else(|| WebFormError::NotFound(format!("Web Form {} not found", name)))
    }

    /// Render context for the form published at `route`
    pub async fn get_context(&self, route: &str, request: &RequestContext) -> Result<RenderContext, WebFormError> {
        let form = self
            .forms
            .by_route(route)
            .ok_or_else(|| WebFormError::NotFound(format!("No web form at /{}", route)))?;
        webform::build_context(form, request, self.store.as_ref(), self.list_page_length).await
    }

    /// Accept a submission; the form is named by the `web_form` parameter
    pub async fn accept(&self, request: &RequestContext) -> Result<Document, WebFormError> {
        let form_name = request
            .param("web_form")
            .or_else(|| request.param("webForm"))
            .ok_or_else(|| WebFormError::field_validation("web_form", "web_form is required"))?;
        let form = self.form(form_name)?;
        webform::accept(form, request, self.store.as_ref(), self.files.as_ref()).await
    }

    pub async fn delete(&self, web_form: &str, name: &str, request: &RequestContext) -> Result<(), WebFormError> {
        let form = self.form(web_form)?;
        webform::delete(form, name, request, self.store.as_ref(), self.files.as_ref()).await
    }
}
