use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::database::{Document, DocumentStore, FieldValue, StoreError};
use crate::files::FileManager;
use crate::webform::{RequestContext, WebFormConfig, WebFormError};

/// Request keys that are never written to the record
const CONTROL_FIELDS: &[&str] = &["web_form", "webForm", "cmd", "owner"];

/// Key marking a JSON field value as a file upload
pub const FILE_ATTACHMENT_MARKER: &str = "__file_attachment";

/// Uploaded file carried in a field value
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileAttachment {
    pub filename: String,
    pub dataurl: String,
}

/// Parsed submission: target form and record, field values and deferred uploads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub web_form: String,
    pub doctype: String,
    pub name: Option<String>,
    pub values: BTreeMap<String, String>,
    pub attachments: Vec<(String, FileAttachment)>,
}

impl Submission {
    /// Split raw request parameters into identity, field values and attachments
    pub fn from_params(params: &BTreeMap<String, String>) -> Result<Self, WebFormError> {
        let lookup = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| params.get(*k))
                .filter(|v| !v.is_empty())
                .cloned()
        };

        let web_form = lookup(&["web_form", "webForm"])
            .ok_or_else(|| WebFormError::field_validation("web_form", "web_form is required"))?;
        let doctype = lookup(&["doctype", "docType"]).unwrap_or_default();
        let name = lookup(&["name"]);

        let mut values = BTreeMap::new();
        let mut attachments = Vec::new();
        for (fieldname, value) in params {
            if CONTROL_FIELDS.contains(&fieldname.as_str())
                || matches!(fieldname.as_str(), "doctype" | "docType" | "name")
            {
                continue;
            }
            match parse_attachment(fieldname, value)? {
                Some(attachment) => attachments.push((fieldname.clone(), attachment)),
                None => {
                    values.insert(fieldname.clone(), value.clone());
                }
            }
        }

        Ok(Self { web_form, doctype, name, values, attachments })
    }

    pub fn is_insert(&self) -> bool {
        self.name.is_none()
    }
}

/// A JSON object value with the attachment marker is an upload. Anything that
/// does not parse as JSON is a plain value.
fn parse_attachment(fieldname: &str, value: &str) -> Result<Option<FileAttachment>, WebFormError> {
    if !value.trim_start().starts_with('{') {
        return Ok(None);
    }
    let parsed = match serde_json::from_str::<Value>(value) {
        Ok(Value::Object(map)) if map.contains_key(FILE_ATTACHMENT_MARKER) => Value::Object(map),
        Ok(_) => return Ok(None),
        Err(e) => {
            debug!("Field {} is not JSON ({}), keeping raw value", fieldname, e);
            return Ok(None);
        }
    };

    serde_json::from_value(parsed)
        .map(Some)
        .map_err(|e| WebFormError::field_validation(fieldname, format!("Invalid file attachment: {}", e)))
}

/// Insert or update the record behind `form` from the request parameters.
///
/// All validation happens before the first write. Owners update their own
/// record without the store's permission check; anyone else goes through it.
/// Attachments are stored once the record has a name, then the record is
/// saved again with their URLs.
pub async fn accept(
    form: &WebFormConfig,
    request: &RequestContext,
    store: &dyn DocumentStore,
    files: &dyn FileManager,
) -> Result<Document, WebFormError> {
    let submission = Submission::from_params(&request.params)?;
    let caller = &request.caller;

    if submission.doctype != form.doc_type {
        return Err(WebFormError::validation("Invalid Request"));
    }
    if submission.is_insert() && form.login_required && caller.is_guest() {
        return Err(WebFormError::AuthenticationRequired(
            "You must login to submit this form".to_string(),
        ));
    }

    let mut doc = match &submission.name {
        Some(name) => store.get_doc(&form.doc_type, name).await?,
        None => Document::new(&form.doc_type),
    };

    for (fieldname, value) in &submission.values {
        doc.set_field(fieldname.as_str(), value.as_str());
    }

    let ignore_permissions = if submission.is_insert() {
        store.insert(&mut doc, caller, true).await?;
        true
    } else {
        let is_owner = caller.owns(doc.owner());
        store.save(&mut doc, caller, is_owner).await?;
        is_owner
    };

    if !submission.attachments.is_empty() {
        let name = doc.name().map(str::to_string).ok_or(StoreError::Unsaved)?;

        for (fieldname, attachment) in &submission.attachments {
            let previous = doc
                .get(fieldname)
                .filter(|v| !v.is_empty())
                .map(|v| v.as_str().to_string());

            // New file first, so a rejected upload leaves the old one in place
            let stored = files
                .save_file(&attachment.filename, &attachment.dataurl, &form.doc_type, &name, true)
                .await?;
            if let Some(previous) = previous.filter(|url| *url != stored.file_url) {
                files.remove_file_by_url(&previous, &form.doc_type, &name).await?;
            }
            doc.set_field(fieldname.as_str(), FieldValue::FileRef(stored.file_url));
        }

        store.save(&mut doc, caller, ignore_permissions).await?;
    }

    info!(
        "Web form {} {} {} (by: {})",
        form.name,
        if submission.is_insert() { "created" } else { "updated" },
        doc,
        caller.name()
    );
    Ok(doc)
}
