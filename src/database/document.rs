use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Fields managed by the store, never settable through `set_field`
pub const SYSTEM_FIELDS: &[&str] = &["doctype", "name", "owner", "creation", "modified"];

/// Value held by a document field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Plain submitted value
    Scalar(String),
    /// URL of a stored file attachment
    FileRef(String),
}

impl FieldValue {
    pub fn as_str(&self) -> &str {
        match self {
            FieldValue::Scalar(s) | FieldValue::FileRef(s) => s,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Scalar(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Scalar(value)
    }
}

// Both variants travel as plain strings on the wire
impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(FieldValue::Scalar)
    }
}

/// A record of some doctype, identified by `(doctype, name)` once stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    doctype: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    owner: String,
    #[serde(default)]
    creation: Option<DateTime<Utc>>,
    #[serde(default)]
    modified: Option<DateTime<Utc>>,
    #[serde(flatten)]
    fields: BTreeMap<String, FieldValue>,
    #[serde(skip)]
    modified_fields: BTreeSet<String>,
}

impl Document {
    /// Create an unsaved document of the given doctype
    pub fn new(doctype: impl Into<String>) -> Self {
        Self {
            doctype: doctype.into(),
            name: None,
            owner: String::new(),
            creation: None,
            modified: None,
            fields: BTreeMap::new(),
            modified_fields: BTreeSet::new(),
        }
    }

    pub fn doctype(&self) -> &str {
        &self.doctype
    }

    /// Document name, `None` until the store has assigned one
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn creation(&self) -> Option<DateTime<Utc>> {
        self.creation
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }

    pub fn is_new(&self) -> bool {
        self.name.is_none()
    }

    /// Get field value
    pub fn get(&self, fieldname: &str) -> Option<&FieldValue> {
        self.fields.get(fieldname)
    }

    /// Get a field as text; `name` and `owner` resolve to the system values
    pub fn get_str(&self, fieldname: &str) -> Option<&str> {
        match fieldname {
            "name" => self.name(),
            "owner" => Some(self.owner()),
            "doctype" => Some(self.doctype()),
            _ => self.get(fieldname).map(FieldValue::as_str),
        }
    }

    /// Set a field value with change tracking. System fields are ignored.
    pub fn set_field(&mut self, fieldname: impl Into<String>, value: impl Into<FieldValue>) -> &mut Self {
        let fieldname = fieldname.into();

        if SYSTEM_FIELDS.contains(&fieldname.as_str()) {
            tracing::warn!("Attempted to set system field '{}' - ignoring", fieldname);
            return self;
        }

        let value = value.into();
        if self.fields.get(&fieldname) != Some(&value) {
            self.modified_fields.insert(fieldname.clone());
        }
        self.fields.insert(fieldname, value);
        self
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    /// Unsaved, or a field value changed since the document was loaded or last stored
    pub fn has_changes(&self) -> bool {
        self.is_new() || !self.modified_fields.is_empty()
    }

    // ========================================
    // Store bookkeeping
    // ========================================

    pub(crate) fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    pub(crate) fn set_owner(&mut self, owner: impl Into<String>) -> &mut Self {
        self.owner = owner.into();
        self
    }

    pub(crate) fn set_creation(&mut self, at: DateTime<Utc>) -> &mut Self {
        self.creation = Some(at);
        self
    }

    pub(crate) fn touch(&mut self, at: DateTime<Utc>) -> &mut Self {
        self.modified = Some(at);
        self
    }

    /// Forget tracked changes, called once the store has persisted the document
    pub(crate) fn mark_clean(&mut self) -> &mut Self {
        self.modified_fields.clear();
        self
    }

    // ========================================
    // Serialization
    // ========================================

    /// Convert to API output format: system fields plus every field value
    pub fn to_api_output(&self) -> Value {
        let mut output = Map::new();
        output.insert("doctype".to_string(), Value::String(self.doctype.clone()));
        output.insert(
            "name".to_string(),
            self.name.clone().map(Value::String).unwrap_or(Value::Null),
        );
        output.insert("owner".to_string(), Value::String(self.owner.clone()));
        if let Some(creation) = self.creation {
            output.insert("creation".to_string(), Value::String(creation.to_rfc3339()));
        }
        if let Some(modified) = self.modified {
            output.insert("modified".to_string(), Value::String(modified.to_rfc3339()));
        }
        for (key, value) in &self.fields {
            output.insert(key.clone(), Value::String(value.as_str().to_string()));
        }
        Value::Object(output)
    }
}

impl std::fmt::Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}",
            self.doctype,
            self.name.as_deref().unwrap_or("(new)")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_fields_cannot_be_set() {
        let mut doc = Document::new("ToDo");
        doc.set_field("owner", "mallory@example.com");
        doc.set_field("name", "TODO-1");
        assert_eq!(doc.owner(), "");
        assert!(doc.name().is_none());
        assert!(doc.fields().is_empty());
    }

    #[test]
    fn tracks_changed_fields_only_when_value_differs() {
        let mut doc = Document::new("ToDo");
        doc.set_field("description", "buy milk");
        doc.mark_clean();

        doc.set_name("TODO-1");
        assert!(!doc.has_changes());

        doc.set_field("description", "buy milk");
        assert!(!doc.has_changes());

        doc.set_field("description", "buy bread");
        assert!(doc.has_changes());
    }

    #[test]
    fn api_output_flattens_fields() {
        let mut doc = Document::new("ToDo");
        doc.set_name("TODO-1").set_owner("a@example.com");
        doc.set_field("description", "buy milk");
        doc.set_field("photo", FieldValue::FileRef("/files/milk.png".into()));

        let out = doc.to_api_output();
        assert_eq!(out["doctype"], "ToDo");
        assert_eq!(out["name"], "TODO-1");
        assert_eq!(out["owner"], "a@example.com");
        assert_eq!(out["description"], "buy milk");
        assert_eq!(out["photo"], "/files/milk.png");
    }

    #[test]
    fn get_str_resolves_system_fields() {
        let mut doc = Document::new("ToDo");
        doc.set_name("TODO-9").set_owner("a@example.com");
        assert_eq!(doc.get_str("name"), Some("TODO-9"));
        assert_eq!(doc.get_str("owner"), Some("a@example.com"));
        assert_eq!(doc.get_str("missing"), None);
    }
}
