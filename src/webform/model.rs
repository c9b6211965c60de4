use serde::{Deserialize, Serialize};

/// Field types a web form can declare. The two break types only shape the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(rename = "Section Break")]
    SectionBreak,
    #[serde(rename = "Column Break")]
    ColumnBreak,
    Data,
    Text,
    #[serde(rename = "Small Text")]
    SmallText,
    #[serde(rename = "Text Editor")]
    TextEditor,
    Int,
    Float,
    Currency,
    Check,
    Date,
    Datetime,
    Select,
    Link,
    Attach,
    #[serde(rename = "Attach Image")]
    AttachImage,
    Table,
    #[serde(rename = "HTML")]
    Html,
}

impl FieldType {
    pub fn is_layout_marker(self) -> bool {
        matches!(self, FieldType::SectionBreak | FieldType::ColumnBreak)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    #[serde(default)]
    pub fieldname: String,
    pub fieldtype: FieldType,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub reqd: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldDefinition {
    pub fn new(fieldname: impl Into<String>, fieldtype: FieldType, label: impl Into<String>) -> Self {
        Self {
            fieldname: fieldname.into(),
            fieldtype,
            label: label.into(),
            reqd: false,
            options: None,
            description: None,
        }
    }

    pub fn section_break() -> Self {
        Self::new("", FieldType::SectionBreak, "")
    }

    pub fn column_break() -> Self {
        Self::new("", FieldType::ColumnBreak, "")
    }
}

/// Declarative web form: which doctype it edits, its fields and its access policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebFormConfig {
    pub name: String,
    pub title: String,
    /// Path segment the form is published under
    pub route: String,
    pub doc_type: String,
    #[serde(default = "default_true")]
    pub published: bool,
    #[serde(default)]
    pub login_required: bool,
    #[serde(default)]
    pub allow_edit: bool,
    #[serde(default)]
    pub allow_multiple: bool,
    #[serde(default)]
    pub allow_comments: bool,
    #[serde(default)]
    pub allow_delete: bool,
    /// JSON list of `{route, title}` used when the page has no record parents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breadcrumbs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introduction_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_url: Option<String>,
    #[serde(default)]
    pub web_form_fields: Vec<FieldDefinition>,
}

fn default_true() -> bool {
    true
}

impl WebFormConfig {
    pub fn new(name: impl Into<String>, doc_type: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            route: name.clone(),
            name,
            doc_type: doc_type.into(),
            published: true,
            login_required: false,
            allow_edit: false,
            allow_multiple: false,
            allow_comments: false,
            allow_delete: false,
            breadcrumbs: None,
            introduction_text: None,
            success_url: None,
            web_form_fields: Vec::new(),
        }
    }

    /// Fieldtypes of all fields, markers included, in declaration order
    pub fn field_types(&self) -> Vec<FieldType> {
        self.web_form_fields.iter().map(|f| f.fieldtype).collect()
    }
}

/// A breadcrumb entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parent {
    #[serde(alias = "route")]
    pub name: String,
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_form_definition_with_defaults() {
        let yaml = r#"
name: job-application
title: Job Application
route: jobs/apply
doc_type: Job Application
login_required: true
web_form_fields:
  - fieldtype: Section Break
  - fieldname: applicant_name
    fieldtype: Data
    label: Name
    reqd: true
  - fieldtype: Column Break
  - fieldname: resume
    fieldtype: Attach
    label: Resume
"#;
        let form: WebFormConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(form.published);
        assert!(form.login_required);
        assert!(!form.allow_delete);
        assert_eq!(
            form.field_types(),
            vec![FieldType::SectionBreak, FieldType::Data, FieldType::ColumnBreak, FieldType::Attach]
        );
        assert!(form.web_form_fields[1].reqd);
    }

    #[test]
    fn field_types_serialize_with_display_names() {
        let json = serde_json::to_value(FieldType::AttachImage).unwrap();
        assert_eq!(json, "Attach Image");
        let parsed: FieldType = serde_json::from_value(serde_json::json!("Section Break")).unwrap();
        assert!(parsed.is_layout_marker());
    }

    #[test]
    fn breadcrumb_accepts_route_alias() {
        let parents: Vec<Parent> =
            serde_json::from_str(r#"[{"route": "jobs", "title": "Jobs"}]"#).unwrap();
        assert_eq!(parents[0].name, "jobs");
    }
}
