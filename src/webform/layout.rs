use serde::Serialize;

use crate::webform::model::{FieldDefinition, FieldType};

pub type Column = Vec<FieldDefinition>;
pub type Section = Vec<Column>;

/// Form grid: sections of columns of fields. Serializes as nested arrays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Layout(pub Vec<Section>);

impl Layout {
    /// Build the grid from a flat field list.
    ///
    /// A Section Break (or the first field) opens a section, a Column Break
    /// (or the first field of a section) opens a column. Break fields are
    /// never placed in a column.
    pub fn build(fields: &[FieldDefinition]) -> Self {
        let mut sections: Vec<Section> = Vec::new();

        for field in fields {
            if field.fieldtype == FieldType::SectionBreak || sections.is_empty() {
                sections.push(Vec::new());
            }

            let Some(section) = sections.last_mut() else { continue };
            if field.fieldtype == FieldType::ColumnBreak || section.is_empty() {
                section.push(Vec::new());
            }

            if field.fieldtype.is_layout_marker() {
                continue;
            }
            if let Some(column) = section.last_mut() {
                column.push(field.clone());
            }
        }

        Layout(sections)
    }

    pub fn sections(&self) -> &[Section] {
        &self.0
    }

    /// All placed fields in reading order
    pub fn fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.0.iter().flatten().flatten()
    }
}
