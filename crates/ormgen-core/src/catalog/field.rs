//! Column definitions for entities.

use serde::{Deserialize, Serialize};

use super::types::FieldType;
use crate::value::Value;

/// A column definition within an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Column name.
    pub name: String,
    /// Column data type.
    pub field_type: FieldType,
    /// Human-readable name shown in list headers and forms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose_name: Option<String>,
    /// Default value used when a create payload omits the column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl FieldDef {
    /// Create a new column.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            verbose_name: None,
            default: None,
        }
    }

    /// Create a nullable scalar column.
    pub fn optional_scalar(name: impl Into<String>, scalar: crate::catalog::ScalarType) -> Self {
        Self::new(name, FieldType::OptionalScalar(scalar))
    }

    /// Set the human-readable name.
    pub fn with_verbose_name(mut self, verbose_name: impl Into<String>) -> Self {
        self.verbose_name = Some(verbose_name.into());
        self
    }

    /// Set the default value.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Check if a value must be supplied on create.
    pub fn is_required(&self) -> bool {
        !self.field_type.is_optional() && self.default.is_none()
    }

    /// Display label: the verbose name, or the column name with spaces.
    pub fn label(&self) -> String {
        self.verbose_name
            .clone()
            .unwrap_or_else(|| self.name.replace('_', " "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ScalarType;

    #[test]
    fn test_label_defaults_to_spaced_name() {
        let field = FieldDef::new("created_at", FieldType::scalar(ScalarType::Timestamp));
        assert_eq!(field.label(), "created at");

        let field = field.with_verbose_name("Created");
        assert_eq!(field.label(), "Created");
    }

    #[test]
    fn test_required() {
        let title = FieldDef::new("title", FieldType::scalar(ScalarType::String));
        assert!(title.is_required());
        assert!(!title.clone().with_default("untitled").is_required());
        assert!(!FieldDef::optional_scalar("note", ScalarType::String).is_required());
    }
}
