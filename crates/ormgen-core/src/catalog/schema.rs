//! Schema bundle - serialized snapshot of the data model.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{EntityDef, RelationDef};
use crate::error::Error;

/// Snapshot of all entities and relations, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaBundle {
    /// Entity definitions.
    pub entities: Vec<EntityDef>,
    /// Relation definitions.
    #[serde(default)]
    pub relations: Vec<RelationDef>,
}

impl SchemaBundle {
    /// Create an empty schema bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity to the schema.
    pub fn with_entity(mut self, entity: EntityDef) -> Self {
        self.entities.push(entity);
        self
    }

    /// Add a relation to the schema.
    pub fn with_relation(mut self, relation: RelationDef) -> Self {
        self.relations.push(relation);
        self
    }

    /// Get an entity by name.
    pub fn get_entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Get a relation by name.
    pub fn get_relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Get all entity names.
    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.iter().map(|e| e.name.as_str()).collect()
    }

    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Deserialize from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Load a bundle from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldDef, FieldType, ScalarType};

    #[test]
    fn test_bundle_json() {
        let bundle = SchemaBundle::new()
            .with_entity(
                EntityDef::new("Author", "id")
                    .with_field(FieldDef::new("id", FieldType::scalar(ScalarType::Int64))),
            )
            .with_entity(
                EntityDef::new("Post", "id")
                    .with_field(FieldDef::new("id", FieldType::scalar(ScalarType::Int64)))
                    .with_field(FieldDef::new(
                        "author_id",
                        FieldType::scalar(ScalarType::Int64),
                    )),
            )
            .with_relation(RelationDef::foreign_key(
                "author", "Post", "author_id", "Author", "id",
            ));

        let bytes = bundle.to_bytes().unwrap();
        let restored = SchemaBundle::from_bytes(&bytes).unwrap();
        assert_eq!(restored.entity_names(), vec!["Author", "Post"]);
        assert!(restored.get_relation("author").is_some());
    }

    #[test]
    fn test_bundle_minimal_json() {
        let json = r#"{
            "entities": [{
                "name": "Tag",
                "identity_field": "id",
                "fields": [
                    {"name": "id", "field_type": {"scalar": "int64"}},
                    {"name": "label", "field_type": {"optional_scalar": "string"}}
                ]
            }]
        }"#;
        let bundle = SchemaBundle::from_bytes(json.as_bytes()).unwrap();
        let tag = bundle.get_entity("Tag").unwrap();
        assert!(tag.get_field("label").unwrap().field_type.is_optional());
        assert!(bundle.relations.is_empty());
    }
}
