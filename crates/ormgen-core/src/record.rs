//! Fetched rows and the values attached to them.

use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::PK_ALIAS;
use crate::value::Value;

/// Records reachable through one accessor.
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    /// To-one value; `None` when there is no related row.
    One(Option<Arc<Record>>),
    /// To-many value in fetch order.
    Many(Vec<Arc<Record>>),
}

impl Related {
    /// The single related record, if this is a populated to-one value.
    pub fn as_one(&self) -> Option<&Arc<Record>> {
        match self {
            Related::One(record) => record.as_ref(),
            Related::Many(_) => None,
        }
    }

    /// The related records; a to-one value yields zero or one record.
    pub fn records(&self) -> &[Arc<Record>] {
        match self {
            Related::One(Some(record)) => std::slice::from_ref(record),
            Related::One(None) => &[],
            Related::Many(records) => records,
        }
    }

    /// Check if nothing is related.
    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}

/// Where a joined value is stored on a record.
///
/// A plain attribute never shadows a relation. When the attribute name
/// collides with a relation accessor the value is routed into the relation
/// cache slot instead, so the stored column behind the relation is untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum Attachment {
    /// Synthetic attribute.
    Attribute(Related),
    /// Relation cache slot.
    RelationSlot(Related),
}

/// One fetched row.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    entity: String,
    identity_field: String,
    fields: Vec<(String, Value)>,
    relation_cache: HashMap<String, Related>,
    attributes: HashMap<String, Related>,
}

impl Record {
    /// Create a record from loaded column values.
    pub fn new(
        entity: impl Into<String>,
        identity_field: impl Into<String>,
        fields: Vec<(String, Value)>,
    ) -> Self {
        Self {
            entity: entity.into(),
            identity_field: identity_field.into(),
            fields,
            relation_cache: HashMap::new(),
            attributes: HashMap::new(),
        }
    }

    /// Entity this record belongs to.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Name of the identity column.
    pub fn identity_field(&self) -> &str {
        &self.identity_field
    }

    /// Get a loaded column value. `pk` resolves to the identity column.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let name = if name == PK_ALIAS {
            self.identity_field.as_str()
        } else {
            name
        };
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Identity value.
    pub fn pk(&self) -> Option<&Value> {
        self.get(&self.identity_field)
    }

    /// Check if a column was loaded.
    pub fn has_field(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Set a column value, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Loaded columns in storage order.
    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    /// Drop every column not accepted by `keep`.
    pub fn retain_fields(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.fields.retain(|(name, _)| keep(name));
    }

    /// Store a joined value.
    pub fn attach(&mut self, name: impl Into<String>, attachment: Attachment) {
        match attachment {
            Attachment::Attribute(value) => {
                self.attributes.insert(name.into(), value);
            }
            Attachment::RelationSlot(value) => {
                self.relation_cache.insert(name.into(), value);
            }
        }
    }

    /// Synthetic attribute set by a virtual join.
    pub fn attribute(&self, name: &str) -> Option<&Related> {
        self.attributes.get(name)
    }

    /// Eagerly loaded relation.
    pub fn cached_relation(&self, name: &str) -> Option<&Related> {
        self.relation_cache.get(name)
    }

    /// Mutable access to an eagerly loaded relation.
    pub(crate) fn cached_relation_mut(&mut self, name: &str) -> Option<&mut Related> {
        self.relation_cache.get_mut(name)
    }

    /// Related value, preferring a synthetic attribute over the relation cache.
    pub fn related(&self, name: &str) -> Option<&Related> {
        self.attribute(name).or_else(|| self.cached_relation(name))
    }

    /// Columns, relation cache and attributes as a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (name, value) in &self.fields {
            map.insert(name.clone(), value.to_json());
        }
        for (name, related) in self.relation_cache.iter().chain(self.attributes.iter()) {
            let json = match related {
                Related::One(Some(record)) => record.to_json(),
                Related::One(None) => serde_json::Value::Null,
                Related::Many(records) => {
                    serde_json::Value::Array(records.iter().map(|r| r.to_json()).collect())
                }
            };
            map.insert(name.clone(), json);
        }
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author(id: i64, name: &str) -> Record {
        Record::new(
            "Author",
            "id",
            vec![
                ("id".to_string(), Value::Int64(id)),
                ("name".to_string(), Value::from(name)),
            ],
        )
    }

    #[test]
    fn test_pk_alias() {
        let record = author(7, "ada");
        assert_eq!(record.pk(), Some(&Value::Int64(7)));
        assert_eq!(record.get("pk"), Some(&Value::Int64(7)));
        assert_eq!(record.get("missing"), None);
    }

    #[test]
    fn test_set_replaces() {
        let mut record = author(1, "ada");
        record.set("name", Value::from("grace"));
        record.set("email", Value::Null);
        assert_eq!(record.get("name"), Some(&Value::from("grace")));
        assert_eq!(record.fields().len(), 3);
    }

    #[test]
    fn test_attachment_routing() {
        let mut record = author(1, "ada");
        let other = Arc::new(author(2, "grace"));

        record.attach("mentor", Attachment::RelationSlot(Related::One(Some(other.clone()))));
        record.attach("friends", Attachment::Attribute(Related::Many(vec![other.clone()])));

        assert!(record.attribute("mentor").is_none());
        assert!(record.cached_relation("mentor").is_some());
        assert_eq!(record.related("friends").map(|r| r.records().len()), Some(1));
    }

    #[test]
    fn test_related_prefers_attribute() {
        let mut record = author(1, "ada");
        let cached = Arc::new(author(2, "cached"));
        let joined = Arc::new(author(3, "joined"));

        record.attach("peer", Attachment::RelationSlot(Related::One(Some(cached))));
        record.attach("peer", Attachment::Attribute(Related::One(Some(joined))));

        let peer = record.related("peer").and_then(|r| r.as_one()).unwrap();
        assert_eq!(peer.pk(), Some(&Value::Int64(3)));
    }

    #[test]
    fn test_to_json_nests_related() {
        let mut record = author(1, "ada");
        record.attach("profile", Attachment::Attribute(Related::One(None)));
        let json = record.to_json();
        assert_eq!(json["name"], "ada");
        assert!(json["profile"].is_null());
    }
}
