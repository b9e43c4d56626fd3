//! Storage backends consumed by the query layer.

use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use sled::{Db, Tree};
use tracing::debug;

use super::key::{decode_int_key, encode_key};
use super::StorageConfig;
use crate::catalog::EntityDef;
use crate::error::Error;
use crate::record::Record;
use crate::value::Value;

/// Prefix for per-entity row trees.
const ENTITY_TREE_PREFIX: &str = "entity:";

/// Row storage used by query execution and the edit views.
///
/// Rows come back with every column of the entity, in declaration order;
/// columns missing from storage read as [`Value::Null`].
pub trait Backend: Send + Sync {
    /// All rows of an entity, ordered by identity.
    fn scan(&self, entity: &EntityDef) -> Result<Vec<Record>, Error>;

    /// One row by identity.
    fn get(&self, entity: &EntityDef, pk: &Value) -> Result<Option<Record>, Error>;

    /// Insert a row and return its identity.
    ///
    /// An absent or null integer identity is assigned as one more than the
    /// largest stored identity.
    fn insert(&self, entity: &EntityDef, values: Vec<(String, Value)>) -> Result<Value, Error>;

    /// Overwrite columns of an existing row.
    fn update(
        &self,
        entity: &EntityDef,
        pk: &Value,
        values: Vec<(String, Value)>,
    ) -> Result<(), Error>;

    /// Delete a row. Returns false when it did not exist.
    fn delete(&self, entity: &EntityDef, pk: &Value) -> Result<bool, Error>;

    /// Number of read operations (scans and point reads) served so far.
    fn queries(&self) -> u64;
}

/// Backend storing one sled tree per entity with JSON-encoded rows.
pub struct SledBackend {
    db: Db,
    queries: AtomicU64,
}

impl SledBackend {
    /// Open or create a backend with the given configuration.
    pub fn open(config: StorageConfig) -> Result<Self, Error> {
        let db = config.to_sled_config().open()?;
        debug!(
            path = %config.path.display(),
            temporary = config.temporary,
            recovered = db.was_recovered(),
            "opened sled backend"
        );
        Ok(Self {
            db,
            queries: AtomicU64::new(0),
        })
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }

    fn tree(&self, entity: &EntityDef) -> Result<Tree, Error> {
        Ok(self
            .db
            .open_tree(format!("{}{}", ENTITY_TREE_PREFIX, entity.name))?)
    }

    fn count_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    fn next_identity(tree: &Tree) -> Result<i64, Error> {
        let last = match tree.last()? {
            Some((key, _)) => decode_int_key(&key).unwrap_or(0),
            None => 0,
        };
        Ok(last.max(0) + 1)
    }
}

fn encode_row(values: &[(String, Value)]) -> Result<Vec<u8>, Error> {
    let row: IndexMap<&str, &Value> = values.iter().map(|(k, v)| (k.as_str(), v)).collect();
    Ok(serde_json::to_vec(&row)?)
}

fn decode_row(entity: &EntityDef, bytes: &[u8]) -> Result<Record, Error> {
    let mut stored: IndexMap<String, Value> = serde_json::from_slice(bytes)?;
    let fields = entity
        .fields
        .iter()
        .map(|f| {
            let value = stored.swap_remove(&f.name).unwrap_or(Value::Null);
            (f.name.clone(), value)
        })
        .collect();
    Ok(Record::new(&entity.name, &entity.identity_field, fields))
}

/// Keep only declared columns, in declaration order.
fn normalize(entity: &EntityDef, values: Vec<(String, Value)>) -> Result<Vec<(String, Value)>, Error> {
    let mut incoming: IndexMap<String, Value> = values.into_iter().collect();
    if let Some(name) = incoming.keys().find(|k| entity.get_field(k).is_none()) {
        return Err(Error::InvalidField {
            entity: entity.name.clone(),
            field: name.clone(),
        });
    }
    Ok(entity
        .fields
        .iter()
        .map(|f| {
            let value = incoming.swap_remove(&f.name).unwrap_or(Value::Null);
            (f.name.clone(), value)
        })
        .collect())
}

impl Backend for SledBackend {
    fn scan(&self, entity: &EntityDef) -> Result<Vec<Record>, Error> {
        self.count_query();
        let tree = self.tree(entity)?;
        tree.iter()
            .map(|item| {
                let (_, bytes) = item?;
                decode_row(entity, &bytes)
            })
            .collect()
    }

    fn get(&self, entity: &EntityDef, pk: &Value) -> Result<Option<Record>, Error> {
        self.count_query();
        let tree = self.tree(entity)?;
        match tree.get(encode_key(pk)?)? {
            Some(bytes) => Ok(Some(decode_row(entity, &bytes)?)),
            None => Ok(None),
        }
    }

    fn insert(&self, entity: &EntityDef, values: Vec<(String, Value)>) -> Result<Value, Error> {
        let tree = self.tree(entity)?;
        let mut row = normalize(entity, values)?;

        let identity = entity
            .get_identity_field()
            .ok_or_else(|| Error::UnknownEntity(entity.name.clone()))?;
        let slot = row
            .iter_mut()
            .find(|(name, _)| *name == identity.name)
            .map(|(_, value)| value)
            .ok_or_else(|| Error::UnknownEntity(entity.name.clone()))?;

        if slot.is_null() {
            if !identity.field_type.scalar_type().is_integer() {
                return Err(Error::InvalidValue {
                    field: identity.name.clone(),
                    message: "identity value is required".to_string(),
                });
            }
            let next = Self::next_identity(&tree)?;
            *slot = match identity.field_type.scalar_type() {
                crate::catalog::ScalarType::Int32 => Value::Int32(next as i32),
                _ => Value::Int64(next),
            };
        }
        let pk = slot.clone();

        let key = encode_key(&pk)?;
        tree.insert(key, encode_row(&row)?)?;
        debug!(entity = %entity.name, pk = %pk, "inserted row");
        Ok(pk)
    }

    fn update(
        &self,
        entity: &EntityDef,
        pk: &Value,
        values: Vec<(String, Value)>,
    ) -> Result<(), Error> {
        let tree = self.tree(entity)?;
        let key = encode_key(pk)?;
        let existing = tree.get(&key)?.ok_or(Error::NotFound)?;
        let mut record = decode_row(entity, &existing)?;

        for (name, value) in normalize_partial(entity, values)? {
            record.set(name, value);
        }
        record.set(entity.identity_field.clone(), pk.clone());

        tree.insert(key, encode_row(record.fields())?)?;
        debug!(entity = %entity.name, pk = %pk, "updated row");
        Ok(())
    }

    fn delete(&self, entity: &EntityDef, pk: &Value) -> Result<bool, Error> {
        let tree = self.tree(entity)?;
        let removed = tree.remove(encode_key(pk)?)?.is_some();
        debug!(entity = %entity.name, pk = %pk, removed, "deleted row");
        Ok(removed)
    }

    fn queries(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }
}

fn normalize_partial(
    entity: &EntityDef,
    values: Vec<(String, Value)>,
) -> Result<Vec<(String, Value)>, Error> {
    for (name, _) in &values {
        if entity.get_field(name).is_none() {
            return Err(Error::InvalidField {
                entity: entity.name.clone(),
                field: name.clone(),
            });
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldDef, FieldType, ScalarType};

    fn author() -> EntityDef {
        EntityDef::new("Author", "id")
            .with_field(FieldDef::new("id", FieldType::scalar(ScalarType::Int64)))
            .with_field(FieldDef::new("name", FieldType::scalar(ScalarType::String)))
            .with_field(FieldDef::optional_scalar("email", ScalarType::String))
    }

    fn row(name: &str) -> Vec<(String, Value)> {
        vec![("name".to_string(), Value::from(name))]
    }

    #[test]
    fn test_insert_assigns_identity() {
        let backend = SledBackend::open(StorageConfig::temporary()).unwrap();
        let entity = author();

        let first = backend.insert(&entity, row("ada")).unwrap();
        let second = backend.insert(&entity, row("grace")).unwrap();
        assert_eq!(first, Value::Int64(1));
        assert_eq!(second, Value::Int64(2));

        let explicit = vec![
            ("id".to_string(), Value::Int64(10)),
            ("name".to_string(), Value::from("linus")),
        ];
        backend.insert(&entity, explicit).unwrap();
        assert_eq!(backend.insert(&entity, row("ken")).unwrap(), Value::Int64(11));
    }

    #[test]
    fn test_scan_in_identity_order() {
        let backend = SledBackend::open(StorageConfig::temporary()).unwrap();
        let entity = author();
        for (id, name) in [(3, "c"), (1, "a"), (2, "b")] {
            backend
                .insert(
                    &entity,
                    vec![
                        ("id".to_string(), Value::Int64(id)),
                        ("name".to_string(), Value::from(name)),
                    ],
                )
                .unwrap();
        }

        let rows = backend.scan(&entity).unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.pk().cloned().unwrap()).collect();
        assert_eq!(ids, vec![Value::Int64(1), Value::Int64(2), Value::Int64(3)]);
        assert_eq!(rows[0].get("email"), Some(&Value::Null));
        assert_eq!(backend.queries(), 1);
    }

    #[test]
    fn test_update_and_delete() {
        let backend = SledBackend::open(StorageConfig::temporary()).unwrap();
        let entity = author();
        let pk = backend.insert(&entity, row("ada")).unwrap();

        backend
            .update(&entity, &pk, vec![("email".to_string(), Value::from("a@x"))])
            .unwrap();
        let record = backend.get(&entity, &pk).unwrap().unwrap();
        assert_eq!(record.get("name"), Some(&Value::from("ada")));
        assert_eq!(record.get("email"), Some(&Value::from("a@x")));

        assert!(backend.delete(&entity, &pk).unwrap());
        assert!(!backend.delete(&entity, &pk).unwrap());
        assert!(matches!(
            backend.update(&entity, &pk, row("x")),
            Err(Error::NotFound)
        ));
    }

    #[test]
    fn test_unknown_column_rejected() {
        let backend = SledBackend::open(StorageConfig::temporary()).unwrap();
        let result = backend.insert(&author(), vec![("age".to_string(), Value::Int64(3))]);
        assert!(matches!(result, Err(Error::InvalidField { .. })));
    }

    #[test]
    fn test_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let entity = author();
        {
            let backend = SledBackend::open(StorageConfig::new(dir.path())).unwrap();
            backend.insert(&entity, row("ada")).unwrap();
            backend.flush().unwrap();
        }
        let backend = SledBackend::open(StorageConfig::new(dir.path())).unwrap();
        assert_eq!(backend.scan(&entity).unwrap().len(), 1);
    }
}
