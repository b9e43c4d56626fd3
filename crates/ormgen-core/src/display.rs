//! Cell values for rendered records.

use serde::{Serialize, Serializer};

use crate::catalog::{Catalog, ModelField, RelationKind};
use crate::record::Record;
use crate::resolver::FieldDescriptor;
use crate::value::Value;

/// A rendered cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// Nothing to show: a null column or a missing related record.
    Empty,
    /// Raw column value.
    Value(Value),
    /// Display string of a related record.
    Text(String),
    /// Display strings of to-many related records.
    List(Vec<String>),
}

impl CellValue {
    /// Check if the cell is empty. `0`, `false` and `""` are not.
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    fn from_value(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => CellValue::Empty,
            Some(value) => CellValue::Value(value.clone()),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Empty => serializer.serialize_none(),
            CellValue::Value(value) => value.to_json().serialize(serializer),
            CellValue::Text(text) => serializer.serialize_str(text),
            CellValue::List(items) => items.serialize(serializer),
        }
    }
}

/// Display string of a record: its display field, else `"<Entity> object (<pk>)"`.
pub fn record_label(catalog: &Catalog, record: &Record) -> String {
    let display_field = catalog
        .get_entity(record.entity())
        .and_then(|def| def.display_field.as_deref());
    let value = display_field
        .and_then(|field| record.get(field))
        .filter(|value| !value.is_null());
    if let Some(value) = value {
        return value.to_string();
    }
    let pk = record.pk().map(Value::to_string).unwrap_or_default();
    format!("{} object ({})", record.entity(), pk)
}

/// Read the value a descriptor points at on `record`.
///
/// Intermediate hops are read from loaded relations; a missing hop renders
/// empty rather than failing.
pub fn lookup_value(catalog: &Catalog, record: &Record, descriptor: &FieldDescriptor) -> CellValue {
    let Some(field) = &descriptor.field else {
        return CellValue::Text(record_label(catalog, record));
    };

    let segments = descriptor.segments();
    let Some((last, hops)) = segments.split_last() else {
        return CellValue::Text(record_label(catalog, record));
    };

    let mut current = record;
    for segment in hops {
        match current.related(segment).and_then(|r| r.as_one()) {
            Some(next) => current = next.as_ref(),
            None => return CellValue::Empty,
        }
    }

    match field {
        ModelField::Column(_) => CellValue::from_value(current.get(&descriptor.terminal)),
        ModelField::Relation(rel) => match rel.kind {
            RelationKind::ForwardToOne => {
                let column = rel.attname.as_deref().unwrap_or_default();
                if *last == column {
                    return CellValue::from_value(current.get(column));
                }
                match current.related(last).and_then(|r| r.as_one()) {
                    Some(target) => CellValue::Text(record_label(catalog, target)),
                    // dangling or not loaded
                    None => CellValue::from_value(current.get(column)),
                }
            }
            RelationKind::ReverseToOne => match current.related(last).and_then(|r| r.as_one()) {
                Some(target) => CellValue::Text(record_label(catalog, target)),
                None => CellValue::Empty,
            },
            RelationKind::ForwardToMany | RelationKind::ReverseToMany => {
                let labels = current
                    .related(last)
                    .map(|r| r.records().iter().map(|t| record_label(catalog, t)).collect())
                    .unwrap_or_default();
                CellValue::List(labels)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EntityDef, FieldDef, FieldType, RelationDef, ScalarType, SchemaBundle};
    use crate::record::{Attachment, Related};
    use crate::resolver::{FieldResolver, FieldSpec};
    use std::sync::Arc;

    fn catalog() -> Catalog {
        let int = |n: &str| FieldDef::new(n, FieldType::scalar(ScalarType::Int64));
        let text = |n: &str| FieldDef::new(n, FieldType::scalar(ScalarType::String));
        let bundle = SchemaBundle::new()
            .with_entity(
                EntityDef::new("Author", "id")
                    .with_fields([int("id"), text("name")])
                    .with_display_field("name"),
            )
            .with_entity(EntityDef::new("Post", "id").with_fields([
                int("id"),
                text("title"),
                int("author_id"),
                FieldDef::optional_scalar("views", ScalarType::Int64),
            ]))
            .with_relation(RelationDef::foreign_key("author", "Post", "author_id", "Author", "id"));
        Catalog::from_bundle(bundle).unwrap()
    }

    fn post(views: Value) -> Record {
        Record::new(
            "Post",
            "id",
            vec![
                ("id".into(), Value::Int64(1)),
                ("title".into(), Value::from("Hello")),
                ("author_id".into(), Value::Int64(9)),
                ("views".into(), views),
            ],
        )
    }

    fn author() -> Arc<Record> {
        Arc::new(Record::new(
            "Author",
            "id",
            vec![("id".into(), Value::Int64(9)), ("name".into(), Value::from("ada"))],
        ))
    }

    fn cell(catalog: &Catalog, record: &Record, path: &str) -> CellValue {
        let descriptor = FieldResolver::new(catalog, record.entity())
            .resolve(&FieldSpec::from(path))
            .unwrap();
        lookup_value(catalog, record, &descriptor)
    }

    #[test]
    fn test_zero_is_not_empty() {
        let catalog = catalog();
        assert_eq!(cell(&catalog, &post(Value::Int64(0)), "views"), CellValue::Value(Value::Int64(0)));
        assert_eq!(cell(&catalog, &post(Value::Null), "views"), CellValue::Empty);
    }

    #[test]
    fn test_relation_by_name_and_column() {
        let catalog = catalog();
        let mut record = post(Value::Null);

        // not loaded: falls back to the raw column
        assert_eq!(cell(&catalog, &record, "author"), CellValue::Value(Value::Int64(9)));

        record.attach("author", Attachment::RelationSlot(Related::One(Some(author()))));
        assert_eq!(cell(&catalog, &record, "author"), CellValue::Text("ada".into()));
        assert_eq!(cell(&catalog, &record, "author_id"), CellValue::Value(Value::Int64(9)));
        assert_eq!(cell(&catalog, &record, "author__name"), CellValue::Value(Value::from("ada")));
    }

    #[test]
    fn test_missing_hop_is_empty() {
        let catalog = catalog();
        let mut record = post(Value::Null);
        record.attach("author", Attachment::RelationSlot(Related::One(None)));
        assert_eq!(cell(&catalog, &record, "author__name"), CellValue::Empty);
    }

    #[test]
    fn test_to_many_labels() {
        let catalog = catalog();
        let mut writer = (*author()).clone();
        writer.attach(
            "post",
            Attachment::RelationSlot(Related::Many(vec![Arc::new(post(Value::Null))])),
        );
        assert_eq!(cell(&catalog, &writer, "post"), CellValue::List(vec!["Post object (1)".into()]));
    }

    #[test]
    fn test_label_and_json() {
        let catalog = catalog();
        assert_eq!(record_label(&catalog, &author()), "ada");
        assert_eq!(record_label(&catalog, &post(Value::Null)), "Post object (1)");

        let json = serde_json::to_value([
            CellValue::Empty,
            CellValue::Value(Value::Int64(3)),
            CellValue::List(vec!["a".into()]),
        ])
        .unwrap();
        assert_eq!(json, serde_json::json!([null, 3, ["a"]]));
    }
}
