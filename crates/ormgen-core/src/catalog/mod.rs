//! Model catalog.
//!
//! The catalog stores metadata about entities, their columns and the relations
//! between them, and resolves field names the way lookup paths use them.

mod catalog;
mod entity;
mod field;
mod relation;
mod schema;
mod types;

pub use catalog::{Catalog, PK_ALIAS};
pub use entity::{EntityDef, OrderBy, OrderDirection};
pub use field::FieldDef;
pub use relation::{
    Cardinality, EdgeHop, JoinPath, ModelField, RelationDef, RelationField, RelationKind,
};
pub use schema::SchemaBundle;
pub use types::{FieldType, ScalarType};
