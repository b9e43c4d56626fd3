//! Relation definitions between entities.

use serde::{Deserialize, Serialize};

use super::field::FieldDef;

/// Cardinality of a relation, seen from the owning (`from`) entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// Foreign key: many owning rows point at one target row.
    ManyToOne,
    /// Unique foreign key.
    OneToOne,
    /// Association through an edge entity.
    ManyToMany,
}

/// A relation definition between two entities.
///
/// For foreign keys `from_field` is the storage column on the owning entity
/// (`author_id`) and `to_field` the referenced column on the target. For
/// many-to-many relations both columns live on `edge_entity`: `from_field`
/// points at the owning side and `to_field` at the target side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDef {
    /// Relation name, also the forward accessor on the owning entity.
    pub name: String,
    /// Owning entity name.
    pub from_entity: String,
    /// Target entity name.
    pub to_entity: String,
    /// Relation cardinality.
    pub cardinality: Cardinality,
    /// Storage column on the owning entity, or edge column for the owning side.
    pub from_field: String,
    /// Referenced column on the target, or edge column for the target side.
    pub to_field: String,
    /// Accessor name on the target entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_name: Option<String>,
    /// Human-readable name of the forward accessor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose_name: Option<String>,
    /// Edge entity for many-to-many relations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_entity: Option<String>,
}

impl RelationDef {
    fn build(
        name: impl Into<String>,
        from_entity: impl Into<String>,
        from_field: impl Into<String>,
        to_entity: impl Into<String>,
        to_field: impl Into<String>,
        cardinality: Cardinality,
    ) -> Self {
        Self {
            name: name.into(),
            from_entity: from_entity.into(),
            to_entity: to_entity.into(),
            cardinality,
            from_field: from_field.into(),
            to_field: to_field.into(),
            related_name: None,
            verbose_name: None,
            edge_entity: None,
        }
    }

    /// Create a foreign key relation.
    pub fn foreign_key(
        name: impl Into<String>,
        from_entity: impl Into<String>,
        from_field: impl Into<String>,
        to_entity: impl Into<String>,
        to_field: impl Into<String>,
    ) -> Self {
        Self::build(
            name,
            from_entity,
            from_field,
            to_entity,
            to_field,
            Cardinality::ManyToOne,
        )
    }

    /// Create a one-to-one relation.
    pub fn one_to_one(
        name: impl Into<String>,
        from_entity: impl Into<String>,
        from_field: impl Into<String>,
        to_entity: impl Into<String>,
        to_field: impl Into<String>,
    ) -> Self {
        Self::build(
            name,
            from_entity,
            from_field,
            to_entity,
            to_field,
            Cardinality::OneToOne,
        )
    }

    /// Create a many-to-many relation through `edge_entity`.
    pub fn many_to_many(
        name: impl Into<String>,
        from_entity: impl Into<String>,
        to_entity: impl Into<String>,
        edge_entity: impl Into<String>,
        edge_from_field: impl Into<String>,
        edge_to_field: impl Into<String>,
    ) -> Self {
        let mut rel = Self::build(
            name,
            from_entity,
            edge_from_field,
            to_entity,
            edge_to_field,
            Cardinality::ManyToMany,
        );
        rel.edge_entity = Some(edge_entity.into());
        rel
    }

    /// Set the accessor name on the target entity.
    pub fn with_related_name(mut self, related_name: impl Into<String>) -> Self {
        self.related_name = Some(related_name.into());
        self
    }

    /// Set the human-readable name.
    pub fn with_verbose_name(mut self, verbose_name: impl Into<String>) -> Self {
        self.verbose_name = Some(verbose_name.into());
        self
    }

    /// Check if this is a many-to-many relation.
    pub fn is_many_to_many(&self) -> bool {
        self.cardinality == Cardinality::ManyToMany
    }

    /// Accessor name on the target entity.
    pub fn reverse_accessor(&self) -> String {
        if let Some(name) = &self.related_name {
            return name.clone();
        }
        let model = self.from_entity.to_lowercase();
        match self.cardinality {
            Cardinality::OneToOne => model,
            Cardinality::ManyToOne | Cardinality::ManyToMany => format!("{}_set", model),
        }
    }

    /// Name used for the reverse side inside lookup paths.
    pub fn reverse_query_name(&self) -> String {
        self.related_name
            .clone()
            .unwrap_or_else(|| self.from_entity.to_lowercase())
    }
}

/// How a relation is seen from the entity it is resolved on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Foreign key or forward one-to-one.
    ForwardToOne,
    /// Reverse side of a one-to-one.
    ReverseToOne,
    /// Forward many-to-many.
    ForwardToMany,
    /// Reverse foreign key or reverse many-to-many.
    ReverseToMany,
}

impl RelationKind {
    /// Check if the relation yields at most one related row.
    pub fn is_to_one(&self) -> bool {
        matches!(self, RelationKind::ForwardToOne | RelationKind::ReverseToOne)
    }

    /// Check if the relation yields any number of related rows.
    pub fn is_to_many(&self) -> bool {
        !self.is_to_one()
    }
}

/// A relation resolved on one of its two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationField {
    /// Classification from the resolving entity's side.
    pub kind: RelationKind,
    /// Name of the underlying relation definition.
    pub relation: String,
    /// Entity reached by following the relation.
    pub related_entity: String,
    /// Accessor name on the resolving entity.
    pub accessor: String,
    /// Storage column for forward to-one relations.
    pub attname: Option<String>,
    /// Human-readable name declared on the relation (forward side only).
    pub verbose_name: Option<String>,
}

impl RelationField {
    /// Check if this is a forward foreign key or one-to-one.
    pub fn is_forward_to_one(&self) -> bool {
        self.kind == RelationKind::ForwardToOne
    }
}

/// A field resolved on an entity: a stored column or a relation accessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelField {
    /// Stored column.
    Column(FieldDef),
    /// Relation accessor.
    Relation(RelationField),
}

impl ModelField {
    /// Accessor or column name.
    pub fn name(&self) -> &str {
        match self {
            ModelField::Column(f) => &f.name,
            ModelField::Relation(r) => &r.accessor,
        }
    }

    /// The relation, if this field is one.
    pub fn as_relation(&self) -> Option<&RelationField> {
        match self {
            ModelField::Relation(r) => Some(r),
            ModelField::Column(_) => None,
        }
    }

    /// Check if this field is a relation.
    pub fn is_relation(&self) -> bool {
        matches!(self, ModelField::Relation(_))
    }

    /// Check if this field is a relation yielding many rows.
    pub fn is_to_many(&self) -> bool {
        self.as_relation().is_some_and(|r| r.kind.is_to_many())
    }
}

/// Hop through an edge entity for many-to-many relations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeHop {
    /// Edge entity name.
    pub entity: String,
    /// Edge column matching the source column.
    pub near_column: String,
    /// Edge column matching the target column.
    pub far_column: String,
}

/// Execution description of one relation hop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinPath {
    /// Column on the source entity.
    pub source_column: String,
    /// Entity reached by the hop.
    pub target_entity: String,
    /// Column on the target entity.
    pub target_column: String,
    /// Intermediate edge entity, if any.
    pub edge: Option<EdgeHop>,
}
