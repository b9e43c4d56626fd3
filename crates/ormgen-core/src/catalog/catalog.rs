//! Validated, read-only view of the data model.

use std::collections::{HashMap, HashSet};

use super::relation::{EdgeHop, JoinPath, ModelField, RelationField, RelationKind};
use super::{Cardinality, EntityDef, RelationDef, SchemaBundle};
use crate::error::Error;

/// Alias for the identity field, accepted at every hop of a path.
pub const PK_ALIAS: &str = "pk";

/// The model catalog.
///
/// Built once from a [`SchemaBundle`] and shared immutably afterwards.
#[derive(Debug, Clone)]
pub struct Catalog {
    bundle: SchemaBundle,
    entity_index: HashMap<String, usize>,
}

impl Catalog {
    /// Validate a schema bundle and build a catalog from it.
    pub fn from_bundle(bundle: SchemaBundle) -> Result<Self, Error> {
        let mut entity_index = HashMap::new();
        for (idx, entity) in bundle.entities.iter().enumerate() {
            if entity_index.insert(entity.name.clone(), idx).is_some() {
                return Err(Error::InvalidSchema(format!(
                    "duplicate entity '{}'",
                    entity.name
                )));
            }
            validate_entity(entity)?;
        }

        let catalog = Self {
            bundle,
            entity_index,
        };

        let mut relation_names = HashSet::new();
        for relation in &catalog.bundle.relations {
            if !relation_names.insert(relation.name.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate relation '{}'",
                    relation.name
                )));
            }
            catalog.validate_relation(relation)?;
        }

        Ok(catalog)
    }

    /// The bundle this catalog was built from.
    pub fn bundle(&self) -> &SchemaBundle {
        &self.bundle
    }

    /// Get an entity by name.
    pub fn get_entity(&self, name: &str) -> Option<&EntityDef> {
        self.entity_index.get(name).map(|idx| &self.bundle.entities[*idx])
    }

    /// Get an entity by name, failing with [`Error::UnknownEntity`].
    pub fn entity(&self, name: &str) -> Result<&EntityDef, Error> {
        self.get_entity(name)
            .ok_or_else(|| Error::UnknownEntity(name.to_string()))
    }

    /// Find an entity by its lower-cased model name.
    pub fn entity_by_model_name(&self, model_name: &str) -> Option<&EntityDef> {
        self.bundle
            .entities
            .iter()
            .find(|e| e.model_name() == model_name)
    }

    /// All entities in declaration order.
    pub fn entities(&self) -> impl Iterator<Item = &EntityDef> {
        self.bundle.entities.iter()
    }

    /// Get a relation by name.
    pub fn get_relation(&self, name: &str) -> Option<&RelationDef> {
        self.bundle.get_relation(name)
    }

    /// Relations owned by an entity.
    pub fn relations_from<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = &'a RelationDef> {
        self.bundle
            .relations
            .iter()
            .filter(move |r| r.from_entity == entity)
    }

    /// Relations pointing at an entity.
    pub fn relations_to<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = &'a RelationDef> {
        self.bundle
            .relations
            .iter()
            .filter(move |r| r.to_entity == entity)
    }

    /// Translate the `pk` alias into the entity's identity field name.
    pub fn resolve_alias<'a>(&'a self, entity: &'a EntityDef, name: &'a str) -> &'a str {
        if name == PK_ALIAS {
            &entity.identity_field
        } else {
            name
        }
    }

    /// Resolve a field name on an entity.
    ///
    /// Lookup order: stored column (a foreign key's storage column resolves
    /// to its relation), forward relation by name, reverse relation by query
    /// name, reverse relation by its `_set` accessor.
    pub fn get_field(&self, entity: &str, name: &str) -> Option<ModelField> {
        let def = self.get_entity(entity)?;
        let name = self.resolve_alias(def, name);

        if let Some(column) = def.get_field(name) {
            let by_attname = self.relations_from(entity).find(|r| {
                r.cardinality != Cardinality::ManyToMany && r.from_field == name
            });
            return Some(match by_attname {
                Some(rel) => ModelField::Relation(forward_field(rel)),
                None => ModelField::Column(column.clone()),
            });
        }

        if let Some(rel) = self.relations_from(entity).find(|r| r.name == name) {
            return Some(ModelField::Relation(forward_field(rel)));
        }

        if let Some(rel) = self
            .relations_to(entity)
            .find(|r| r.reverse_query_name() == name)
        {
            return Some(ModelField::Relation(reverse_field(rel)));
        }

        self.relations_to(entity)
            .find(|r| {
                let accessor = r.reverse_accessor();
                accessor == name && format!("{}_set", r.reverse_query_name()) == accessor
            })
            .map(|rel| ModelField::Relation(reverse_field(rel)))
    }

    /// Resolve a relation accessor on an entity.
    pub fn get_relation_field(&self, entity: &str, name: &str) -> Option<RelationField> {
        match self.get_field(entity, name)? {
            ModelField::Relation(r) => Some(r),
            ModelField::Column(_) => None,
        }
    }

    /// Forward foreign keys and one-to-ones declared on an entity.
    pub fn forward_to_one(&self, entity: &str) -> Vec<RelationField> {
        self.relations_from(entity)
            .filter(|r| r.cardinality != Cardinality::ManyToMany)
            .map(forward_field)
            .collect()
    }

    /// Human-readable label for a resolved field.
    pub fn field_label(&self, field: &ModelField) -> String {
        match field {
            ModelField::Column(f) => f.label(),
            ModelField::Relation(r) => match (&r.verbose_name, r.kind) {
                (Some(name), _) => name.clone(),
                (None, RelationKind::ForwardToOne | RelationKind::ForwardToMany) => {
                    r.accessor.replace('_', " ")
                }
                (None, RelationKind::ReverseToOne | RelationKind::ReverseToMany) => self
                    .get_entity(&r.related_entity)
                    .map(|e| e.verbose_name())
                    .unwrap_or_else(|| r.accessor.replace('_', " ")),
            },
        }
    }

    /// Describe how a relation hop is executed.
    pub fn join_path(&self, field: &RelationField) -> Result<JoinPath, Error> {
        let rel = self
            .get_relation(&field.relation)
            .ok_or_else(|| Error::InvalidSchema(format!("unknown relation '{}'", field.relation)))?;

        let path = match field.kind {
            RelationKind::ForwardToOne => JoinPath {
                source_column: rel.from_field.clone(),
                target_entity: rel.to_entity.clone(),
                target_column: rel.to_field.clone(),
                edge: None,
            },
            RelationKind::ReverseToOne => JoinPath {
                source_column: rel.to_field.clone(),
                target_entity: rel.from_entity.clone(),
                target_column: rel.from_field.clone(),
                edge: None,
            },
            RelationKind::ForwardToMany => JoinPath {
                source_column: self.entity(&rel.from_entity)?.identity_field.clone(),
                target_entity: rel.to_entity.clone(),
                target_column: self.entity(&rel.to_entity)?.identity_field.clone(),
                edge: Some(EdgeHop {
                    entity: edge_entity(rel)?.to_string(),
                    near_column: rel.from_field.clone(),
                    far_column: rel.to_field.clone(),
                }),
            },
            RelationKind::ReverseToMany if rel.is_many_to_many() => JoinPath {
                source_column: self.entity(&rel.to_entity)?.identity_field.clone(),
                target_entity: rel.from_entity.clone(),
                target_column: self.entity(&rel.from_entity)?.identity_field.clone(),
                edge: Some(EdgeHop {
                    entity: edge_entity(rel)?.to_string(),
                    near_column: rel.to_field.clone(),
                    far_column: rel.from_field.clone(),
                }),
            },
            RelationKind::ReverseToMany => JoinPath {
                source_column: rel.to_field.clone(),
                target_entity: rel.from_entity.clone(),
                target_column: rel.from_field.clone(),
                edge: None,
            },
        };
        Ok(path)
    }

    fn validate_relation(&self, rel: &RelationDef) -> Result<(), Error> {
        let from = self.get_entity(&rel.from_entity).ok_or_else(|| {
            Error::InvalidSchema(format!(
                "relation '{}' references unknown entity '{}'",
                rel.name, rel.from_entity
            ))
        })?;
        let to = self.get_entity(&rel.to_entity).ok_or_else(|| {
            Error::InvalidSchema(format!(
                "relation '{}' references unknown entity '{}'",
                rel.name, rel.to_entity
            ))
        })?;

        let missing = |entity: &EntityDef, column: &str| {
            Error::InvalidSchema(format!(
                "relation '{}' references unknown column '{}.{}'",
                rel.name, entity.name, column
            ))
        };

        if from.get_field(&rel.name).is_some() {
            return Err(Error::InvalidSchema(format!(
                "relation '{}' clashes with a column on '{}'",
                rel.name, from.name
            )));
        }

        if rel.is_many_to_many() {
            let edge_name = edge_entity(rel)?;
            let edge = self.get_entity(edge_name).ok_or_else(|| {
                Error::InvalidSchema(format!(
                    "relation '{}' references unknown edge entity '{}'",
                    rel.name, edge_name
                ))
            })?;
            for column in [&rel.from_field, &rel.to_field] {
                if edge.get_field(column).is_none() {
                    return Err(missing(edge, column));
                }
            }
        } else {
            if from.get_field(&rel.from_field).is_none() {
                return Err(missing(from, &rel.from_field));
            }
            if to.get_field(&rel.to_field).is_none() {
                return Err(missing(to, &rel.to_field));
            }
        }
        Ok(())
    }
}

fn validate_entity(entity: &EntityDef) -> Result<(), Error> {
    if entity.get_identity_field().is_none() {
        return Err(Error::InvalidSchema(format!(
            "entity '{}' has no identity field '{}'",
            entity.name, entity.identity_field
        )));
    }
    if let Some(display) = &entity.display_field {
        if entity.get_field(display).is_none() {
            return Err(Error::InvalidSchema(format!(
                "entity '{}' has no display field '{}'",
                entity.name, display
            )));
        }
    }
    let mut seen = HashSet::new();
    for field in &entity.fields {
        if !seen.insert(field.name.as_str()) {
            return Err(Error::InvalidSchema(format!(
                "duplicate field '{}' on entity '{}'",
                field.name, entity.name
            )));
        }
    }
    Ok(())
}

fn edge_entity(rel: &RelationDef) -> Result<&str, Error> {
    rel.edge_entity.as_deref().ok_or_else(|| {
        Error::InvalidSchema(format!(
            "many-to-many relation '{}' has no edge entity",
            rel.name
        ))
    })
}

fn forward_field(rel: &RelationDef) -> RelationField {
    let (kind, attname) = match rel.cardinality {
        Cardinality::ManyToOne | Cardinality::OneToOne => {
            (RelationKind::ForwardToOne, Some(rel.from_field.clone()))
        }
        Cardinality::ManyToMany => (RelationKind::ForwardToMany, None),
    };
    RelationField {
        kind,
        relation: rel.name.clone(),
        related_entity: rel.to_entity.clone(),
        accessor: rel.name.clone(),
        attname,
        verbose_name: rel.verbose_name.clone(),
    }
}

fn reverse_field(rel: &RelationDef) -> RelationField {
    let kind = match rel.cardinality {
        Cardinality::OneToOne => RelationKind::ReverseToOne,
        Cardinality::ManyToOne | Cardinality::ManyToMany => RelationKind::ReverseToMany,
    };
    RelationField {
        kind,
        relation: rel.name.clone(),
        related_entity: rel.from_entity.clone(),
        accessor: rel.reverse_accessor(),
        attname: None,
        verbose_name: None,
    }
}
