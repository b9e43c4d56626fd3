//! Query optimization for resolved field lists.
//!
//! Partitions descriptors into eager joins, separate fetches and a column
//! restriction, then applies them to a query. Restrictions are merged with
//! whatever the query already restricts, never replaced.

use tracing::{debug, warn};

use crate::catalog::{Catalog, ModelField, RelationKind, PK_ALIAS};
use crate::error::Error;
use crate::query::{QuerySet, LOOKUP_SEP};
use crate::resolver::FieldDescriptor;

/// What a field list needs loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimizationPlan {
    /// To-one paths joined eagerly.
    pub eager: Vec<String>,
    /// To-many paths fetched with one extra query each.
    pub separate: Vec<String>,
    /// Columns to load, with `pk` translated.
    pub restrict: Vec<String>,
}

impl OptimizationPlan {
    /// Check if the plan changes nothing.
    pub fn is_empty(&self) -> bool {
        self.eager.is_empty() && self.separate.is_empty() && self.restrict.is_empty()
    }

    /// Apply the plan to a query.
    pub fn apply(&self, qs: &QuerySet) -> Result<QuerySet, Error> {
        let mut qs = qs.clone();
        if !self.eager.is_empty() {
            qs = qs.select_related(&self.eager)?;
        }
        if !self.separate.is_empty() {
            qs = qs.prefetch_related(&self.separate)?;
        }
        if !self.restrict.is_empty() {
            qs = qs.with_restriction(qs.restriction().merge_only(self.restrict.iter().cloned()));
        }
        Ok(qs)
    }
}

fn push_unique(bucket: &mut Vec<String>, path: String) {
    if !bucket.contains(&path) {
        bucket.push(path);
    }
}

/// Builds [`OptimizationPlan`]s for one entity.
pub struct QueryOptimizer<'a> {
    catalog: &'a Catalog,
}

impl<'a> QueryOptimizer<'a> {
    /// Create an optimizer.
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Partition descriptors rooted at `entity`.
    pub fn plan(&self, entity: &str, fields: &[FieldDescriptor]) -> OptimizationPlan {
        let mut plan = OptimizationPlan::default();

        for descriptor in fields {
            let Some(field) = &descriptor.field else {
                continue;
            };

            if field.is_to_many() {
                push_unique(&mut plan.separate, descriptor.path.clone());
                continue;
            }

            push_unique(&mut plan.restrict, self.translate_pk(entity, &descriptor.path));

            let eager_full = match field {
                ModelField::Relation(rel) if rel.kind == RelationKind::ForwardToOne => {
                    if rel.attname.as_deref() == Some(descriptor.terminal.as_str()) {
                        false
                    } else {
                        warn!(
                            entity,
                            path = %descriptor.path,
                            column = rel.attname.as_deref().unwrap_or_default(),
                            "relation field renders its related record's display string; \
                             name a related column (path__column) to restrict the join, \
                             or the storage column for the raw value"
                        );
                        true
                    }
                }
                ModelField::Relation(rel) => rel.kind == RelationKind::ReverseToOne,
                ModelField::Column(_) => false,
            };

            if eager_full {
                push_unique(&mut plan.eager, descriptor.path.clone());
            } else if let Some((prefix, _)) = descriptor.path.rsplit_once(LOOKUP_SEP) {
                push_unique(&mut plan.eager, prefix.to_string());
            }
        }

        debug!(
            entity,
            eager = ?plan.eager,
            separate = ?plan.separate,
            restrict = ?plan.restrict,
            "query optimization plan"
        );
        plan
    }

    /// Plan and apply in one step.
    pub fn optimize(&self, qs: &QuerySet, fields: &[FieldDescriptor]) -> Result<QuerySet, Error> {
        self.plan(qs.entity(), fields).apply(qs)
    }

    /// Replace `pk` segments with the identity field of the entity they refer to.
    fn translate_pk(&self, entity: &str, path: &str) -> String {
        let mut current = self.catalog.get_entity(entity);
        let mut out = Vec::new();
        for segment in path.split(LOOKUP_SEP) {
            let Some(def) = current else {
                out.push(segment.to_string());
                continue;
            };
            let name = if segment == PK_ALIAS {
                def.identity_field.clone()
            } else {
                segment.to_string()
            };
            current = self
                .catalog
                .get_relation_field(&def.name, &name)
                .and_then(|rel| self.catalog.get_entity(&rel.related_entity));
            out.push(name);
        }
        out.join(LOOKUP_SEP)
    }
}
