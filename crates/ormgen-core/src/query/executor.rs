//! Query execution against a [`Backend`].
//!
//! Evaluation order: scan, filter, order, slice, related loading, projection.
//! Conditions crossing relations are evaluated as semi-joins: the related
//! entities are scanned once per hop and reduced to the set of join keys that
//! satisfy the condition, so a to-many hop matches when any related row does.
//! Related loading fetches every requested relation with one scan per
//! relation per level and stitches the rows in with a hash join.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use super::filter::{Condition, Filter, FilterEvaluator, Operand};
use super::lookup::LOOKUP_SEP;
use super::queryset::{QuerySet, Restriction};
use crate::catalog::{Catalog, EntityDef, ModelField, OrderBy, OrderDirection, RelationField};
use crate::error::Error;
use crate::record::{Attachment, Record, Related};
use crate::storage::Backend;
use crate::value::JoinKey;

/// Relation paths to load, as a tree of accessors.
#[derive(Debug, Default)]
struct PathTree {
    children: IndexMap<String, PathTree>,
}

impl PathTree {
    fn insert(&mut self, path: &str) {
        let mut node = self;
        for segment in path.split(LOOKUP_SEP) {
            node = node.children.entry(segment.to_string()).or_default();
        }
    }
}

fn key_of(record: &Record, column: &str) -> Option<JoinKey> {
    record.get(column).and_then(|v| v.join_key())
}

/// Executes [`QuerySet`]s.
pub struct QueryExecutor<'a> {
    backend: &'a dyn Backend,
}

impl<'a> QueryExecutor<'a> {
    /// Create an executor over a backend.
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// Evaluate a query into records.
    pub fn fetch(&self, qs: &QuerySet) -> Result<Vec<Record>, Error> {
        if qs.empty {
            return Ok(Vec::new());
        }
        let catalog = qs.catalog.as_ref();
        let def = qs.entity_def()?;

        let mut rows = self.filtered(qs)?;
        let order = if qs.order_by.is_empty() {
            default_order(def)
        } else {
            qs.order_by.clone()
        };
        sort_rows(&mut rows, &order);
        let mut rows = apply_slice(rows, qs.offset, qs.limit);

        let mut tree = PathTree::default();
        for path in qs.select_related.iter().chain(qs.prefetch_related.iter()) {
            tree.insert(path);
        }
        self.load_related(catalog, def, &mut rows, &tree, &qs.restriction)?;
        project(catalog, def, &mut rows, &qs.restriction, &tree, None)?;

        debug!(
            entity = %qs.entity,
            rows = rows.len(),
            select_related = ?qs.select_related,
            prefetch_related = ?qs.prefetch_related,
            "executed query"
        );
        Ok(rows)
    }

    /// Count rows the query would return.
    pub fn count(&self, qs: &QuerySet) -> Result<usize, Error> {
        if qs.empty {
            return Ok(0);
        }
        let total = self.filtered(qs)?.len();
        let remaining = total.saturating_sub(qs.offset);
        Ok(qs.limit.map_or(remaining, |limit| remaining.min(limit)))
    }

    /// Delete the rows the query would return.
    pub fn delete(&self, qs: &QuerySet) -> Result<usize, Error> {
        if qs.empty {
            return Ok(0);
        }
        let def = qs.entity_def()?;
        let mut rows = self.filtered(qs)?;
        sort_rows(&mut rows, &default_order(def));
        let rows = apply_slice(rows, qs.offset, qs.limit);

        let mut deleted = 0;
        for row in &rows {
            if let Some(pk) = row.pk() {
                if self.backend.delete(def, pk)? {
                    deleted += 1;
                }
            }
        }
        debug!(entity = %qs.entity, deleted, "deleted rows");
        Ok(deleted)
    }

    fn filtered(&self, qs: &QuerySet) -> Result<Vec<Record>, Error> {
        let catalog = qs.catalog.as_ref();
        let rows = self.backend.scan(qs.entity_def()?)?;
        if qs.filters.is_empty() {
            return Ok(rows);
        }

        let mut keep = vec![true; rows.len()];
        for filter in &qs.filters {
            let mask = match filter {
                Filter::Condition(condition) => self.condition_mask(catalog, &rows, condition)?,
                Filter::AnyOf(conditions) => {
                    let mut any = vec![false; rows.len()];
                    for condition in conditions {
                        let mask = self.condition_mask(catalog, &rows, condition)?;
                        for (slot, hit) in any.iter_mut().zip(mask) {
                            *slot |= hit;
                        }
                    }
                    any
                }
            };
            for (slot, hit) in keep.iter_mut().zip(mask) {
                *slot &= hit;
            }
        }

        Ok(rows
            .into_iter()
            .zip(keep)
            .filter_map(|(row, hit)| hit.then_some(row))
            .collect())
    }

    fn condition_mask(
        &self,
        catalog: &Catalog,
        rows: &[Record],
        condition: &Condition,
    ) -> Result<Vec<bool>, Error> {
        let lookup = &condition.lookup;
        let column = lookup.column.as_str();

        let Some(first) = lookup.hops.first() else {
            return Ok(rows
                .iter()
                .map(|r| r.get(column).is_some_and(|v| condition.matches_value(v)))
                .collect());
        };
        let source = catalog.join_path(first)?.source_column;

        if condition.operand == Operand::IsNull(true) {
            // Rows with no related row at all also match.
            let null_keys = self.semi_join(catalog, &lookup.hops, &|r: &Record| {
                r.get(column).map_or(true, |v| v.is_null())
            })?;
            let any_keys = self.semi_join(catalog, &lookup.hops, &|_: &Record| true)?;
            return Ok(rows
                .iter()
                .map(|r| match key_of(r, &source) {
                    Some(key) => null_keys.contains(&key) || !any_keys.contains(&key),
                    None => true,
                })
                .collect());
        }

        let keys = self.semi_join(catalog, &lookup.hops, &|r: &Record| {
            r.get(column).is_some_and(|v| condition.matches_value(v))
        })?;
        Ok(rows
            .iter()
            .map(|r| key_of(r, &source).is_some_and(|key| keys.contains(&key)))
            .collect())
    }

    /// Join keys on the root's first source column for which some row at the
    /// end of `hops` satisfies `predicate`.
    fn semi_join(
        &self,
        catalog: &Catalog,
        hops: &[RelationField],
        predicate: &dyn Fn(&Record) -> bool,
    ) -> Result<HashSet<JoinKey>, Error> {
        let mut wanted: Option<(String, HashSet<JoinKey>)> = None;

        for hop in hops.iter().rev() {
            let path = catalog.join_path(hop)?;
            let target = catalog.entity(&path.target_entity)?;

            let mut keys = HashSet::new();
            for row in self.backend.scan(target)? {
                let hit = match &wanted {
                    None => predicate(&row),
                    Some((column, set)) => key_of(&row, column).is_some_and(|k| set.contains(&k)),
                };
                if hit {
                    keys.extend(key_of(&row, &path.target_column));
                }
            }

            if let Some(edge) = &path.edge {
                let edge_def = catalog.entity(&edge.entity)?;
                let near: HashSet<JoinKey> = self
                    .backend
                    .scan(edge_def)?
                    .iter()
                    .filter(|r| key_of(r, &edge.far_column).is_some_and(|k| keys.contains(&k)))
                    .filter_map(|r| key_of(r, &edge.near_column))
                    .collect();
                keys = near;
            }

            wanted = Some((path.source_column, keys));
        }

        Ok(wanted.map(|(_, keys)| keys).unwrap_or_default())
    }

    fn load_related(
        &self,
        catalog: &Catalog,
        def: &EntityDef,
        rows: &mut [Record],
        tree: &PathTree,
        restriction: &Restriction,
    ) -> Result<(), Error> {
        for (accessor, child) in &tree.children {
            let rel = catalog
                .get_relation_field(&def.name, accessor)
                .ok_or_else(|| Error::InvalidField {
                    entity: def.name.clone(),
                    field: accessor.clone(),
                })?;
            let path = catalog.join_path(&rel)?;
            let target_def = catalog.entity(&path.target_entity)?;

            let source_keys: HashSet<JoinKey> = rows
                .iter()
                .filter_map(|r| key_of(r, &path.source_column))
                .collect();

            let mut edge_map: Option<HashMap<JoinKey, Vec<JoinKey>>> = None;
            let wanted: HashSet<JoinKey> = match &path.edge {
                Some(edge) if !source_keys.is_empty() => {
                    let mut map: HashMap<JoinKey, Vec<JoinKey>> = HashMap::new();
                    for r in self.backend.scan(catalog.entity(&edge.entity)?)? {
                        if let (Some(near), Some(far)) =
                            (key_of(&r, &edge.near_column), key_of(&r, &edge.far_column))
                        {
                            if source_keys.contains(&near) {
                                map.entry(near).or_default().push(far);
                            }
                        }
                    }
                    let wanted: HashSet<JoinKey> = map.values().flatten().cloned().collect();
                    edge_map = Some(map);
                    wanted
                }
                Some(_) => {
                    edge_map = Some(HashMap::new());
                    HashSet::new()
                }
                None => source_keys,
            };

            let mut targets: Vec<Record> = if wanted.is_empty() {
                Vec::new()
            } else {
                self.backend
                    .scan(target_def)?
                    .into_iter()
                    .filter(|r| key_of(r, &path.target_column).is_some_and(|k| wanted.contains(&k)))
                    .collect()
            };
            sort_rows(&mut targets, &default_order(target_def));

            let nested = restriction.nested(accessor);
            self.load_related(catalog, target_def, &mut targets, child, &nested)?;
            project(
                catalog,
                target_def,
                &mut targets,
                &nested,
                child,
                Some(&path.target_column),
            )?;

            let mut by_key: HashMap<JoinKey, Vec<Arc<Record>>> = HashMap::new();
            for target in targets {
                if let Some(key) = key_of(&target, &path.target_column) {
                    by_key.entry(key).or_default().push(Arc::new(target));
                }
            }

            for row in rows.iter_mut() {
                let found: Vec<Arc<Record>> = match (key_of(row, &path.source_column), &edge_map) {
                    (None, _) => Vec::new(),
                    (Some(key), Some(map)) => map
                        .get(&key)
                        .into_iter()
                        .flatten()
                        .flat_map(|far| by_key.get(far).into_iter().flatten().cloned())
                        .collect(),
                    (Some(key), None) => by_key.get(&key).cloned().unwrap_or_default(),
                };
                let related = if rel.kind.is_to_one() {
                    Related::One(found.into_iter().next())
                } else {
                    Related::Many(found)
                };
                row.attach(accessor.clone(), Attachment::RelationSlot(related));
            }

            debug!(
                entity = %def.name,
                relation = %accessor,
                target = %target_def.name,
                "loaded related rows"
            );
        }
        Ok(())
    }
}

fn default_order(def: &EntityDef) -> Vec<OrderBy> {
    if def.default_order.is_empty() {
        vec![OrderBy::asc(&def.identity_field)]
    } else {
        def.default_order.clone()
    }
}

fn sort_rows(rows: &mut [Record], order: &[OrderBy]) {
    rows.sort_by(|a, b| {
        for spec in order {
            let (Some(x), Some(y)) = (a.get(&spec.field), b.get(&spec.field)) else {
                continue;
            };
            let ordering = FilterEvaluator::sort_order(x, y);
            let ordering = match spec.direction {
                OrderDirection::Asc => ordering,
                OrderDirection::Desc => ordering.reverse(),
            };
            if ordering.is_ne() {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });
}

fn apply_slice(rows: Vec<Record>, offset: usize, limit: Option<usize>) -> Vec<Record> {
    rows.into_iter()
        .skip(offset)
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

/// Drop columns excluded by `restriction`.
///
/// The identity column, the source columns of loaded relations and
/// `join_column` always survive.
fn project(
    catalog: &Catalog,
    def: &EntityDef,
    rows: &mut [Record],
    restriction: &Restriction,
    tree: &PathTree,
    join_column: Option<&str>,
) -> Result<(), Error> {
    if restriction.is_unrestricted() {
        return Ok(());
    }

    let mut required: HashSet<String> = HashSet::new();
    required.insert(def.identity_field.clone());
    required.extend(join_column.map(str::to_string));
    for accessor in tree.children.keys() {
        if let Some(rel) = catalog.get_relation_field(&def.name, accessor) {
            required.insert(catalog.join_path(&rel)?.source_column);
        }
    }

    let named: HashSet<String> = restriction
        .local_names()
        .filter_map(|name| match catalog.get_field(&def.name, name)? {
            ModelField::Column(column) => Some(column.name),
            ModelField::Relation(rel) => rel.attname,
        })
        .collect();

    match restriction {
        Restriction::Only(_) => {
            for row in rows.iter_mut() {
                row.retain_fields(|name| required.contains(name) || named.contains(name));
            }
        }
        Restriction::Defer(_) => {
            for row in rows.iter_mut() {
                row.retain_fields(|name| required.contains(name) || !named.contains(name));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_tree_merges_prefixes() {
        let mut tree = PathTree::default();
        tree.insert("author");
        tree.insert("author__profile");
        tree.insert("comment_set");

        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children["author"].children.len(), 1);
        assert!(tree.children["comment_set"].children.is_empty());
    }
}
