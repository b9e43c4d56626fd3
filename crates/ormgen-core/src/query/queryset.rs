//! Lazily evaluated, chainable queries.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use super::executor::QueryExecutor;
use super::filter::{Condition, Filter, Operand};
use super::lookup::{Lookup, LookupOp, LOOKUP_SEP};
use crate::catalog::{Catalog, EntityDef, OrderBy};
use crate::error::Error;
use crate::record::Record;
use crate::storage::Backend;
use crate::value::Value;

/// Column restriction of a query.
///
/// A fresh query defers nothing, which loads every column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Restriction {
    /// Load every column except these.
    Defer(BTreeSet<String>),
    /// Load only these columns.
    Only(BTreeSet<String>),
}

impl Default for Restriction {
    fn default() -> Self {
        Restriction::Defer(BTreeSet::new())
    }
}

impl Restriction {
    /// Merge an `only` request: `Defer(existing)` becomes `Only(new - existing)`
    /// and `Only(existing)` becomes `Only(existing ∪ new)`.
    pub fn merge_only(&self, fields: impl IntoIterator<Item = String>) -> Self {
        let incoming: BTreeSet<String> = fields.into_iter().collect();
        match self {
            Restriction::Defer(existing) => {
                Restriction::Only(incoming.difference(existing).cloned().collect())
            }
            Restriction::Only(existing) => {
                Restriction::Only(existing.union(&incoming).cloned().collect())
            }
        }
    }

    /// Merge a `defer` request.
    pub fn merge_defer(&self, fields: impl IntoIterator<Item = String>) -> Self {
        let incoming: BTreeSet<String> = fields.into_iter().collect();
        match self {
            Restriction::Defer(existing) => {
                Restriction::Defer(existing.union(&incoming).cloned().collect())
            }
            Restriction::Only(existing) => {
                Restriction::Only(existing.difference(&incoming).cloned().collect())
            }
        }
    }

    /// Restriction applying to the related rows reached through `accessor`.
    ///
    /// An `Only` set without any entry for the accessor loads every column of
    /// the related rows.
    pub fn nested(&self, accessor: &str) -> Restriction {
        let prefix = format!("{}{}", accessor, LOOKUP_SEP);
        let strip = |set: &BTreeSet<String>| -> BTreeSet<String> {
            set.iter()
                .filter_map(|f| f.strip_prefix(prefix.as_str()).map(str::to_string))
                .collect()
        };
        match self {
            Restriction::Defer(set) => Restriction::Defer(strip(set)),
            Restriction::Only(set) => {
                let nested = strip(set);
                if nested.is_empty() {
                    Restriction::default()
                } else {
                    Restriction::Only(nested)
                }
            }
        }
    }

    /// Names restricted at this level (no `__`).
    pub fn local_names(&self) -> impl Iterator<Item = &str> {
        let set = match self {
            Restriction::Defer(set) | Restriction::Only(set) => set,
        };
        set.iter()
            .map(String::as_str)
            .filter(|f| !f.contains(LOOKUP_SEP))
    }

    /// Check if nothing is restricted.
    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Restriction::Defer(set) if set.is_empty())
    }
}

/// A chainable query over one entity.
///
/// Builder methods leave `self` untouched and return a new query. Nothing is
/// read from storage until [`QuerySet::fetch`], [`QuerySet::count`] or
/// [`QuerySet::delete`] runs.
#[derive(Clone)]
pub struct QuerySet {
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) entity: String,
    pub(crate) filters: Vec<Filter>,
    pub(crate) restriction: Restriction,
    pub(crate) select_related: Vec<String>,
    pub(crate) prefetch_related: Vec<String>,
    pub(crate) order_by: Vec<OrderBy>,
    pub(crate) offset: usize,
    pub(crate) limit: Option<usize>,
    pub(crate) empty: bool,
}

impl fmt::Debug for QuerySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySet")
            .field("entity", &self.entity)
            .field("filters", &self.filters.len())
            .field("restriction", &self.restriction)
            .field("select_related", &self.select_related)
            .field("prefetch_related", &self.prefetch_related)
            .field("order_by", &self.order_by)
            .field("offset", &self.offset)
            .field("limit", &self.limit)
            .field("empty", &self.empty)
            .finish()
    }
}

impl QuerySet {
    /// Query every row of an entity.
    pub fn new(catalog: Arc<Catalog>, entity: &str) -> Result<Self, Error> {
        let name = catalog.entity(entity)?.name.clone();
        Ok(Self {
            catalog,
            entity: name,
            filters: Vec::new(),
            restriction: Restriction::default(),
            select_related: Vec::new(),
            prefetch_related: Vec::new(),
            order_by: Vec::new(),
            offset: 0,
            limit: None,
            empty: false,
        })
    }

    /// Entity name.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Entity definition.
    pub fn entity_def(&self) -> Result<&EntityDef, Error> {
        self.catalog.entity(&self.entity)
    }

    /// Catalog the query resolves against.
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Current column restriction.
    pub fn restriction(&self) -> &Restriction {
        &self.restriction
    }

    /// Paths eagerly joined.
    pub fn select_related_paths(&self) -> &[String] {
        &self.select_related
    }

    /// Paths fetched separately.
    pub fn prefetch_related_paths(&self) -> &[String] {
        &self.prefetch_related
    }

    /// Check if the query can never return rows.
    pub fn is_none(&self) -> bool {
        self.empty
    }

    fn condition(&self, expr: &str, value: Value) -> Result<Condition, Error> {
        let lookup = Lookup::parse(expr)?.resolve(&self.catalog, &self.entity)?;
        let operand = Operand::coerce(lookup.op, &lookup.field_type, expr, value)?;
        Ok(Condition { lookup, operand })
    }

    /// Add a `lookup = value` condition.
    pub fn filter(&self, expr: &str, value: impl Into<Value>) -> Result<Self, Error> {
        let condition = self.condition(expr, value.into())?;
        let mut qs = self.clone();
        qs.filters.push(Filter::Condition(condition));
        Ok(qs)
    }

    /// Add a condition from query-string text, coerced to the column type.
    pub fn filter_raw(&self, expr: &str, text: &str) -> Result<Self, Error> {
        self.filter(expr, Value::String(text.to_string()))
    }

    /// Add an `in` condition over typed values.
    ///
    /// `expr` is a path; a trailing `__in` is accepted.
    pub fn filter_in(&self, expr: &str, values: Vec<Value>) -> Result<Self, Error> {
        let path = expr
            .strip_suffix(&format!("{}{}", LOOKUP_SEP, LookupOp::In.name()))
            .unwrap_or(expr);
        let mut lookup = Lookup::parse(path)?;
        lookup.op = LookupOp::In;
        let lookup = lookup.resolve(&self.catalog, &self.entity)?;
        let operand = Operand::coerce_list(&lookup.field_type, expr, values)?;
        let mut qs = self.clone();
        qs.filters
            .push(Filter::Condition(Condition { lookup, operand }));
        Ok(qs)
    }

    /// Keep rows where any of `fields` contains `term`, case-insensitively.
    pub fn search<S: AsRef<str>>(&self, fields: &[S], term: &str) -> Result<Self, Error> {
        if fields.is_empty() {
            return Ok(self.clone());
        }
        let conditions = fields
            .iter()
            .map(|field| {
                let expr = format!("{}{}icontains", field.as_ref(), LOOKUP_SEP);
                self.condition(&expr, Value::String(term.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut qs = self.clone();
        qs.filters.push(Filter::AnyOf(conditions));
        Ok(qs)
    }

    /// A query that returns no rows.
    pub fn none(&self) -> Self {
        let mut qs = self.clone();
        qs.empty = true;
        qs
    }

    /// Load only these columns (cumulative).
    pub fn only<S: AsRef<str>>(&self, fields: &[S]) -> Self {
        let fields = fields.iter().map(|f| f.as_ref().to_string());
        self.with_restriction(self.restriction.merge_only(fields))
    }

    /// Skip these columns (cumulative).
    pub fn defer<S: AsRef<str>>(&self, fields: &[S]) -> Self {
        let fields = fields.iter().map(|f| f.as_ref().to_string());
        self.with_restriction(self.restriction.merge_defer(fields))
    }

    /// Replace the column restriction.
    pub fn with_restriction(&self, restriction: Restriction) -> Self {
        let mut qs = self.clone();
        qs.restriction = restriction;
        qs
    }

    /// Eagerly join to-one relation paths.
    pub fn select_related<S: AsRef<str>>(&self, paths: &[S]) -> Result<Self, Error> {
        let mut qs = self.clone();
        for path in paths {
            let path = path.as_ref();
            self.validate_path(path, true)?;
            if !qs.select_related.iter().any(|p| p == path) {
                qs.select_related.push(path.to_string());
            }
        }
        Ok(qs)
    }

    /// Fetch relation paths with one extra query per relation.
    pub fn prefetch_related<S: AsRef<str>>(&self, paths: &[S]) -> Result<Self, Error> {
        let mut qs = self.clone();
        for path in paths {
            let path = path.as_ref();
            self.validate_path(path, false)?;
            if !qs.prefetch_related.iter().any(|p| p == path) {
                qs.prefetch_related.push(path.to_string());
            }
        }
        Ok(qs)
    }

    fn validate_path(&self, path: &str, to_one_only: bool) -> Result<(), Error> {
        let mut entity = self.entity.clone();
        for segment in path.split(LOOKUP_SEP) {
            let rel = self
                .catalog
                .get_relation_field(&entity, segment)
                .ok_or_else(|| Error::InvalidField {
                    entity: entity.clone(),
                    field: segment.to_string(),
                })?;
            if to_one_only && rel.kind.is_to_many() {
                return Err(Error::InvalidLookup(format!(
                    "'{}' is not a to-one relation and cannot be joined eagerly",
                    path
                )));
            }
            entity = rel.related_entity;
        }
        Ok(())
    }

    /// Order by columns of this entity; `-name` sorts descending.
    pub fn order_by<S: AsRef<str>>(&self, fields: &[S]) -> Result<Self, Error> {
        let def = self.entity_def()?;
        let order = fields
            .iter()
            .map(|f| {
                let mut order = OrderBy::parse(f.as_ref());
                order.field = self.catalog.resolve_alias(def, &order.field).to_string();
                if def.get_field(&order.field).is_none() {
                    return Err(Error::InvalidField {
                        entity: self.entity.clone(),
                        field: order.field.clone(),
                    });
                }
                Ok(order)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut qs = self.clone();
        qs.order_by = order;
        Ok(qs)
    }

    /// Skip `offset` rows and return at most `limit`.
    pub fn slice(&self, offset: usize, limit: Option<usize>) -> Self {
        let mut qs = self.clone();
        qs.offset = self.offset + offset;
        qs.limit = match (self.limit, limit) {
            (Some(current), Some(new)) => Some(current.saturating_sub(offset).min(new)),
            (Some(current), None) => Some(current.saturating_sub(offset)),
            (None, new) => new,
        };
        qs
    }

    /// Evaluate the query.
    pub fn fetch(&self, backend: &dyn Backend) -> Result<Vec<Record>, Error> {
        QueryExecutor::new(backend).fetch(self)
    }

    /// Count the rows the query would return.
    pub fn count(&self, backend: &dyn Backend) -> Result<usize, Error> {
        QueryExecutor::new(backend).count(self)
    }

    /// Delete matching rows and return how many were removed.
    pub fn delete(&self, backend: &dyn Backend) -> Result<usize, Error> {
        QueryExecutor::new(backend).delete(self)
    }
}
