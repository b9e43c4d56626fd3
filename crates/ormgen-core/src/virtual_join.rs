//! In-memory joins between independently fetched record sets.
//!
//! Used when two entities are related by business keys but not by a declared
//! relation (different stores, no foreign key). The related set is fetched on
//! its own, hashed by its join column, and attached to every primary record.
//!
//! Once values are attached the primary list must not be re-filtered or
//! re-queried; the attachments only describe the rows they were built from.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::catalog::{Catalog, ModelField, RelationKind, PK_ALIAS};
use crate::error::Error;
use crate::query::QuerySet;
use crate::record::{Attachment, Record, Related};
use crate::storage::Backend;
use crate::value::{JoinKey, Value};

/// Either side of a virtual join.
#[derive(Debug, Clone)]
pub enum RecordSource {
    /// Unevaluated query; may be narrowed before it runs.
    Query(QuerySet),
    /// Records already in memory.
    Records(Vec<Record>),
}

impl RecordSource {
    fn entity(&self) -> Option<String> {
        match self {
            RecordSource::Query(qs) => Some(qs.entity().to_string()),
            RecordSource::Records(records) => records.first().map(|r| r.entity().to_string()),
        }
    }
}

impl From<QuerySet> for RecordSource {
    fn from(qs: QuerySet) -> Self {
        RecordSource::Query(qs)
    }
}

impl From<Vec<Record>> for RecordSource {
    fn from(records: Vec<Record>) -> Self {
        RecordSource::Records(records)
    }
}

/// How two record sets are matched.
///
/// In to-many mode (`rel_field` set and `reverse`) the primary side is keyed by
/// `to_field` and the related side by `rel_field`: each primary record gets
/// the list of related records pointing at it. Otherwise the primary side is
/// keyed by `rel_field` (or `to_field`) and the related side by `to_field`:
/// each primary record gets the single related record it points at.
///
/// A primary record without a match gets `Related::One(None)` in to-one mode
/// and an empty `Related::Many` in to-many mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinConfig {
    /// Attribute name; defaults to the related entity's model name.
    pub attr: Option<String>,
    /// Business key column on the pointing side.
    pub rel_field: Option<String>,
    /// Referenced column.
    pub to_field: String,
    /// Select to-many mode.
    pub reverse: bool,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            attr: None,
            rel_field: None,
            to_field: PK_ALIAS.to_string(),
            reverse: false,
        }
    }
}

impl JoinConfig {
    /// Default configuration: match on `pk`, to-one.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the attribute name.
    pub fn attr(mut self, attr: impl Into<String>) -> Self {
        self.attr = Some(attr.into());
        self
    }

    /// Set the pointing column.
    pub fn rel_field(mut self, field: impl Into<String>) -> Self {
        self.rel_field = Some(field.into());
        self
    }

    /// Set the referenced column.
    pub fn to_field(mut self, field: impl Into<String>) -> Self {
        self.to_field = field.into();
        self
    }

    /// Attach lists of related records.
    pub fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    fn is_to_many(&self) -> bool {
        self.rel_field.is_some() && self.reverse
    }

    /// (primary column, related column)
    fn columns(&self) -> (&str, &str) {
        match (&self.rel_field, self.reverse) {
            (Some(rel), true) => (self.to_field.as_str(), rel.as_str()),
            (Some(rel), false) => (rel.as_str(), self.to_field.as_str()),
            (None, _) => (self.to_field.as_str(), self.to_field.as_str()),
        }
    }
}

/// Configuration of a near → link → far join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct M2mConfig {
    /// Link column pointing at the near side.
    pub link_near_field: String,
    /// Link column pointing at the far side.
    pub link_far_field: String,
    /// Attribute on near records holding their link records.
    pub attr_link: Option<String>,
    /// Attribute on link records holding the far record.
    pub attr_far: Option<String>,
    /// Near column referenced by the link.
    pub near_to_field: String,
    /// Far column referenced by the link.
    pub far_to_field: String,
}

impl M2mConfig {
    /// Link columns for both sides, referencing `pk`.
    pub fn new(link_near_field: impl Into<String>, link_far_field: impl Into<String>) -> Self {
        Self {
            link_near_field: link_near_field.into(),
            link_far_field: link_far_field.into(),
            attr_link: None,
            attr_far: None,
            near_to_field: PK_ALIAS.to_string(),
            far_to_field: PK_ALIAS.to_string(),
        }
    }

    /// Set the attribute names.
    pub fn attrs(mut self, attr_link: impl Into<String>, attr_far: impl Into<String>) -> Self {
        self.attr_link = Some(attr_link.into());
        self.attr_far = Some(attr_far.into());
        self
    }

    /// Set the referenced columns.
    pub fn to_fields(mut self, near: impl Into<String>, far: impl Into<String>) -> Self {
        self.near_to_field = near.into();
        self.far_to_field = far.into();
        self
    }
}

/// Where an attribute name lands on primary records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Attribute,
    RelationSlot,
}

impl Route {
    fn wrap(self, related: Related) -> Attachment {
        match self {
            Route::Attribute => Attachment::Attribute(related),
            Route::RelationSlot => Attachment::RelationSlot(related),
        }
    }
}

/// Performs virtual joins.
pub struct VirtualRelation<'a> {
    catalog: &'a Catalog,
    backend: &'a dyn Backend,
    optimize: bool,
}

impl<'a> VirtualRelation<'a> {
    /// Create a joiner. With `optimize`, related queries are narrowed to the
    /// keys present on the primary side before they run.
    pub fn new(catalog: &'a Catalog, backend: &'a dyn Backend, optimize: bool) -> Self {
        Self {
            catalog,
            backend,
            optimize,
        }
    }

    /// Join `related` onto `primary` and return the decorated primary records.
    ///
    /// A primary record without a match receives an absent value: `One(None)`
    /// or an empty list. When the related side is an empty in-memory set and
    /// no attribute name is configured, the primary records come back
    /// unattached.
    pub fn join(
        &self,
        primary: impl Into<RecordSource>,
        related: impl Into<RecordSource>,
        config: &JoinConfig,
    ) -> Result<Vec<Record>, Error> {
        let primary = primary.into();
        let related = related.into();
        let primary_entity = primary.entity();
        let related_entity = related.entity();

        let mut records = self.materialize(primary)?;
        let Some(primary_entity) = primary_entity else {
            return Ok(records);
        };

        let attr = match &config.attr {
            Some(attr) => attr.clone(),
            None => match self.default_attr(related_entity.as_deref())? {
                Some(attr) => attr,
                None => {
                    debug!(
                        primary = %primary_entity,
                        "no attribute name for an empty related set, leaving records unattached"
                    );
                    return Ok(records);
                }
            },
        };
        let route = self.check_attr(&primary_entity, &attr);

        let (primary_col, related_col) = config.columns();
        let related = self.narrow(&records, primary_col, related, related_col)?;
        let related = self.materialize(related)?;

        let to_many = config.is_to_many();
        let mut many: HashMap<JoinKey, Vec<Arc<Record>>> = HashMap::new();
        let mut one: HashMap<JoinKey, Arc<Record>> = HashMap::new();
        for record in related {
            let Some(key) = join_key(&record, related_col) else {
                continue;
            };
            let record = Arc::new(record);
            if to_many {
                many.entry(key).or_default().push(record);
            } else {
                one.insert(key, record);
            }
        }

        for record in records.iter_mut() {
            let key = join_key(record, primary_col);
            let value = match (to_many, key) {
                (true, Some(key)) => Related::Many(many.get(&key).cloned().unwrap_or_default()),
                (true, None) => Related::Many(Vec::new()),
                (false, Some(key)) => Related::One(one.get(&key).cloned()),
                (false, None) => Related::One(None),
            };
            record.attach(attr.clone(), route.wrap(value));
        }

        debug!(
            primary = %primary_entity,
            attr = %attr,
            primary_column = primary_col,
            related_column = related_col,
            to_many,
            matched_keys = if to_many { many.len() } else { one.len() },
            "virtual join"
        );
        Ok(records)
    }

    /// Join near → link → far: each near record gets its link records, and
    /// each link record gets its far record.
    pub fn join_many_to_many(
        &self,
        near: impl Into<RecordSource>,
        link: impl Into<RecordSource>,
        far: impl Into<RecordSource>,
        config: &M2mConfig,
    ) -> Result<Vec<Record>, Error> {
        let link = link.into();
        let far = far.into();
        let attr_link = match &config.attr_link {
            Some(attr) => Some(attr.clone()),
            None => self.default_attr(link.entity().as_deref())?,
        };
        let attr_far = match &config.attr_far {
            Some(attr) => Some(attr.clone()),
            None => self.default_attr(far.entity().as_deref())?,
        };

        let near = self.materialize(near.into())?;
        let link = self.narrow(&near, &config.near_to_field, link, &config.link_near_field)?;

        let far_config = JoinConfig {
            attr: attr_far,
            rel_field: Some(config.link_far_field.clone()),
            to_field: config.far_to_field.clone(),
            reverse: false,
        };
        let links = self.join(link, far, &far_config)?;

        let link_config = JoinConfig {
            attr: attr_link,
            rel_field: Some(config.link_near_field.clone()),
            to_field: config.near_to_field.clone(),
            reverse: true,
        };
        self.join(near, links, &link_config)
    }

    /// Model name of `entity`, the attribute name used when none is configured.
    fn default_attr(&self, entity: Option<&str>) -> Result<Option<String>, Error> {
        entity
            .map(|name| self.catalog.entity(name).map(|def| def.model_name()))
            .transpose()
    }

    fn materialize(&self, source: RecordSource) -> Result<Vec<Record>, Error> {
        match source {
            RecordSource::Query(qs) => qs.fetch(self.backend),
            RecordSource::Records(records) => Ok(records),
        }
    }

    /// Restrict a related query to the keys present on the primary records.
    ///
    /// In-memory sources pass through unchanged, as does everything when
    /// optimization is off.
    pub fn narrow(
        &self,
        primary: &[Record],
        primary_col: &str,
        related: RecordSource,
        related_col: &str,
    ) -> Result<RecordSource, Error> {
        let qs = match related {
            RecordSource::Query(qs) if self.optimize => qs,
            other => return Ok(other),
        };

        let mut seen = HashSet::new();
        let keys: Vec<Value> = primary
            .iter()
            .filter_map(|r| {
                let value = r.get(primary_col)?;
                let key = value.join_key()?;
                seen.insert(key).then(|| value.clone())
            })
            .collect();
        Ok(RecordSource::Query(qs.filter_in(related_col, keys)?))
    }

    /// Decide how `attr` is stored on records of `entity`.
    ///
    /// A name shared with a forward to-one relation, or with a reverse
    /// one-to-one accessor, goes into the relation cache slot. Any other
    /// collision stays a plain attribute.
    fn check_attr(&self, entity: &str, attr: &str) -> Route {
        let Some(field) = self.catalog.get_field(entity, attr) else {
            return Route::Attribute;
        };
        warn!(entity, attr, field = field.name(), "virtual attribute name collides with a model field");
        match field {
            ModelField::Relation(rel) if rel.kind == RelationKind::ForwardToOne => Route::RelationSlot,
            ModelField::Relation(rel) if rel.kind == RelationKind::ReverseToOne && rel.accessor == attr => {
                Route::RelationSlot
            }
            _ => Route::Attribute,
        }
    }
}

fn join_key(record: &Record, column: &str) -> Option<JoinKey> {
    match record.get(column) {
        Some(value) => value.join_key(),
        None => {
            let error = Error::InvalidField {
                entity: record.entity().to_string(),
                field: column.to_string(),
            };
            warn!(error = %error, "join column not loaded, treating value as absent");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_config_columns() {
        let to_one = JoinConfig::new().rel_field("customer_code").to_field("code");
        assert_eq!(to_one.columns(), ("customer_code", "code"));
        assert!(!to_one.is_to_many());

        let to_many = JoinConfig::new().rel_field("customer_code").to_field("code").reverse();
        assert_eq!(to_many.columns(), ("code", "customer_code"));
        assert!(to_many.is_to_many());

        // reverse without rel_field stays to-one on pk
        let plain = JoinConfig::new().reverse();
        assert_eq!(plain.columns(), ("pk", "pk"));
        assert!(!plain.is_to_many());
    }
}
