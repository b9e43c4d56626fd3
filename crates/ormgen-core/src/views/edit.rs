//! Create and update views.
//!
//! Payloads are JSON objects keyed by column name; a forward relation may be
//! given by name instead of by its storage column. Many-to-many relations are
//! not editable here.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use super::Site;
use crate::catalog::{EntityDef, ModelField, RelationKind};
use crate::error::Error;
use crate::record::Record;
use crate::router::Action;
use crate::value::Value;

/// Validation messages keyed by field name.
pub type FieldErrors = IndexMap<String, Vec<String>>;

const REQUIRED: &str = "this field is required";

/// Result of a create or update.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EditOutcome {
    /// Record written.
    Saved {
        /// Identity of the written record.
        pk: serde_json::Value,
        /// Where clients go next.
        success_url: String,
    },
    /// Payload rejected; nothing written.
    Invalid {
        /// Messages per field.
        errors: FieldErrors,
    },
}

impl EditOutcome {
    /// Check if the record was written.
    pub fn is_saved(&self) -> bool {
        matches!(self, EditOutcome::Saved { .. })
    }
}

type Payload = serde_json::Map<String, serde_json::Value>;

/// Inserts records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateView {
    entity: String,
    success_url: Option<String>,
}

impl CreateView {
    /// Create an insert view.
    pub fn new(entity: impl Into<String>, success_url: Option<String>) -> Self {
        Self {
            entity: entity.into(),
            success_url,
        }
    }

    /// Entity written.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Validate `payload` and insert it.
    pub fn submit(&self, site: &Site, payload: &Payload) -> Result<EditOutcome, Error> {
        let def = site.catalog.entity(&self.entity)?;
        let mut errors = FieldErrors::new();
        let mut values = clean(site, def, payload, &mut errors);

        for field in &def.fields {
            if values.iter().any(|(name, _)| *name == field.name) {
                continue;
            }
            if let Some(default) = &field.default {
                values.push((field.name.clone(), default.clone()));
            } else if field.name != def.identity_field && field.is_required() {
                add_error(&mut errors, &field.name, REQUIRED);
            }
        }
        check_references(site, def, &values, &mut errors)?;
        if !errors.is_empty() {
            return Ok(EditOutcome::Invalid { errors });
        }

        let pk = match site.backend().insert(def, values) {
            Ok(pk) => pk,
            Err(Error::InvalidValue { field, message }) => {
                let mut errors = FieldErrors::new();
                add_error(&mut errors, &field, &message);
                return Ok(EditOutcome::Invalid { errors });
            }
            Err(error) => return Err(error),
        };
        debug!(entity = %def.name, pk = %pk, "created record");
        Ok(EditOutcome::Saved {
            pk: pk.to_json(),
            success_url: success_url(site, def, self.success_url.as_deref()),
        })
    }
}

/// Edits records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateView {
    entity: String,
    success_url: Option<String>,
}

impl UpdateView {
    /// Create an edit view.
    pub fn new(entity: impl Into<String>, success_url: Option<String>) -> Self {
        Self {
            entity: entity.into(),
            success_url,
        }
    }

    /// Entity written.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Current record, for pre-filling a form.
    pub fn initial(&self, site: &Site, pk: &str) -> Result<Record, Error> {
        let def = site.catalog.entity(&self.entity)?;
        let pk = parse_pk(def, pk)?;
        site.backend().get(def, &pk)?.ok_or(Error::NotFound)
    }

    /// Validate `payload` and write it over the record `pk`. Omitted fields
    /// keep their stored values.
    pub fn submit(&self, site: &Site, pk: &str, payload: &Payload) -> Result<EditOutcome, Error> {
        let def = site.catalog.entity(&self.entity)?;
        let existing = self.initial(site, pk)?;
        let pk = existing.pk().cloned().ok_or(Error::NotFound)?;

        let mut errors = FieldErrors::new();
        let mut values = clean(site, def, payload, &mut errors);
        if let Some(position) = values.iter().position(|(name, _)| *name == def.identity_field) {
            if values[position].1 != pk {
                add_error(&mut errors, &def.identity_field, "identity cannot be changed");
            }
            values.remove(position);
        }
        check_references(site, def, &values, &mut errors)?;
        if !errors.is_empty() {
            return Ok(EditOutcome::Invalid { errors });
        }

        site.backend().update(def, &pk, values)?;
        debug!(entity = %def.name, pk = %pk, "updated record");
        Ok(EditOutcome::Saved {
            pk: pk.to_json(),
            success_url: success_url(site, def, self.success_url.as_deref()),
        })
    }
}

fn add_error(errors: &mut FieldErrors, field: &str, message: &str) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.to_string());
}

fn parse_pk(def: &EntityDef, text: &str) -> Result<Value, Error> {
    let identity = def
        .get_identity_field()
        .ok_or_else(|| Error::UnknownEntity(def.name.clone()))?;
    Value::parse(text, &identity.field_type, &identity.name).map_err(|_| Error::NotFound)
}

/// Map payload keys to columns and coerce their values.
fn clean(site: &Site, def: &EntityDef, payload: &Payload, errors: &mut FieldErrors) -> Vec<(String, Value)> {
    let mut values = Vec::new();
    for (key, json) in payload {
        let column = match site.catalog.get_field(&def.name, key) {
            Some(ModelField::Column(field)) => field.name,
            Some(ModelField::Relation(rel)) if rel.kind == RelationKind::ForwardToOne => {
                match rel.attname {
                    Some(attname) => attname,
                    None => continue,
                }
            }
            _ => {
                add_error(errors, key, "unknown field");
                continue;
            }
        };
        let Some(field) = def.get_field(&column) else {
            add_error(errors, key, "unknown field");
            continue;
        };
        match Value::from_json(json, &field.field_type, &column) {
            Ok(value) => values.push((column, value)),
            Err(Error::InvalidValue { message, .. }) => add_error(errors, &column, &message),
            Err(error) => add_error(errors, &column, &error.to_string()),
        }
    }
    values
}

/// Every non-null forward reference must point at an existing row.
fn check_references(
    site: &Site,
    def: &EntityDef,
    values: &[(String, Value)],
    errors: &mut FieldErrors,
) -> Result<(), Error> {
    for relation in site.catalog.forward_to_one(&def.name) {
        let Some(column) = relation.attname.as_deref() else {
            continue;
        };
        let Some((_, value)) = values.iter().find(|(name, _)| name == column) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let target = site.catalog.join_path(&relation)?.target_column;
        let found = site
            .queryset(&relation.related_entity)?
            .filter(&target, value.clone())?
            .count(site.backend())?;
        if found == 0 {
            add_error(
                errors,
                column,
                &format!("{} with {} {} does not exist", relation.related_entity, target, value),
            );
        }
    }
    Ok(())
}

fn success_url(site: &Site, def: &EntityDef, configured: Option<&str>) -> String {
    if let Some(url) = configured {
        return url.to_string();
    }
    let model_name = def.model_name();
    site.router()
        .reverse(&model_name, Action::List, None)
        .unwrap_or_else(|| format!("/{}", model_name))
}
