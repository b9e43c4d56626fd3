//! Bulk delete view.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::Site;
use crate::error::Error;
use crate::value::Value;

/// Result of a bulk delete. Failures are reported here, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    /// True when the delete ran.
    pub status: bool,
    /// Why nothing was deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Number of rows removed.
    #[serde(default)]
    pub deleted: usize,
}

impl DeleteOutcome {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            status: false,
            error: Some(error.into()),
            deleted: 0,
        }
    }
}

/// Deletes records by identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteView {
    entity: String,
}

impl DeleteView {
    /// Create a delete view.
    pub fn new(entity: impl Into<String>) -> Self {
        Self { entity: entity.into() }
    }

    /// Entity deleted from.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Delete every record whose identity is listed in `ids`.
    pub fn submit(&self, site: &Site, ids: &[String]) -> DeleteOutcome {
        if ids.is_empty() {
            return DeleteOutcome::failed("no object ids supplied, nothing deleted");
        }
        match self.delete(site, ids) {
            Ok(deleted) => {
                debug!(entity = %self.entity, deleted, "bulk delete");
                DeleteOutcome {
                    status: true,
                    error: None,
                    deleted,
                }
            }
            Err(error) => {
                warn!(entity = %self.entity, error = %error, "bulk delete failed");
                DeleteOutcome::failed(error.to_string())
            }
        }
    }

    fn delete(&self, site: &Site, ids: &[String]) -> Result<usize, Error> {
        let def = site.catalog.entity(&self.entity)?;
        let identity = def
            .get_identity_field()
            .ok_or_else(|| Error::UnknownEntity(def.name.clone()))?;
        let values = ids
            .iter()
            .map(|id| Value::parse(id, &identity.field_type, &identity.name))
            .collect::<Result<Vec<_>, _>>()?;
        site.queryset(&self.entity)?
            .filter_in("pk", values)?
            .delete(site.backend())
    }
}
