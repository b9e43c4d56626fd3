//! JSON request and response types for the HTTP server.

use ormgen_core::{Action, UrlEntry};
use serde::{Deserialize, Serialize};

/// Generic success response wrapper.
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T: Serialize> {
    /// Success flag.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    /// Create a new success response.
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Health status.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Number of entities in the catalog.
    pub entities: usize,
    /// Number of routed views.
    pub routes: usize,
}

/// A routed view.
#[derive(Debug, Serialize)]
pub struct RouteJson {
    /// Route name.
    pub name: String,
    /// Path pattern.
    pub path: String,
    /// Routed action.
    pub action: Action,
    /// Entity served.
    pub entity: String,
    /// HTTP methods accepted.
    pub methods: Vec<&'static str>,
}

impl From<&UrlEntry> for RouteJson {
    fn from(entry: &UrlEntry) -> Self {
        let methods = match entry.action {
            Action::List | Action::Detail => vec!["GET"],
            Action::Update => vec!["GET", "POST"],
            Action::Create | Action::Delete => vec!["POST"],
        };
        Self {
            name: entry.name.clone(),
            path: entry.path.clone(),
            action: entry.action,
            entity: entry.entity.clone(),
            methods,
        }
    }
}

/// Bulk delete request.
#[derive(Debug, Default, Deserialize)]
pub struct DeleteRequest {
    /// Identities to delete, as numbers or strings.
    #[serde(default)]
    pub ids: Vec<serde_json::Value>,
}

impl DeleteRequest {
    /// Identities as query-string text.
    pub fn id_strings(&self) -> Vec<String> {
        self.ids
            .iter()
            .map(|id| match id {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()
    }
}
