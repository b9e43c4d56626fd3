//! Scaffolding configuration.
//!
//! Values are layered: built-in defaults, then a JSON file, then `ORMGEN_*`
//! environment variables. A loaded [`ScaffoldConfig`] is never mutated; it is
//! handed to the views and the router explicitly.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;
use crate::resolver::FieldSpec;
use crate::router::Action;

/// Enables `orm_<lookup>` query parameters.
pub const ENV_FILTER_ORM: &str = "ORMGEN_LISTVIEW_FILTER_ORM";
/// Enables query optimization of list views.
pub const ENV_OPTIMIZE_SQL: &str = "ORMGEN_LISTVIEW_OPTIMIZE_SQL";
/// Default rows per page.
pub const ENV_PAGINATE_BY: &str = "ORMGEN_LISTVIEW_PAGINATE_BY";
/// Name of the page number parameter.
pub const ENV_PAGE_KWARG: &str = "ORMGEN_LISTVIEW_PAGE_KWARG";
/// Name of the page size parameter.
pub const ENV_PAGE_SIZE_KWARG: &str = "ORMGEN_LISTVIEW_PAGE_SIZE_KWARG";

/// List view defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListViewConfig {
    /// Accept `orm_<lookup>=value` filters from the query string.
    pub filter_orm: bool,
    /// Optimize list queries from the declared fields.
    pub optimize_sql: bool,
    /// Page number parameter.
    pub page_kwarg: String,
    /// Rows per page.
    pub paginate_by: usize,
    /// Page size parameter.
    pub page_size_kwarg: String,
    /// Page sizes offered to clients.
    pub page_size_list: Vec<usize>,
}

impl Default for ListViewConfig {
    fn default() -> Self {
        Self {
            filter_orm: false,
            optimize_sql: true,
            page_kwarg: "page".to_string(),
            paginate_by: 20,
            page_size_kwarg: "pagesize".to_string(),
            page_size_list: vec![20, 30, 50],
        }
    }
}

/// Router defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Global enablement per action; `None` defers to the action mask.
    pub actions: IndexMap<Action, Option<bool>>,
    /// Path rule per action, relative to `/<model>/`.
    pub url_rules: IndexMap<Action, String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        let actions = [Action::Create, Action::Delete, Action::Update, Action::Detail]
            .into_iter()
            .map(|action| (action, None))
            .collect();
        let url_rules = [
            (Action::Create, "create"),
            (Action::Delete, "delete"),
            (Action::Update, ":pk/update"),
            (Action::Detail, ":pk"),
            (Action::List, ""),
        ]
        .into_iter()
        .map(|(action, rule)| (action, rule.to_string()))
        .collect();
        Self { actions, url_rules }
    }
}

impl RouterConfig {
    /// Path rule for an action; unconfigured actions use their own name.
    pub fn url_rule(&self, action: Action) -> String {
        self.url_rules
            .get(&action)
            .cloned()
            .unwrap_or_else(|| action.as_str().to_string())
    }
}

/// Per-model view settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelViewOptions {
    /// Columns shown by the list view.
    pub list_fields: Vec<FieldSpec>,
    /// Fields searched by the `s` parameter.
    pub filter_fields: Vec<FieldSpec>,
    /// Redirect target after a successful create or update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_url: Option<String>,
    /// Overrides [`ListViewConfig::filter_orm`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_orm: Option<bool>,
    /// Overrides [`ListViewConfig::optimize_sql`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimize_sql: Option<bool>,
    /// Overrides [`ListViewConfig::paginate_by`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paginate_by: Option<usize>,
    /// Action overrides for this model only.
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub actions: IndexMap<Action, bool>,
}

/// Complete scaffolding configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaffoldConfig {
    /// List view defaults.
    pub listview: ListViewConfig,
    /// Router defaults.
    pub router: RouterConfig,
    /// Per-model settings keyed by entity name.
    pub models: IndexMap<String, ModelViewOptions>,
}

impl ScaffoldConfig {
    /// Parse a JSON configuration.
    pub fn from_json(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Defaults, overlaid with `path` if given, overlaid with the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let config = match path {
            Some(path) => {
                debug!(path = %path.display(), "loading scaffold configuration");
                Self::from_file(path)?
            }
            None => Self::default(),
        };
        config.apply_env()
    }

    /// Overlay `ORMGEN_LISTVIEW_*` variables from the process environment.
    pub fn apply_env(self) -> Result<Self, Error> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Overlay `ORMGEN_LISTVIEW_*` variables read through `lookup`.
    pub fn apply_env_with(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        if let Some(raw) = lookup(ENV_FILTER_ORM) {
            self.listview.filter_orm = parse_bool(ENV_FILTER_ORM, &raw)?;
        }
        if let Some(raw) = lookup(ENV_OPTIMIZE_SQL) {
            self.listview.optimize_sql = parse_bool(ENV_OPTIMIZE_SQL, &raw)?;
        }
        if let Some(raw) = lookup(ENV_PAGINATE_BY) {
            self.listview.paginate_by = raw
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{} must be a positive integer, got '{}'", ENV_PAGINATE_BY, raw)))?;
        }
        if let Some(raw) = lookup(ENV_PAGE_KWARG) {
            self.listview.page_kwarg = raw;
        }
        if let Some(raw) = lookup(ENV_PAGE_SIZE_KWARG) {
            self.listview.page_size_kwarg = raw;
        }
        Ok(self)
    }

    /// Settings for one model; unconfigured models get the defaults.
    pub fn model(&self, entity: &str) -> ModelViewOptions {
        self.models.get(entity).cloned().unwrap_or_default()
    }

    /// List view settings with the model's overrides applied.
    pub fn listview_for(&self, entity: &str) -> ListViewConfig {
        let mut listview = self.listview.clone();
        if let Some(options) = self.models.get(entity) {
            if let Some(filter_orm) = options.filter_orm {
                listview.filter_orm = filter_orm;
            }
            if let Some(optimize_sql) = options.optimize_sql {
                listview.optimize_sql = optimize_sql;
            }
            if let Some(paginate_by) = options.paginate_by {
                listview.paginate_by = paginate_by;
            }
        }
        listview
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, Error> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("{} must be a boolean, got '{}'", key, raw))),
    }
}
