//! Generated CRUD views.
//!
//! Views are plain values describing what to render for one entity. They run
//! against a [`Site`], which holds everything shared between requests.

mod delete;
mod detail;
mod edit;
mod list;

pub use delete::{DeleteOutcome, DeleteView};
pub use detail::{DetailField, DetailPage, DetailView};
pub use edit::{CreateView, EditOutcome, FieldErrors, UpdateView};
pub use list::{apply_orm_filters, Column, ListPage, ListView, Row, SEARCH_PARAM};

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::catalog::Catalog;
use crate::config::{ListViewConfig, ModelViewOptions, ScaffoldConfig};
use crate::error::Error;
use crate::query::QuerySet;
use crate::router::{Action, Router};
use crate::storage::Backend;

/// Shared, read-only context for view execution.
#[derive(Clone)]
pub struct Site {
    /// Model metadata.
    pub catalog: Arc<Catalog>,
    /// Record storage.
    pub backend: Arc<dyn Backend>,
    /// Loaded configuration.
    pub config: Arc<ScaffoldConfig>,
}

impl fmt::Debug for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Site")
            .field("entities", &self.catalog.bundle().entity_names())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Site {
    /// Create a site.
    pub fn new(catalog: Arc<Catalog>, backend: Arc<dyn Backend>, config: Arc<ScaffoldConfig>) -> Self {
        Self {
            catalog,
            backend,
            config,
        }
    }

    /// Unfiltered query over an entity.
    pub fn queryset(&self, entity: &str) -> Result<QuerySet, Error> {
        QuerySet::new(self.catalog.clone(), entity)
    }

    /// Router over this site's catalog and configuration.
    pub fn router(&self) -> Router<'_> {
        Router::new(&self.catalog, &self.config)
    }

    /// Storage backend.
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }
}

/// Query-string parameters in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Empty parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last value given for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Each key once, with its last value, in order of first appearance.
    pub fn items(&self) -> IndexMap<&str, &str> {
        let mut items = IndexMap::new();
        for (key, value) in &self.pairs {
            items.insert(key.as_str(), value.as_str());
        }
        items
    }

    /// `key=value` strings for every key except `exclude`.
    pub fn url_args(&self, exclude: &str) -> Vec<String> {
        self.items()
            .into_iter()
            .filter(|(key, _)| *key != exclude)
            .map(|(key, value)| format!("{}={}", key, value))
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// A view for one action on one entity.
#[derive(Debug, Clone)]
pub enum ActionView {
    /// Insert form.
    Create(CreateView),
    /// Bulk delete.
    Delete(DeleteView),
    /// Edit form.
    Update(UpdateView),
    /// Single record.
    Detail(DetailView),
    /// Paginated list.
    List(ListView),
}

impl ActionView {
    /// Build the view for `action` on `entity`.
    pub fn build(
        action: Action,
        entity: &str,
        options: &ModelViewOptions,
        listview: &ListViewConfig,
    ) -> Self {
        match action {
            Action::Create => ActionView::Create(CreateView::new(entity, options.success_url.clone())),
            Action::Delete => ActionView::Delete(DeleteView::new(entity)),
            Action::Update => ActionView::Update(UpdateView::new(entity, options.success_url.clone())),
            Action::Detail => ActionView::Detail(DetailView::new(entity)),
            Action::List => ActionView::List(ListView::new(entity, options, listview.clone())),
        }
    }

    /// Action this view serves.
    pub fn action(&self) -> Action {
        match self {
            ActionView::Create(_) => Action::Create,
            ActionView::Delete(_) => Action::Delete,
            ActionView::Update(_) => Action::Update,
            ActionView::Detail(_) => Action::Detail,
            ActionView::List(_) => Action::List,
        }
    }

    /// Entity this view serves.
    pub fn entity(&self) -> &str {
        match self {
            ActionView::Create(view) => view.entity(),
            ActionView::Delete(view) => view.entity(),
            ActionView::Update(view) => view.entity(),
            ActionView::Detail(view) => view.entity(),
            ActionView::List(view) => view.entity(),
        }
    }
}
