//! Paginated, searchable list view.

use serde::Serialize;
use tracing::debug;

use super::{QueryParams, Site};
use crate::catalog::ModelField;
use crate::config::{ListViewConfig, ModelViewOptions};
use crate::display::{lookup_value, CellValue};
use crate::error::Error;
use crate::optimizer::QueryOptimizer;
use crate::paginate::{page_size_from_param, Page, Paginator};
use crate::query::QuerySet;
use crate::resolver::{FieldDescriptor, FieldResolver, FieldSpec};

/// Search term parameter.
pub const SEARCH_PARAM: &str = "s";

/// Prefix of query-string filters.
const ORM_PREFIX: &str = "orm_";

/// A rendered column header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    /// Field path; empty for the object column.
    pub path: String,
    /// Header label.
    pub label: String,
}

/// A rendered row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    /// Identity of the record.
    pub pk: serde_json::Value,
    /// One cell per column.
    pub cells: Vec<CellValue>,
}

/// Output of [`ListView::render`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListPage {
    /// Entity listed.
    pub entity: String,
    /// Column headers.
    pub columns: Vec<Column>,
    /// Rows of the current page.
    pub rows: Vec<Row>,
    /// Labels of the searched fields.
    pub search_labels: Vec<String>,
    /// Search term in effect.
    pub search: Option<String>,
    /// Pagination state.
    pub page: Page,
    /// Query-string arguments to carry into page links.
    pub url_args: Vec<String>,
    /// Page sizes offered to clients.
    pub page_size_list: Vec<usize>,
}

/// Apply `orm_<lookup>=value` parameters as filters.
///
/// A malformed parameter is skipped when `ignore_errors` is set; otherwise the
/// query becomes empty.
pub fn apply_orm_filters(qs: &QuerySet, params: &QueryParams, ignore_errors: bool) -> QuerySet {
    let mut qs = qs.clone();
    for (key, value) in params.items() {
        let Some(expr) = key.strip_prefix(ORM_PREFIX) else {
            continue;
        };
        match qs.filter_raw(expr, value) {
            Ok(filtered) => qs = filtered,
            Err(error) if ignore_errors => {
                debug!(entity = %qs.entity(), expr, error = %error, "ignoring malformed orm filter");
            }
            Err(error) => {
                debug!(entity = %qs.entity(), expr, error = %error, "malformed orm filter, returning no rows");
                return qs.none();
            }
        }
    }
    qs
}

/// Lists one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListView {
    entity: String,
    list_fields: Vec<FieldSpec>,
    filter_fields: Vec<FieldSpec>,
    settings: ListViewConfig,
}

impl ListView {
    /// Create a list view from model options and list settings.
    pub fn new(entity: impl Into<String>, options: &ModelViewOptions, settings: ListViewConfig) -> Self {
        Self {
            entity: entity.into(),
            list_fields: options.list_fields.clone(),
            filter_fields: options.filter_fields.clone(),
            settings,
        }
    }

    /// Entity listed.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Settings in effect.
    pub fn settings(&self) -> &ListViewConfig {
        &self.settings
    }

    /// Resolved columns, falling back to the object column.
    pub fn columns(&self, site: &Site) -> Vec<FieldDescriptor> {
        FieldResolver::new(&site.catalog, &self.entity).resolve_list(&self.list_fields)
    }

    /// Resolved search fields. Relation terminals cannot be searched and are
    /// left out.
    pub fn search_fields(&self, site: &Site) -> Vec<FieldDescriptor> {
        FieldResolver::new(&site.catalog, &self.entity)
            .resolve_all(&self.filter_fields)
            .into_iter()
            .filter(|d| matches!(d.field, Some(ModelField::Column(_))))
            .collect()
    }

    /// Query for the listed rows, before pagination.
    pub fn queryset(&self, site: &Site, params: &QueryParams) -> Result<QuerySet, Error> {
        let mut qs = site.queryset(&self.entity)?;
        if self.settings.filter_orm {
            qs = apply_orm_filters(&qs, params, true);
        }

        let term = params.get(SEARCH_PARAM).map(str::trim).unwrap_or_default();
        let search_fields = self.search_fields(site);
        if !term.is_empty() && !search_fields.is_empty() {
            let paths: Vec<&str> = search_fields.iter().map(|d| d.path.as_str()).collect();
            qs = qs.search(&paths, term)?;
        }

        let columns = self.columns(site);
        let optimizer = QueryOptimizer::new(&site.catalog);
        let plan = optimizer.plan(&self.entity, &columns);
        if self.settings.optimize_sql {
            plan.apply(&qs)
        } else {
            // Related rows are still needed to render; only the column
            // restriction is skipped.
            let mut qs = qs;
            if !plan.eager.is_empty() {
                qs = qs.select_related(&plan.eager)?;
            }
            if !plan.separate.is_empty() {
                qs = qs.prefetch_related(&plan.separate)?;
            }
            Ok(qs)
        }
    }

    /// Render one page.
    pub fn render(&self, site: &Site, params: &QueryParams) -> Result<ListPage, Error> {
        let columns = self.columns(site);
        let qs = self.queryset(site, params)?;

        let per_page = page_size_from_param(
            params.get(&self.settings.page_size_kwarg),
            self.settings.paginate_by,
        );
        let count = qs.count(site.backend())?;
        let page = Paginator::new(per_page).page(params.get(&self.settings.page_kwarg), count)?;

        let records = qs.slice(page.offset, Some(page.per_page)).fetch(site.backend())?;
        let rows = records
            .iter()
            .map(|record| Row {
                pk: record.pk().map(|pk| pk.to_json()).unwrap_or_default(),
                cells: columns
                    .iter()
                    .map(|column| lookup_value(&site.catalog, record, column))
                    .collect(),
            })
            .collect();

        debug!(
            entity = %self.entity,
            count,
            page = page.number,
            per_page,
            "rendered list page"
        );

        let search = params
            .get(SEARCH_PARAM)
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_string);
        Ok(ListPage {
            entity: self.entity.clone(),
            columns: columns
                .iter()
                .map(|d| Column {
                    path: d.path.clone(),
                    label: d.label.clone(),
                })
                .collect(),
            rows,
            search_labels: self.search_fields(site).into_iter().map(|d| d.label).collect(),
            search,
            page,
            url_args: params.url_args(&self.settings.page_kwarg),
            page_size_list: self.settings.page_size_list.clone(),
        })
    }
}
