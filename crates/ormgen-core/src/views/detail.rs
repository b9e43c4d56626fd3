//! Single-record view.

use serde::Serialize;

use super::Site;
use crate::display::{lookup_value, record_label, CellValue};
use crate::error::Error;
use crate::optimizer::QueryOptimizer;
use crate::resolver::{FieldDescriptor, FieldResolver, FieldSpec};

/// One labelled value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailField {
    /// Field path.
    pub path: String,
    /// Field label.
    pub label: String,
    /// Rendered value.
    pub value: CellValue,
}

/// Output of [`DetailView::render`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailPage {
    /// Entity shown.
    pub entity: String,
    /// Identity of the record.
    pub pk: serde_json::Value,
    /// Display string of the record.
    pub title: String,
    /// Columns followed by forward to-one relations.
    pub fields: Vec<DetailField>,
}

/// Shows one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailView {
    entity: String,
}

impl DetailView {
    /// Create a detail view.
    pub fn new(entity: impl Into<String>) -> Self {
        Self { entity: entity.into() }
    }

    /// Entity shown.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Every column, then every forward to-one relation by name.
    pub fn fields(&self, site: &Site) -> Vec<FieldDescriptor> {
        let resolver = FieldResolver::new(&site.catalog, &self.entity);
        let mut fields = resolver.all_columns();
        for relation in site.catalog.forward_to_one(&self.entity) {
            if let Some(descriptor) = resolver.resolve(&FieldSpec::Path(relation.accessor)) {
                fields.push(descriptor);
            }
        }
        fields
    }

    /// Render the record whose identity is `pk` (query-string text).
    pub fn render(&self, site: &Site, pk: &str) -> Result<DetailPage, Error> {
        let fields = self.fields(site);
        let qs = site.queryset(&self.entity)?.filter_raw("pk", pk)?;
        let qs = QueryOptimizer::new(&site.catalog).optimize(&qs, &fields)?;
        let record = qs
            .fetch(site.backend())?
            .into_iter()
            .next()
            .ok_or(Error::NotFound)?;

        Ok(DetailPage {
            entity: self.entity.clone(),
            pk: record.pk().map(|pk| pk.to_json()).unwrap_or_default(),
            title: record_label(&site.catalog, &record),
            fields: fields
                .iter()
                .map(|d| DetailField {
                    path: d.path.clone(),
                    label: d.label.clone(),
                    value: lookup_value(&site.catalog, &record, d),
                })
                .collect(),
        })
    }
}
