//! Field path resolution.
//!
//! Turns declarative field lists (`"author__name"` or `["author__name",
//! "Writer"]`) into [`FieldDescriptor`]s. Paths that do not resolve are
//! dropped and logged, never raised.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::{Catalog, ModelField, PK_ALIAS};
use crate::query::LOOKUP_SEP;

/// One entry of a declarative field list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldSpec {
    /// Bare path, labelled from model metadata.
    Path(String),
    /// Path with an explicit label.
    Labeled(String, String),
}

impl FieldSpec {
    /// The dotted path.
    pub fn path(&self) -> &str {
        match self {
            FieldSpec::Path(path) | FieldSpec::Labeled(path, _) => path,
        }
    }

    /// The explicit label, if any.
    pub fn label(&self) -> Option<&str> {
        match self {
            FieldSpec::Path(_) => None,
            FieldSpec::Labeled(_, label) => Some(label),
        }
    }
}

impl From<&str> for FieldSpec {
    fn from(path: &str) -> Self {
        FieldSpec::Path(path.to_string())
    }
}

impl From<(&str, &str)> for FieldSpec {
    fn from((path, label): (&str, &str)) -> Self {
        FieldSpec::Labeled(path.to_string(), label.to_string())
    }
}

/// A resolved field path.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Dotted path as declared; empty for the object column.
    pub path: String,
    /// Display label.
    pub label: String,
    /// Name of the terminal field, with `pk` translated.
    pub terminal: String,
    /// Terminal field metadata; `None` for the object column.
    pub field: Option<ModelField>,
}

impl FieldDescriptor {
    /// Check if this is the object column.
    pub fn is_object(&self) -> bool {
        self.field.is_none()
    }

    /// Path segments.
    pub fn segments(&self) -> Vec<&str> {
        if self.path.is_empty() {
            Vec::new()
        } else {
            self.path.split(LOOKUP_SEP).collect()
        }
    }

    /// Check if the path crosses at least one relation.
    pub fn is_nested(&self) -> bool {
        self.path.contains(LOOKUP_SEP)
    }
}

/// Resolves field paths against one entity.
#[derive(Debug, Clone, Copy)]
pub struct FieldResolver<'a> {
    catalog: &'a Catalog,
    entity: &'a str,
}

impl<'a> FieldResolver<'a> {
    /// Create a resolver rooted at `entity`.
    pub fn new(catalog: &'a Catalog, entity: &'a str) -> Self {
        Self { catalog, entity }
    }

    /// Resolve one spec, or `None` if the path is unusable.
    pub fn resolve(&self, spec: &FieldSpec) -> Option<FieldDescriptor> {
        let path = spec.path();
        let segments: Vec<&str> = path.split(LOOKUP_SEP).collect();
        let last = segments.len() - 1;
        let mut current = self.catalog.get_entity(self.entity)?;

        for (idx, segment) in segments.iter().enumerate() {
            let name = self.catalog.resolve_alias(current, segment);
            let Some(field) = self.catalog.get_field(&current.name, name) else {
                debug!(entity = %self.entity, path, segment, "dropping unresolvable field path");
                return None;
            };

            if idx == last {
                let label = match spec.label() {
                    Some(label) => label.to_string(),
                    None => self.catalog.field_label(&field),
                };
                return Some(FieldDescriptor {
                    path: path.to_string(),
                    label,
                    terminal: name.to_string(),
                    field: Some(field),
                });
            }

            let rel = match field {
                ModelField::Relation(rel) => rel,
                ModelField::Column(_) => {
                    debug!(entity = %self.entity, path, segment, "dropping field path through a column");
                    return None;
                }
            };
            if rel.kind.is_to_many() {
                warn!(
                    entity = %self.entity,
                    path,
                    segment,
                    "to-many relation may only end a field path, dropping it"
                );
                return None;
            }
            if rel.attname.as_deref() == Some(name) {
                debug!(entity = %self.entity, path, segment, "dropping field path through a storage column");
                return None;
            }
            current = self.catalog.get_entity(&rel.related_entity)?;
        }
        None
    }

    /// Resolve a field list, dropping unusable entries.
    pub fn resolve_all(&self, specs: &[FieldSpec]) -> Vec<FieldDescriptor> {
        specs.iter().filter_map(|spec| self.resolve(spec)).collect()
    }

    /// Resolve a list view's columns, falling back to the object column.
    pub fn resolve_list(&self, specs: &[FieldSpec]) -> Vec<FieldDescriptor> {
        let fields = self.resolve_all(specs);
        if fields.is_empty() {
            self.object_column().into_iter().collect()
        } else {
            fields
        }
    }

    /// Column rendering each record's display string.
    pub fn object_column(&self) -> Option<FieldDescriptor> {
        let entity = self.catalog.get_entity(self.entity)?;
        Some(FieldDescriptor {
            path: String::new(),
            label: entity.verbose_name(),
            terminal: String::new(),
            field: None,
        })
    }

    /// Descriptor for every column of the entity, identity first.
    pub fn all_columns(&self) -> Vec<FieldDescriptor> {
        let Some(entity) = self.catalog.get_entity(self.entity) else {
            return Vec::new();
        };
        let mut specs: Vec<FieldSpec> = vec![FieldSpec::Path(PK_ALIAS.to_string())];
        specs.extend(
            entity
                .fields
                .iter()
                .filter(|f| f.name != entity.identity_field)
                .map(|f| FieldSpec::Path(f.name.clone())),
        );
        self.resolve_all(&specs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EntityDef, FieldDef, FieldType, RelationDef, RelationKind, ScalarType, SchemaBundle};

    fn catalog() -> Catalog {
        let int = |n: &str| FieldDef::new(n, FieldType::scalar(ScalarType::Int64));
        let text = |n: &str| FieldDef::new(n, FieldType::scalar(ScalarType::String));
        let bundle = SchemaBundle::new()
            .with_entity(EntityDef::new("Author", "id").with_fields([int("id"), text("name")]))
            .with_entity(
                EntityDef::new("Post", "id").with_fields([
                    int("id"),
                    text("title").with_verbose_name("Title"),
                    int("author_id"),
                ]),
            )
            .with_entity(
                EntityDef::new("Comment", "id").with_fields([int("id"), int("post_id"), text("body")]),
            )
            .with_relation(RelationDef::foreign_key("author", "Post", "author_id", "Author", "id"))
            .with_relation(RelationDef::foreign_key("post", "Comment", "post_id", "Post", "id"));
        Catalog::from_bundle(bundle).unwrap()
    }

    #[test]
    fn test_resolve_column_and_label() {
        let catalog = catalog();
        let resolver = FieldResolver::new(&catalog, "Post");

        let title = resolver.resolve(&"title".into()).unwrap();
        assert_eq!(title.label, "Title");
        assert_eq!(title.terminal, "title");

        let labeled = resolver.resolve(&("title", "Headline").into()).unwrap();
        assert_eq!(labeled.label, "Headline");
    }

    #[test]
    fn test_pk_alias_translated() {
        let catalog = catalog();
        let resolver = FieldResolver::new(&catalog, "Comment");
        let pk = resolver.resolve(&"post__author__pk".into()).unwrap();
        assert_eq!(pk.terminal, "id");
        assert_eq!(pk.path, "post__author__pk");
    }

    #[test]
    fn test_to_many_only_terminal() {
        let catalog = catalog();
        let resolver = FieldResolver::new(&catalog, "Author");

        let posts = resolver.resolve(&"post".into()).unwrap();
        assert_eq!(posts.label, "post");
        assert!(matches!(
            posts.field,
            Some(ModelField::Relation(ref r)) if r.kind == RelationKind::ReverseToMany
        ));

        assert!(resolver.resolve(&"post__title".into()).is_none());
        assert!(resolver.resolve(&"post_set__comment".into()).is_none());
    }

    #[test]
    fn test_invalid_paths_dropped() {
        let catalog = catalog();
        let resolver = FieldResolver::new(&catalog, "Post");
        let fields = resolver.resolve_all(&[
            "nope".into(),
            "title__author".into(),
            "author_id__name".into(),
            "author__name".into(),
        ]);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].path, "author__name");
    }

    #[test]
    fn test_list_fallback_object_column() {
        let catalog = catalog();
        let resolver = FieldResolver::new(&catalog, "Post");
        let fields = resolver.resolve_list(&["bogus".into()]);
        assert_eq!(fields.len(), 1);
        assert!(fields[0].is_object());
        assert_eq!(fields[0].label, "post");
    }

    #[test]
    fn test_field_spec_json() {
        let specs: Vec<FieldSpec> =
            serde_json::from_str(r#"["title", ["author__name", "Author"]]"#).unwrap();
        assert_eq!(specs[0], FieldSpec::Path("title".into()));
        assert_eq!(specs[1].label(), Some("Author"));
    }
}
