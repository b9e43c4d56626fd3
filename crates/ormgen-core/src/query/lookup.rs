//! Lookup expressions: `path__to__field__op`.

use crate::catalog::{Catalog, FieldType, ModelField, RelationField};
use crate::error::Error;

/// Separator between path segments and the lookup operator.
pub const LOOKUP_SEP: &str = "__";

/// Comparison applied by a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOp {
    /// Equality (default).
    Exact,
    /// Case-insensitive equality.
    IExact,
    /// Substring match.
    Contains,
    /// Case-insensitive substring match.
    IContains,
    /// Membership in a list.
    In,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Prefix match.
    StartsWith,
    /// Case-insensitive prefix match.
    IStartsWith,
    /// Suffix match.
    EndsWith,
    /// Case-insensitive suffix match.
    IEndsWith,
    /// Null check.
    IsNull,
}

impl LookupOp {
    /// Parse an operator name.
    pub fn from_name(name: &str) -> Option<Self> {
        let op = match name {
            "exact" => LookupOp::Exact,
            "iexact" => LookupOp::IExact,
            "contains" => LookupOp::Contains,
            "icontains" => LookupOp::IContains,
            "in" => LookupOp::In,
            "gt" => LookupOp::Gt,
            "gte" => LookupOp::Gte,
            "lt" => LookupOp::Lt,
            "lte" => LookupOp::Lte,
            "startswith" => LookupOp::StartsWith,
            "istartswith" => LookupOp::IStartsWith,
            "endswith" => LookupOp::EndsWith,
            "iendswith" => LookupOp::IEndsWith,
            "isnull" => LookupOp::IsNull,
            _ => return None,
        };
        Some(op)
    }

    /// Operator name as written in lookups.
    pub fn name(&self) -> &'static str {
        match self {
            LookupOp::Exact => "exact",
            LookupOp::IExact => "iexact",
            LookupOp::Contains => "contains",
            LookupOp::IContains => "icontains",
            LookupOp::In => "in",
            LookupOp::Gt => "gt",
            LookupOp::Gte => "gte",
            LookupOp::Lt => "lt",
            LookupOp::Lte => "lte",
            LookupOp::StartsWith => "startswith",
            LookupOp::IStartsWith => "istartswith",
            LookupOp::EndsWith => "endswith",
            LookupOp::IEndsWith => "iendswith",
            LookupOp::IsNull => "isnull",
        }
    }

    /// Check if the operator compares text.
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            LookupOp::IExact
                | LookupOp::Contains
                | LookupOp::IContains
                | LookupOp::StartsWith
                | LookupOp::IStartsWith
                | LookupOp::EndsWith
                | LookupOp::IEndsWith
        )
    }
}

/// A parsed, unresolved lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    /// Path segments.
    pub path: Vec<String>,
    /// Operator.
    pub op: LookupOp,
}

impl Lookup {
    /// Parse `path__op`. A trailing segment that is not an operator is part of
    /// the path and the operator defaults to `exact`.
    pub fn parse(expr: &str) -> Result<Self, Error> {
        let mut path: Vec<String> = expr.split(LOOKUP_SEP).map(str::to_string).collect();
        if path.iter().any(|s| s.is_empty()) {
            return Err(Error::InvalidLookup(expr.to_string()));
        }

        let op = match path.last().and_then(|s| LookupOp::from_name(s)) {
            Some(op) if path.len() > 1 => {
                path.pop();
                op
            }
            _ => LookupOp::Exact,
        };
        Ok(Self { path, op })
    }

    /// Resolve the path against an entity.
    pub fn resolve(self, catalog: &Catalog, entity: &str) -> Result<ResolvedLookup, Error> {
        let mut current = catalog.entity(entity)?.name.clone();
        let mut hops = Vec::new();
        let last = self.path.len() - 1;

        for (idx, segment) in self.path.iter().enumerate() {
            let field = catalog
                .get_field(&current, segment)
                .ok_or_else(|| Error::InvalidField {
                    entity: current.clone(),
                    field: segment.clone(),
                })?;

            match field {
                ModelField::Column(column) => {
                    if idx != last {
                        return Err(Error::InvalidLookup(format!(
                            "'{}' is not a relation on '{}'",
                            segment, current
                        )));
                    }
                    return Ok(ResolvedLookup {
                        hops,
                        column: column.name,
                        field_type: column.field_type,
                        op: self.op,
                    });
                }
                ModelField::Relation(rel) => {
                    let by_attname = rel.attname.as_deref() == Some(segment.as_str());
                    if idx == last && rel.is_forward_to_one() {
                        let column = rel.attname.clone().unwrap_or_default();
                        let def = catalog.entity(&current)?;
                        let field_type = def
                            .get_field(&column)
                            .map(|f| f.field_type.clone())
                            .ok_or_else(|| Error::InvalidField {
                                entity: current.clone(),
                                field: column.clone(),
                            })?;
                        return Ok(ResolvedLookup {
                            hops,
                            column,
                            field_type,
                            op: self.op,
                        });
                    }
                    if by_attname {
                        return Err(Error::InvalidLookup(format!(
                            "cannot traverse storage column '{}'",
                            segment
                        )));
                    }
                    current = rel.related_entity.clone();
                    hops.push(rel);
                }
            }
        }

        // Path ends at a relation other than a forward to-one: compare the
        // related identity.
        let def = catalog.entity(&current)?;
        let identity = def
            .get_identity_field()
            .ok_or_else(|| Error::UnknownEntity(current.clone()))?;
        Ok(ResolvedLookup {
            hops,
            column: identity.name.clone(),
            field_type: identity.field_type.clone(),
            op: self.op,
        })
    }
}

/// A lookup resolved to relation hops and a terminal column.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLookup {
    /// Relations crossed from the root entity.
    pub hops: Vec<RelationField>,
    /// Compared column on the last entity.
    pub column: String,
    /// Type of the compared column.
    pub field_type: FieldType,
    /// Operator.
    pub op: LookupOp,
}
