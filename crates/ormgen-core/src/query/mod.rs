//! Query layer: lookups, chainable querysets and their execution.

mod executor;
mod filter;
mod lookup;
mod queryset;

pub use executor::QueryExecutor;
pub use filter::{Condition, Filter, FilterEvaluator, Operand};
pub use lookup::{Lookup, LookupOp, ResolvedLookup, LOOKUP_SEP};
pub use queryset::{QuerySet, Restriction};
