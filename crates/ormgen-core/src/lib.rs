//! ormgen Core - Model catalog, query optimization, virtual joins and CRUD views.
//!
//! Given a catalog of entities and relations, this crate resolves declarative
//! field lists, turns them into optimized queries, joins record sets that have
//! no declared relation, and generates list/detail/create/update/delete views
//! and the routes that serve them.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod catalog;
pub mod config;
pub mod display;
pub mod error;
pub mod optimizer;
pub mod paginate;
pub mod query;
pub mod record;
pub mod resolver;
pub mod router;
pub mod storage;
pub mod value;
pub mod views;
pub mod virtual_join;

pub use catalog::{
    Cardinality, Catalog, EntityDef, FieldDef, FieldType, ModelField, OrderBy, OrderDirection,
    RelationDef, RelationField, RelationKind, ScalarType, SchemaBundle, PK_ALIAS,
};
pub use config::{ListViewConfig, ModelViewOptions, RouterConfig, ScaffoldConfig};
pub use display::{lookup_value, record_label, CellValue};
pub use error::Error;
pub use optimizer::{OptimizationPlan, QueryOptimizer};
pub use paginate::{page_size_from_param, Page, Paginator};
pub use query::{QuerySet, Restriction};
pub use record::{Attachment, Record, Related};
pub use resolver::{FieldDescriptor, FieldResolver, FieldSpec};
pub use router::{enabled_actions, Action, ActionMask, ActionOverrides, Router, UrlEntry};
pub use storage::{Backend, SledBackend, StorageConfig};
pub use value::Value;
pub use views::{
    ActionView, CreateView, DeleteOutcome, DeleteView, DetailView, EditOutcome, ListPage,
    ListView, QueryParams, Site, UpdateView,
};
pub use virtual_join::{JoinConfig, M2mConfig, RecordSource, VirtualRelation};
