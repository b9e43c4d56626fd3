//! Storage layer for ormgen.
//!
//! Rows are read and written through the [`Backend`] trait. The bundled
//! [`SledBackend`] keeps one sled tree per entity.

mod backend;
mod config;

pub mod key;

pub use backend::{Backend, SledBackend};
pub use config::StorageConfig;
