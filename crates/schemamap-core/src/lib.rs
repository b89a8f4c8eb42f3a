//! `schemamap-core` is the core library for `schemamap`, which converts GeMS habitat
//! feature collections into the JNCC attribute schema.
//!
//! This crate includes:
//! - **Feature tables**: Arrow-backed collections with field aliases and a geometry column.
//! - **Stores**: A directory of `GeoJSON` files or an in-memory workspace, both exposing
//!   the same copy / rename / add / calculate field primitives.
//! - **Mapping**: The GeMS → JNCC field mapping, constant values and target schemas,
//!   and the mapper that applies them.
//!
//! The `mapper` module is the entry point consumed by the CLI.

pub mod codec;
pub mod config;
pub mod error;
pub mod expression;
pub mod mapper;
pub mod schema;
pub mod store;
pub mod table;
pub mod types;

pub use config::{MappingConfig, MappingOptions, MappingPlan};
pub use error::{Result, SchemaMapError};
pub use mapper::{MappingReport, SchemaMapper, map_to_schema};
pub use schema::GeometryKind;
pub use store::{FeatureStore, GeoJsonWorkspace, MemoryStore};
