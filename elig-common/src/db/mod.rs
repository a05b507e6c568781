//! Warehouse database layer

pub mod init;
pub mod schema_sync;
pub mod table_schemas;

pub use init::{open_in_memory, open_warehouse, provision_warehouse, verify_required_tables};
pub use schema_sync::{ColumnDefinition, SchemaIntrospector, SchemaSync, TableSchema};
