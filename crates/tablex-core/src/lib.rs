//! TableX Core - Core abstractions and types for the table browser
//!
//! This crate provides the fundamental types and collaborator traits that the
//! other TableX crates depend on. It defines:
//!
//! - `ColumnVariant` / `ColumnDescriptor` - Column metadata as seen by the grid
//! - `QueryDescriptor` - The normalized filter/sort/pagination request
//! - `Connection` - Trait for database connections
//! - `RowSource` / `SchemaSource` - Remote paged-row fetch and schema discovery
//! - `KeyValueStore` - Durable per-instance storage
//! - Common types like `Value`, `Row`, `RowPage`, etc.

mod column;
mod connection;
mod descriptor;
mod error;
mod source;
mod storage;
mod types;

pub use column::*;
pub use connection::*;
pub use descriptor::*;
pub use error::*;
pub use source::*;
pub use storage::*;
pub use types::*;
