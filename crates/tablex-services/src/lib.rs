//! TableX Services
//!
//! Connects the grid controller to a SQL database.
//!
//! - [`TableService`] - [`RowSource`] and [`SchemaSource`] over a [`Connection`]
//! - [`render_select`] / [`render_count`] - Descriptor to parameterized SQL
//! - [`SqliteKeyValueStore`] - Durable view state
//! - [`logging`] - Subscriber setup for embedding applications
//!
//! [`RowSource`]: tablex_core::RowSource
//! [`SchemaSource`]: tablex_core::SchemaSource
//! [`Connection`]: tablex_core::Connection

mod error;
pub mod logging;
mod sql;
mod storage;
mod table_service;

pub use error::{ServiceError, ServiceResult};
pub use sql::{RenderedQuery, SqlDialect, render_columns, render_count, render_select};
pub use storage::SqliteKeyValueStore;
pub use table_service::TableService;
