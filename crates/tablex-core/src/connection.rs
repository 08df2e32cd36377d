//! Connection trait

use crate::{QueryResult, Result, Value};
use async_trait::async_trait;

/// A database connection able to run read queries.
///
/// The table browser only ever reads; writes, transactions and connection
/// management are owned by the host application.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "sqlite", "postgresql", "mysql")
    fn driver_name(&self) -> &str;

    /// Execute a query that returns rows (SELECT)
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Get the dialect identifier for this connection (e.g., "sqlite", "postgresql")
    ///
    /// Used to pick the SQL dialect the descriptor is rendered in. Returns None
    /// if the dialect is unknown, in which case `driver_name` is consulted.
    fn dialect_id(&self) -> Option<&'static str> {
        None
    }
}
