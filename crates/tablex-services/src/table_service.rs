//! Table browsing service
//!
//! Answers the grid's page requests and schema lookups by running SQL on a
//! [`Connection`].

use std::sync::Arc;

use async_trait::async_trait;
use tablex_core::{
    ColumnDescriptor, ColumnMeta, Connection, QueryDescriptor, Row, RowPage, RowSource,
    SchemaSource, TableRef, Value,
};

use crate::error::{ServiceError, ServiceResult};
use crate::sql::{SqlDialect, render_columns, render_count, render_select};

/// Row source and schema source backed by a SQL connection
pub struct TableService {
    connection: Arc<dyn Connection>,
    dialect: SqlDialect,
    count_rows: bool,
}

impl TableService {
    /// Create a service for `connection`, failing if its dialect is not supported
    pub fn new(connection: Arc<dyn Connection>) -> ServiceResult<Self> {
        let dialect = SqlDialect::for_connection(connection.as_ref())?;
        Ok(Self {
            connection,
            dialect,
            count_rows: true,
        })
    }

    /// Whether to run `COUNT(*)` alongside each page.
    ///
    /// Without it the row total stays unknown and paging relies on whether the
    /// last page came back full.
    pub fn with_row_counts(mut self, count_rows: bool) -> Self {
        self.count_rows = count_rows;
        self
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// Fetch the descriptor's page and, when enabled, the total row count.
    ///
    /// A failed count is not fatal: the page is returned with an unknown total.
    #[tracing::instrument(skip_all, fields(table = %table, page_index = descriptor.pagination.page_index))]
    pub async fn browse(
        &self,
        table: &TableRef,
        descriptor: &QueryDescriptor,
    ) -> ServiceResult<RowPage> {
        let select = render_select(self.dialect, table, descriptor)?;
        tracing::debug!(sql = %select.sql, "browsing table");

        let (data_result, total_rows) = if self.count_rows {
            let count = render_count(self.dialect, table, descriptor)?;
            tracing::debug!(sql = %count.sql, "counting rows");

            let (data_result, count_result) = tokio::join!(
                self.connection.query(&select.sql, &select.params),
                self.connection.query(&count.sql, &count.params)
            );

            let total_rows = match count_result {
                Ok(result) => result.scalar_i64().and_then(|n| u64::try_from(n).ok()),
                Err(e) => {
                    tracing::warn!(error = %e, "COUNT(*) query failed, pagination total unavailable");
                    None
                }
            };
            (data_result, total_rows)
        } else {
            (self.connection.query(&select.sql, &select.params).await, None)
        };

        let result = data_result.map_err(|e| ServiceError::BrowseFailed(e.to_string()))?;
        tracing::debug!(rows = result.rows.len(), total_rows = ?total_rows, "table page loaded");

        let page = RowPage::new(result.rows);
        Ok(match total_rows {
            Some(total) => page.with_total_rows(total, descriptor.pagination.page_size),
            None => page,
        })
    }

    /// Discover the columns of `table`
    #[tracing::instrument(skip_all, fields(table = %table))]
    pub async fn load_columns(&self, table: &TableRef) -> ServiceResult<Vec<ColumnDescriptor>> {
        let query = render_columns(self.dialect, table);
        let result = self
            .connection
            .query(&query.sql, &query.params)
            .await
            .map_err(|e| ServiceError::SchemaLoadFailed(e.to_string()))?;

        let columns: Vec<ColumnDescriptor> = result
            .rows
            .iter()
            .enumerate()
            .filter_map(|(ordinal, row)| column_meta(self.dialect, ordinal, row))
            .map(|meta| ColumnDescriptor::from_meta(&meta))
            .collect();

        if columns.is_empty() {
            return Err(ServiceError::SchemaLoadFailed(format!(
                "table {} has no columns or does not exist",
                table
            )));
        }
        Ok(columns)
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn column_meta(dialect: SqlDialect, ordinal: usize, row: &Row) -> Option<ColumnMeta> {
    // PRAGMA table_info: cid, name, type, notnull, dflt_value, pk
    let (name, data_type, nullable) = match dialect {
        SqlDialect::Sqlite => (
            text(row.get(1))?,
            text(row.get(2)).unwrap_or_default(),
            row.get(3).and_then(|v| v.as_i64()) != Some(1),
        ),
        SqlDialect::Postgres | SqlDialect::MySql => (
            text(row.get(0))?,
            text(row.get(1)).unwrap_or_default(),
            text(row.get(2)).is_some_and(|v| v.eq_ignore_ascii_case("yes")),
        ),
    };

    Some(ColumnMeta {
        name,
        data_type,
        nullable,
        ordinal,
        ..ColumnMeta::default()
    })
}

#[async_trait]
impl RowSource for TableService {
    async fn fetch_rows(
        &self,
        table: &TableRef,
        descriptor: &QueryDescriptor,
    ) -> tablex_core::Result<RowPage> {
        Ok(self.browse(table, descriptor).await?)
    }
}

#[async_trait]
impl SchemaSource for TableService {
    async fn columns(&self, table: &TableRef) -> tablex_core::Result<Vec<ColumnDescriptor>> {
        Ok(self.load_columns(table).await?)
    }
}

impl std::fmt::Debug for TableService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableService")
            .field("driver", &self.connection.driver_name())
            .field("dialect", &self.dialect)
            .field("count_rows", &self.count_rows)
            .finish()
    }
}
