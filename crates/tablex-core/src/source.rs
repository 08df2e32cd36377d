//! Remote collaborators: paged-row fetch, schema discovery and change notifications

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{ColumnDescriptor, QueryDescriptor, Result, Row};

/// Identity of one table inside a data source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    /// Schema/database qualifier, if the source has one
    pub schema: Option<String>,
    pub name: String,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// `schema.name`, or just `name`
    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.qualified_name())
    }
}

/// One page of rows returned for a descriptor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowPage {
    pub rows: Vec<Row>,
    /// Total number of pages for the descriptor's filters, if known
    pub total_page_count: Option<usize>,
    /// Total number of matching rows, if known
    pub total_row_count: Option<u64>,
}

impl RowPage {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            total_page_count: None,
            total_row_count: None,
        }
    }

    /// Attach the total row count and derive the page count from it
    pub fn with_total_rows(mut self, total_rows: u64, page_size: usize) -> Self {
        self.total_row_count = Some(total_rows);
        self.total_page_count = Some(page_count(total_rows, page_size));
        self
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// `ceil(total_rows / page_size)`; zero when the page size is zero
pub fn page_count(total_rows: u64, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    total_rows.div_ceil(page_size as u64) as usize
}

/// Fetches one page of rows for a descriptor.
///
/// Implementations must be deterministic for identical descriptors as long as the
/// underlying data does not change.
#[async_trait]
pub trait RowSource: Send + Sync {
    async fn fetch_rows(&self, table: &TableRef, descriptor: &QueryDescriptor) -> Result<RowPage>;
}

/// Discovers the ordered columns of a table
#[async_trait]
pub trait SchemaSource: Send + Sync {
    async fn columns(&self, table: &TableRef) -> Result<Vec<ColumnDescriptor>>;
}

/// Published when rows of a table changed outside the view
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChangeNotification {
    /// The changed table; `None` means every table may have changed
    pub table: Option<String>,
}

impl ChangeNotification {
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            table: Some(name.into()),
        }
    }

    pub fn all() -> Self {
        Self { table: None }
    }

    /// Whether this notification concerns the given table
    pub fn affects(&self, table: &TableRef) -> bool {
        match &self.table {
            None => true,
            Some(name) => *name == table.name || *name == table.qualified_name(),
        }
    }
}
