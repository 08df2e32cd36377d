//! Common test utilities and mocks

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tablex_core::{
    ColumnDescriptor, ColumnVariant, KeyValueStore, QueryDescriptor, Result, Row, RowPage,
    RowSource, SchemaSource, TableRef, TablexError, Value,
};

/// Row source serving `total_rows` numbered rows.
///
/// Each page can be given its own latency so tests can make an older request
/// resolve after a newer one.
pub struct MockRowSource {
    total_rows: Mutex<u64>,
    default_delay: Mutex<Duration>,
    page_delays: Mutex<HashMap<usize, Duration>>,
    should_fail: Mutex<bool>,
    /// Every descriptor received, in call order
    calls: Mutex<Vec<(TableRef, QueryDescriptor)>>,
}

impl MockRowSource {
    pub fn new(total_rows: u64) -> Self {
        Self {
            total_rows: Mutex::new(total_rows),
            default_delay: Mutex::new(Duration::ZERO),
            page_delays: Mutex::new(HashMap::new()),
            should_fail: Mutex::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        *self.default_delay.lock() = delay;
        self
    }

    pub fn with_page_delay(self, page_index: usize, delay: Duration) -> Self {
        self.page_delays.lock().insert(page_index, delay);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        *self.should_fail.lock() = failing;
    }

    pub fn set_total_rows(&self, total_rows: u64) {
        *self.total_rows.lock() = total_rows;
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls(&self) -> Vec<(TableRef, QueryDescriptor)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl RowSource for MockRowSource {
    async fn fetch_rows(&self, table: &TableRef, descriptor: &QueryDescriptor) -> Result<RowPage> {
        self.calls.lock().push((table.clone(), descriptor.clone()));

        let page_index = descriptor.pagination.page_index;
        let delay = self
            .page_delays
            .lock()
            .get(&page_index)
            .copied()
            .unwrap_or(*self.default_delay.lock());
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if *self.should_fail.lock() {
            return Err(TablexError::Query("backend unavailable".into()));
        }

        let total = *self.total_rows.lock();
        let page_size = descriptor.pagination.page_size;
        let start = descriptor.pagination.offset() as u64;
        let end = (start + page_size as u64).min(total);
        let rows = (start..end)
            .map(|id| Row::new(vec!["id".to_string()], vec![Value::Int64(id as i64)]))
            .collect();

        Ok(RowPage::new(rows).with_total_rows(total, page_size))
    }
}

/// First `id` value of a page, to tell pages apart
pub fn first_id(page: &RowPage) -> Option<i64> {
    page.rows.first().and_then(|row| row.get(0)).and_then(|v| v.as_i64())
}

pub struct MockSchemaSource {
    pub tables: HashMap<String, Vec<ColumnDescriptor>>,
}

impl MockSchemaSource {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }

    pub fn with_table(mut self, name: &str, columns: Vec<ColumnDescriptor>) -> Self {
        self.tables.insert(name.to_string(), columns);
        self
    }
}

#[async_trait]
impl SchemaSource for MockSchemaSource {
    async fn columns(&self, table: &TableRef) -> Result<Vec<ColumnDescriptor>> {
        self.tables
            .get(&table.name)
            .cloned()
            .ok_or_else(|| TablexError::NotFound(format!("table {}", table)))
    }
}

/// Store whose every call fails
pub struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(TablexError::Storage("database is locked".into()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Err(TablexError::Storage("database is locked".into()))
    }
}

pub fn users_table() -> TableRef {
    TableRef::new("users")
}

pub fn user_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::new("name", ColumnVariant::Text),
        ColumnDescriptor::new("age", ColumnVariant::Integer),
        ColumnDescriptor::new("active", ColumnVariant::Boolean),
        ColumnDescriptor::new("created_at", ColumnVariant::DateTime),
    ]
}

pub fn source(total_rows: u64) -> Arc<MockRowSource> {
    Arc::new(MockRowSource::new(total_rows))
}
