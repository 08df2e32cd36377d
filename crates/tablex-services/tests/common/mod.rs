//! Common test utilities and mocks

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use tablex_core::{ColumnMeta, Connection, QueryResult, Result, Row, TablexError, Value};

/// Mock connection for testing service-layer logic without a real database.
///
/// Queries containing a registered pattern get that pattern's response; any
/// other query gets the default result.
pub struct MockConnection {
    pub driver: String,
    pub should_fail: bool,
    /// Queries containing one of these patterns fail
    pub failing_patterns: Vec<String>,
    /// Default query result returned when no pattern matches
    pub query_results: Vec<QueryResult>,
    /// SQL-pattern-based responses: if a query contains the pattern string,
    /// the corresponding result is returned instead of the default.
    pub query_responses: Vec<(String, QueryResult)>,
    /// Log of all SQL queries executed with their parameters
    pub query_log: Arc<parking_lot::Mutex<Vec<(String, Vec<Value>)>>>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self {
            driver: "sqlite".to_string(),
            should_fail: false,
            failing_patterns: vec![],
            query_results: vec![],
            query_responses: vec![],
            query_log: Arc::new(parking_lot::Mutex::new(Vec::new())),
        }
    }

    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = driver.into();
        self
    }

    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    pub fn with_failure_on(mut self, sql_contains: impl Into<String>) -> Self {
        self.failing_patterns.push(sql_contains.into());
        self
    }

    pub fn with_result(mut self, result: QueryResult) -> Self {
        self.query_results.push(result);
        self
    }

    /// Register a response for queries containing the given SQL pattern.
    pub fn with_query_response(
        mut self,
        sql_contains: impl Into<String>,
        result: QueryResult,
    ) -> Self {
        self.query_responses.push((sql_contains.into(), result));
        self
    }

    pub fn query_count(&self) -> usize {
        self.query_log.lock().len()
    }

    pub fn query_log(&self) -> Vec<(String, Vec<Value>)> {
        self.query_log.lock().clone()
    }

    /// The logged query containing `pattern`
    pub fn find_query(&self, pattern: &str) -> Option<(String, Vec<Value>)> {
        self.query_log
            .lock()
            .iter()
            .find(|(sql, _)| sql.contains(pattern))
            .cloned()
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        &self.driver
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.query_log.lock().push((sql.to_string(), params.to_vec()));

        if self.should_fail || self.failing_patterns.iter().any(|p| sql.contains(p.as_str())) {
            return Err(TablexError::Query("Query failed".into()));
        }

        for (pattern, result) in &self.query_responses {
            if sql.contains(pattern.as_str()) {
                return Ok(result.clone());
            }
        }

        Ok(self.query_results.first().cloned().unwrap_or_default())
    }
}

pub fn mock_query_result(column_names: Vec<&str>, row_data: Vec<Vec<Value>>) -> QueryResult {
    let columns: Vec<ColumnMeta> = column_names
        .iter()
        .enumerate()
        .map(|(i, name)| ColumnMeta {
            name: name.to_string(),
            data_type: "TEXT".to_string(),
            nullable: true,
            ordinal: i,
            ..ColumnMeta::default()
        })
        .collect();

    let rows: Vec<Row> = row_data
        .into_iter()
        .map(|values| Row::new(column_names.iter().map(|s| s.to_string()).collect(), values))
        .collect();

    QueryResult {
        columns,
        rows,
        total_rows: None,
        execution_time_ms: 0,
    }
}

pub fn count_result(count: i64) -> QueryResult {
    mock_query_result(vec!["count"], vec![vec![Value::Int64(count)]])
}

pub fn rows_result() -> QueryResult {
    mock_query_result(
        vec!["id", "name"],
        vec![
            vec![Value::Int64(1), Value::String("Alice".into())],
            vec![Value::Int64(2), Value::String("Bob".into())],
        ],
    )
}
