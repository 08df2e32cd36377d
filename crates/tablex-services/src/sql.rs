//! Rendering query descriptors to SQL
//!
//! A [`QueryDescriptor`] is turned into a parameterized `SELECT` for the requested
//! page and a matching `COUNT(*)` for the total, in the dialect of the connection.

use sea_query::{
    Alias, Asterisk, Cond, Expr, Func, MysqlQueryBuilder, Order, PostgresQueryBuilder, Query,
    QueryStatementWriter, SelectStatement, SimpleExpr, SqliteQueryBuilder,
};
use serde_json::Value as Json;
use tablex_core::{
    Connection, DescriptorFilter, FilterOperator, JoinOperator, PredicateValue, QueryDescriptor,
    SortDirection, TableRef, Value,
};

use crate::error::{ServiceError, ServiceResult};

/// SQL dialects the browser can render for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    Postgres,
    MySql,
    Sqlite,
}

impl SqlDialect {
    /// Resolve a dialect from a driver or dialect name
    pub fn from_name(name: &str) -> ServiceResult<Self> {
        match name.to_lowercase().as_str() {
            "postgres" | "postgresql" | "redshift" | "cockroachdb" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::MySql),
            "sqlite" | "sqlite3" | "libsql" => Ok(Self::Sqlite),
            other => Err(ServiceError::UnsupportedDialect(other.to_string())),
        }
    }

    /// Dialect of a connection, preferring its dialect id over its driver name
    pub fn for_connection(connection: &dyn Connection) -> ServiceResult<Self> {
        match connection.dialect_id() {
            Some(id) => Self::from_name(id),
            None => Self::from_name(connection.driver_name()),
        }
    }

    fn build(&self, statement: &SelectStatement) -> (String, Vec<Value>) {
        let (sql, values) = match self {
            Self::Postgres => statement.build(PostgresQueryBuilder),
            Self::MySql => statement.build(MysqlQueryBuilder),
            Self::Sqlite => statement.build(SqliteQueryBuilder),
        };
        (sql, values.0.into_iter().map(from_sea_value).collect())
    }
}

/// A rendered statement with its bound parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

impl From<(String, Vec<Value>)> for RenderedQuery {
    fn from((sql, params): (String, Vec<Value>)) -> Self {
        Self { sql, params }
    }
}

/// `SELECT *` for the descriptor's page: filters, sort, `LIMIT` and `OFFSET`
pub fn render_select(
    dialect: SqlDialect,
    table: &TableRef,
    descriptor: &QueryDescriptor,
) -> ServiceResult<RenderedQuery> {
    let mut statement = Query::select();
    statement.column(Asterisk);
    from_table(&mut statement, table);
    apply_filters(&mut statement, descriptor)?;

    for clause in &descriptor.sort {
        let order = match clause.direction {
            SortDirection::Ascending => Order::Asc,
            SortDirection::Descending => Order::Desc,
        };
        statement.order_by(Alias::new(clause.column.as_str()), order);
    }

    statement
        .limit(descriptor.pagination.page_size as u64)
        .offset(descriptor.pagination.offset() as u64);

    Ok(dialect.build(&statement).into())
}

/// `SELECT COUNT(*)` over the descriptor's filters, ignoring sort and paging
pub fn render_count(
    dialect: SqlDialect,
    table: &TableRef,
    descriptor: &QueryDescriptor,
) -> ServiceResult<RenderedQuery> {
    let mut statement = Query::select();
    statement.expr(Func::count(Expr::col(Asterisk)));
    from_table(&mut statement, table);
    apply_filters(&mut statement, descriptor)?;

    Ok(dialect.build(&statement).into())
}

/// Column name, type and nullability of `table`, in ordinal order.
///
/// SQLite answers through `PRAGMA table_info`, the others through
/// `information_schema.columns`.
pub fn render_columns(dialect: SqlDialect, table: &TableRef) -> RenderedQuery {
    if dialect == SqlDialect::Sqlite {
        let target = match &table.schema {
            Some(schema) => format!("{}.table_info({})", quote(schema), quote(&table.name)),
            None => format!("table_info({})", quote(&table.name)),
        };
        return RenderedQuery {
            sql: format!("PRAGMA {}", target),
            params: Vec::new(),
        };
    }

    // MySQL's column_type keeps enum members and tinyint(1)
    let type_column = match dialect {
        SqlDialect::MySql => "column_type",
        _ => "data_type",
    };
    let current_schema = match dialect {
        SqlDialect::MySql => "DATABASE()",
        _ => "current_schema()",
    };

    let mut statement = Query::select();
    statement
        .columns([
            Alias::new("column_name"),
            Alias::new(type_column),
            Alias::new("is_nullable"),
        ])
        .from((Alias::new("information_schema"), Alias::new("columns")))
        .and_where(Expr::col(Alias::new("table_name")).eq(table.name.as_str()));
    match &table.schema {
        Some(schema) => {
            statement.and_where(Expr::col(Alias::new("table_schema")).eq(schema.as_str()))
        }
        None => statement.and_where(Expr::col(Alias::new("table_schema")).eq(Expr::cust(current_schema))),
    };
    statement.order_by(Alias::new("ordinal_position"), Order::Asc);

    dialect.build(&statement).into()
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn from_table(statement: &mut SelectStatement, table: &TableRef) {
    match &table.schema {
        Some(schema) => statement.from((Alias::new(schema.as_str()), Alias::new(table.name.as_str()))),
        None => statement.from(Alias::new(table.name.as_str())),
    };
}

fn apply_filters(statement: &mut SelectStatement, descriptor: &QueryDescriptor) -> ServiceResult<()> {
    if descriptor.filters.is_empty() {
        return Ok(());
    }

    let mut condition = match descriptor.join_operator {
        JoinOperator::And => Cond::all(),
        JoinOperator::Or => Cond::any(),
    };
    for filter in &descriptor.filters {
        condition = condition.add(filter_expr(filter)?);
    }
    statement.cond_where(condition);
    Ok(())
}

fn filter_expr(filter: &DescriptorFilter) -> ServiceResult<SimpleExpr> {
    let column = Expr::col(Alias::new(filter.column.as_str()));
    let invalid = |reason: &str| ServiceError::InvalidFilter {
        column: filter.column.clone(),
        reason: reason.to_string(),
    };
    let scalar = || match &filter.value {
        PredicateValue::Scalar(value) => Ok(value),
        _ => Err(invalid("expected a single value")),
    };

    let expr = match filter.operator {
        // Patterns are passed through; the user types the wildcards
        FilterOperator::Like => column.like(pattern(scalar()?)),
        FilterOperator::NotLike => column.not_like(pattern(scalar()?)),
        FilterOperator::Eq => column.eq(to_sea_value(scalar()?)),
        FilterOperator::Ne => column.ne(to_sea_value(scalar()?)),
        FilterOperator::Lt => column.lt(to_sea_value(scalar()?)),
        FilterOperator::Lte => column.lte(to_sea_value(scalar()?)),
        FilterOperator::Gt => column.gt(to_sea_value(scalar()?)),
        FilterOperator::Gte => column.gte(to_sea_value(scalar()?)),
        FilterOperator::Between => match &filter.value {
            PredicateValue::Pair(low, high) => {
                column.between(to_sea_value(low), to_sea_value(high))
            }
            _ => return Err(invalid("expected two values")),
        },
        FilterOperator::IsEmpty => column.is_null(),
        FilterOperator::IsNotEmpty => column.is_not_null(),
    };
    Ok(expr)
}

fn pattern(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn to_sea_value(value: &Json) -> sea_query::Value {
    match value {
        Json::Bool(b) => sea_query::Value::Bool(Some(*b)),
        Json::Number(n) => match n.as_i64() {
            Some(i) => sea_query::Value::BigInt(Some(i)),
            None => sea_query::Value::Double(n.as_f64()),
        },
        Json::String(s) => s.as_str().into(),
        Json::Null => sea_query::Value::String(None),
        other => other.to_string().into(),
    }
}

fn from_sea_value(value: sea_query::Value) -> Value {
    match value {
        sea_query::Value::Bool(Some(b)) => Value::Bool(b),
        sea_query::Value::Int(Some(i)) => Value::Int64(i64::from(i)),
        sea_query::Value::BigInt(Some(i)) => Value::Int64(i),
        sea_query::Value::Unsigned(Some(u)) => Value::Int64(i64::from(u)),
        // LIMIT and OFFSET are bound as unsigned
        sea_query::Value::BigUnsigned(Some(u)) => match i64::try_from(u) {
            Ok(i) => Value::Int64(i),
            Err(_) => Value::Decimal(u.to_string()),
        },
        sea_query::Value::Float(Some(f)) => Value::Float64(f64::from(f)),
        sea_query::Value::Double(Some(f)) => Value::Float64(f),
        sea_query::Value::String(Some(s)) => Value::String(s.to_string()),
        _ => Value::Null,
    }
}
