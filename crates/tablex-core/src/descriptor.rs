//! The query descriptor: filters, sort and pagination as sent to a row source

use serde::{Deserialize, Serialize};

/// Comparison operators available to filter clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    Like,
    NotLike,
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Between,
    IsEmpty,
    IsNotEmpty,
}

/// How many values an operator consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorArity {
    None,
    One,
    Two,
}

impl FilterOperator {
    /// Get the display label for the operator
    pub fn label(&self) -> &'static str {
        match self {
            Self::Like => "Like",
            Self::NotLike => "Not like",
            Self::Eq => "Equals",
            Self::Ne => "Not equals",
            Self::Lt => "Is less than",
            Self::Lte => "Is less than or equal to",
            Self::Gt => "Is greater than",
            Self::Gte => "Is greater than or equal to",
            Self::Between => "Is between",
            Self::IsEmpty => "Is empty",
            Self::IsNotEmpty => "Is not empty",
        }
    }

    /// Wire name, as used in the serialized descriptor
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::NotLike => "notLike",
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Between => "between",
            Self::IsEmpty => "isEmpty",
            Self::IsNotEmpty => "isNotEmpty",
        }
    }

    pub fn arity(&self) -> OperatorArity {
        match self {
            Self::IsEmpty | Self::IsNotEmpty => OperatorArity::None,
            Self::Between => OperatorArity::Two,
            _ => OperatorArity::One,
        }
    }

    /// Returns true if this operator requires a value input
    pub fn requires_value(&self) -> bool {
        self.arity() != OperatorArity::None
    }

    /// Returns true if this operator requires two values (for BETWEEN)
    pub fn requires_two_values(&self) -> bool {
        self.arity() == OperatorArity::Two
    }
}

impl std::fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical operator combining every filter clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JoinOperator {
    #[default]
    And,
    Or,
}

impl JoinOperator {
    pub fn label(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }

    pub fn toggle(&self) -> Self {
        match self {
            Self::And => Self::Or,
            Self::Or => Self::And,
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }

    pub fn toggle(&self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

/// A single sort criterion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortClause {
    pub column: String,
    pub direction: SortDirection,
}

impl SortClause {
    pub fn new(column: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }

    pub fn ascending(column: impl Into<String>) -> Self {
        Self::new(column, SortDirection::Ascending)
    }

    pub fn descending(column: impl Into<String>) -> Self {
        Self::new(column, SortDirection::Descending)
    }
}

/// Page index and size of the requested window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationData {
    pub page_index: usize,
    pub page_size: usize,
}

impl PaginationData {
    pub fn new(page_index: usize, page_size: usize) -> Self {
        Self {
            page_index,
            page_size,
        }
    }

    /// Number of rows skipped before this page
    pub fn offset(&self) -> usize {
        self.page_index.saturating_mul(self.page_size)
    }
}

impl Default for PaginationData {
    fn default() -> Self {
        Self::new(0, 10)
    }
}

/// The value side of a predicate.
///
/// Serialized as `null`, a bare JSON value, or a two-element array.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredicateValue {
    #[default]
    Empty,
    Pair(serde_json::Value, serde_json::Value),
    Scalar(serde_json::Value),
}

impl PredicateValue {
    /// A scalar holding a string, as typed into an input
    pub fn text(value: impl Into<String>) -> Self {
        Self::Scalar(serde_json::Value::String(value.into()))
    }

    pub fn pair(low: impl Into<serde_json::Value>, high: impl Into<serde_json::Value>) -> Self {
        Self::Pair(low.into(), high.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn as_scalar(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_pair(&self) -> Option<(&serde_json::Value, &serde_json::Value)> {
        match self {
            Self::Pair(low, high) => Some((low, high)),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for PredicateValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Empty,
            serde_json::Value::Array(mut items) if items.len() == 2 => {
                let high = items.pop().unwrap_or_default();
                let low = items.pop().unwrap_or_default();
                Self::Pair(low, high)
            }
            other => Self::Scalar(other),
        }
    }
}

/// A complete predicate as transmitted to the row source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorFilter {
    pub column: String,
    pub operator: FilterOperator,
    pub value: PredicateValue,
}

/// The normalized request for one page of rows.
///
/// Always replaced wholesale; two descriptors that compare equal fetch the same page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDescriptor {
    pub filters: Vec<DescriptorFilter>,
    pub sort: Vec<SortClause>,
    pub pagination: PaginationData,
    pub join_operator: JoinOperator,
}

impl QueryDescriptor {
    /// Stable identity used to key cached pages
    pub fn cache_key(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }

    /// Same filters and sort, ignoring which page is requested
    pub fn same_row_set(&self, other: &QueryDescriptor) -> bool {
        self.filters == other.filters
            && self.sort == other.sort
            && self.join_operator == other.join_operator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_descriptor_wire_format() {
        let descriptor = QueryDescriptor {
            filters: vec![DescriptorFilter {
                column: "age".to_string(),
                operator: FilterOperator::Between,
                value: PredicateValue::pair(18, 30),
            }],
            sort: vec![SortClause::descending("name")],
            pagination: PaginationData::new(2, 25),
            join_operator: JoinOperator::Or,
        };

        assert_eq!(
            serde_json::to_value(&descriptor).unwrap(),
            json!({
                "filters": [{"column": "age", "operator": "between", "value": [18, 30]}],
                "sort": [{"column": "name", "direction": "descending"}],
                "pagination": {"pageIndex": 2, "pageSize": 25},
                "joinOperator": "or"
            })
        );
    }

    #[test]
    fn test_predicate_value_deserialize_shapes() {
        let empty: PredicateValue = serde_json::from_value(json!(null)).unwrap();
        assert_eq!(empty, PredicateValue::Empty);

        let pair: PredicateValue = serde_json::from_value(json!([1, 2])).unwrap();
        assert_eq!(pair, PredicateValue::pair(1, 2));

        let scalar: PredicateValue = serde_json::from_value(json!("abc")).unwrap();
        assert_eq!(scalar, PredicateValue::text("abc"));
    }

    #[test]
    fn test_predicate_value_from_json() {
        assert_eq!(PredicateValue::from(json!([18, 30])), PredicateValue::pair(18, 30));
        assert_eq!(PredicateValue::from(json!(null)), PredicateValue::Empty);
        assert_eq!(PredicateValue::from(json!(5)), PredicateValue::Scalar(json!(5)));
    }

    #[test]
    fn test_operator_arity() {
        assert_eq!(FilterOperator::IsEmpty.arity(), OperatorArity::None);
        assert_eq!(FilterOperator::Between.arity(), OperatorArity::Two);
        assert_eq!(FilterOperator::Like.arity(), OperatorArity::One);
        assert!(!FilterOperator::IsNotEmpty.requires_value());
        assert!(FilterOperator::Between.requires_two_values());
    }

    #[test]
    fn test_cache_key_distinguishes_pages() {
        let first = QueryDescriptor::default();
        let second = QueryDescriptor {
            pagination: PaginationData::new(1, 10),
            ..QueryDescriptor::default()
        };
        assert_ne!(first.cache_key(), second.cache_key());
        assert!(first.same_row_set(&second));
    }

    #[test]
    fn test_join_operator_toggle() {
        assert_eq!(JoinOperator::default(), JoinOperator::And);
        assert_eq!(JoinOperator::And.toggle(), JoinOperator::Or);
        assert_eq!(JoinOperator::Or.sql(), "OR");
    }
}
