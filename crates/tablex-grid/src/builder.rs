//! Query descriptor builder
//!
//! Combines the filter list, sort list and pagination window into the descriptor
//! a row source receives. Clauses that are still being typed (a `between` with one
//! bound, a number field holding `"12a"`) stay visible in the list but are left out
//! of the descriptor.

use serde_json::Value as Json;
use tablex_core::{
    ColumnVariant, DescriptorFilter, JoinOperator, OperatorArity, PaginationData,
    PredicateValue, QueryDescriptor, SortClause,
};

use crate::filter_list::FilterClause;

/// Why a clause is left out of the descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncompleteReason {
    /// No value entered yet
    MissingValue,
    /// A range with only its lower bound
    MissingSecondValue,
    /// The value does not parse for the column's variant
    InvalidValue,
    /// A range given to a single-value operator
    ShapeMismatch,
}

impl IncompleteReason {
    pub fn message(&self) -> &'static str {
        match self {
            Self::MissingValue => "Enter a value",
            Self::MissingSecondValue => "Enter the second value",
            Self::InvalidValue => "Value does not match the column type",
            Self::ShapeMismatch => "Operator takes a single value",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseStatus {
    Complete,
    Incomplete(IncompleteReason),
}

impl ClauseStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

pub fn clause_status(clause: &FilterClause) -> ClauseStatus {
    match transmitted_value(clause) {
        Ok(_) => ClauseStatus::Complete,
        Err(reason) => ClauseStatus::Incomplete(reason),
    }
}

/// Build the descriptor for the given state. List order is preserved.
pub fn build_descriptor(
    filters: &[FilterClause],
    sort: &[SortClause],
    pagination: PaginationData,
    join_operator: JoinOperator,
) -> QueryDescriptor {
    let filters: Vec<DescriptorFilter> = filters
        .iter()
        .filter_map(|clause| {
            let value = transmitted_value(clause).ok()?;
            Some(DescriptorFilter {
                column: clause.column_id.clone(),
                operator: clause.operator,
                value,
            })
        })
        .collect();

    QueryDescriptor {
        filters,
        sort: sort.to_vec(),
        pagination,
        join_operator,
    }
}

/// The value sent for a clause, coerced to its variant
fn transmitted_value(clause: &FilterClause) -> Result<PredicateValue, IncompleteReason> {
    match (clause.operator.arity(), &clause.value) {
        (OperatorArity::None, _) => Ok(PredicateValue::Empty),
        (_, PredicateValue::Empty) => Err(IncompleteReason::MissingValue),
        (OperatorArity::One, PredicateValue::Scalar(v)) => {
            coerce(clause.variant, v).map(PredicateValue::Scalar)
        }
        (OperatorArity::One, PredicateValue::Pair(..)) => Err(IncompleteReason::ShapeMismatch),
        (OperatorArity::Two, PredicateValue::Scalar(v)) => {
            coerce(clause.variant, v)?;
            Err(IncompleteReason::MissingSecondValue)
        }
        (OperatorArity::Two, PredicateValue::Pair(low, high)) => {
            let low = coerce(clause.variant, low)?;
            let high = coerce(clause.variant, high).map_err(|reason| match reason {
                IncompleteReason::MissingValue => IncompleteReason::MissingSecondValue,
                other => other,
            })?;
            Ok(PredicateValue::Pair(low, high))
        }
    }
}

fn is_missing(value: &Json) -> bool {
    match value {
        Json::Null => true,
        Json::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Coerce one input value to the representation its column variant expects
fn coerce(variant: ColumnVariant, value: &Json) -> Result<Json, IncompleteReason> {
    if is_missing(value) {
        return Err(IncompleteReason::MissingValue);
    }

    match (variant, value) {
        (ColumnVariant::Integer, Json::Number(n)) if n.is_i64() || n.is_u64() => Ok(value.clone()),
        (ColumnVariant::Integer, Json::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Json::from)
            .map_err(|_| IncompleteReason::InvalidValue),
        (ColumnVariant::Integer, _) => Err(IncompleteReason::InvalidValue),

        (ColumnVariant::Float, Json::Number(_)) => Ok(value.clone()),
        (ColumnVariant::Float, Json::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Json::Number)
            .ok_or(IncompleteReason::InvalidValue),
        (ColumnVariant::Float, _) => Err(IncompleteReason::InvalidValue),

        (ColumnVariant::Boolean, Json::Bool(_)) => Ok(value.clone()),
        (ColumnVariant::Boolean, Json::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" => Ok(Json::Bool(true)),
            "false" => Ok(Json::Bool(false)),
            _ => Err(IncompleteReason::InvalidValue),
        },
        (ColumnVariant::Boolean, _) => Err(IncompleteReason::InvalidValue),

        (_, Json::Array(_) | Json::Object(_)) => Err(IncompleteReason::InvalidValue),
        _ => Ok(value.clone()),
    }
}
