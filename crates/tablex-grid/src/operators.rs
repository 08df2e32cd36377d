//! Column type registry: which filter operators each column variant accepts

use tablex_core::{ColumnVariant, FilterOperator};

const TEXT_OPERATORS: &[FilterOperator] = &[
    FilterOperator::Like,
    FilterOperator::NotLike,
    FilterOperator::Eq,
    FilterOperator::Ne,
    FilterOperator::IsEmpty,
    FilterOperator::IsNotEmpty,
];

const NUMERIC_OPERATORS: &[FilterOperator] = &[
    FilterOperator::Eq,
    FilterOperator::Ne,
    FilterOperator::Lt,
    FilterOperator::Lte,
    FilterOperator::Gt,
    FilterOperator::Gte,
    FilterOperator::Between,
    FilterOperator::IsEmpty,
    FilterOperator::IsNotEmpty,
];

const TEMPORAL_OPERATORS: &[FilterOperator] = &[
    FilterOperator::Eq,
    FilterOperator::Ne,
    FilterOperator::Lt,
    FilterOperator::Gt,
    FilterOperator::Lte,
    FilterOperator::Gte,
    FilterOperator::Between,
    FilterOperator::IsEmpty,
    FilterOperator::IsNotEmpty,
];

const BOOLEAN_OPERATORS: &[FilterOperator] = &[FilterOperator::Eq, FilterOperator::Ne];

const BINARY_OPERATORS: &[FilterOperator] = &[FilterOperator::IsEmpty, FilterOperator::IsNotEmpty];

/// Operators permitted for a column variant, in display order
pub fn operators_for(variant: ColumnVariant) -> &'static [FilterOperator] {
    match variant {
        ColumnVariant::Text
        | ColumnVariant::Uuid
        | ColumnVariant::Json
        | ColumnVariant::Enumerated => TEXT_OPERATORS,
        ColumnVariant::Integer | ColumnVariant::Float => NUMERIC_OPERATORS,
        ColumnVariant::Date | ColumnVariant::DateTime | ColumnVariant::Time => TEMPORAL_OPERATORS,
        ColumnVariant::Boolean => BOOLEAN_OPERATORS,
        ColumnVariant::Binary => BINARY_OPERATORS,
        ColumnVariant::Unsupported => &[],
    }
}

/// Operator a freshly added clause starts with. `None` for unfilterable variants.
pub fn default_operator_for(variant: ColumnVariant) -> Option<FilterOperator> {
    match variant {
        ColumnVariant::Text | ColumnVariant::Json => Some(FilterOperator::Like),
        ColumnVariant::Uuid | ColumnVariant::Enumerated => Some(FilterOperator::Eq),
        ColumnVariant::Integer
        | ColumnVariant::Float
        | ColumnVariant::Date
        | ColumnVariant::DateTime
        | ColumnVariant::Time
        | ColumnVariant::Boolean => Some(FilterOperator::Eq),
        ColumnVariant::Binary => Some(FilterOperator::IsNotEmpty),
        ColumnVariant::Unsupported => None,
    }
}

pub fn is_operator_allowed(variant: ColumnVariant, operator: FilterOperator) -> bool {
    operators_for(variant).contains(&operator)
}

/// Display label for an operator as offered on a column of the given variant
pub fn operator_label(variant: ColumnVariant, operator: FilterOperator) -> &'static str {
    match (variant, operator) {
        (ColumnVariant::Boolean, FilterOperator::Eq) => "Is",
        (ColumnVariant::Boolean, FilterOperator::Ne) => "Is not",
        (v, FilterOperator::Ne) if v.is_textual() => "Not Equals",
        (v, FilterOperator::Lt) if v.is_temporal() => "Is before",
        (v, FilterOperator::Gt) if v.is_temporal() => "Is after",
        (v, FilterOperator::Lte) if v.is_temporal() => "Is on or before",
        (v, FilterOperator::Gte) if v.is_temporal() => "Is on or after",
        (_, op) => op.label(),
    }
}
