//! The filter clause list and its edit operations

use tablex_core::{
    ColumnDescriptor, ColumnVariant, FilterOperator, JoinOperator, OperatorArity, PredicateValue,
};

use crate::builder::{ClauseStatus, clause_status};
use crate::operators::{default_operator_for, is_operator_allowed};

const FILTER_ID_LENGTH: usize = 8;

const ALPHANUMERIC: [char; 62] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h',
    'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R',
    'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
];

/// One column/operator/value predicate
#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    /// Opaque identifier, unique within its list
    pub filter_id: String,
    pub column_id: String,
    pub variant: ColumnVariant,
    pub operator: FilterOperator,
    pub value: PredicateValue,
}

impl FilterClause {
    pub fn status(&self) -> ClauseStatus {
        clause_status(self)
    }
}

/// Partial update of a clause; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterPatch {
    pub column_id: Option<String>,
    pub operator: Option<FilterOperator>,
    pub value: Option<PredicateValue>,
}

impl FilterPatch {
    pub fn column(column_id: impl Into<String>) -> Self {
        Self {
            column_id: Some(column_id.into()),
            ..Default::default()
        }
    }

    pub fn operator(operator: FilterOperator) -> Self {
        Self {
            operator: Some(operator),
            ..Default::default()
        }
    }

    pub fn value(value: impl Into<PredicateValue>) -> Self {
        Self {
            value: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn with_value(mut self, value: impl Into<PredicateValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_operator(mut self, operator: FilterOperator) -> Self {
        self.operator = Some(operator);
        self
    }
}

/// Where keyboard focus should go after a removal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusTarget {
    /// The "add filter" button
    AddFilter,
    /// The clause that took the removed clause's place
    Clause(String),
}

/// Connective shown in front of the clause at a given position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinLabel {
    /// First clause, no connective
    Where,
    /// Second clause, hosts the control that changes the global operator
    Editable(JoinOperator),
    /// Later clauses echo the global operator
    ReadOnly(JoinOperator),
}

/// Ordered filter clauses plus one join operator applied across all of them
#[derive(Debug, Clone, Default)]
pub struct FilterList {
    clauses: Vec<FilterClause>,
    join_operator: JoinOperator,
    columns: Vec<ColumnDescriptor>,
}

impl FilterList {
    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            columns,
            ..Default::default()
        }
    }

    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }

    pub fn get(&self, filter_id: &str) -> Option<&FilterClause> {
        self.clauses.iter().find(|c| c.filter_id == filter_id)
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn join_operator(&self) -> JoinOperator {
        self.join_operator
    }

    pub fn set_join_operator(&mut self, join_operator: JoinOperator) {
        self.join_operator = join_operator;
    }

    /// Columns a clause may reference
    pub fn filterable_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|c| c.is_filterable())
    }

    /// Append a clause on the first filterable column, with that column's default
    /// operator and no value. Returns the new clause's id.
    pub fn add(&mut self) -> Option<String> {
        let column = self.filterable_columns().next()?.clone();
        let operator = default_operator_for(column.variant)?;
        let filter_id = self.generate_id();

        tracing::debug!(filter_id = %filter_id, column = %column.id, "adding filter clause");
        self.clauses.push(FilterClause {
            filter_id: filter_id.clone(),
            column_id: column.id,
            variant: column.variant,
            operator,
            value: PredicateValue::Empty,
        });
        Some(filter_id)
    }

    /// Merge a partial update into the clause with the given id.
    ///
    /// Returns whether the clause changed. Unknown ids, unknown columns and operators
    /// the clause's variant does not permit leave the clause untouched.
    pub fn update(&mut self, filter_id: &str, patch: FilterPatch) -> bool {
        let columns = &self.columns;
        let Some(clause) = self.clauses.iter_mut().find(|c| c.filter_id == filter_id) else {
            tracing::trace!(filter_id = %filter_id, "update for unknown filter ignored");
            return false;
        };
        let before = clause.clone();

        if let Some(column_id) = patch.column_id {
            if column_id != clause.column_id {
                let target = columns
                    .iter()
                    .find(|c| c.id == column_id && c.is_filterable());
                match target.and_then(|c| default_operator_for(c.variant).map(|op| (c, op))) {
                    Some((column, operator)) => {
                        clause.column_id = column.id.clone();
                        clause.variant = column.variant;
                        clause.operator = operator;
                        clause.value = PredicateValue::Empty;
                    }
                    None => {
                        tracing::debug!(column = %column_id, "cannot filter on column");
                    }
                }
            }
        }

        if let Some(operator) = patch.operator {
            if operator != clause.operator {
                if is_operator_allowed(clause.variant, operator) {
                    let value = std::mem::take(&mut clause.value);
                    clause.value = reshape_value(clause.operator, operator, value);
                    clause.operator = operator;
                } else {
                    tracing::debug!(
                        operator = %operator,
                        variant = %clause.variant,
                        "operator not permitted for column"
                    );
                }
            }
        }

        if let Some(value) = patch.value {
            if clause.operator.requires_value() {
                clause.value = value;
            }
        }

        *clause != before
    }

    /// Remove a clause. Returns where focus should go, or `None` if no clause had that id.
    pub fn remove(&mut self, filter_id: &str) -> Option<FocusTarget> {
        let index = self.clauses.iter().position(|c| c.filter_id == filter_id)?;
        self.clauses.remove(index);
        tracing::debug!(filter_id = %filter_id, "removed filter clause");

        if self.clauses.is_empty() {
            return Some(FocusTarget::AddFilter);
        }
        let next = self.clauses.get(index).or_else(|| self.clauses.last());
        Some(
            next.map(|c| FocusTarget::Clause(c.filter_id.clone()))
                .unwrap_or(FocusTarget::AddFilter),
        )
    }

    /// Remove the most recently added clause
    pub fn remove_last(&mut self) -> Option<FocusTarget> {
        let filter_id = self.clauses.last()?.filter_id.clone();
        self.remove(&filter_id)
    }

    /// Drop every clause and go back to `and`
    pub fn reset(&mut self) {
        self.clauses.clear();
        self.join_operator = JoinOperator::And;
    }

    /// Move the clause at `from` to position `to`, shifting the ones in between
    pub fn move_clause(&mut self, from: usize, to: usize) -> bool {
        if from >= self.clauses.len() || to >= self.clauses.len() || from == to {
            return false;
        }
        let clause = self.clauses.remove(from);
        self.clauses.insert(to, clause);
        true
    }

    pub fn join_label_at(&self, index: usize) -> JoinLabel {
        match index {
            0 => JoinLabel::Where,
            1 => JoinLabel::Editable(self.join_operator),
            _ => JoinLabel::ReadOnly(self.join_operator),
        }
    }

    pub fn status(&self, filter_id: &str) -> Option<ClauseStatus> {
        self.get(filter_id).map(clause_status)
    }

    /// Replace the known columns, dropping clauses whose column vanished or changed
    /// variant. Returns the number of clauses dropped.
    pub fn retain_columns(&mut self, columns: Vec<ColumnDescriptor>) -> usize {
        let before = self.clauses.len();
        self.clauses.retain(|clause| {
            columns
                .iter()
                .any(|c| c.id == clause.column_id && c.variant == clause.variant)
        });
        self.columns = columns;

        let dropped = before - self.clauses.len();
        if dropped > 0 {
            tracing::debug!(dropped, "dropped filter clauses referencing missing columns");
        }
        dropped
    }

    fn generate_id(&self) -> String {
        loop {
            let id = nanoid::nanoid!(FILTER_ID_LENGTH, &ALPHANUMERIC);
            if self.get(&id).is_none() {
                return id;
            }
        }
    }
}

/// Adapt a clause value to the arity of its new operator
fn reshape_value(from: FilterOperator, to: FilterOperator, value: PredicateValue) -> PredicateValue {
    match (from.arity(), to.arity(), value) {
        (_, OperatorArity::None, _) | (OperatorArity::None, _, _) => PredicateValue::Empty,
        (OperatorArity::One, OperatorArity::Two, PredicateValue::Scalar(v)) => {
            PredicateValue::Pair(v, serde_json::Value::Null)
        }
        (OperatorArity::Two, OperatorArity::One, PredicateValue::Pair(low, _)) => {
            if low.is_null() {
                PredicateValue::Empty
            } else {
                PredicateValue::Scalar(low)
            }
        }
        (_, _, value) => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::operators_for;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn columns() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("age", ColumnVariant::Integer),
            ColumnDescriptor::new("name", ColumnVariant::Text),
            ColumnDescriptor::new("active", ColumnVariant::Boolean),
            ColumnDescriptor::new("shape", ColumnVariant::Unsupported),
        ]
    }

    #[test]
    fn test_add_uses_first_filterable_column() {
        let mut list = FilterList::new(columns());
        let id = list.add().unwrap();

        let clause = list.get(&id).unwrap();
        assert_eq!(clause.column_id, "age");
        assert_eq!(clause.variant, ColumnVariant::Integer);
        assert_eq!(clause.operator, FilterOperator::Eq);
        assert_eq!(clause.value, PredicateValue::Empty);
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_add_without_filterable_columns_is_noop() {
        let mut list = FilterList::new(vec![ColumnDescriptor::new(
            "shape",
            ColumnVariant::Unsupported,
        )]);
        assert_eq!(list.add(), None);
        assert!(list.is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        let mut list = FilterList::new(columns());
        let ids: std::collections::HashSet<_> = (0..50).filter_map(|_| list.add()).collect();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn test_update_between_with_pair() {
        let mut list = FilterList::new(columns());
        let id = list.add().unwrap();

        let changed = list.update(
            &id,
            FilterPatch::operator(FilterOperator::Between).with_value(json!([18, 30])),
        );

        assert!(changed);
        let clause = list.get(&id).unwrap();
        assert_eq!(clause.operator, FilterOperator::Between);
        assert_eq!(clause.value, PredicateValue::pair(18, 30));
    }

    #[test]
    fn test_operator_to_is_empty_clears_value() {
        let mut list = FilterList::new(columns());
        let id = list.add().unwrap();
        list.update(&id, FilterPatch::value(PredicateValue::text("42")));

        list.update(&id, FilterPatch::operator(FilterOperator::IsEmpty));
        assert_eq!(list.get(&id).unwrap().value, PredicateValue::Empty);

        list.update(&id, FilterPatch::operator(FilterOperator::Gt));
        assert_eq!(list.get(&id).unwrap().value, PredicateValue::Empty);
    }

    #[test]
    fn test_value_ignored_for_valueless_operator() {
        let mut list = FilterList::new(columns());
        let id = list.add().unwrap();
        list.update(&id, FilterPatch::operator(FilterOperator::IsNotEmpty));

        assert!(!list.update(&id, FilterPatch::value(PredicateValue::text("x"))));
        assert_eq!(list.get(&id).unwrap().value, PredicateValue::Empty);
    }

    #[test]
    fn test_scalar_range_reshape() {
        let mut list = FilterList::new(columns());
        let id = list.add().unwrap();
        list.update(&id, FilterPatch::value(PredicateValue::text("18")));

        list.update(&id, FilterPatch::operator(FilterOperator::Between));
        assert_eq!(
            list.get(&id).unwrap().value,
            PredicateValue::Pair(json!("18"), serde_json::Value::Null)
        );

        list.update(&id, FilterPatch::operator(FilterOperator::Lt));
        assert_eq!(list.get(&id).unwrap().value, PredicateValue::text("18"));
    }

    #[test]
    fn test_disallowed_operator_is_rejected() {
        let mut list = FilterList::new(columns());
        let id = list.add().unwrap();
        list.update(&id, FilterPatch::column("active"));

        assert!(!list.update(&id, FilterPatch::operator(FilterOperator::Between)));
        assert_eq!(list.get(&id).unwrap().operator, FilterOperator::Eq);
    }

    #[test]
    fn test_column_change_rederives_variant() {
        let mut list = FilterList::new(columns());
        let id = list.add().unwrap();
        list.update(&id, FilterPatch::value(PredicateValue::text("42")));

        list.update(&id, FilterPatch::column("name"));
        let clause = list.get(&id).unwrap();
        assert_eq!(clause.variant, ColumnVariant::Text);
        assert_eq!(clause.operator, FilterOperator::Like);
        assert_eq!(clause.value, PredicateValue::Empty);

        assert!(!list.update(&id, FilterPatch::column("shape")));
        assert!(!list.update(&id, FilterPatch::column("missing")));
        assert_eq!(list.get(&id).unwrap().column_id, "name");
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let mut list = FilterList::new(columns());
        list.add();
        let snapshot = list.clauses().to_vec();

        assert!(!list.update("nope", FilterPatch::operator(FilterOperator::Ne)));
        assert_eq!(list.clauses(), snapshot.as_slice());
    }

    #[test]
    fn test_operators_stay_valid_after_edit_sequence() {
        let mut list = FilterList::new(columns());
        let a = list.add().unwrap();
        let b = list.add().unwrap();

        let edits = [
            (a.clone(), FilterPatch::operator(FilterOperator::Like)),
            (a.clone(), FilterPatch::column("name")),
            (a.clone(), FilterPatch::operator(FilterOperator::Between)),
            (b.clone(), FilterPatch::column("active")),
            (b.clone(), FilterPatch::operator(FilterOperator::Gte)),
            (a.clone(), FilterPatch::column("age").with_operator(FilterOperator::Like)),
            (b.clone(), FilterPatch::column("age").with_operator(FilterOperator::Between)),
        ];
        for (id, patch) in edits {
            list.update(&id, patch);
            for clause in list.clauses() {
                assert!(operators_for(clause.variant).contains(&clause.operator));
            }
        }
        list.remove(&a);
        list.add();
        for clause in list.clauses() {
            assert!(operators_for(clause.variant).contains(&clause.operator));
        }
    }

    #[test]
    fn test_remove_focus_targets() {
        let mut list = FilterList::new(columns());
        let a = list.add().unwrap();
        let b = list.add().unwrap();

        assert_eq!(list.remove(&a), Some(FocusTarget::Clause(b.clone())));
        assert_eq!(list.remove(&b), Some(FocusTarget::AddFilter));
        assert_eq!(list.remove(&b), None);
    }

    #[test]
    fn test_remove_last() {
        let mut list = FilterList::new(columns());
        let a = list.add().unwrap();
        list.add();

        list.remove_last();
        assert_eq!(list.len(), 1);
        assert_eq!(list.clauses()[0].filter_id, a);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut list = FilterList::new(columns());
        list.add();
        list.add();
        list.set_join_operator(JoinOperator::Or);

        list.reset();
        let once = (list.clauses().to_vec(), list.join_operator());
        list.reset();
        let twice = (list.clauses().to_vec(), list.join_operator());

        assert_eq!(once, twice);
        assert_eq!(once, (vec![], JoinOperator::And));
    }

    #[test]
    fn test_join_labels() {
        let mut list = FilterList::new(columns());
        list.set_join_operator(JoinOperator::Or);

        assert_eq!(list.join_label_at(0), JoinLabel::Where);
        assert_eq!(list.join_label_at(1), JoinLabel::Editable(JoinOperator::Or));
        assert_eq!(list.join_label_at(2), JoinLabel::ReadOnly(JoinOperator::Or));
        assert_eq!(list.join_label_at(7), JoinLabel::ReadOnly(JoinOperator::Or));
    }

    #[test]
    fn test_move_clause_is_stable() {
        let mut list = FilterList::new(columns());
        let ids: Vec<_> = (0..4).filter_map(|_| list.add()).collect();

        assert!(list.move_clause(0, 2));
        let order: Vec<_> = list.clauses().iter().map(|c| c.filter_id.clone()).collect();
        assert_eq!(order, vec![ids[1].clone(), ids[2].clone(), ids[0].clone(), ids[3].clone()]);

        assert!(!list.move_clause(0, 9));
    }

    #[test]
    fn test_retain_columns_drops_vanished_columns() {
        let mut list = FilterList::new(columns());
        let a = list.add().unwrap();
        let b = list.add().unwrap();
        list.update(&b, FilterPatch::column("name"));

        let dropped = list.retain_columns(vec![ColumnDescriptor::new("name", ColumnVariant::Text)]);

        assert_eq!(dropped, 1);
        assert!(list.get(&a).is_none());
        assert!(list.get(&b).is_some());
    }
}
