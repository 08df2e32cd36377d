//! Multi-column sort list

use tablex_core::{ColumnDescriptor, SortClause, SortDirection};

/// Partial update of a sort clause
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortPatch {
    pub column: Option<String>,
    pub direction: Option<SortDirection>,
}

impl SortPatch {
    pub fn column(column: impl Into<String>) -> Self {
        Self {
            column: Some(column.into()),
            direction: None,
        }
    }

    pub fn direction(direction: SortDirection) -> Self {
        Self {
            column: None,
            direction: Some(direction),
        }
    }
}

/// Ordered sort clauses, at most one per column.
///
/// The first clause has the highest priority.
#[derive(Debug, Clone, Default)]
pub struct SortList {
    clauses: Vec<SortClause>,
    initial: Vec<SortClause>,
    columns: Vec<ColumnDescriptor>,
}

impl SortList {
    /// Create a list starting from `initial`; duplicate columns keep their first entry
    pub fn new(columns: Vec<ColumnDescriptor>, initial: Vec<SortClause>) -> Self {
        let mut list = Self {
            clauses: Vec::new(),
            initial,
            columns,
        };
        list.reset();
        list
    }

    pub fn clauses(&self) -> &[SortClause] {
        &self.clauses
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.clauses.iter().any(|c| c.column == column)
    }

    pub fn direction_of(&self, column: &str) -> Option<SortDirection> {
        self.clauses
            .iter()
            .find(|c| c.column == column)
            .map(|c| c.direction)
    }

    fn is_sortable(&self, column: &str) -> bool {
        self.columns
            .iter()
            .any(|c| c.id == column && c.variant.is_filterable())
    }

    /// Append a descending clause for the first sortable column not yet listed
    pub fn add(&mut self) -> Option<String> {
        let column = self
            .columns
            .iter()
            .filter(|c| c.variant.is_filterable())
            .find(|c| !self.contains(&c.id))?
            .id
            .clone();

        self.clauses.push(SortClause::descending(column.clone()));
        Some(column)
    }

    /// Merge a partial update into the clause for `column`.
    ///
    /// Renaming onto a column that is already listed, or onto one that cannot be
    /// sorted, rejects the whole patch.
    pub fn update(&mut self, column: &str, patch: SortPatch) -> bool {
        let Some(index) = self.clauses.iter().position(|c| c.column == column) else {
            return false;
        };

        if let Some(new_column) = &patch.column {
            if new_column != column && (self.contains(new_column) || !self.is_sortable(new_column))
            {
                tracing::debug!(from = %column, to = %new_column, "sort column rename rejected");
                return false;
            }
        }

        let clause = &mut self.clauses[index];
        let before = clause.clone();
        if let Some(new_column) = patch.column {
            clause.column = new_column;
        }
        if let Some(direction) = patch.direction {
            clause.direction = direction;
        }
        *clause != before
    }

    pub fn remove(&mut self, column: &str) -> bool {
        let before = self.clauses.len();
        self.clauses.retain(|c| c.column != column);
        self.clauses.len() != before
    }

    /// Header click: unsorted → descending → ascending → unsorted
    pub fn toggle(&mut self, column: &str) -> Option<SortDirection> {
        match self.direction_of(column) {
            None => {
                if !self.is_sortable(column) {
                    return None;
                }
                self.clauses.push(SortClause::descending(column));
                Some(SortDirection::Descending)
            }
            Some(SortDirection::Descending) => {
                self.update(column, SortPatch::direction(SortDirection::Ascending));
                Some(SortDirection::Ascending)
            }
            Some(SortDirection::Ascending) => {
                self.remove(column);
                None
            }
        }
    }

    pub fn move_clause(&mut self, from: usize, to: usize) -> bool {
        if from >= self.clauses.len() || to >= self.clauses.len() || from == to {
            return false;
        }
        let clause = self.clauses.remove(from);
        self.clauses.insert(to, clause);
        true
    }

    /// Restore the initial configuration
    pub fn reset(&mut self) {
        let mut clauses: Vec<SortClause> = Vec::with_capacity(self.initial.len());
        for clause in &self.initial {
            if !clauses.iter().any(|c| c.column == clause.column) {
                clauses.push(clause.clone());
            }
        }
        if !self.columns.is_empty() {
            clauses.retain(|c| self.is_sortable(&c.column));
        }
        self.clauses = clauses;
    }

    pub fn set_initial(&mut self, initial: Vec<SortClause>) {
        self.initial = initial;
    }

    /// Replace the known columns and drop clauses whose column vanished
    pub fn retain_columns(&mut self, columns: Vec<ColumnDescriptor>) -> usize {
        self.columns = columns;
        let before = self.clauses.len();
        let columns = &self.columns;
        self.clauses.retain(|clause| {
            columns
                .iter()
                .any(|c| c.id == clause.column && c.variant.is_filterable())
        });
        before - self.clauses.len()
    }
}
