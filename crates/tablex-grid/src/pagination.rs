//! Pagination window
//!
//! Page index and size for one table view. The page index is persisted per data
//! source identity; the page size is a global preference.

use serde::{Deserialize, Serialize};
use tablex_core::{PaginationData, RowPage, page_count};

use crate::persist::{PAGE_SIZE_KEY, Persistence, pagination_key};

/// Default page size when neither settings nor storage provide one
pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredPaginationState {
    page_index: usize,
}

#[derive(Debug, Clone)]
pub struct PaginationWindow {
    page_index: usize,
    page_size: usize,
    /// Total rows matching the current filters (from COUNT query, if available)
    total_row_count: Option<u64>,
    total_page_count: Option<usize>,
    /// Whether the last page fetched was full, used while the total is unknown
    has_more: bool,
    source_identity: Option<String>,
    persistence: Persistence,
}

impl PaginationWindow {
    /// Create a window, preferring a persisted page size over `default_page_size`
    pub fn new(default_page_size: usize, persistence: Persistence) -> Self {
        let page_size = persistence
            .load_parsed::<usize>(PAGE_SIZE_KEY)
            .filter(|size| *size > 0)
            .unwrap_or(if default_page_size > 0 {
                default_page_size
            } else {
                DEFAULT_PAGE_SIZE
            });

        Self {
            page_index: 0,
            page_size,
            total_row_count: None,
            total_page_count: None,
            has_more: false,
            source_identity: None,
            persistence,
        }
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn data(&self) -> PaginationData {
        PaginationData::new(self.page_index, self.page_size)
    }

    /// Calculate SQL OFFSET for the current page
    pub fn offset(&self) -> usize {
        self.data().offset()
    }

    pub fn total_row_count(&self) -> Option<u64> {
        self.total_row_count
    }

    /// Number of pages, if the row source reported a total
    pub fn page_count(&self) -> Option<usize> {
        self.total_page_count
    }

    pub fn source_identity(&self) -> Option<&str> {
        self.source_identity.as_deref()
    }

    pub fn can_previous_page(&self) -> bool {
        self.page_index > 0
    }

    pub fn can_next_page(&self) -> bool {
        match self.total_page_count {
            Some(pages) => self.page_index.saturating_add(1) < pages,
            None => self.has_more,
        }
    }

    /// Record the totals reported with a fetched page.
    ///
    /// When the row set shrank below the current page, the index is pulled back to
    /// the last page. Returns whether that happened.
    pub fn observe_page(&mut self, page: &RowPage) -> bool {
        self.total_row_count = page.total_row_count;
        self.total_page_count = page
            .total_page_count
            .or_else(|| page.total_row_count.map(|rows| page_count(rows, self.page_size)));
        self.has_more = page.rows.len() >= self.page_size;

        match self.total_page_count {
            Some(pages) if self.page_index > pages.saturating_sub(1) => {
                let last = pages.saturating_sub(1);
                tracing::debug!(
                    page_index = self.page_index,
                    last,
                    "page index beyond the row set, clamping"
                );
                self.apply_index(last)
            }
            _ => false,
        }
    }

    /// Set the total row count directly and derive the page count from it
    pub fn set_total_row_count(&mut self, total_rows: Option<u64>) {
        self.total_row_count = total_rows;
        self.total_page_count = total_rows.map(|rows| page_count(rows, self.page_size));
    }

    /// Jump to a page, clamped to the last page when the page count is known
    pub fn set_page_index(&mut self, index: usize) -> bool {
        let index = match self.total_page_count {
            Some(pages) => index.min(pages.saturating_sub(1)),
            None => index,
        };
        self.apply_index(index)
    }

    pub fn next_page(&mut self) -> bool {
        if !self.can_next_page() {
            return false;
        }
        self.apply_index(self.page_index + 1)
    }

    pub fn previous_page(&mut self) -> bool {
        if !self.can_previous_page() {
            return false;
        }
        self.apply_index(self.page_index - 1)
    }

    pub fn first_page(&mut self) -> bool {
        self.apply_index(0)
    }

    /// Go to the last page; a no-op while the page count is unknown
    pub fn last_page(&mut self) -> bool {
        match self.total_page_count {
            Some(pages) => self.apply_index(pages.saturating_sub(1)),
            None => false,
        }
    }

    /// Change the page size. Zero is ignored; any other new size goes back to the
    /// first page and is remembered as the global preference.
    pub fn set_page_size(&mut self, size: usize) -> bool {
        if size == 0 || size == self.page_size {
            return false;
        }
        self.page_size = size;
        self.total_page_count = self.total_row_count.map(|rows| page_count(rows, size));
        self.persistence.save(PAGE_SIZE_KEY, &size.to_string());
        self.apply_index(0);
        true
    }

    /// Start over at page 0, e.g. because the filtered row set changed
    pub fn reset_index(&mut self) -> bool {
        self.apply_index(0)
    }

    /// Switch to another data source, restoring its persisted page index
    pub fn switch_source(&mut self, identity: impl Into<String>) {
        let identity = identity.into();
        let restored = self
            .persistence
            .load(&pagination_key(&identity))
            .and_then(|raw| serde_json::from_str::<StoredPaginationState>(&raw).ok())
            .map(|state| state.page_index)
            .unwrap_or(0);

        tracing::debug!(source = %identity, page_index = restored, "restored pagination state");
        self.page_index = restored;
        self.total_row_count = None;
        self.total_page_count = None;
        self.has_more = false;
        self.source_identity = Some(identity);
    }

    fn apply_index(&mut self, index: usize) -> bool {
        if index == self.page_index {
            return false;
        }
        self.page_index = index;
        self.persist_index();
        true
    }

    fn persist_index(&self) {
        let Some(identity) = &self.source_identity else {
            return;
        };
        let state = StoredPaginationState {
            page_index: self.page_index,
        };
        match serde_json::to_string(&state) {
            Ok(raw) => self.persistence.save(&pagination_key(identity), &raw),
            Err(e) => tracing::warn!(error = %e, "failed to serialize pagination state"),
        }
    }
}
