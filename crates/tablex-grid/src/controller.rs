//! Table controller: one per table view
//!
//! Owns the filter list, sort list, pagination window, viewport, debounce task and
//! sync layer of a single view, and keeps the query descriptor consistent with them.
//! Create it when the view mounts and drop it (or call [`TableController::teardown`])
//! when the view goes away.

use std::sync::Arc;

use tablex_core::{
    ChangeNotification, ColumnDescriptor, JoinOperator, KeyValueStore, QueryDescriptor, Result,
    RowSource, SchemaSource, SortClause, SortDirection, TableRef,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::builder::{ClauseStatus, build_descriptor};
use crate::debounce::Debouncer;
use crate::filter_list::{FilterClause, FilterList, FilterPatch, FocusTarget, JoinLabel};
use crate::pagination::PaginationWindow;
use crate::persist::Persistence;
use crate::settings::GridSettings;
use crate::sort_list::{SortList, SortPatch};
use crate::sync::{FetchOutcome, SyncLayer, SyncSnapshot};
use crate::viewport::{RenderWindow, Viewport};

pub struct TableController {
    settings: GridSettings,
    source_identity: Option<String>,
    table: Option<TableRef>,
    columns: Vec<ColumnDescriptor>,
    filters: FilterList,
    sort: SortList,
    pagination: PaginationWindow,
    viewport: Viewport,
    debouncer: Debouncer<Vec<FilterClause>>,
    /// Filter clauses as of the last commit; the descriptor is built from these
    committed_filters: Vec<FilterClause>,
    descriptor: QueryDescriptor,
    generation: u64,
    sync: SyncLayer,
    notifications: Option<broadcast::Receiver<ChangeNotification>>,
    listener: Option<JoinHandle<()>>,
}

impl TableController {
    /// Create a controller.
    ///
    /// # Arguments
    ///
    /// * `source` - Remote paged-row fetch
    /// * `store` - Durable storage for page index, page size and scroll anchor; `None`
    ///   keeps everything in memory
    /// * `settings` - Grid settings, normalized with [`GridSettings::validated`]
    pub fn new(
        source: Arc<dyn RowSource>,
        store: Option<Arc<dyn KeyValueStore>>,
        settings: GridSettings,
    ) -> Self {
        let settings = settings.validated();
        let persistence = store.map(Persistence::new).unwrap_or_default();
        let pagination = PaginationWindow::new(settings.page_size, persistence.clone());
        let viewport = Viewport::new(settings.row_height, settings.overscan, persistence);
        let descriptor = build_descriptor(&[], &[], pagination.data(), JoinOperator::And);

        Self {
            debouncer: Debouncer::new(settings.debounce()),
            sync: SyncLayer::with_stale_time(source, settings.stale_time()),
            settings,
            source_identity: None,
            table: None,
            columns: Vec::new(),
            filters: FilterList::default(),
            sort: SortList::default(),
            pagination,
            viewport,
            committed_filters: Vec::new(),
            descriptor,
            generation: 0,
            notifications: None,
            listener: None,
        }
    }

    /// Sort configuration restored by [`reset_sort`](Self::reset_sort)
    pub fn with_initial_sort(mut self, initial: Vec<SortClause>) -> Self {
        self.sort.set_initial(initial);
        self.sort.reset();
        self.commit_now();
        self
    }

    pub fn settings(&self) -> &GridSettings {
        &self.settings
    }

    pub fn source_identity(&self) -> Option<&str> {
        self.source_identity.as_deref()
    }

    pub fn table(&self) -> Option<&TableRef> {
        self.table.as_ref()
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn filters(&self) -> &FilterList {
        &self.filters
    }

    pub fn sort(&self) -> &SortList {
        &self.sort
    }

    pub fn pagination(&self) -> &PaginationWindow {
        &self.pagination
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// The descriptor the row source is asked for
    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    /// How many times the descriptor has been replaced
    pub fn descriptor_generation(&self) -> u64 {
        self.generation
    }

    pub fn sync_layer(&self) -> SyncLayer {
        self.sync.clone()
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.sync.snapshot()
    }

    // Data source

    /// Discover the columns of `table` and switch the view to it
    #[tracing::instrument(skip_all, fields(table = %table))]
    pub async fn load_schema(
        &mut self,
        schema: &dyn SchemaSource,
        identity: impl Into<String>,
        table: TableRef,
    ) -> Result<()> {
        let columns = schema.columns(&table).await?;
        tracing::info!(columns = columns.len(), "loaded table schema");
        self.switch_source(identity, table, columns);
        Ok(())
    }

    /// Switch the view to another data source.
    ///
    /// In-flight fetches and a pending debounced commit are abandoned, the page index
    /// and scroll anchor persisted for `identity` are restored, and clauses that
    /// reference columns `columns` no longer has are dropped.
    pub fn switch_source(
        &mut self,
        identity: impl Into<String>,
        table: TableRef,
        columns: Vec<ColumnDescriptor>,
    ) {
        let identity = identity.into();
        tracing::debug!(source = %identity, table = %table, "switching data source");

        self.debouncer.cancel();
        self.sync.set_table(table.clone());

        self.filters.retain_columns(columns.clone());
        self.sort.retain_columns(columns.clone());
        self.columns = columns;

        self.pagination.switch_source(identity.clone());
        self.viewport.switch_source(identity.clone());
        self.source_identity = Some(identity);
        self.table = Some(table);

        self.committed_filters = self.filters.clauses().to_vec();
        let descriptor = self.current_descriptor();
        self.replace_descriptor(descriptor);
        self.restart_listener();
    }

    /// Invalidate the sync layer whenever a change notification for the current
    /// table arrives. Survives source switches.
    pub fn listen_for_changes(&mut self, receiver: broadcast::Receiver<ChangeNotification>) {
        self.notifications = Some(receiver);
        self.restart_listener();
    }

    fn restart_listener(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        if let (Some(receiver), Some(table)) = (&self.notifications, &self.table) {
            self.listener = Some(
                self.sync
                    .listen_for_changes(receiver.resubscribe(), table.clone()),
            );
        }
    }

    // Filters

    pub fn add_filter(&mut self) -> Option<String> {
        let id = self.filters.add()?;
        self.commit_now();
        Some(id)
    }

    /// Edit a clause. The list changes at once; the descriptor follows after the
    /// debounce delay, once edits stop.
    pub fn update_filter(&mut self, filter_id: &str, patch: FilterPatch) -> bool {
        let changed = self.filters.update(filter_id, patch);
        if changed {
            self.debouncer.schedule(self.filters.clauses().to_vec());
        }
        changed
    }

    pub fn remove_filter(&mut self, filter_id: &str) -> Option<FocusTarget> {
        let focus = self.filters.remove(filter_id)?;
        self.commit_now();
        Some(focus)
    }

    pub fn remove_last_filter(&mut self) -> Option<FocusTarget> {
        let focus = self.filters.remove_last()?;
        self.commit_now();
        Some(focus)
    }

    pub fn reset_filters(&mut self) {
        self.filters.reset();
        self.commit_now();
    }

    pub fn move_filter(&mut self, from: usize, to: usize) -> bool {
        let moved = self.filters.move_clause(from, to);
        if moved {
            self.commit_now();
        }
        moved
    }

    pub fn set_join_operator(&mut self, join_operator: JoinOperator) {
        if self.filters.join_operator() != join_operator {
            self.filters.set_join_operator(join_operator);
            self.commit_now();
        }
    }

    pub fn join_label_at(&self, index: usize) -> JoinLabel {
        self.filters.join_label_at(index)
    }

    pub fn filter_status(&self, filter_id: &str) -> Option<ClauseStatus> {
        self.filters.status(filter_id)
    }

    /// Whether a debounced filter commit is still waiting
    pub fn has_pending_commit(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Apply a debounced filter commit that has already fired.
    ///
    /// Returns whether the descriptor changed.
    pub fn apply_pending_commits(&mut self) -> bool {
        match self.debouncer.take_latest() {
            Some(snapshot) => self.commit_filters(snapshot),
            None => false,
        }
    }

    /// Wait for the pending debounced filter commit and apply it.
    ///
    /// Returns whether the descriptor changed; `false` straight away when nothing
    /// is pending.
    pub async fn next_commit(&mut self) -> bool {
        match self.debouncer.next().await {
            Some(snapshot) => self.commit_filters(snapshot),
            None => false,
        }
    }

    // Sorting

    pub fn add_sort(&mut self) -> Option<String> {
        let column = self.sort.add()?;
        self.commit_now();
        Some(column)
    }

    pub fn update_sort(&mut self, column: &str, patch: SortPatch) -> bool {
        let changed = self.sort.update(column, patch);
        if changed {
            self.commit_now();
        }
        changed
    }

    pub fn remove_sort(&mut self, column: &str) -> bool {
        let removed = self.sort.remove(column);
        if removed {
            self.commit_now();
        }
        removed
    }

    pub fn toggle_sort(&mut self, column: &str) -> Option<SortDirection> {
        let direction = self.sort.toggle(column);
        self.commit_now();
        direction
    }

    pub fn move_sort(&mut self, from: usize, to: usize) -> bool {
        let moved = self.sort.move_clause(from, to);
        if moved {
            self.commit_now();
        }
        moved
    }

    pub fn reset_sort(&mut self) {
        self.sort.reset();
        self.commit_now();
    }

    // Pagination

    pub fn set_page_index(&mut self, index: usize) -> bool {
        let changed = self.pagination.set_page_index(index);
        self.commit_pagination(changed)
    }

    pub fn next_page(&mut self) -> bool {
        let changed = self.pagination.next_page();
        self.commit_pagination(changed)
    }

    pub fn previous_page(&mut self) -> bool {
        let changed = self.pagination.previous_page();
        self.commit_pagination(changed)
    }

    pub fn first_page(&mut self) -> bool {
        let changed = self.pagination.first_page();
        self.commit_pagination(changed)
    }

    pub fn last_page(&mut self) -> bool {
        let changed = self.pagination.last_page();
        self.commit_pagination(changed)
    }

    pub fn set_page_size(&mut self, size: usize) -> bool {
        let changed = self.pagination.set_page_size(size);
        self.commit_pagination(changed)
    }

    pub fn can_previous_page(&self) -> bool {
        self.pagination.can_previous_page()
    }

    pub fn can_next_page(&self) -> bool {
        self.pagination.can_next_page()
    }

    // Viewport

    pub fn set_viewport_extent(&mut self, extent: f32) {
        self.viewport.set_viewport_extent(extent);
    }

    pub fn set_scroll_offset(&mut self, offset: f32) {
        self.viewport.set_scroll_offset(offset);
    }

    pub fn measure_row(&mut self, index: usize, size: f32) {
        self.viewport.measure(index, size);
    }

    pub fn render_window(&self) -> RenderWindow {
        self.viewport.window()
    }

    // Remote sync

    /// Fetch the page for the current descriptor.
    ///
    /// Holds the controller until the response arrives. When the response moves the
    /// page index back inside a shrunken row set, the clamped page is fetched too.
    pub async fn sync(&mut self) -> FetchOutcome {
        let outcome = self.sync.fetch(self.descriptor.clone()).await;
        if self.apply_outcome(&outcome) {
            return self.fetch_clamped().await;
        }
        outcome
    }

    /// Issue a fetch for the current descriptor without holding the controller.
    ///
    /// The request is ordered when this is called, so a descriptor change made while
    /// it is in flight, followed by another `begin_sync`, supersedes it. Hand the
    /// outcome to [`apply_outcome`](Self::apply_outcome) once it resolves.
    pub fn begin_sync(&self) -> impl Future<Output = FetchOutcome> + Send + use<> {
        self.sync.request(self.descriptor.clone())
    }

    /// Update pagination totals and the viewport row count from a resolved fetch.
    ///
    /// Superseded and failed outcomes, and pages for a row set the view has since
    /// left, change nothing. Returns whether the descriptor was rebuilt because the
    /// page index had to be clamped; fetch again when it was.
    pub fn apply_outcome(&mut self, outcome: &FetchOutcome) -> bool {
        let Some(page) = outcome.page() else {
            return false;
        };
        // Only the page on screen for the latest request carries current totals
        let snapshot = self.sync.snapshot();
        let on_screen = !snapshot.is_stale
            && snapshot.data.as_ref().is_some_and(|data| Arc::ptr_eq(data, page));
        let same_rows = snapshot
            .descriptor
            .as_ref()
            .is_some_and(|d| d.same_row_set(&self.descriptor));
        if !on_screen || !same_rows {
            tracing::trace!("ignoring page for a previous request");
            return false;
        }

        self.viewport.set_row_count(page.rows.len());
        let clamped = self.pagination.observe_page(page);
        clamped && self.commit_pagination(true)
    }

    /// Manual refresh: refetch the current descriptor, bypassing the cache
    pub async fn refresh(&mut self) -> Option<FetchOutcome> {
        let outcome = self.sync.refetch().await?;
        if self.apply_outcome(&outcome) {
            return Some(self.fetch_clamped().await);
        }
        Some(outcome)
    }

    /// Mark cached pages stale and refetch the current descriptor
    pub async fn invalidate(&mut self) -> Option<FetchOutcome> {
        let outcome = self.sync.invalidate().await?;
        if self.apply_outcome(&outcome) {
            return Some(self.fetch_clamped().await);
        }
        Some(outcome)
    }

    /// Save the scroll anchor, then abandon in-flight fetches, the pending debounce
    /// timer and the change listener. Nothing observable happens afterwards.
    pub fn teardown(&mut self) {
        tracing::debug!(source = ?self.source_identity, "tearing down table controller");
        self.viewport.persist_anchor();
        self.debouncer.cancel();
        self.sync.abandon();
        self.notifications = None;
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }

    /// Fetch the page the index was clamped to
    async fn fetch_clamped(&mut self) -> FetchOutcome {
        let outcome = self.sync.fetch(self.descriptor.clone()).await;
        self.apply_outcome(&outcome);
        outcome
    }

    fn current_descriptor(&self) -> QueryDescriptor {
        build_descriptor(
            &self.committed_filters,
            self.sort.clauses(),
            self.pagination.data(),
            self.filters.join_operator(),
        )
    }

    /// Commit the live filter list, dropping any pending debounced commit
    fn commit_now(&mut self) -> bool {
        self.debouncer.cancel();
        self.commit_filters(self.filters.clauses().to_vec())
    }

    fn commit_filters(&mut self, filters: Vec<FilterClause>) -> bool {
        self.committed_filters = filters;
        let mut candidate = self.current_descriptor();

        if !candidate.same_row_set(&self.descriptor) {
            if self.pagination.reset_index() {
                candidate.pagination = self.pagination.data();
            }
            self.viewport.reset_scroll();
        }
        self.replace_descriptor(candidate)
    }

    fn commit_pagination(&mut self, changed: bool) -> bool {
        if !changed {
            return false;
        }
        self.viewport.reset_scroll();
        let descriptor = self.current_descriptor();
        self.replace_descriptor(descriptor)
    }

    fn replace_descriptor(&mut self, descriptor: QueryDescriptor) -> bool {
        if descriptor == self.descriptor {
            return false;
        }
        self.descriptor = descriptor;
        self.generation += 1;
        tracing::debug!(
            generation = self.generation,
            filters = self.descriptor.filters.len(),
            sort = self.descriptor.sort.len(),
            page_index = self.descriptor.pagination.page_index,
            page_size = self.descriptor.pagination.page_size,
            "query descriptor rebuilt"
        );
        true
    }
}

impl Drop for TableController {
    fn drop(&mut self) {
        self.viewport.persist_anchor();
        self.sync.abandon();
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

impl std::fmt::Debug for TableController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableController")
            .field("source_identity", &self.source_identity)
            .field("table", &self.table)
            .field("generation", &self.generation)
            .field("descriptor", &self.descriptor)
            .finish()
    }
}
