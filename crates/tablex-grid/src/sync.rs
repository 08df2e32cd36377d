//! Remote synchronization layer
//!
//! Fetches pages from a [`RowSource`] keyed by descriptor. Every request takes a
//! sequence number; only the response for the most recently issued request may update
//! the visible state, so a slow response for an old descriptor can never overwrite a
//! newer one. A request for a descriptor whose remote call is already in flight waits
//! for that call instead of issuing another. Pages are cached per descriptor for a
//! stale time and evicted once expired, and the previous page stays visible (flagged
//! stale) while a new descriptor loads.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tablex_core::{
    ChangeNotification, QueryDescriptor, RowPage, RowSource, TableRef, TablexError,
};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// How long a cached page is served without asking the row source again
pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(10 * 60);

/// Result of one fetch request
#[derive(Debug)]
pub enum FetchOutcome {
    /// The row source answered and the page is now visible
    Applied(Arc<RowPage>),
    /// A fresh cached page was reused without a remote call
    Cached(Arc<RowPage>),
    /// A newer request was issued before this one resolved; the response was dropped
    Superseded,
    /// The row source failed; previously visible data is kept
    Failed(Arc<TablexError>),
}

impl FetchOutcome {
    /// The page made visible by this request, if any
    pub fn page(&self) -> Option<&Arc<RowPage>> {
        match self {
            Self::Applied(page) | Self::Cached(page) => Some(page),
            Self::Superseded | Self::Failed(_) => None,
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded)
    }
}

/// What the view renders from
#[derive(Debug, Clone, Default)]
pub struct SyncSnapshot {
    /// The most recent page that was made visible
    pub data: Option<Arc<RowPage>>,
    /// A request for the current descriptor is in flight
    pub is_fetching: bool,
    /// `data` belongs to another descriptor, was invalidated or has expired
    pub is_stale: bool,
    /// Failure of the latest request, if it failed
    pub error: Option<String>,
    /// Descriptor of the latest request
    pub descriptor: Option<QueryDescriptor>,
}

type SharedResult = Result<Arc<RowPage>, Arc<TablexError>>;

struct CacheEntry {
    page: Arc<RowPage>,
    fetched_at: Instant,
    invalidated: bool,
}

impl CacheEntry {
    fn is_fresh(&self, stale_time: Duration) -> bool {
        !self.invalidated && self.fetched_at.elapsed() < stale_time
    }
}

/// A remote call other requests for the same key can wait on
struct InFlight {
    /// Sequence number of the request that issued the call
    sequence: u64,
    result: watch::Receiver<Option<SharedResult>>,
}

impl InFlight {
    /// False once the issuing request was dropped before its call returned
    fn is_alive(&self) -> bool {
        self.result.has_changed().is_ok()
    }
}

enum Pending {
    /// This request owns the remote call and publishes its result
    Remote(watch::Sender<Option<SharedResult>>),
    /// This request waits for an identical call already in flight
    Joined(watch::Receiver<Option<SharedResult>>),
}

/// An issued request whose response has not been applied yet
struct Ticket {
    sequence: u64,
    table: TableRef,
    key: String,
    descriptor: QueryDescriptor,
    pending: Pending,
}

enum Issued {
    Ready(FetchOutcome),
    Pending(Ticket),
}

#[derive(Default)]
struct SyncState {
    table: Option<TableRef>,
    /// Sequence number of the most recently issued request
    sequence: u64,
    /// Sequence number of the request still awaiting its response
    fetching: Option<u64>,
    current: Option<QueryDescriptor>,
    data: Option<Arc<RowPage>>,
    data_key: Option<String>,
    error: Option<String>,
    cache: HashMap<String, CacheEntry>,
    in_flight: HashMap<String, InFlight>,
}

impl SyncState {
    /// Store a page, evicting every entry that could no longer be served
    fn insert_page(&mut self, key: String, page: Arc<RowPage>, stale_time: Duration) {
        let before = self.cache.len();
        self.cache.retain(|_, entry| entry.is_fresh(stale_time));
        let evicted = before - self.cache.len();
        if evicted > 0 {
            tracing::trace!(evicted, "evicted stale cached pages");
        }
        self.cache.insert(
            key,
            CacheEntry {
                page,
                fetched_at: Instant::now(),
                invalidated: false,
            },
        );
    }
}

struct SyncInner {
    source: Arc<dyn RowSource>,
    stale_time: Duration,
    state: Mutex<SyncState>,
}

/// Cheap to clone; clones share state
#[derive(Clone)]
pub struct SyncLayer {
    inner: Arc<SyncInner>,
}

fn cache_key(table: &TableRef, descriptor: &QueryDescriptor) -> String {
    format!("{}|{}", table.qualified_name(), descriptor.cache_key())
}

impl SyncLayer {
    pub fn new(source: Arc<dyn RowSource>) -> Self {
        Self::with_stale_time(source, DEFAULT_STALE_TIME)
    }

    pub fn with_stale_time(source: Arc<dyn RowSource>, stale_time: Duration) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                source,
                stale_time,
                state: Mutex::new(SyncState::default()),
            }),
        }
    }

    pub fn stale_time(&self) -> Duration {
        self.inner.stale_time
    }

    pub fn table(&self) -> Option<TableRef> {
        self.inner.state.lock().table.clone()
    }

    /// Number of pages currently held in the cache
    pub fn cached_pages(&self) -> usize {
        self.inner.state.lock().cache.len()
    }

    /// Point the layer at another table. In-flight requests are abandoned and the
    /// visible page is cleared; cached pages of other tables are kept.
    pub fn set_table(&self, table: TableRef) {
        let mut state = self.inner.state.lock();
        state.sequence += 1;
        state.fetching = None;
        state.table = Some(table);
        state.current = None;
        state.data = None;
        state.data_key = None;
        state.error = None;
    }

    /// Fetch the page for `descriptor`, serving a fresh cached page when there is one
    pub async fn fetch(&self, descriptor: QueryDescriptor) -> FetchOutcome {
        self.request(descriptor).await
    }

    /// Issue a fetch for `descriptor` right away and return its outcome as a future
    /// that borrows nothing.
    ///
    /// The request is ordered against others when this is called, not when the
    /// future is first polled.
    pub fn request(
        &self,
        descriptor: QueryDescriptor,
    ) -> impl Future<Output = FetchOutcome> + Send + use<> {
        let issued = self.issue(descriptor, false);
        let sync = self.clone();
        async move {
            match issued {
                Issued::Ready(outcome) => outcome,
                Issued::Pending(ticket) => sync.complete(ticket).await,
            }
        }
    }

    /// Fetch the current descriptor again, bypassing the cache
    pub async fn refetch(&self) -> Option<FetchOutcome> {
        let current = self.inner.state.lock().current.clone()?;
        Some(match self.issue(current, true) {
            Issued::Ready(outcome) => outcome,
            Issued::Pending(ticket) => self.complete(ticket).await,
        })
    }

    /// Mark every cached page stale and refetch the current descriptor
    pub async fn invalidate(&self) -> Option<FetchOutcome> {
        {
            let mut state = self.inner.state.lock();
            for entry in state.cache.values_mut() {
                entry.invalidated = true;
            }
            tracing::debug!(cached_pages = state.cache.len(), "invalidated page cache");
        }
        self.refetch().await
    }

    /// Supersede every in-flight request; their responses will be dropped
    pub fn abandon(&self) {
        let mut state = self.inner.state.lock();
        state.sequence += 1;
        state.fetching = None;
    }

    pub fn clear_cache(&self) {
        self.inner.state.lock().cache.clear();
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        let state = self.inner.state.lock();
        let current_key = match (&state.table, &state.current) {
            (Some(table), Some(descriptor)) => Some(cache_key(table, descriptor)),
            _ => None,
        };
        // An evicted entry means the visible page expired
        let data_outdated = state.data_key.as_ref().is_some_and(|key| {
            state
                .cache
                .get(key)
                .is_none_or(|entry| !entry.is_fresh(self.inner.stale_time))
        });

        SyncSnapshot {
            data: state.data.clone(),
            is_fetching: state.fetching.is_some_and(|seq| seq == state.sequence),
            is_stale: state.data.is_some() && (state.data_key != current_key || data_outdated),
            error: state.error.clone(),
            descriptor: state.current.clone(),
        }
    }

    /// Invalidate whenever a notification for `table` arrives.
    ///
    /// Must be called from within a tokio runtime. The task ends when the sending
    /// side is dropped; abort the handle to stop it earlier.
    pub fn listen_for_changes(
        &self,
        mut receiver: broadcast::Receiver<ChangeNotification>,
        table: TableRef,
    ) -> JoinHandle<()> {
        let sync = self.clone();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(notification) if notification.affects(&table) => {
                        tracing::debug!(table = %table, "change notification received");
                        sync.invalidate().await;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "missed change notifications, invalidating");
                        sync.invalidate().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Take a sequence number for `descriptor` and decide how it is answered: from
    /// the cache, by joining an identical call in flight, or by a new remote call.
    fn issue(&self, descriptor: QueryDescriptor, force: bool) -> Issued {
        let mut state = self.inner.state.lock();
        let Some(table) = state.table.clone() else {
            return Issued::Ready(FetchOutcome::Failed(Arc::new(TablexError::Configuration(
                "no table selected".to_string(),
            ))));
        };

        let key = cache_key(&table, &descriptor);
        state.current = Some(descriptor.clone());
        state.error = None;

        let cached = if force {
            None
        } else {
            state
                .cache
                .get(&key)
                .filter(|entry| entry.is_fresh(self.inner.stale_time))
                .map(|entry| entry.page.clone())
        };
        if let Some(page) = cached {
            state.sequence += 1;
            tracing::debug!(sequence = state.sequence, table = %table, "serving page from cache");
            state.fetching = None;
            state.data = Some(page.clone());
            state.data_key = Some(key);
            return Issued::Ready(FetchOutcome::Cached(page));
        }

        state.in_flight.retain(|_, flight| flight.is_alive());
        let joinable = if force {
            None
        } else {
            state
                .in_flight
                .get(&key)
                .map(|flight| (flight.sequence, flight.result.clone()))
        };

        let (sequence, pending) = match joinable {
            Some((flight_sequence, result)) => {
                // Still the latest request: share its sequence so both callers apply
                if flight_sequence != state.sequence {
                    state.sequence += 1;
                }
                tracing::debug!(sequence = state.sequence, table = %table, "joining in-flight fetch");
                (state.sequence, Pending::Joined(result))
            }
            None => {
                state.sequence += 1;
                let (sender, result) = watch::channel(None);
                let sequence = state.sequence;
                state.in_flight.insert(
                    key.clone(),
                    InFlight {
                        sequence,
                        result,
                    },
                );
                (state.sequence, Pending::Remote(sender))
            }
        };
        state.fetching = Some(sequence);

        Issued::Pending(Ticket {
            sequence,
            table,
            key,
            descriptor,
            pending,
        })
    }

    async fn complete(&self, ticket: Ticket) -> FetchOutcome {
        let Ticket {
            sequence,
            table,
            key,
            descriptor,
            pending,
        } = ticket;

        let result = match pending {
            Pending::Remote(sender) => {
                let result = self.call_source(sequence, &table, &descriptor).await;
                {
                    let mut state = self.inner.state.lock();
                    if state
                        .in_flight
                        .get(&key)
                        .is_some_and(|flight| flight.sequence == sequence)
                    {
                        state.in_flight.remove(&key);
                    }
                }
                sender.send_replace(Some(result.clone()));
                result
            }
            Pending::Joined(mut receiver) => {
                let shared = match receiver.wait_for(Option::is_some).await {
                    Ok(value) => (*value).clone(),
                    Err(_) => None,
                };
                match shared {
                    Some(result) => result,
                    None => {
                        tracing::debug!(sequence, "joined fetch was dropped, calling the source");
                        self.call_source(sequence, &table, &descriptor).await
                    }
                }
            }
        };

        self.settle(sequence, &table, key, result)
    }

    async fn call_source(
        &self,
        sequence: u64,
        table: &TableRef,
        descriptor: &QueryDescriptor,
    ) -> SharedResult {
        tracing::debug!(
            sequence,
            table = %table,
            page_index = descriptor.pagination.page_index,
            filters = descriptor.filters.len(),
            "issuing fetch"
        );
        self.inner
            .source
            .fetch_rows(table, descriptor)
            .await
            .map(Arc::new)
            .map_err(Arc::new)
    }

    /// Apply a response if its request is still the latest one
    fn settle(
        &self,
        sequence: u64,
        table: &TableRef,
        key: String,
        result: SharedResult,
    ) -> FetchOutcome {
        let mut state = self.inner.state.lock();
        if state.sequence != sequence {
            tracing::debug!(
                sequence,
                latest = state.sequence,
                "discarding response for superseded request"
            );
            return FetchOutcome::Superseded;
        }
        state.fetching = None;

        match result {
            Ok(page) => {
                tracing::info!(
                    table = %table,
                    rows = page.rows.len(),
                    total_rows = ?page.total_row_count,
                    "loaded rows"
                );
                state.insert_page(key.clone(), page.clone(), self.inner.stale_time);
                state.data = Some(page.clone());
                state.data_key = Some(key);
                FetchOutcome::Applied(page)
            }
            Err(e) => {
                tracing::warn!(table = %table, error = %e, "fetch failed");
                state.error = Some(e.to_string());
                FetchOutcome::Failed(e)
            }
        }
    }
}

impl std::fmt::Debug for SyncLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("SyncLayer")
            .field("table", &state.table)
            .field("sequence", &state.sequence)
            .field("cached_pages", &state.cache.len())
            .field("in_flight", &state.in_flight.len())
            .finish()
    }
}
