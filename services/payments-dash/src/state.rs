// services/payments-dash/src/state.rs
//
// Dashboard state: filters, debounce, query cache and the derived table view

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use svckit::config::DashboardConfig;
use svckit::{PaymentRow, StatusFilter};
use tracing::{info, warn};

use crate::aggregate::{status_counts, StatusCount};
use crate::debounce::SearchInput;
use crate::fetcher::{FetchEvent, PaymentsBackend, QueryClient, QueryKey};
use crate::location::FilterLocation;
use crate::table::{sorted_indices, Column, SortState};
use crate::window::{clamp_scroll, VirtualWindow};

const MAX_LOG_ENTRIES: usize = 100;

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: String,  // INFO, WARN, ERROR
    pub message: String,
}

// Sorted order and chart data for one result set + sort combination
struct Derived {
    rows: Arc<[PaymentRow]>,
    sort: SortState,
    order: Vec<usize>,
    counts: Vec<StatusCount>,
}

impl Derived {
    fn build(rows: Arc<[PaymentRow]>, sort: &SortState) -> Self {
        let order = sorted_indices(&rows, sort);
        let counts = status_counts(&rows);
        Self {
            rows,
            sort: sort.clone(),
            order,
            counts,
        }
    }
}

pub struct DashboardState {
    pub location: FilterLocation,
    pub search: SearchInput,
    pub query: QueryClient,
    pub sort: SortState,

    // Virtualization, in row-height units
    pub scroll_offset: u64,
    pub viewport: u64,
    pub row_height: u64,
    pub overscan: usize,

    pub activity_log: Vec<LogEntry>,
    derived: Derived,
}

impl DashboardState {
    /// Build from a shared location and start the first fetch.
    pub fn new(
        location: FilterLocation,
        config: &DashboardConfig,
        backend: Arc<dyn PaymentsBackend>,
        now: Instant,
    ) -> Self {
        let search = SearchInput::new(&location.search(), config.filters.debounce());
        let query = QueryClient::new(backend, config.query.stale_time())
            .with_cache_time(config.query.cache_time());
        let sort = SortState::default();
        let derived = Derived::build(query.rows_arc(), &sort);

        let mut state = Self {
            location,
            search,
            query,
            sort,
            scroll_offset: 0,
            viewport: 0,
            row_height: u64::from(config.table.row_height.max(1)),
            overscan: config.table.overscan,
            activity_log: Vec::new(),
            derived,
        };
        state.sync_query(now);
        state
    }

    /// Filter pair the view should currently show.
    pub fn current_key(&self) -> QueryKey {
        QueryKey::new(self.location.status(), self.location.search())
    }

    pub fn type_char(&mut self, c: char, now: Instant) {
        self.search.push(c, now);
    }

    pub fn backspace(&mut self, now: Instant) {
        self.search.pop(now);
    }

    pub fn clear_search(&mut self, now: Instant) {
        self.search.clear(now);
    }

    /// Status changes skip the debounce and refetch immediately.
    pub fn set_status(&mut self, status: StatusFilter, now: Instant) {
        if self.location.set_status(status) {
            self.add_log("INFO", &format!("Status filter: {}", status.label()));
            self.sync_query(now);
        }
    }

    pub fn next_status(&mut self, now: Instant) {
        let next = self.location.status().next();
        self.set_status(next, now);
    }

    pub fn prev_status(&mut self, now: Instant) {
        let prev = self.location.status().prev();
        self.set_status(prev, now);
    }

    pub fn toggle_email_sort(&mut self) {
        self.sort.toggle(Column::Email);
        self.refresh_derived();
    }

    pub fn refetch(&mut self) {
        if self.query.refetch() {
            self.add_log("INFO", "Refetching payments");
        }
    }

    /// Advance timers and commit finished fetches.
    pub fn tick(&mut self, now: Instant) -> Vec<FetchEvent> {
        let committed = self.location.search();
        if let Some(search) = self.search.poll(&committed, now) {
            self.location.set_search(&search);
            if search.is_empty() {
                self.add_log("INFO", "Search cleared");
            } else {
                self.add_log("INFO", &format!("Searching for \"{}\"", search));
            }
            self.sync_query(now);
        }

        let events = self.query.poll(now);
        for event in &events {
            self.log_event(event);
        }
        self.refresh_derived();
        events
    }

    /// Block up to `timeout` for the next fetch to finish.
    pub fn wait_for_fetch(&mut self, timeout: Duration) -> Option<FetchEvent> {
        let event = self.query.wait(timeout)?;
        self.log_event(&event);
        self.refresh_derived();
        Some(event)
    }

    /// Search box differs from the committed search.
    pub fn awaiting_sync(&self) -> bool {
        self.search.awaiting_sync(&self.location.search())
    }

    /// Spinner in the search box: network busy or debounce pending.
    pub fn show_busy_indicator(&self) -> bool {
        self.query.is_fetching() || self.awaiting_sync()
    }

    pub fn is_fetching(&self) -> bool {
        self.query.is_fetching()
    }

    pub fn is_loading(&self) -> bool {
        self.query.is_loading()
    }

    pub fn row_count(&self) -> usize {
        self.derived.rows.len()
    }

    pub fn status_counts(&self) -> &[StatusCount] {
        &self.derived.counts
    }

    /// Row at display position `index` (after sorting).
    pub fn display_row(&self, index: usize) -> Option<&PaymentRow> {
        self.derived
            .order
            .get(index)
            .and_then(|&i| self.derived.rows.get(i))
    }

    pub fn window(&self) -> VirtualWindow {
        VirtualWindow::compute(
            self.row_count(),
            self.scroll_offset,
            self.viewport,
            self.row_height,
            self.overscan,
        )
    }

    /// Viewport height in cells, as measured by the last draw. Rounded down to
    /// whole rows, at least one.
    pub fn set_viewport(&mut self, viewport: u64) {
        self.viewport = (viewport / self.row_height).max(1) * self.row_height;
        self.clamp_scroll();
    }

    pub fn scroll_up(&mut self) {
        self.scroll_by(-1);
    }

    pub fn scroll_down(&mut self) {
        self.scroll_by(1);
    }

    pub fn page_up(&mut self) {
        let rows = (self.viewport / self.row_height).max(1) as i64;
        self.scroll_by(-rows);
    }

    pub fn page_down(&mut self) {
        let rows = (self.viewport / self.row_height).max(1) as i64;
        self.scroll_by(rows);
    }

    pub fn scroll_home(&mut self) {
        self.scroll_offset = 0;
    }

    pub fn scroll_end(&mut self) {
        self.scroll_offset = u64::MAX;
        self.clamp_scroll();
    }

    pub fn add_log(&mut self, level: &str, message: &str) {
        self.activity_log.push(LogEntry {
            timestamp: Local::now(),
            level: level.to_string(),
            message: message.to_string(),
        });

        // Keep last 100 entries
        if self.activity_log.len() > MAX_LOG_ENTRIES {
            self.activity_log.remove(0);
        }
    }

    fn scroll_by(&mut self, rows: i64) {
        let delta = rows.unsigned_abs() * self.row_height;
        self.scroll_offset = if rows < 0 {
            self.scroll_offset.saturating_sub(delta)
        } else {
            self.scroll_offset.saturating_add(delta)
        };
        self.clamp_scroll();
    }

    fn clamp_scroll(&mut self) {
        let total = self.row_count() as u64 * self.row_height;
        self.scroll_offset = clamp_scroll(self.scroll_offset, total, self.viewport);
    }

    fn sync_query(&mut self, now: Instant) {
        let key = self.current_key();
        if self.query.set_key(key.clone(), now) {
            info!("Fetching {}", key);
        }
        self.refresh_derived();
    }

    fn refresh_derived(&mut self) {
        let rows = self.query.rows_arc();
        if !Arc::ptr_eq(&rows, &self.derived.rows) || self.derived.sort != self.sort {
            self.derived = Derived::build(rows, &self.sort);
            self.clamp_scroll();
        }
    }

    fn log_event(&mut self, event: &FetchEvent) {
        match event {
            FetchEvent::Committed { rows, .. } => {
                self.add_log("INFO", &format!("{} rows fetched", rows));
            }
            FetchEvent::Failed { error, .. } => {
                warn!("Payments fetch failed: {}", error);
                self.add_log("ERROR", &format!("Fetch failed: {}", error));
            }
            FetchEvent::Stale { .. } => {}
        }
    }
}
