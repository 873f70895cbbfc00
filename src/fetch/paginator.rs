//! Sequential page walker over the DOAJ journal search.
//!
//! Records are handed out one at a time; a new page is requested only when
//! the previous one has been drained, so a caller that stops pulling never
//! triggers another request.

use crate::fetch::transport::Transport;
use crate::models::RawRecord;
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Pagination settings.
#[derive(Debug, Clone)]
pub struct PaginatorConfig {
    pub page_size: usize,
    pub start_page: u32,
    /// Pause before every page request except the first.
    pub delay: Duration,
}

impl Default for PaginatorConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            start_page: 1,
            delay: Duration::from_millis(500),
        }
    }
}

impl From<&crate::config::ApiConfig> for PaginatorConfig {
    fn from(config: &crate::config::ApiConfig) -> Self {
        Self {
            page_size: config.page_size,
            start_page: config.start_page,
            delay: Duration::from_millis(config.rate_limit_delay_ms),
        }
    }
}

/// Why the walk ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The caller's record budget was used up.
    BudgetReached,
    /// A page came back without results.
    Exhausted,
    /// A page request failed after the transport gave up on it.
    TransportFailed { page: u32, error: String },
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::BudgetReached => write!(f, "limit reached"),
            StopReason::Exhausted => write!(f, "no more results"),
            StopReason::TransportFailed { page, error } => {
                write!(f, "page {} failed: {}", page, error)
            }
        }
    }
}

/// Lazy, single-pass walk over the journal pages.
pub struct Paginator<'a, T: Transport + ?Sized> {
    transport: &'a T,
    url: String,
    config: PaginatorConfig,
    next_page: u32,
    buffer: VecDeque<RawRecord>,
    pages_fetched: u32,
    records_yielded: usize,
    stop: Option<StopReason>,
}

impl<'a, T: Transport + ?Sized> Paginator<'a, T> {
    pub fn new(transport: &'a T, url: impl Into<String>, config: PaginatorConfig) -> Self {
        Self {
            transport,
            url: url.into(),
            next_page: config.start_page,
            config,
            buffer: VecDeque::new(),
            pages_fetched: 0,
            records_yielded: 0,
            stop: None,
        }
    }

    /// Next record in source order, or `None` once the walk has ended.
    pub async fn next_record(&mut self) -> Option<RawRecord> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                self.records_yielded += 1;
                return Some(record);
            }
            if self.stop.is_some() {
                return None;
            }
            self.fetch_next_page().await;
        }
    }

    /// End the walk on the caller's side; buffered records are dropped.
    pub fn stop_with_budget_reached(&mut self) {
        if self.stop.is_none() {
            debug!(
                "Budget reached with {} buffered record(s) unread",
                self.buffer.len()
            );
            self.stop = Some(StopReason::BudgetReached);
        }
        self.buffer.clear();
    }

    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.stop.as_ref()
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    pub fn records_yielded(&self) -> usize {
        self.records_yielded
    }

    async fn fetch_next_page(&mut self) {
        if self.pages_fetched > 0 && !self.config.delay.is_zero() {
            tokio::time::sleep(self.config.delay).await;
        }

        let page = self.next_page;
        info!("Fetching journals page {}...", page);

        let params = vec![
            ("pageSize".to_string(), self.config.page_size.to_string()),
            ("page".to_string(), page.to_string()),
        ];

        let mut body = match self.transport.get(&self.url, &params).await {
            Ok(body) => body,
            Err(e) => {
                error!("Failed to fetch journals page {}: {}", page, e);
                self.stop = Some(StopReason::TransportFailed {
                    page,
                    error: e.to_string(),
                });
                return;
            }
        };

        self.pages_fetched += 1;
        self.next_page += 1;

        let results = match body.get_mut("results").map(Value::take) {
            Some(Value::Array(results)) if !results.is_empty() => results,
            _ => {
                info!("Page {} returned no results; source exhausted", page);
                self.stop = Some(StopReason::Exhausted);
                return;
            }
        };

        debug!("Page {} returned {} results", page, results.len());
        for (index, value) in results.into_iter().enumerate() {
            match RawRecord::from_value(value) {
                Some(record) => self.buffer.push_back(record),
                None => warn!("Skipping non-object result {} on page {}", index, page),
            }
        }
    }
}
