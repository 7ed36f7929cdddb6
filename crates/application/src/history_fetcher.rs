//! Paginated run history retrieval with completeness checks.

use chrono::{DateTime, Utc};
use runtally_core::{AppError, AppResult};
use tracing::trace;

use crate::history_ports::{EntitySelector, RunHistoryQuery, RunHistorySource, RunRecord};

/// Default number of items requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Upper bound on pages requested for one entity.
pub const MAX_PAGES: u32 = 10_000;

/// Every record returned for one entity selector.
#[derive(Debug, Clone)]
pub struct FetchedHistory {
    /// Entities covered.
    pub selector: EntitySelector,
    /// Total reported by the last page.
    pub total_count: u64,
    /// Pages requested.
    pub pages: u32,
    /// Records in upstream order.
    pub records: Vec<RunRecord>,
}

/// Requests pages until the upstream-reported total has been received.
#[derive(Debug, Clone, Copy)]
pub struct PaginatedFetcher {
    page_size: u32,
    max_pages: u32,
}

impl PaginatedFetcher {
    /// Creates a fetcher with a fixed page size.
    pub fn new(page_size: u32) -> AppResult<Self> {
        if page_size == 0 {
            return Err(AppError::Configuration(
                "page size must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            page_size,
            max_pages: MAX_PAGES,
        })
    }

    /// Overrides the page request limit.
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Fetches every page for one selector.
    ///
    /// Stops once the cumulative item count equals the reported total. A page
    /// that comes back short before the total is reached, or a cumulative
    /// count that overshoots it, is an [`AppError::IncompleteData`]. No page
    /// is retried.
    pub async fn fetch_all(
        &self,
        source: &dyn RunHistorySource,
        selector: EntitySelector,
        created_after: DateTime<Utc>,
    ) -> AppResult<FetchedHistory> {
        let query = RunHistoryQuery {
            selector,
            created_after,
            page_size: self.page_size,
        };
        let mut records = Vec::new();
        let mut received = 0_u64;

        for page in 1..=self.max_pages {
            let history_page = source.fetch_page(&query, page).await?;
            let item_count = u64::try_from(history_page.records.len()).unwrap_or(u64::MAX);
            let total_count = history_page.total_count;
            received = received.saturating_add(item_count);
            records.extend(history_page.records);

            trace!(
                target: "raw_payload",
                source = source.source_name(),
                selector = %query.selector,
                page,
                item_count,
                received,
                total_count,
                "fetched run history page"
            );

            if received == total_count {
                return Ok(FetchedHistory {
                    selector: query.selector,
                    total_count,
                    pages: page,
                    records,
                });
            }

            if received > total_count {
                return Err(AppError::IncompleteData(format!(
                    "{} history for '{}' returned {received} items but reported a total of {total_count}",
                    source.source_name(),
                    query.selector
                )));
            }

            if item_count < u64::from(self.page_size) {
                return Err(AppError::IncompleteData(format!(
                    "{} history for '{}' page {page} returned {item_count} of {} items with {received}/{total_count} received",
                    source.source_name(),
                    query.selector,
                    self.page_size
                )));
            }
        }

        Err(AppError::IncompleteData(format!(
            "{} history for '{}' not complete after {} pages ({received} items received)",
            source.source_name(),
            query.selector,
            self.max_pages
        )))
    }
}
