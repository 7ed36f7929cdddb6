use async_trait::async_trait;
use chrono::{DateTime, Utc};
use runtally_core::AppResult;
use runtally_domain::MetadataSnapshot;

use super::records::{RunHistoryPage, RunHistoryQuery};

/// Port for paginated run history listings.
#[async_trait]
pub trait RunHistorySource: Send + Sync {
    /// Returns a short source name used in diagnostics.
    fn source_name(&self) -> &'static str;

    /// Fetches one 1-based page of run history.
    async fn fetch_page(&self, query: &RunHistoryQuery, page: u32) -> AppResult<RunHistoryPage>;

    /// Lists sub-entities known to exist since `since`, registered with zero
    /// counts before any event is classified.
    async fn list_baseline_sub_entities(&self, _since: DateTime<Utc>) -> AppResult<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Port for entity tag and association listings.
#[async_trait]
pub trait EntityMetadataSource: Send + Sync {
    /// Loads entity tags and association ids as of call time.
    async fn load_snapshot(&self) -> AppResult<MetadataSnapshot>;
}
