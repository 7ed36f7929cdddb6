//! Application services and ports.

#![forbid(unsafe_code)]

mod history_fetcher;
mod history_ports;
mod monitor_service;

pub use history_fetcher::{DEFAULT_PAGE_SIZE, FetchedHistory, MAX_PAGES, PaginatedFetcher};
pub use history_ports::{
    EntityMetadataSource, EntitySelector, MalformedRunRecord, RunHistoryPage, RunHistoryQuery,
    RunHistorySource, RunRecord,
};
pub use monitor_service::{MonitorReport, MonitorRequest, MonitorService, MonitorSummary};
