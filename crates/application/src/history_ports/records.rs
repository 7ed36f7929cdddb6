use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use runtally_domain::RunEvent;

/// Which entities one paginated query covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntitySelector {
    /// Every entity the source exposes in one listing.
    AllEntities,
    /// One named entity, such as a repository.
    Entity(String),
}

impl Display for EntitySelector {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AllEntities => formatter.write_str("all"),
            Self::Entity(entity_id) => formatter.write_str(entity_id),
        }
    }
}

/// Query scoping one paginated history listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHistoryQuery {
    /// Entities covered by the listing.
    pub selector: EntitySelector,
    /// Only runs created at or after this instant are requested.
    pub created_after: DateTime<Utc>,
    /// Items requested per page.
    pub page_size: u32,
}

/// Upstream record that could not be mapped onto a run event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRunRecord {
    /// Entity, when readable.
    pub entity_id: Option<String>,
    /// Sub-entity, when readable.
    pub sub_entity: Option<String>,
    /// Why mapping failed.
    pub reason: String,
}

/// One item of a history page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunRecord {
    /// Successfully mapped run.
    Event(RunEvent),
    /// Item that still counts toward the reported total but is not classified.
    Malformed(MalformedRunRecord),
}

/// One page of run history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHistoryPage {
    /// Total items the upstream reports for the whole query.
    pub total_count: u64,
    /// Items on this page.
    pub records: Vec<RunRecord>,
}
