mod records;
mod sources;

pub use records::{
    EntitySelector, MalformedRunRecord, RunHistoryPage, RunHistoryQuery, RunRecord,
};
pub use sources::{EntityMetadataSource, RunHistorySource};
