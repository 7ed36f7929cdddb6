//! Domain entities and invariants for windowed run classification.

#![forbid(unsafe_code)]

mod aggregate;
mod classifier;
mod event;
mod exclusion;
mod metadata;
mod window;

pub use aggregate::{AggregateRow, AggregateStore, CounterBucket, EntityKey, SubEntityKey};
pub use classifier::{Classification, Outcome, classify};
pub use event::{RunEvent, RunStatus, TerminalOutcome, correlation_segments};
pub use exclusion::{
    ExclusionCandidate, ExclusionReason, ExclusionRuleEngine, ExclusionRules,
    ExclusionRulesInput, TagPredicate,
};
pub use metadata::{AssociationIndex, EntityMetadata, EntityTags, MetadataSnapshot, TagLookup};
pub use window::{MAX_WINDOW_SPAN_SECS, TimeWindow, WindowParams, WindowPlan};
