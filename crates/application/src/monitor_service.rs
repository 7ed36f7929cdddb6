//! Windowed classification run over one run history source.

use std::sync::Arc;

use runtally_core::{AppError, AppResult};
use runtally_domain::{
    AggregateStore, Classification, ExclusionRuleEngine, ExclusionRules, MetadataSnapshot,
    Outcome, RunEvent, TagLookup, TimeWindow, WindowPlan, classify,
};
use tracing::{debug, info, trace, warn};

use crate::history_fetcher::PaginatedFetcher;
use crate::history_ports::{
    EntityMetadataSource, EntitySelector, MalformedRunRecord, RunHistorySource, RunRecord,
};

/// Input for one monitoring run.
#[derive(Debug, Clone)]
pub struct MonitorRequest {
    /// Window and upstream lookback bound.
    pub plan: WindowPlan,
    /// Entities to fetch, one paginated listing each.
    pub selectors: Vec<EntitySelector>,
}

/// Per-verdict tallies for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorSummary {
    /// Records received from the source, malformed ones included.
    pub fetched: u64,
    /// Records that could not be mapped onto events.
    pub malformed: u64,
    /// Events classified as successful.
    pub success: u64,
    /// Events classified as failed.
    pub failed: u64,
    /// Events excluded by a rule.
    pub ignored: u64,
    /// Events completed outside the window.
    pub out_of_window: u64,
    /// Events without a conclusion.
    pub not_terminal: u64,
}

impl MonitorSummary {
    fn observe(&mut self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Success => &mut self.success,
            Outcome::Failed => &mut self.failed,
            Outcome::Ignored => &mut self.ignored,
            Outcome::OutOfWindow => &mut self.out_of_window,
            Outcome::NotTerminal => &mut self.not_terminal,
        };
        *counter = counter.saturating_add(1);
    }
}

/// Completed monitoring run.
#[derive(Debug, Clone)]
pub struct MonitorReport {
    /// Window the counters cover.
    pub window: TimeWindow,
    /// Aggregated counters.
    pub store: AggregateStore,
    /// Verdict tallies.
    pub summary: MonitorSummary,
}

/// Fetches, classifies and aggregates run history for one source.
#[derive(Clone)]
pub struct MonitorService {
    history_source: Arc<dyn RunHistorySource>,
    metadata_source: Option<Arc<dyn EntityMetadataSource>>,
    rules: ExclusionRules,
    fetcher: PaginatedFetcher,
}

impl MonitorService {
    /// Creates a monitor service without entity metadata.
    #[must_use]
    pub fn new(
        history_source: Arc<dyn RunHistorySource>,
        rules: ExclusionRules,
        fetcher: PaginatedFetcher,
    ) -> Self {
        Self {
            history_source,
            metadata_source: None,
            rules,
            fetcher,
        }
    }

    /// Adds an entity tag and association listing.
    #[must_use]
    pub fn with_metadata_source(mut self, metadata_source: Arc<dyn EntityMetadataSource>) -> Self {
        self.metadata_source = Some(metadata_source);
        self
    }

    /// Runs the full pipeline and returns the aggregated counters.
    ///
    /// Any transport or pagination error aborts the run; individual malformed
    /// records are logged and skipped.
    pub async fn run(&self, request: MonitorRequest) -> AppResult<MonitorReport> {
        if request.selectors.is_empty() {
            return Err(AppError::Configuration(
                "at least one entity must be selected".to_owned(),
            ));
        }

        let source_name = self.history_source.source_name();
        let window = request.plan.window;
        let lookback = request.plan.lookback;

        let metadata = match &self.metadata_source {
            Some(metadata_source) => metadata_source.load_snapshot().await?,
            None => MetadataSnapshot::untracked(),
        };
        debug!(
            source = source_name,
            metadata_tracked = metadata.is_tracked(),
            associations = metadata.associations().len(),
            "loaded entity metadata"
        );
        let engine = ExclusionRuleEngine::new(self.rules.clone(), metadata);

        let mut store = AggregateStore::new();
        let mut summary = MonitorSummary::default();

        let baseline = self
            .history_source
            .list_baseline_sub_entities(lookback)
            .await?;
        for sub_entity in &baseline {
            store.register(None, sub_entity);
        }

        info!(
            source = source_name,
            window_start = %window.start(),
            window_end = %window.end(),
            lookback = %lookback,
            selectors = request.selectors.len(),
            baseline = baseline.len(),
            "starting monitoring run"
        );

        for selector in request.selectors {
            let history = self
                .fetcher
                .fetch_all(self.history_source.as_ref(), selector, lookback)
                .await?;
            debug!(
                source = source_name,
                selector = %history.selector,
                pages = history.pages,
                total_count = history.total_count,
                "fetched run history"
            );

            for record in history.records {
                summary.fetched = summary.fetched.saturating_add(1);
                match record {
                    RunRecord::Event(event) => {
                        let classification =
                            Self::ingest_event(&mut store, &engine, &window, &event);
                        summary.observe(classification.outcome);
                    }
                    RunRecord::Malformed(malformed) => {
                        Self::skip_malformed(&mut store, &malformed);
                        summary.malformed = summary.malformed.saturating_add(1);
                    }
                }
            }
        }

        info!(
            source = source_name,
            fetched = summary.fetched,
            success = summary.success,
            failed = summary.failed,
            ignored = summary.ignored,
            out_of_window = summary.out_of_window,
            not_terminal = summary.not_terminal,
            malformed = summary.malformed,
            "monitoring run complete"
        );

        Ok(MonitorReport {
            window,
            store,
            summary,
        })
    }

    fn ingest_event(
        store: &mut AggregateStore,
        engine: &ExclusionRuleEngine,
        window: &TimeWindow,
        event: &RunEvent,
    ) -> Classification {
        let entity_id = event.entity_id.as_deref();
        store.register(entity_id, event.sub_entity.as_str());

        let classification = classify(event, window, engine);
        log_classification(engine, event, classification);
        store.record(entity_id, event.sub_entity.as_str(), classification.outcome);

        classification
    }

    fn skip_malformed(store: &mut AggregateStore, malformed: &MalformedRunRecord) {
        if let Some(sub_entity) = malformed.sub_entity.as_deref() {
            store.register(malformed.entity_id.as_deref(), sub_entity);
        }

        warn!(
            entity = malformed.entity_id.as_deref().unwrap_or("-"),
            sub_entity = malformed.sub_entity.as_deref().unwrap_or("-"),
            reason = %malformed.reason,
            "skipping malformed run record"
        );
    }
}

fn log_classification(
    engine: &ExclusionRuleEngine,
    event: &RunEvent,
    classification: Classification,
) {
    let entity = event.entity_id.as_deref().unwrap_or("-");
    let outcome_label = event
        .outcome
        .as_ref()
        .map_or(event.status.as_str(), |outcome| outcome.as_str());

    match classification.outcome {
        Outcome::Failed => {
            info!(
                entity,
                sub_entity = %event.sub_entity,
                run = %event.run_ref,
                upstream_outcome = outcome_label,
                "run failed"
            );
            trace!(event = ?event, "failed run detail");
            if let TagLookup::Known(tags) = engine.metadata().lookup(event.entity_id.as_deref()) {
                trace!(target: "raw_payload", entity, tags = ?tags, "failed run entity tags");
            }
        }
        Outcome::Ignored => debug!(
            entity,
            sub_entity = %event.sub_entity,
            run = %event.run_ref,
            upstream_outcome = outcome_label,
            reason = classification.reason.map_or("-", |reason| reason.as_str()),
            "ignoring run"
        ),
        Outcome::NotTerminal | Outcome::OutOfWindow => debug!(
            entity,
            sub_entity = %event.sub_entity,
            run = %event.run_ref,
            status = event.status.as_str(),
            outcome = classification.outcome.as_str(),
            "skipping run"
        ),
        Outcome::Success => trace!(
            entity,
            sub_entity = %event.sub_entity,
            run = %event.run_ref,
            "run succeeded"
        ),
    }
}
