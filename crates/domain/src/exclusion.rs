use std::collections::{BTreeMap, HashMap, HashSet};

use runtally_core::{AppError, AppResult};

use crate::event::{RunEvent, RunStatus, TerminalOutcome, correlation_segments};
use crate::metadata::{EntityTags, MetadataSnapshot, TagLookup};

/// Tag conditions that must all hold on an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPredicate(BTreeMap<String, String>);

impl TagPredicate {
    /// Creates a predicate with at least one required tag.
    pub fn new(required: BTreeMap<String, String>) -> AppResult<Self> {
        if required.is_empty() {
            return Err(AppError::Configuration(
                "tag predicate must require at least one tag".to_owned(),
            ));
        }

        Ok(Self(required))
    }

    /// Returns true when every required key is present with an equal value.
    #[must_use]
    pub fn matches(&self, tags: &EntityTags) -> bool {
        self.0
            .iter()
            .all(|(key, value)| tags.get(key) == Some(value.as_str()))
    }
}

/// Why an event was excluded from success/failure counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionReason {
    /// Correlation token does not reference a scheduling association.
    NotScheduledViaAssociation,
    /// Referenced association is not listed.
    AssociationNotFound,
    /// Run has not finished.
    StillRunning,
    /// Entity is missing from the metadata listing.
    EntityMetadataNotFound,
    /// Failure matches an accepted tag predicate.
    KnownFailureMode,
    /// Outcome is configured as noise.
    IgnorableOutcome,
}

impl ExclusionReason {
    /// Returns a human-readable reason.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotScheduledViaAssociation => "not scheduled via association",
            Self::AssociationNotFound => "association not found",
            Self::StillRunning => "still running",
            Self::EntityMetadataNotFound => "entity metadata not found",
            Self::KnownFailureMode => "known failure mode",
            Self::IgnorableOutcome => "ignorable outcome",
        }
    }
}

/// Input payload used to construct validated exclusion rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionRulesInput {
    /// Sub-entities excluded unless scheduled via a known association.
    pub hard_exclude: Vec<String>,
    /// Ordered tag predicates per sub-entity; matching failures are excluded.
    pub tag_exclusions: BTreeMap<String, Vec<BTreeMap<String, String>>>,
    /// Terminal outcome names treated as noise.
    pub ignorable_outcomes: Vec<String>,
}

/// Immutable exclusion rule tables.
#[derive(Debug, Clone, Default)]
pub struct ExclusionRules {
    hard_exclude: HashSet<String>,
    tag_exclusions: HashMap<String, Vec<TagPredicate>>,
    ignorable_outcomes: HashSet<String>,
}

impl ExclusionRules {
    /// Creates validated rule tables.
    pub fn new(input: ExclusionRulesInput) -> AppResult<Self> {
        let ExclusionRulesInput {
            hard_exclude,
            tag_exclusions,
            ignorable_outcomes,
        } = input;

        let mut predicates_by_sub_entity = HashMap::with_capacity(tag_exclusions.len());
        for (sub_entity, predicates) in tag_exclusions {
            let predicates = predicates
                .into_iter()
                .map(TagPredicate::new)
                .collect::<AppResult<Vec<_>>>()
                .map_err(|error| {
                    AppError::Configuration(format!(
                        "invalid tag exclusion for '{sub_entity}': {error}"
                    ))
                })?;
            predicates_by_sub_entity.insert(sub_entity, predicates);
        }

        Ok(Self {
            hard_exclude: hard_exclude.into_iter().collect(),
            tag_exclusions: predicates_by_sub_entity,
            ignorable_outcomes: ignorable_outcomes
                .iter()
                .map(|outcome| TerminalOutcome::from_label(outcome).as_str().to_owned())
                .collect(),
        })
    }

    /// Returns true when the sub-entity requires association validation.
    #[must_use]
    pub fn is_hard_excluded(&self, sub_entity: &str) -> bool {
        self.hard_exclude.contains(sub_entity)
    }

    /// Returns the tag predicates configured for a sub-entity.
    #[must_use]
    pub fn predicates_for(&self, sub_entity: &str) -> &[TagPredicate] {
        self.tag_exclusions
            .get(sub_entity)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns true when the outcome is configured as noise.
    #[must_use]
    pub fn is_ignorable_outcome(&self, outcome: &TerminalOutcome) -> bool {
        self.ignorable_outcomes.contains(outcome.as_str())
    }
}

/// Inputs evaluated against the exclusion rules for one event.
#[derive(Debug, Clone, Copy)]
pub struct ExclusionCandidate<'a> {
    /// Document or workflow name.
    pub sub_entity: &'a str,
    /// Upstream lifecycle state.
    pub status: RunStatus,
    /// Terminal outcome, if any.
    pub outcome: Option<&'a TerminalOutcome>,
    /// Tags of the event's entity.
    pub tags: TagLookup<'a>,
    /// Correlation token attached to the event.
    pub correlation_token: Option<&'a str>,
}

/// Evaluates the layered exclusion rules; the first applicable rule wins.
#[derive(Debug, Clone)]
pub struct ExclusionRuleEngine {
    rules: ExclusionRules,
    metadata: MetadataSnapshot,
}

impl ExclusionRuleEngine {
    /// Creates a rule engine over immutable rules and one metadata snapshot.
    #[must_use]
    pub fn new(rules: ExclusionRules, metadata: MetadataSnapshot) -> Self {
        Self { rules, metadata }
    }

    /// Returns the metadata snapshot consulted by this engine.
    #[must_use]
    pub fn metadata(&self) -> &MetadataSnapshot {
        &self.metadata
    }

    /// Returns the first exclusion reason that applies, if any.
    ///
    /// Order: association checks for hard-excluded sub-entities, unfinished
    /// runs, unknown entity metadata, tag predicates on failures, then
    /// ignorable outcomes.
    #[must_use]
    pub fn evaluate(&self, candidate: &ExclusionCandidate<'_>) -> Option<ExclusionReason> {
        if self.rules.is_hard_excluded(candidate.sub_entity) {
            let segments = correlation_segments(candidate.correlation_token);
            if segments.len() != 2 {
                return Some(ExclusionReason::NotScheduledViaAssociation);
            }
            if !self.metadata.associations().contains(segments[0]) {
                return Some(ExclusionReason::AssociationNotFound);
            }
        }

        if !candidate.status.is_terminal() {
            return Some(ExclusionReason::StillRunning);
        }

        if candidate.tags == TagLookup::Unknown {
            return Some(ExclusionReason::EntityMetadataNotFound);
        }

        let outcome = candidate.outcome?;

        if outcome.is_failure()
            && let TagLookup::Known(tags) = candidate.tags
            && self
                .rules
                .predicates_for(candidate.sub_entity)
                .iter()
                .any(|predicate| predicate.matches(tags))
        {
            return Some(ExclusionReason::KnownFailureMode);
        }

        if self.rules.is_ignorable_outcome(outcome) {
            return Some(ExclusionReason::IgnorableOutcome);
        }

        None
    }

    /// Returns true when any exclusion rule applies.
    #[must_use]
    pub fn should_exclude(&self, candidate: &ExclusionCandidate<'_>) -> bool {
        self.evaluate(candidate).is_some()
    }

    /// Evaluates the rules for one event, looking up its entity tags.
    #[must_use]
    pub fn evaluate_event(&self, event: &RunEvent) -> Option<ExclusionReason> {
        self.evaluate(&ExclusionCandidate {
            sub_entity: event.sub_entity.as_str(),
            status: event.status,
            outcome: event.outcome.as_ref(),
            tags: self.metadata.lookup(event.entity_id.as_deref()),
            correlation_token: event.correlation_token.as_deref(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{
        ExclusionCandidate, ExclusionReason, ExclusionRuleEngine, ExclusionRules,
        ExclusionRulesInput,
    };
    use crate::event::{RunStatus, TerminalOutcome};
    use crate::metadata::{AssociationIndex, EntityMetadata, EntityTags, MetadataSnapshot, TagLookup};

    fn predicate(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect()
    }

    fn engine() -> ExclusionRuleEngine {
        let mut tag_exclusions = BTreeMap::new();
        tag_exclusions.insert(
            "Y".to_owned(),
            vec![
                predicate(&[("server-type", "NartClient")]),
                predicate(&[("os-type", "Linux")]),
            ],
        );
        let rules = ExclusionRules::new(ExclusionRulesInput {
            hard_exclude: vec!["X".to_owned()],
            tag_exclusions,
            ignorable_outcomes: vec!["Skipped".to_owned()],
        })
        .unwrap_or_else(|_| unreachable!());

        let associations: AssociationIndex = ["assoc-1"].into_iter().collect();
        ExclusionRuleEngine::new(
            rules,
            MetadataSnapshot::tracked(EntityMetadata::new(), associations),
        )
    }

    fn candidate<'a>(
        sub_entity: &'a str,
        status: RunStatus,
        outcome: Option<&'a TerminalOutcome>,
        tags: TagLookup<'a>,
        correlation_token: Option<&'a str>,
    ) -> ExclusionCandidate<'a> {
        ExclusionCandidate {
            sub_entity,
            status,
            outcome,
            tags,
            correlation_token,
        }
    }

    #[test]
    fn empty_predicate_is_rejected() {
        let mut tag_exclusions = BTreeMap::new();
        tag_exclusions.insert("Y".to_owned(), vec![BTreeMap::new()]);
        let rules = ExclusionRules::new(ExclusionRulesInput {
            tag_exclusions,
            ..ExclusionRulesInput::default()
        });

        assert!(rules.is_err());
    }

    #[test]
    fn hard_excluded_single_segment_token_is_not_scheduled() {
        let engine = engine();
        let tags = EntityTags::new();
        let success = TerminalOutcome::Success;

        for status in [RunStatus::Completed, RunStatus::InProgress] {
            let reason = engine.evaluate(&candidate(
                "X",
                status,
                Some(&success),
                TagLookup::Known(&tags),
                Some("abc"),
            ));
            assert_eq!(reason, Some(ExclusionReason::NotScheduledViaAssociation));
        }
    }

    #[test]
    fn hard_excluded_unknown_association_is_excluded() {
        let engine = engine();
        let tags = EntityTags::new();
        let success = TerminalOutcome::Success;

        let reason = engine.evaluate(&candidate(
            "X",
            RunStatus::Completed,
            Some(&success),
            TagLookup::Known(&tags),
            Some("assoc-9:exec-1"),
        ));
        assert_eq!(reason, Some(ExclusionReason::AssociationNotFound));

        let reason = engine.evaluate(&candidate(
            "X",
            RunStatus::Completed,
            Some(&success),
            TagLookup::Known(&tags),
            Some("assoc-1:exec-1"),
        ));
        assert_eq!(reason, None);
    }

    #[test]
    fn association_checks_skip_other_sub_entities() {
        let engine = engine();
        let tags = EntityTags::new();
        let failure = TerminalOutcome::Failure;

        let reason = engine.evaluate(&candidate(
            "Z",
            RunStatus::Completed,
            Some(&failure),
            TagLookup::Known(&tags),
            None,
        ));
        assert_eq!(reason, None);
    }

    #[test]
    fn unfinished_run_is_still_running() {
        let engine = engine();
        let reason = engine.evaluate(&candidate(
            "Z",
            RunStatus::InProgress,
            None,
            TagLookup::Unknown,
            None,
        ));
        assert_eq!(reason, Some(ExclusionReason::StillRunning));
    }

    #[test]
    fn unknown_entity_metadata_is_excluded() {
        let engine = engine();
        let success = TerminalOutcome::Success;
        let reason = engine.evaluate(&candidate(
            "Z",
            RunStatus::Completed,
            Some(&success),
            TagLookup::Unknown,
            None,
        ));
        assert_eq!(reason, Some(ExclusionReason::EntityMetadataNotFound));
    }

    #[test]
    fn tag_predicate_ignores_matching_failures_only() {
        let engine = engine();
        let linux: EntityTags = [("os-type", "Linux"), ("server-type", "Foo")]
            .into_iter()
            .collect();
        let windows: EntityTags = [("os-type", "Windows")].into_iter().collect();
        let failure = TerminalOutcome::Failure;
        let success = TerminalOutcome::Success;

        let reason = engine.evaluate(&candidate(
            "Y",
            RunStatus::Completed,
            Some(&failure),
            TagLookup::Known(&linux),
            None,
        ));
        assert_eq!(reason, Some(ExclusionReason::KnownFailureMode));

        let reason = engine.evaluate(&candidate(
            "Y",
            RunStatus::Completed,
            Some(&failure),
            TagLookup::Known(&windows),
            None,
        ));
        assert_eq!(reason, None);

        let reason = engine.evaluate(&candidate(
            "Y",
            RunStatus::Completed,
            Some(&success),
            TagLookup::Known(&linux),
            None,
        ));
        assert_eq!(reason, None);
    }

    #[test]
    fn tag_predicate_requires_every_pair() {
        let mut tag_exclusions = BTreeMap::new();
        tag_exclusions.insert(
            "Y".to_owned(),
            vec![predicate(&[
                ("environment-name", "nomis-development"),
                ("server-type", "NomisClient"),
            ])],
        );
        let rules = ExclusionRules::new(ExclusionRulesInput {
            tag_exclusions,
            ..ExclusionRulesInput::default()
        })
        .unwrap_or_else(|_| unreachable!());
        let engine = ExclusionRuleEngine::new(rules, MetadataSnapshot::untracked());
        let partial: EntityTags = [("server-type", "NomisClient")].into_iter().collect();
        let failure = TerminalOutcome::Failure;

        assert!(!engine.should_exclude(&candidate(
            "Y",
            RunStatus::Completed,
            Some(&failure),
            TagLookup::Known(&partial),
            None,
        )));
    }

    #[test]
    fn timeout_is_not_suppressed_by_tag_predicates() {
        let engine = engine();
        let linux: EntityTags = [("os-type", "Linux")].into_iter().collect();
        let timed_out = TerminalOutcome::TimedOut;

        assert!(!engine.should_exclude(&candidate(
            "Y",
            RunStatus::Completed,
            Some(&timed_out),
            TagLookup::Known(&linux),
            None,
        )));
    }

    #[test]
    fn ignorable_outcome_is_excluded_after_other_rules() {
        let engine = engine();
        let tags = EntityTags::new();
        let skipped = TerminalOutcome::from_label("skipped");

        let reason = engine.evaluate(&candidate(
            "Z",
            RunStatus::Completed,
            Some(&skipped),
            TagLookup::Known(&tags),
            None,
        ));
        assert_eq!(reason, Some(ExclusionReason::IgnorableOutcome));
    }

    #[test]
    fn untracked_metadata_skips_metadata_rule() {
        let rules = ExclusionRules::new(ExclusionRulesInput::default())
            .unwrap_or_else(|_| unreachable!());
        let engine = ExclusionRuleEngine::new(rules, MetadataSnapshot::untracked());
        let failure = TerminalOutcome::Failure;

        assert!(!engine.should_exclude(&candidate(
            "deploy",
            RunStatus::Completed,
            Some(&failure),
            TagLookup::Untracked,
            None,
        )));
    }
}
