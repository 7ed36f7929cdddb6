use chrono::{DateTime, Utc};

/// Upstream lifecycle state of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Accepted upstream but not started yet.
    Queued,
    /// Started and not finished.
    InProgress,
    /// Finished; the terminal outcome is meaningful.
    Completed,
}

impl RunStatus {
    /// Returns true when the run has reached a conclusion.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns stable status value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

/// Final disposition of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalOutcome {
    /// Run succeeded.
    Success,
    /// Run failed.
    Failure,
    /// Run exceeded its time budget.
    TimedOut,
    /// Run was cancelled.
    Cancelled,
    /// Any other upstream outcome, normalized to lower case.
    Other(String),
}

impl TerminalOutcome {
    /// Maps an upstream outcome label onto a terminal outcome.
    ///
    /// Matching is case-insensitive so both `Failed` and `failure` map to
    /// [`TerminalOutcome::Failure`].
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let normalized = label.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "success" | "succeeded" => Self::Success,
            "failure" | "failed" => Self::Failure,
            "timed_out" | "timedout" => Self::TimedOut,
            "cancelled" | "canceled" => Self::Cancelled,
            _ => Self::Other(normalized),
        }
    }

    /// Returns stable outcome value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
            Self::Other(label) => label.as_str(),
        }
    }

    /// Returns true for a successful outcome.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true for an explicit failure.
    ///
    /// Timeouts and cancellations are not failures here; tag-based
    /// exclusions only ever suppress explicit failures.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure)
    }
}

/// One historical run or invocation record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunEvent {
    /// Entity the run executed against; `None` only contributes to `all`.
    pub entity_id: Option<String>,
    /// Document or workflow name.
    pub sub_entity: String,
    /// Upstream run reference used in diagnostics.
    pub run_ref: String,
    /// When the run was requested or created.
    pub occurred_at: DateTime<Utc>,
    /// When the run concluded; used for window filtering.
    pub completed_at: Option<DateTime<Utc>>,
    /// Upstream lifecycle state.
    pub status: RunStatus,
    /// Terminal outcome, meaningful only when `status` is terminal.
    pub outcome: Option<TerminalOutcome>,
    /// Opaque token linking the run to a scheduling association.
    pub correlation_token: Option<String>,
}

/// Splits a correlation token into its `:`-separated segments.
///
/// A missing token yields no segments.
#[must_use]
pub fn correlation_segments(token: Option<&str>) -> Vec<&str> {
    token.map(|token| token.split(':').collect()).unwrap_or_default()
}
