use crate::event::RunEvent;
use crate::exclusion::{ExclusionReason, ExclusionRuleEngine};
use crate::window::TimeWindow;

/// Verdict for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Completed successfully inside the window.
    Success,
    /// Completed unsuccessfully inside the window.
    Failed,
    /// Excluded by an exclusion rule.
    Ignored,
    /// Completed outside the window.
    OutOfWindow,
    /// Has not reached a conclusion.
    NotTerminal,
}

impl Outcome {
    /// Returns stable outcome value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Ignored => "ignored",
            Self::OutOfWindow => "out_of_window",
            Self::NotTerminal => "not_terminal",
        }
    }

    /// Returns true when the outcome increments a counter.
    #[must_use]
    pub fn is_counted(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Ignored)
    }
}

/// Outcome plus the exclusion reason for ignored events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Verdict for the event.
    pub outcome: Outcome,
    /// Rule that excluded the event, for [`Outcome::Ignored`].
    pub reason: Option<ExclusionReason>,
}

impl Classification {
    fn plain(outcome: Outcome) -> Self {
        Self {
            outcome,
            reason: None,
        }
    }
}

/// Classifies one event against the window and exclusion rules.
///
/// Unfinished and out-of-window events are resolved before any exclusion rule
/// is consulted. Terminal events without a success outcome count as failed.
#[must_use]
pub fn classify(
    event: &RunEvent,
    window: &TimeWindow,
    engine: &ExclusionRuleEngine,
) -> Classification {
    if !event.status.is_terminal() {
        return Classification::plain(Outcome::NotTerminal);
    }

    match event.completed_at {
        Some(completed_at) if window.contains(completed_at) => {}
        _ => return Classification::plain(Outcome::OutOfWindow),
    }

    if let Some(reason) = engine.evaluate_event(event) {
        return Classification {
            outcome: Outcome::Ignored,
            reason: Some(reason),
        };
    }

    if event
        .outcome
        .as_ref()
        .is_some_and(|outcome| outcome.is_success())
    {
        Classification::plain(Outcome::Success)
    } else {
        Classification::plain(Outcome::Failed)
    }
}
