use std::collections::BTreeMap;
use std::path::Path;

use chrono::TimeDelta;
use runtally_core::{AppError, AppResult};
use runtally_domain::{ExclusionRules, ExclusionRulesInput};
use serde::Deserialize;

const GITHUB_WORKFLOWS_PROFILE: &str = include_str!("../profiles/github_workflows.json");
const SSM_COMMANDS_PROFILE: &str = include_str!("../profiles/ssm_commands.json");

/// Longest accepted in-flight duration for one event.
const MAX_EVENT_DURATION_LIMIT_SECS: u64 = 30 * 86_400;

/// Rule profile compiled into the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinProfile {
    /// Scheduled GitHub Actions workflows.
    GithubWorkflows,
    /// AWS SSM command invocations.
    SsmCommands,
}

/// Immutable rule configuration for one source, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleProfile {
    #[serde(default)]
    hard_exclude: Vec<String>,
    #[serde(default)]
    tag_exclusions: BTreeMap<String, Vec<BTreeMap<String, String>>>,
    #[serde(default)]
    ignorable_outcomes: Vec<String>,
    #[serde(default)]
    default_entities: Vec<String>,
    #[serde(default)]
    default_owner: Option<String>,
    max_event_duration_secs: u64,
}

impl RuleProfile {
    /// Returns a built-in profile.
    pub fn builtin(profile: BuiltinProfile) -> AppResult<Self> {
        match profile {
            BuiltinProfile::GithubWorkflows => Self::from_json(GITHUB_WORKFLOWS_PROFILE),
            BuiltinProfile::SsmCommands => Self::from_json(SSM_COMMANDS_PROFILE),
        }
    }

    /// Loads a profile file, or the built-in profile when no path is given.
    pub fn load_or_builtin(path: Option<&Path>, builtin: BuiltinProfile) -> AppResult<Self> {
        match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path).map_err(|error| {
                    AppError::Configuration(format!(
                        "failed to read rule profile '{}': {error}",
                        path.display()
                    ))
                })?;
                Self::from_json(contents.as_str())
            }
            None => Self::builtin(builtin),
        }
    }

    /// Parses and validates a JSON profile.
    pub fn from_json(contents: &str) -> AppResult<Self> {
        let profile = serde_json::from_str::<Self>(contents).map_err(|error| {
            AppError::Configuration(format!("invalid rule profile: {error}"))
        })?;

        if profile.max_event_duration_secs > MAX_EVENT_DURATION_LIMIT_SECS {
            return Err(AppError::Configuration(format!(
                "max_event_duration_secs must not exceed {MAX_EVENT_DURATION_LIMIT_SECS}"
            )));
        }

        profile.exclusion_rules()?;
        Ok(profile)
    }

    /// Builds the exclusion rule tables.
    pub fn exclusion_rules(&self) -> AppResult<ExclusionRules> {
        ExclusionRules::new(ExclusionRulesInput {
            hard_exclude: self.hard_exclude.clone(),
            tag_exclusions: self.tag_exclusions.clone(),
            ignorable_outcomes: self.ignorable_outcomes.clone(),
        })
    }

    /// Returns the entity names used when `all` is requested.
    #[must_use]
    pub fn default_entities(&self) -> &[String] {
        self.default_entities.as_slice()
    }

    /// Returns the owner of the default entities, when the profile names one.
    #[must_use]
    pub fn default_owner(&self) -> Option<&str> {
        self.default_owner
            .as_deref()
            .map(str::trim)
            .filter(|owner| !owner.is_empty())
    }

    /// Returns how long an event may run before completing.
    #[must_use]
    pub fn max_event_duration(&self) -> TimeDelta {
        TimeDelta::seconds(i64::try_from(self.max_event_duration_secs).unwrap_or(i64::MAX))
    }
}
