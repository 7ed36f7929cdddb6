use async_trait::async_trait;
use reqwest::header;
use runtally_application::{
    EntitySelector, MalformedRunRecord, RunHistoryPage, RunHistoryQuery, RunHistorySource,
    RunRecord,
};
use runtally_core::{AppError, AppResult, NonEmptyString};
use runtally_domain::{RunEvent, RunStatus, TerminalOutcome};
use serde_json::Value;
use tracing::trace;
use url::Url;

use crate::json_fields::{array_field, filter_timestamp, str_field, timestamp_field};

const GITHUB_API_VERSION: &str = "2022-11-28";

/// GitHub Actions workflow run history for repositories of one owner.
#[derive(Debug, Clone)]
pub struct GithubWorkflowRunSource {
    http_client: reqwest::Client,
    api_base_url: Url,
    owner: NonEmptyString,
    event: String,
    token: String,
}

impl GithubWorkflowRunSource {
    /// Creates a workflow run source.
    pub fn new(
        http_client: reqwest::Client,
        api_base_url: &str,
        owner: &str,
        event: &str,
        token: String,
    ) -> AppResult<Self> {
        let api_base_url = Url::parse(api_base_url).map_err(|error| {
            AppError::Configuration(format!("invalid GitHub API base URL '{api_base_url}': {error}"))
        })?;
        let owner = NonEmptyString::new(owner).map_err(|_| {
            AppError::Configuration("GitHub owner must not be empty".to_owned())
        })?;
        if token.trim().is_empty() {
            return Err(AppError::Configuration(
                "GitHub token must not be empty".to_owned(),
            ));
        }

        Ok(Self {
            http_client,
            api_base_url,
            owner,
            event: event.trim().to_owned(),
            token,
        })
    }

    fn runs_url(&self, repo: &str, query: &RunHistoryQuery, page: u32) -> AppResult<Url> {
        let mut url = self.api_base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                AppError::Configuration(format!(
                    "GitHub API base URL '{}' cannot carry a path",
                    self.api_base_url
                ))
            })?
            .pop_if_empty()
            .extend(["repos", self.owner.as_str(), repo, "actions", "runs"]);

        {
            let mut pairs = url.query_pairs_mut();
            if !self.event.is_empty() {
                pairs.append_pair("event", self.event.as_str());
            }
            pairs
                .append_pair(
                    "created",
                    format!(">={}", filter_timestamp(query.created_after)).as_str(),
                )
                .append_pair("per_page", query.page_size.to_string().as_str())
                .append_pair("page", page.to_string().as_str());
        }

        Ok(url)
    }
}

#[async_trait]
impl RunHistorySource for GithubWorkflowRunSource {
    fn source_name(&self) -> &'static str {
        "github-workflows"
    }

    async fn fetch_page(&self, query: &RunHistoryQuery, page: u32) -> AppResult<RunHistoryPage> {
        let EntitySelector::Entity(repo) = &query.selector else {
            return Err(AppError::Configuration(
                "GitHub workflow runs are listed per repository".to_owned(),
            ));
        };

        let url = self.runs_url(repo, query, page)?;
        trace!(target: "raw_payload", url = %url, "requesting workflow runs");

        let response = self
            .http_client
            .get(url)
            .bearer_auth(self.token.as_str())
            .header(header::ACCEPT, "application/vnd.github+json")
            .header(header::USER_AGENT, "runtally")
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .send()
            .await
            .map_err(|error| {
                AppError::Transport(format!("failed to call GitHub for {repo} page {page}: {error}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            AppError::Transport(format!(
                "failed to read GitHub response for {repo} page {page}: {error}"
            ))
        })?;

        if !status.is_success() {
            return Err(AppError::Transport(format!(
                "GitHub returned status {} for {repo} page {page}: {body}",
                status.as_u16()
            )));
        }

        parse_workflow_runs(repo, body.as_str())
    }
}

/// Maps one `actions/runs` response body onto a history page.
pub(crate) fn parse_workflow_runs(repo: &str, body: &str) -> AppResult<RunHistoryPage> {
    let body = serde_json::from_str::<Value>(body).map_err(|error| {
        AppError::Transport(format!("failed to parse GitHub response for {repo}: {error}"))
    })?;

    let (Some(total_count), Some(runs)) = (
        body.get("total_count").and_then(Value::as_u64),
        array_field(&body, "workflow_runs"),
    ) else {
        return Err(AppError::Transport(format!(
            "GitHub response for {repo} is missing 'total_count' or 'workflow_runs': {body}"
        )));
    };

    Ok(RunHistoryPage {
        total_count,
        records: runs.iter().map(|run| map_workflow_run(repo, run)).collect(),
    })
}

fn map_workflow_run(repo: &str, run: &Value) -> RunRecord {
    trace!(target: "raw_payload", repo, run = %run, "workflow run");

    let workflow = str_field(run, "path").and_then(workflow_file_stem);
    let malformed = |reason: &str| {
        RunRecord::Malformed(MalformedRunRecord {
            entity_id: Some(repo.to_owned()),
            sub_entity: workflow.clone(),
            reason: reason.to_owned(),
        })
    };

    let Some(sub_entity) = workflow.clone() else {
        return malformed("missing workflow path");
    };
    let Some(created_at) = timestamp_field(run, "created_at") else {
        return malformed("missing or unparsable created_at");
    };
    let Some(status_label) = str_field(run, "status") else {
        return malformed("missing status");
    };

    let status = map_status(status_label);
    let (completed_at, outcome) = if status.is_terminal() {
        let Some(updated_at) = timestamp_field(run, "updated_at") else {
            return malformed("completed run without a parsable updated_at");
        };
        let Some(conclusion) = str_field(run, "conclusion") else {
            return malformed("completed run without a conclusion");
        };
        (Some(updated_at), Some(TerminalOutcome::from_label(conclusion)))
    } else {
        (None, None)
    };

    let run_ref = run
        .get("run_number")
        .and_then(Value::as_u64)
        .map_or_else(|| "#?".to_owned(), |number| format!("#{number}"));

    RunRecord::Event(RunEvent {
        entity_id: Some(repo.to_owned()),
        sub_entity,
        run_ref,
        occurred_at: created_at,
        completed_at,
        status,
        outcome,
        correlation_token: None,
    })
}

fn map_status(label: &str) -> RunStatus {
    match label {
        "completed" => RunStatus::Completed,
        "in_progress" => RunStatus::InProgress,
        _ => RunStatus::Queued,
    }
}

/// Returns `nightly` for `.github/workflows/nightly.yml`.
fn workflow_file_stem(path: &str) -> Option<String> {
    path.rsplit('/')
        .next()
        .and_then(|file_name| file_name.split('.').next())
        .filter(|stem| !stem.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use runtally_application::{EntitySelector, RunHistoryQuery, RunRecord};
    use runtally_core::AppError;
    use runtally_domain::{RunStatus, TerminalOutcome};

    use super::{GithubWorkflowRunSource, parse_workflow_runs, workflow_file_stem};

    fn source(base_url: &str) -> GithubWorkflowRunSource {
        GithubWorkflowRunSource::new(
            reqwest::Client::new(),
            base_url,
            "ministryofjustice",
            "schedule",
            "token".to_owned(),
        )
        .unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn runs_url_carries_filters_and_page() {
        let query = RunHistoryQuery {
            selector: EntitySelector::Entity("dso-repositories".to_owned()),
            created_after: Utc
                .with_ymd_and_hms(2024, 3, 11, 13, 0, 0)
                .single()
                .unwrap_or_else(|| unreachable!()),
            page_size: 100,
        };

        let url = source("https://api.github.com")
            .runs_url("dso-repositories", &query, 2)
            .map(|url| url.to_string())
            .unwrap_or_default();

        assert_eq!(
            url,
            "https://api.github.com/repos/ministryofjustice/dso-repositories/actions/runs?event=schedule&created=%3E%3D2024-03-11T13%3A00%3A00Z&per_page=100&page=2"
        );
    }

    #[test]
    fn runs_url_keeps_base_path_prefix() {
        let query = RunHistoryQuery {
            selector: EntitySelector::Entity("repo".to_owned()),
            created_after: Utc
                .with_ymd_and_hms(2024, 3, 11, 13, 0, 0)
                .single()
                .unwrap_or_else(|| unreachable!()),
            page_size: 50,
        };

        let url = source("https://ghe.example.com/api/v3/")
            .runs_url("repo", &query, 1)
            .map(|url| url.path().to_owned())
            .unwrap_or_default();

        assert_eq!(url, "/api/v3/repos/ministryofjustice/repo/actions/runs");
    }

    #[test]
    fn blank_token_is_a_configuration_error() {
        let result = GithubWorkflowRunSource::new(
            reqwest::Client::new(),
            "https://api.github.com",
            "ministryofjustice",
            "schedule",
            " ".to_owned(),
        );
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[test]
    fn workflow_runs_map_onto_events() {
        let body = r#"{
            "total_count": 3,
            "workflow_runs": [
                {
                    "path": ".github/workflows/nightly.yml",
                    "status": "completed",
                    "conclusion": "failure",
                    "run_number": 42,
                    "created_at": "2024-03-14T12:50:00Z",
                    "updated_at": "2024-03-14T13:10:00Z"
                },
                {
                    "path": ".github/workflows/weekly.yaml",
                    "status": "in_progress",
                    "conclusion": null,
                    "run_number": 7,
                    "created_at": "2024-03-14T13:20:00Z",
                    "updated_at": "2024-03-14T13:21:00Z"
                },
                {
                    "path": ".github/workflows/weekly.yaml",
                    "status": "completed",
                    "conclusion": null,
                    "run_number": 6,
                    "created_at": "2024-03-14T13:20:00Z",
                    "updated_at": "2024-03-14T13:21:00Z"
                }
            ]
        }"#;

        let page = parse_workflow_runs("dso-repositories", body);
        assert!(page.is_ok());
        let page = page.unwrap_or_else(|_| unreachable!());
        assert_eq!(page.total_count, 3);
        assert_eq!(page.records.len(), 3);

        let RunRecord::Event(failed) = &page.records[0] else {
            panic!("expected completed run to map onto an event");
        };
        assert_eq!(failed.sub_entity, "nightly");
        assert_eq!(failed.entity_id.as_deref(), Some("dso-repositories"));
        assert_eq!(failed.run_ref, "#42");
        assert_eq!(failed.outcome, Some(TerminalOutcome::Failure));
        assert_eq!(
            failed.completed_at,
            Utc.with_ymd_and_hms(2024, 3, 14, 13, 10, 0).single()
        );

        let RunRecord::Event(running) = &page.records[1] else {
            panic!("expected in-progress run to map onto an event");
        };
        assert_eq!(running.status, RunStatus::InProgress);
        assert_eq!(running.completed_at, None);

        let RunRecord::Malformed(malformed) = &page.records[2] else {
            panic!("expected completed run without conclusion to be malformed");
        };
        assert_eq!(malformed.sub_entity.as_deref(), Some("weekly"));
    }

    #[test]
    fn error_bodies_are_transport_errors() {
        let missing = parse_workflow_runs("repo", r#"{"message": "Bad credentials"}"#);
        assert!(matches!(missing, Err(AppError::Transport(_))));

        let garbage = parse_workflow_runs("repo", "<html>");
        assert!(matches!(garbage, Err(AppError::Transport(_))));
    }

    #[test]
    fn workflow_stems_drop_directories_and_extensions() {
        assert_eq!(
            workflow_file_stem(".github/workflows/nightly.yml").as_deref(),
            Some("nightly")
        );
        assert_eq!(workflow_file_stem("terraform.plan.yml").as_deref(), Some("terraform"));
        assert_eq!(workflow_file_stem(".github/workflows/"), None);
    }
}
