use async_trait::async_trait;
use chrono::{DateTime, Utc};
use runtally_application::{
    EntitySelector, MalformedRunRecord, RunHistoryPage, RunHistoryQuery, RunHistorySource,
    RunRecord,
};
use runtally_core::{AppError, AppResult, NonEmptyString};
use runtally_domain::{RunEvent, RunStatus, TerminalOutcome};
use serde_json::Value;
use tracing::trace;

use crate::aws_cli_runner::AwsCliRunner;
use crate::json_fields::{array_field, filter_timestamp, str_field, timestamp_field};

/// SSM command invocation history read through the `aws` CLI.
///
/// The CLI follows pagination tokens itself, so every query is served as a
/// single page whose reported total equals its item count.
#[derive(Debug, Clone)]
pub struct SsmCommandHistorySource {
    aws_cli: AwsCliRunner,
}

impl SsmCommandHistorySource {
    /// Creates an SSM history source.
    #[must_use]
    pub fn new(aws_cli: AwsCliRunner) -> Self {
        Self { aws_cli }
    }
}

#[async_trait]
impl RunHistorySource for SsmCommandHistorySource {
    fn source_name(&self) -> &'static str {
        "ssm-commands"
    }

    async fn fetch_page(&self, query: &RunHistoryQuery, page: u32) -> AppResult<RunHistoryPage> {
        if page != 1 {
            return Err(AppError::Internal(format!(
                "ssm command invocations are listed in one page, page {page} requested"
            )));
        }

        let invoked_after = format!(
            "key=InvokedAfter,value={}",
            filter_timestamp(query.created_after)
        );
        let mut args = vec![
            "ssm",
            "list-command-invocations",
            "--filters",
            invoked_after.as_str(),
        ];
        if let EntitySelector::Entity(instance_id) = &query.selector {
            args.extend(["--instance-id", instance_id.as_str()]);
        }

        let body = self.aws_cli.run_json(&args).await?;
        parse_command_invocations(&body)
    }

    async fn list_baseline_sub_entities(&self, since: DateTime<Utc>) -> AppResult<Vec<String>> {
        let invoked_after = format!("key=InvokedAfter,value={}", filter_timestamp(since));
        let body = self
            .aws_cli
            .run_json(&["ssm", "list-commands", "--filters", invoked_after.as_str()])
            .await?;

        parse_command_documents(&body)
    }
}

/// Maps a `list-command-invocations` body onto one history page.
pub(crate) fn parse_command_invocations(body: &Value) -> AppResult<RunHistoryPage> {
    let invocations = array_field(body, "CommandInvocations").ok_or_else(|| {
        AppError::Transport(
            "list-command-invocations response is missing 'CommandInvocations'".to_owned(),
        )
    })?;

    let records: Vec<RunRecord> = invocations.iter().map(map_invocation).collect();

    Ok(RunHistoryPage {
        total_count: u64::try_from(records.len()).unwrap_or(u64::MAX),
        records,
    })
}

/// Returns document names from a `list-commands` body in first-seen order.
pub(crate) fn parse_command_documents(body: &Value) -> AppResult<Vec<String>> {
    let commands = array_field(body, "Commands").ok_or_else(|| {
        AppError::Transport("list-commands response is missing 'Commands'".to_owned())
    })?;

    let mut documents: Vec<String> = Vec::new();
    for document in commands
        .iter()
        .filter_map(|command| str_field(command, "DocumentName"))
    {
        if !documents.iter().any(|known| known == document) {
            documents.push(document.to_owned());
        }
    }

    Ok(documents)
}

fn map_invocation(invocation: &Value) -> RunRecord {
    trace!(target: "raw_payload", invocation = %invocation, "ssm command invocation");

    let entity_id = str_field(invocation, "InstanceId").map(str::to_owned);
    let sub_entity = NonEmptyString::new(str_field(invocation, "DocumentName").unwrap_or_default());
    let malformed = |reason: &str| {
        RunRecord::Malformed(MalformedRunRecord {
            entity_id: entity_id.clone(),
            sub_entity: sub_entity.as_ref().ok().map(|name| name.as_str().to_owned()),
            reason: reason.to_owned(),
        })
    };

    let Ok(document_name) = &sub_entity else {
        return malformed("missing DocumentName");
    };
    let Some(requested_at) = timestamp_field(invocation, "RequestedDateTime") else {
        return malformed("missing or unparsable RequestedDateTime");
    };
    let Some(status_label) = str_field(invocation, "Status") else {
        return malformed("missing Status");
    };
    let (status, outcome) = map_status(status_label);

    RunRecord::Event(RunEvent {
        entity_id: entity_id.clone(),
        sub_entity: document_name.as_str().to_owned(),
        run_ref: str_field(invocation, "CommandId")
            .unwrap_or("-")
            .to_owned(),
        occurred_at: requested_at,
        completed_at: Some(requested_at),
        status,
        outcome,
        correlation_token: invocation
            .get("Comment")
            .and_then(Value::as_str)
            .map(str::to_owned),
    })
}

fn map_status(label: &str) -> (RunStatus, Option<TerminalOutcome>) {
    match label {
        "Pending" | "Delayed" => (RunStatus::Queued, None),
        "InProgress" | "Cancelling" => (RunStatus::InProgress, None),
        other => (RunStatus::Completed, Some(TerminalOutcome::from_label(other))),
    }
}
