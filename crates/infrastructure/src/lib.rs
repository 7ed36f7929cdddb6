//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod aws_cli_runner;
mod csv_report_writer;
mod ec2_tag_metadata_source;
mod github_workflow_run_source;
mod json_fields;
mod rule_profile;
mod ssm_command_history_source;

pub use aws_cli_runner::AwsCliRunner;
pub use csv_report_writer::{CsvReportWriter, ReportLayout};
pub use ec2_tag_metadata_source::Ec2TagMetadataSource;
pub use github_workflow_run_source::GithubWorkflowRunSource;
pub use rule_profile::{BuiltinProfile, RuleProfile};
pub use ssm_command_history_source::SsmCommandHistorySource;
