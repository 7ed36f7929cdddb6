//! Runtally scheduled-run outcome monitor.

#![forbid(unsafe_code)]

mod cli;
mod monitor_config;

use std::process::ExitCode;
use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use clap::Parser;
use runtally_application::{EntitySelector, MonitorRequest, MonitorService, PaginatedFetcher};
use runtally_core::{AppError, AppResult};
use runtally_domain::WindowParams;
use runtally_infrastructure::{
    AwsCliRunner, BuiltinProfile, CsvReportWriter, Ec2TagMetadataSource, GithubWorkflowRunSource,
    ReportLayout, RuleProfile, SsmCommandHistorySource,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, SourceCommand};
use crate::monitor_config::{GithubConfig, MonitorConfig};

const ALL_ENTITIES: &str = "all";

struct MonitorSetup {
    service: MonitorService,
    selectors: Vec<EntitySelector>,
    layout: ReportLayout,
    max_event_duration: TimeDelta,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("runtally: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    let interval = cli
        .interval
        .ok_or_else(|| AppError::Configuration("--interval is required".to_owned()))?;
    let params = WindowParams::new(interval, cli.number, cli.round)?;
    let config = MonitorConfig::load(cli.rules)?;
    let fetcher = PaginatedFetcher::new(config.page_size)?;

    let setup = match cli.command {
        SourceCommand::GithubWorkflows {
            owner,
            event,
            repos,
        } => build_github_setup(&config, fetcher, owner, event.as_str(), &repos)?,
        SourceCommand::SsmCommands { profile, region } => {
            build_ssm_setup(&config, fetcher, profile, region)?
        }
    };

    let plan = params.compute(Utc::now(), setup.max_event_duration);
    info!(
        window_start = %plan.window.start(),
        window_end = %plan.window.end(),
        lookback = %plan.lookback,
        entities = setup.selectors.len(),
        "computed monitoring window"
    );

    let report = setup
        .service
        .run(MonitorRequest {
            plan,
            selectors: setup.selectors,
        })
        .await?;

    info!(
        fetched = report.summary.fetched,
        malformed = report.summary.malformed,
        success = report.summary.success,
        failed = report.summary.failed,
        ignored = report.summary.ignored,
        rows = report.store.len(),
        "monitoring run finished"
    );

    CsvReportWriter::new(setup.layout).write(&report, std::io::stdout().lock())
}

fn build_github_setup(
    config: &MonitorConfig,
    fetcher: PaginatedFetcher,
    owner: Option<String>,
    event: &str,
    repos: &[String],
) -> AppResult<MonitorSetup> {
    let rules = RuleProfile::load_or_builtin(
        config.rules_file.as_deref(),
        BuiltinProfile::GithubWorkflows,
    )?;
    let github = GithubConfig::load(owner, rules.default_owner())?;
    let selectors = repo_selectors(repos, rules.default_entities())?;

    let http_client = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;
    let source = GithubWorkflowRunSource::new(
        http_client,
        github.api_base_url.as_str(),
        github.owner.as_str(),
        event,
        github.token,
    )?;

    Ok(MonitorSetup {
        service: MonitorService::new(Arc::new(source), rules.exclusion_rules()?, fetcher),
        selectors,
        layout: ReportLayout::GITHUB_WORKFLOWS,
        max_event_duration: rules.max_event_duration(),
    })
}

fn build_ssm_setup(
    config: &MonitorConfig,
    fetcher: PaginatedFetcher,
    aws_profile: Option<String>,
    region: Option<String>,
) -> AppResult<MonitorSetup> {
    let rules =
        RuleProfile::load_or_builtin(config.rules_file.as_deref(), BuiltinProfile::SsmCommands)?;
    let aws_cli = AwsCliRunner::new(config.aws_cli_timeout)
        .with_profile(aws_profile)
        .with_region(region);

    let service = MonitorService::new(
        Arc::new(SsmCommandHistorySource::new(aws_cli.clone())),
        rules.exclusion_rules()?,
        fetcher,
    )
    .with_metadata_source(Arc::new(Ec2TagMetadataSource::new(aws_cli)));

    Ok(MonitorSetup {
        service,
        selectors: vec![EntitySelector::AllEntities],
        layout: ReportLayout::SSM_COMMANDS,
        max_event_duration: rules.max_event_duration(),
    })
}

/// Expands `all` into the profile defaults, keeping first-seen order.
fn repo_selectors(repos: &[String], default_entities: &[String]) -> AppResult<Vec<EntitySelector>> {
    let mut names: Vec<&str> = Vec::new();
    for repo in repos.iter().map(|repo| repo.trim()) {
        if repo == ALL_ENTITIES {
            if default_entities.is_empty() {
                return Err(AppError::Configuration(
                    "'all' requested but the rule profile lists no default entities".to_owned(),
                ));
            }
            names.extend(default_entities.iter().map(String::as_str));
        } else if !repo.is_empty() {
            names.push(repo);
        }
    }

    let mut selectors: Vec<EntitySelector> = Vec::with_capacity(names.len());
    for name in names {
        let selector = EntitySelector::Entity(name.to_owned());
        if !selectors.contains(&selector) {
            selectors.push(selector);
        }
    }

    if selectors.is_empty() {
        return Err(AppError::Configuration(
            "at least one repository is required".to_owned(),
        ));
    }

    Ok(selectors)
}

fn verbosity_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        3 => "trace,raw_payload=off",
        _ => "trace",
    }
}

fn init_tracing(verbose: u8) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity_filter(verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
