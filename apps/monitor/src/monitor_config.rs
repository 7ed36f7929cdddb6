use std::env;
use std::path::PathBuf;
use std::time::Duration;

use runtally_application::DEFAULT_PAGE_SIZE;
use runtally_core::{AppError, AppResult};

const DEFAULT_GITHUB_API_BASE_URL: &str = "https://api.github.com";
const MAX_PAGE_SIZE: u32 = 100;

/// Environment-derived settings shared by every source.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub rules_file: Option<PathBuf>,
    pub http_timeout: Duration,
    pub aws_cli_timeout: Duration,
    pub page_size: u32,
}

impl MonitorConfig {
    /// Reads settings from the environment; `rules_override` wins over `RUNTALLY_RULES_FILE`.
    pub fn load(rules_override: Option<PathBuf>) -> AppResult<Self> {
        let rules_file =
            rules_override.or_else(|| optional_env("RUNTALLY_RULES_FILE").map(PathBuf::from));
        let http_timeout_secs = parse_env_u64("RUNTALLY_HTTP_TIMEOUT_SECS", 10)?;
        let aws_cli_timeout_secs = parse_env_u64("RUNTALLY_AWS_CLI_TIMEOUT_SECS", 30)?;
        let page_size = parse_env_u32("RUNTALLY_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;

        if http_timeout_secs == 0 {
            return Err(AppError::Configuration(
                "RUNTALLY_HTTP_TIMEOUT_SECS must be greater than zero".to_owned(),
            ));
        }

        if aws_cli_timeout_secs == 0 {
            return Err(AppError::Configuration(
                "RUNTALLY_AWS_CLI_TIMEOUT_SECS must be greater than zero".to_owned(),
            ));
        }

        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(AppError::Configuration(format!(
                "RUNTALLY_PAGE_SIZE must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        Ok(Self {
            rules_file,
            http_timeout: Duration::from_secs(http_timeout_secs),
            aws_cli_timeout: Duration::from_secs(aws_cli_timeout_secs),
            page_size,
        })
    }
}

/// GitHub credentials and addressing.
#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub token: String,
    pub api_base_url: String,
    pub owner: String,
}

impl GithubConfig {
    /// Reads GitHub settings. The owner comes from `owner_override`, then
    /// `GITHUB_OWNER`, then the rule profile's `default_owner`.
    pub fn load(owner_override: Option<String>, default_owner: Option<&str>) -> AppResult<Self> {
        let token = required_env("GITHUB_TOKEN")?;
        let api_base_url = optional_env("GITHUB_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_GITHUB_API_BASE_URL.to_owned());
        let owner = resolve_owner(owner_override, optional_env("GITHUB_OWNER"), default_owner)?;

        Ok(Self {
            token,
            api_base_url,
            owner,
        })
    }
}

fn resolve_owner(
    owner_override: Option<String>,
    env_owner: Option<String>,
    default_owner: Option<&str>,
) -> AppResult<String> {
    owner_override
        .map(|owner| owner.trim().to_owned())
        .filter(|owner| !owner.is_empty())
        .or(env_owner)
        .or_else(|| default_owner.map(str::to_owned))
        .ok_or_else(|| {
            AppError::Configuration(
                "--owner, GITHUB_OWNER or a profile default_owner is required".to_owned(),
            )
        })
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn required_env(name: &str) -> AppResult<String> {
    optional_env(name).ok_or_else(|| AppError::Configuration(format!("{name} is required")))
}

fn parse_env_u32(name: &str, default: u32) -> AppResult<u32> {
    match optional_env(name) {
        Some(value) => value.parse::<u32>().map_err(|error| {
            AppError::Configuration(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match optional_env(name) {
        Some(value) => value.parse::<u64>().map_err(|error| {
            AppError::Configuration(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}
