//! Configuration loaded from the environment and the command line.
//!
//! # Environment Variables
//!
//! ## Required
//! - `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_REGION`
//! - `S3_BUCKET_NAME`, `SQS_QUEUE_NAME`, `SNS_TOPIC_NAME`
//! - `DB_HOST`, `DB_USER`, `DB_PASSWORD`, `DB_NAME`, `DB_PORT`
//! - `API_URL`, `APP_ENV` (`local`, `development` or `production`)
//!
//! ## Optional
//! - `NOTIFICATION_EMAIL`
//! - `MAX_FILE_SIZE` (default: 5242880)
//! - `ALLOWED_FILE_TYPES` (default: `image/*`)
//! - `DASHBOARD_HOST` (default: 0.0.0.0)
//! - `DASHBOARD_PORT` (default: 3000)

use crate::services::validation::{DEFAULT_ALLOWED_TYPES, UploadPolicy, parse_allowed_types};
use clap::{Args as ClapArgs, Parser, Subcommand};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgConnectOptions;
use std::{fmt, str::FromStr, sync::LazyLock};
use thiserror::Error;

const REQUIRED_VARS: &[&str] = &[
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_REGION",
    "S3_BUCKET_NAME",
    "SQS_QUEUE_NAME",
    "SNS_TOPIC_NAME",
    "DB_HOST",
    "DB_USER",
    "DB_PASSWORD",
    "DB_NAME",
    "DB_PORT",
    "API_URL",
    "APP_ENV",
];

static REGION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}-[a-z]+-\d$").expect("region pattern is valid"));

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variables:\n{}", format_missing(.0))]
    Missing(Vec<&'static str>),
    #[error("Invalid environment variable {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

fn format_missing(names: &[&'static str]) -> String {
    names
        .iter()
        .map(|name| format!("  - {name}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Deployment tag carried by `APP_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Local,
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "`{other}` is not one of local, development, production"
            )),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Development => "development",
            Self::Production => "production",
        })
    }
}

/// AWS credentials and resource names.
#[derive(Debug, Clone)]
pub struct AwsConfig {
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    pub bucket: String,
    pub queue_name: String,
    pub topic_name: String,
}

/// Postgres connection parameters.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: SecretString,
    pub name: String,
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(self.password.expose_secret())
            .database(&self.name)
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub api_url: String,
    pub notification_email: Option<String>,
    pub aws: AwsConfig,
    pub database: DatabaseConfig,
    pub upload: UploadPolicy,
}

/// Command-line configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Bucket dashboard relay")]
pub struct Args {
    /// Host to bind to (overrides DASHBOARD_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides DASHBOARD_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Create the users table and exit
    #[arg(long)]
    pub migrate: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Poll a running relay and print the activity feed
    Watch(WatchArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct WatchArgs {
    /// Base URL of the relay
    #[arg(long, default_value = "http://127.0.0.1:3000")]
    pub api_url: String,

    /// Bucket to list (defaults to the relay's configured bucket)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Seconds between notification polls
    #[arg(long, default_value_t = 5)]
    pub interval: u64,
}

impl AppConfig {
    /// Read the process environment and apply CLI overrides.
    pub fn from_env_and_args(args: &Args) -> Result<Self, ConfigError> {
        let mut cfg = Self::from_lookup(|name| std::env::var(name).ok())?;
        if let Some(host) = &args.host {
            cfg.host = host.clone();
        }
        if let Some(port) = args.port {
            cfg.port = port;
        }
        Ok(cfg)
    }

    /// Build the configuration from any variable source.
    ///
    /// Every missing required variable is reported at once.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let missing: Vec<&'static str> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|name| get(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }
        let required = |name: &'static str| get(name).unwrap_or_default();

        let environment = required("APP_ENV")
            .parse::<Environment>()
            .map_err(|reason| ConfigError::Invalid {
                name: "APP_ENV",
                reason,
            })?;

        let region = required("AWS_REGION");
        if !REGION_PATTERN.is_match(&region) {
            return Err(ConfigError::Invalid {
                name: "AWS_REGION",
                reason: format!("`{region}` is not a region like us-east-1"),
            });
        }

        let db_port = parse_number::<u16>("DB_PORT", &required("DB_PORT"))?;
        let port = match get("DASHBOARD_PORT") {
            Some(raw) => parse_number::<u16>("DASHBOARD_PORT", &raw)?,
            None => 3000,
        };
        let max_file_size = match get("MAX_FILE_SIZE") {
            Some(raw) => parse_number::<u64>("MAX_FILE_SIZE", &raw)?,
            None => UploadPolicy::default().max_file_size,
        };
        let allowed_types = parse_allowed_types(
            &get("ALLOWED_FILE_TYPES").unwrap_or_else(|| DEFAULT_ALLOWED_TYPES.into()),
        );

        Ok(Self {
            host: get("DASHBOARD_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            environment,
            api_url: required("API_URL"),
            notification_email: get("NOTIFICATION_EMAIL"),
            aws: AwsConfig {
                region,
                access_key_id: required("AWS_ACCESS_KEY_ID"),
                secret_access_key: SecretString::from(required("AWS_SECRET_ACCESS_KEY")),
                bucket: required("S3_BUCKET_NAME"),
                queue_name: required("SQS_QUEUE_NAME"),
                topic_name: required("SNS_TOPIC_NAME"),
            },
            database: DatabaseConfig {
                host: required("DB_HOST"),
                port: db_port,
                user: required("DB_USER"),
                password: SecretString::from(required("DB_PASSWORD")),
                name: required("DB_NAME"),
            },
            upload: UploadPolicy {
                max_file_size,
                allowed_types,
            },
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_number<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim().parse::<T>().map_err(|err| ConfigError::Invalid {
        name,
        reason: format!("`{raw}`: {err}"),
    })
}
