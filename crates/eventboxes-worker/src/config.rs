//! Worker configuration read from environment variables.

use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use eventboxes_core::event::TENANT_ID_PROPERTY;
use eventboxes_core::filter::{IncomingEventField, OutgoingEventField, Predicate};
use eventboxes_core::options::BoxesOptions;

use crate::error::AppError;

/// Fewest pooled connections the worker runs with. The sender and the
/// processor each hold their lock connection plus one store connection at
/// peak, and the HTTP endpoints need one more.
pub const MIN_DATABASE_CONNECTIONS: u32 = 5;

/// Settings for the worker process.
#[derive(Debug, Clone)]
pub struct Config {
    /// `DATABASE_URL`
    pub database_url: String,
    /// `HOST`
    pub host: String,
    /// `PORT`
    pub port: u16,
    /// `DATABASE_MAX_CONNECTIONS`
    pub database_max_connections: u32,
    /// Processor tuning; every field has an `EVENTBOXES_*` override.
    pub options: BoxesOptions,
    /// `EVENTBOXES_PUBLISH_URL`: ingestion endpoint of the receiving service.
    /// When unset, outgoing events are delivered to the local inbox.
    pub publish_url: Option<String>,
    /// `EVENTBOXES_PUBLISH_TIMEOUT_SECS`
    pub publish_timeout: Duration,
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required variable is missing or a value
    /// does not parse.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`. Blank values count as unset.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required variable is missing or a value
    /// does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = BoxesOptions::default();

        let database_url = get("DATABASE_URL").ok_or_else(|| {
            AppError::Config("DATABASE_URL environment variable must be set".into())
        })?;

        let tenant_id = get("EVENTBOXES_TENANT_ID");
        let options = BoxesOptions {
            period: parse_duration(&get, "EVENTBOXES_PERIOD_MS", defaults.period, Duration::from_millis)?,
            distributed_lock_wait_duration: parse_duration(
                &get,
                "EVENTBOXES_LOCK_WAIT_MS",
                defaults.distributed_lock_wait_duration,
                Duration::from_millis,
            )?,
            clean_old_event_time_interval: parse_duration(
                &get,
                "EVENTBOXES_CLEAN_INTERVAL_SECS",
                defaults.clean_old_event_time_interval,
                Duration::from_secs,
            )?,
            wait_time_to_delete_processed_inbox_events: parse_duration(
                &get,
                "EVENTBOXES_INBOX_RETENTION_SECS",
                defaults.wait_time_to_delete_processed_inbox_events,
                Duration::from_secs,
            )?,
            inbox_waiting_event_max_count: parse(
                &get,
                "EVENTBOXES_INBOX_MAX_COUNT",
                defaults.inbox_waiting_event_max_count,
            )?,
            outbox_waiting_event_max_count: parse(
                &get,
                "EVENTBOXES_OUTBOX_MAX_COUNT",
                defaults.outbox_waiting_event_max_count,
            )?,
            batch_publish_outbox_events: parse(
                &get,
                "EVENTBOXES_BATCH_PUBLISH",
                defaults.batch_publish_outbox_events,
            )?,
            inbox_processor_filter: tenant_id.as_deref().map(|tenant| {
                Predicate::field(IncomingEventField::ExtraProperty(TENANT_ID_PROPERTY.to_owned()))
                    .eq(tenant)
            }),
            outbox_processor_filter: tenant_id.as_deref().map(|tenant| {
                Predicate::field(OutgoingEventField::ExtraProperty(TENANT_ID_PROPERTY.to_owned()))
                    .eq(tenant)
            }),
        };

        if options.period.is_zero() {
            return Err(AppError::Config(
                "EVENTBOXES_PERIOD_MS must be greater than zero".into(),
            ));
        }
        options
            .validate()
            .map_err(|e| AppError::Config(format!("invalid processor filter: {e}")))?;

        let database_max_connections = parse(&get, "DATABASE_MAX_CONNECTIONS", 10)?;
        if database_max_connections < MIN_DATABASE_CONNECTIONS {
            return Err(AppError::Config(format!(
                "DATABASE_MAX_CONNECTIONS must be at least {MIN_DATABASE_CONNECTIONS}"
            )));
        }

        Ok(Self {
            database_url,
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port: parse(&get, "PORT", 3000)?,
            database_max_connections,
            options,
            publish_url: get("EVENTBOXES_PUBLISH_URL"),
            publish_timeout: parse_duration(
                &get,
                "EVENTBOXES_PUBLISH_TIMEOUT_SECS",
                Duration::from_secs(30),
                Duration::from_secs,
            )?,
        })
    }

    /// The socket address the HTTP server binds to.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `HOST:PORT` is not a socket address.
    pub fn bind_address(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid: {e}"))),
        None => Ok(default),
    }
}

fn parse_duration(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
    unit: fn(u64) -> Duration,
) -> Result<Duration, AppError> {
    match get(key) {
        Some(_) => parse::<u64>(get, key, 0).map(unit),
        None => Ok(default),
    }
}
