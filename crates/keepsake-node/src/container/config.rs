//! # Engine Configuration
//!
//! Unified configuration for every subsystem and the runtime.
//!
//! Defaults come from each subsystem's own config type. `KS_*` environment
//! variables override individual fields; a value that fails to parse is
//! logged and the default stays in place.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use keepsake_telemetry::TelemetryConfig;
use ks_01_verification_ledger::VetoMode;
use ks_02_liveness_monitor::MonitorConfig;
use ks_03_delivery::DeliveryConfig;
use ks_04_scheduler::SchedulerConfig;
use thiserror::Error;
use tracing::warn;

/// Complete engine configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub scheduler: SchedulerConfig,
    pub delivery: DeliveryConfig,
    pub monitor: MonitorConfig,
    pub storage: StorageConfig,
    pub telemetry: TelemetryConfig,
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("lease TTL ({lease_ttl:?}) must exceed twice the I/O timeout ({io_timeout:?})")]
    LeaseTooShort {
        lease_ttl: Duration,
        io_timeout: Duration,
    },

    #[error("worker pool size must be at least 1")]
    EmptyWorkerPool,

    #[error("max delivery attempts must be at least 1")]
    NoDeliveryAttempts,

    #[error("missed check-in threshold must be at least 1")]
    ZeroMissedThreshold,

    #[error("posthumous quorum must require at least 1 confirmation")]
    EmptyPosthumousQuorum,

    #[error("unknown storage backend: {0}")]
    UnknownBackend(String),
}

impl EngineConfig {
    /// Defaults overridden by `KS_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self {
            telemetry: TelemetryConfig::from_env(),
            ..Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Apply overrides from `lookup`. Unparseable values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secs) = parsed::<u64, _>(&lookup, "KS_TICK_INTERVAL_SECS") {
            self.scheduler.tick_interval = Duration::from_secs(secs);
        }
        if let Some(size) = parsed::<usize, _>(&lookup, "KS_WORKER_POOL_SIZE") {
            self.scheduler.worker_pool_size = size;
            self.monitor.worker_pool_size = size;
        }
        if let Some(secs) = parsed::<u64, _>(&lookup, "KS_IO_TIMEOUT_SECS") {
            let timeout = Duration::from_secs(secs);
            self.scheduler.io_timeout = timeout;
            self.delivery.io_timeout = timeout;
            self.monitor.io_timeout = timeout;
        }
        if let Some(secs) = parsed::<u64, _>(&lookup, "KS_LEASE_TTL_SECS") {
            self.scheduler.lease_ttl = Duration::from_secs(secs);
        }
        if let Some(n) = parsed::<u32, _>(&lookup, "KS_MAX_ATTEMPTS") {
            self.delivery.max_attempts = n;
        }
        if let Some(n) = parsed::<u32, _>(&lookup, "KS_MAX_VERIFICATION_ROUNDS") {
            self.delivery.max_verification_rounds = n;
        }
        if let Some(n) = parsed::<u32, _>(&lookup, "KS_MISSED_THRESHOLD") {
            self.monitor.missed_threshold = n;
        }
        if let Some(hours) = parsed::<i64, _>(&lookup, "KS_ESCALATION_WINDOW_HOURS") {
            self.monitor.escalation_window = chrono::Duration::hours(hours);
        }
        if let Some(hours) = parsed::<i64, _>(&lookup, "KS_REMINDER_LEAD_HOURS") {
            self.monitor.reminder_lead = chrono::Duration::hours(hours);
        }
        if let Some(n) = parsed::<u32, _>(&lookup, "KS_POSTHUMOUS_CONFIRMATIONS") {
            self.monitor.required_confirmations = n;
        }
        if let Some(on) = parsed::<bool, _>(&lookup, "KS_DOCUMENT_SUBSTITUTE") {
            self.monitor.allow_document_substitute = on;
        }
        if let Some(raw) = lookup("KS_VETO_MODE") {
            match parse_veto_mode(&raw) {
                Some(mode) => {
                    self.delivery.veto = mode;
                    self.monitor.veto = mode;
                }
                None => warn!(value = %raw, "Ignoring KS_VETO_MODE: expected audit_only or any_denial_blocks"),
            }
        }
        if let Some(raw) = lookup("KS_STORAGE_BACKEND") {
            match raw.parse() {
                Ok(backend) => self.storage.backend = backend,
                Err(e) => warn!(value = %raw, error = %e, "Ignoring KS_STORAGE_BACKEND"),
            }
        }
        if let Some(dir) = lookup("KS_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
    }

    /// Reject combinations the engine cannot run safely with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.lease_ttl <= self.scheduler.io_timeout * 2 {
            return Err(ConfigError::LeaseTooShort {
                lease_ttl: self.scheduler.lease_ttl,
                io_timeout: self.scheduler.io_timeout,
            });
        }
        if self.scheduler.worker_pool_size == 0 || self.monitor.worker_pool_size == 0 {
            return Err(ConfigError::EmptyWorkerPool);
        }
        if self.delivery.max_attempts == 0 {
            return Err(ConfigError::NoDeliveryAttempts);
        }
        if self.monitor.missed_threshold == 0 {
            return Err(ConfigError::ZeroMissedThreshold);
        }
        if self.monitor.required_confirmations < 1 {
            return Err(ConfigError::EmptyPosthumousQuorum);
        }
        Ok(())
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, value = %raw, error = %e, "Ignoring malformed configuration override");
            None
        }
    }
}

fn parse_veto_mode(raw: &str) -> Option<VetoMode> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "audit_only" | "audit" => Some(VetoMode::AuditOnly),
        "any_denial_blocks" | "block" => Some(VetoMode::AnyDenialBlocks),
        _ => None,
    }
}

/// Which `KeyValueStore` implementation backs the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    /// Nothing survives a restart.
    Memory,
    /// Snapshot file under the data directory.
    #[default]
    File,
    /// Requires the `rocksdb` feature.
    RocksDb,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            "rocksdb" => Ok(Self::RocksDb),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Data directory. Holds the store and the process lock file.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            data_dir: PathBuf::from("./data"),
        }
    }
}
