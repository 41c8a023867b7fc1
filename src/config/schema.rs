//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway core.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway request core.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Request body streaming settings.
    pub body: BodyConfig,

    /// Inspection service settings.
    pub inspect: InspectConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Request body streaming configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BodyConfig {
    /// In-memory window per request. File reads pause while this many
    /// bytes are waiting to be consumed.
    pub buffer_size: usize,

    /// Upload file growth observer.
    pub watch: WatchConfig,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            buffer_size: 200_000,
            watch: WatchConfig::default(),
        }
    }
}

/// Backend used to learn that an upload file may have grown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    /// OS file change notifications (inotify, kqueue, ...).
    #[default]
    Native,
    /// Periodic stat polling.
    Poll,
}

/// Upload file watch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchConfig {
    pub mode: WatchMode,

    /// Poll interval in milliseconds (poll mode only).
    pub poll_interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            mode: WatchMode::Native,
            poll_interval_ms: 500,
        }
    }
}

/// Inspection service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InspectConfig {
    /// How long to wait for an inspection reply, in seconds.
    pub timeout_secs: u64,

    /// Outbound queue depth toward the inspection service. A full queue
    /// means new inspections fail fast as unavailable.
    pub queue_capacity: usize,
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 8,
            queue_capacity: 100,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Pretty for development, JSON for log aggregation.
    pub log_format: LogFormat,

    /// Record counters through the `metrics` facade.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
        }
    }
}
