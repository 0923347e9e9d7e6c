use config::{Config, ConfigError, File};
use opcua::types::TimestampsToReturn;
use serde::{Deserialize, Serialize};
use std::{ops::Deref, sync::Arc};

/// Layered monitoring settings: optional file, then `NGM__` environment.
#[derive(Debug, Clone)]
pub struct MonitoringSettings(Arc<SettingsInner>);

impl Deref for MonitoringSettings {
    type Target = SettingsInner;
    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl MonitoringSettings {
    /// Load settings from `config_path` (missing file is fine) and
    /// `NGM__SECTION__KEY` environment overrides.
    pub fn load(config_path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("NGM")
                    .separator("__")
                    .try_parsing(true),
            );
        let inner: SettingsInner = builder.build()?.try_deserialize()?;
        Ok(Self(Arc::new(inner)))
    }

    pub fn from_parts(server: ServerLimits, client: ClientSubscriptionConfig) -> Self {
        Self(Arc::new(SettingsInner { server, client }))
    }
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        Self(Arc::new(SettingsInner::default()))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsInner {
    /// Limits enforced by the server side.
    #[serde(default)]
    pub server: ServerLimits,
    /// Defaults for client subscriptions.
    #[serde(default)]
    pub client: ClientSubscriptionConfig,
}

/// Operation limits and parameter bounds a server enforces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerLimits {
    /// Largest batch accepted by a single monitored-item service call.
    /// 0 disables the check.
    #[serde(default = "ServerLimits::default_max_monitored_items_per_call")]
    pub max_monitored_items_per_call: u32,
    /// Upper bound for a subscription's notifications per publish; requests
    /// of 0 are revised to this value.
    #[serde(default = "ServerLimits::default_max_notifications_per_publish")]
    pub max_notifications_per_publish: u32,
    /// Lower clamp for the revised publishing interval.
    #[serde(default = "ServerLimits::default_min_publishing_interval_ms")]
    pub min_publishing_interval_ms: f64,
    /// Upper clamp for the revised publishing interval.
    #[serde(default = "ServerLimits::default_max_publishing_interval_ms")]
    pub max_publishing_interval_ms: f64,
    /// Shortest subscription lifetime (interval x lifetime count).
    #[serde(default = "ServerLimits::default_min_lifetime_ms")]
    pub min_lifetime_ms: f64,
    /// Longest subscription lifetime (interval x lifetime count).
    #[serde(default = "ServerLimits::default_max_lifetime_ms")]
    pub max_lifetime_ms: f64,
    /// Fastest sampling a monitored item is granted.
    #[serde(default = "ServerLimits::default_min_sampling_interval_ms")]
    pub min_sampling_interval_ms: f64,
    /// Slowest sampling a monitored item is granted.
    #[serde(default = "ServerLimits::default_max_sampling_interval_ms")]
    pub max_sampling_interval_ms: f64,
    /// Largest queue a monitored item may be revised to.
    #[serde(default = "ServerLimits::default_max_queue_size")]
    pub max_queue_size: u32,
}

impl ServerLimits {
    fn default_max_monitored_items_per_call() -> u32 {
        10_000
    }
    fn default_max_notifications_per_publish() -> u32 {
        0xFFFF
    }
    fn default_min_publishing_interval_ms() -> f64 {
        1.0
    }
    fn default_max_publishing_interval_ms() -> f64 {
        60_000.0
    }
    fn default_min_lifetime_ms() -> f64 {
        10_000.0
    }
    fn default_max_lifetime_ms() -> f64 {
        3_600_000.0
    }
    fn default_min_sampling_interval_ms() -> f64 {
        100.0
    }
    fn default_max_sampling_interval_ms() -> f64 {
        3_600_000.0
    }
    fn default_max_queue_size() -> u32 {
        0xFFFF
    }
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            max_monitored_items_per_call: ServerLimits::default_max_monitored_items_per_call(),
            max_notifications_per_publish: ServerLimits::default_max_notifications_per_publish(),
            min_publishing_interval_ms: ServerLimits::default_min_publishing_interval_ms(),
            max_publishing_interval_ms: ServerLimits::default_max_publishing_interval_ms(),
            min_lifetime_ms: ServerLimits::default_min_lifetime_ms(),
            max_lifetime_ms: ServerLimits::default_max_lifetime_ms(),
            min_sampling_interval_ms: ServerLimits::default_min_sampling_interval_ms(),
            max_sampling_interval_ms: ServerLimits::default_max_sampling_interval_ms(),
            max_queue_size: ServerLimits::default_max_queue_size(),
        }
    }
}

/// Which timestamps a client asks the server to return, as written in
/// configuration files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReturnedTimestamps {
    Source,
    Server,
    #[default]
    Both,
    Neither,
}

impl From<ReturnedTimestamps> for TimestampsToReturn {
    fn from(value: ReturnedTimestamps) -> Self {
        match value {
            ReturnedTimestamps::Source => TimestampsToReturn::Source,
            ReturnedTimestamps::Server => TimestampsToReturn::Server,
            ReturnedTimestamps::Both => TimestampsToReturn::Both,
            ReturnedTimestamps::Neither => TimestampsToReturn::Neither,
        }
    }
}

/// Client-side subscription defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSubscriptionConfig {
    /// Requested publishing interval for new subscriptions.
    #[serde(default = "ClientSubscriptionConfig::default_publishing_interval_ms")]
    pub publishing_interval_ms: f64,
    /// Used verbatim only when `lifetime_and_keep_alive_calculated` is off.
    #[serde(default = "ClientSubscriptionConfig::default_lifetime_count")]
    pub lifetime_count: u32,
    /// Used verbatim only when `lifetime_and_keep_alive_calculated` is off.
    #[serde(default = "ClientSubscriptionConfig::default_max_keep_alive_count")]
    pub max_keep_alive_count: u32,
    /// 0 means no limit.
    #[serde(default)]
    pub max_notifications_per_publish: u32,
    /// Relative priority among the session's subscriptions.
    #[serde(default)]
    pub priority: u8,
    /// Whether new subscriptions start publishing.
    #[serde(default = "ClientSubscriptionConfig::default_true")]
    pub publishing_enabled: bool,
    /// Derive lifetime and keep-alive counts from the publishing interval.
    #[serde(default = "ClientSubscriptionConfig::default_true")]
    pub lifetime_and_keep_alive_calculated: bool,
    /// Desired time between keep-alives when counts are derived.
    #[serde(default = "ClientSubscriptionConfig::default_target_keep_alive_interval_ms")]
    pub target_keep_alive_interval_ms: f64,
    /// Server minimum lifetime the calculation honours.
    #[serde(default = "ClientSubscriptionConfig::default_min_lifetime_ms")]
    pub min_lifetime_ms: f64,
    /// Server maximum lifetime the calculation honours.
    #[serde(default = "ClientSubscriptionConfig::default_max_lifetime_ms")]
    pub max_lifetime_ms: f64,
    /// Watchdog deadline = keep-alive interval x multiplier.
    #[serde(default = "ClientSubscriptionConfig::default_watchdog_multiplier")]
    pub watchdog_multiplier: f64,
    /// Partition size for monitored-item batches, 0 disables partitioning.
    #[serde(default = "ClientSubscriptionConfig::default_max_monitored_items_per_call")]
    pub max_monitored_items_per_call: usize,
    /// Sampling interval of items added without one.
    #[serde(default = "ClientSubscriptionConfig::default_sampling_interval_ms")]
    pub default_sampling_interval_ms: f64,
    /// Queue size of data items added without one.
    #[serde(default = "ClientSubscriptionConfig::default_queue_size")]
    pub default_queue_size: u32,
    /// Timestamps requested on monitored item create and modify.
    #[serde(default)]
    pub timestamps_to_return: ReturnedTimestamps,
}

impl ClientSubscriptionConfig {
    fn default_publishing_interval_ms() -> f64 {
        1_000.0
    }
    fn default_lifetime_count() -> u32 {
        60
    }
    fn default_max_keep_alive_count() -> u32 {
        20
    }
    fn default_true() -> bool {
        true
    }
    fn default_target_keep_alive_interval_ms() -> f64 {
        10_000.0
    }
    fn default_min_lifetime_ms() -> f64 {
        10_000.0
    }
    fn default_max_lifetime_ms() -> f64 {
        3_600_000.0
    }
    fn default_watchdog_multiplier() -> f64 {
        1.25
    }
    fn default_max_monitored_items_per_call() -> usize {
        256
    }
    fn default_sampling_interval_ms() -> f64 {
        1_000.0
    }
    fn default_queue_size() -> u32 {
        1
    }
}

impl Default for ClientSubscriptionConfig {
    fn default() -> Self {
        Self {
            publishing_interval_ms: Self::default_publishing_interval_ms(),
            lifetime_count: Self::default_lifetime_count(),
            max_keep_alive_count: Self::default_max_keep_alive_count(),
            max_notifications_per_publish: 0,
            priority: 0,
            publishing_enabled: true,
            lifetime_and_keep_alive_calculated: true,
            target_keep_alive_interval_ms: Self::default_target_keep_alive_interval_ms(),
            min_lifetime_ms: Self::default_min_lifetime_ms(),
            max_lifetime_ms: Self::default_max_lifetime_ms(),
            watchdog_multiplier: Self::default_watchdog_multiplier(),
            max_monitored_items_per_call: Self::default_max_monitored_items_per_call(),
            default_sampling_interval_ms: Self::default_sampling_interval_ms(),
            default_queue_size: Self::default_queue_size(),
            timestamps_to_return: ReturnedTimestamps::Both,
        }
    }
}
