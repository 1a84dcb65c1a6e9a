//! Configuration for the symbiosis engine.

use guardian_core::{NightSymbiosisPolicy, RewardPolicy, WeatherAffinityPolicy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a SymbiosisEngine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Reward policy configuration
    pub reward: RewardConfig,
    /// Progression rules
    pub progression: ProgressionConfig,
    /// Collective mission wiring
    pub collective: CollectiveConfig,
    /// Feed configuration
    pub feed: FeedConfig,
    /// Territory monitoring
    pub territory: TerritoryConfig,
    /// Spot connectivity
    pub connectivity: ConnectivityConfig,
    /// Spot adoption and echoes
    pub stewardship: StewardshipConfig,
    /// General settings
    pub general: GeneralConfig,
}

impl EngineConfig {
    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Which modifier policy turns a context into a multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardPolicyKind {
    /// Symbiosis and night-hour bonuses
    #[default]
    NightSymbiosis,
    /// Symbiosis and weather/impact affinity bonuses
    WeatherAffinity,
}

/// Reward configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    pub policy: RewardPolicyKind,
    /// Cooperative completion bonus
    pub symbiosis_multiplier: f64,
    /// Night-hour bonus (night_symbiosis only)
    pub night_multiplier: f64,
    /// First night hour, inclusive
    pub night_start_hour: u32,
    /// First day hour, exclusive end of the night window
    pub night_end_hour: u32,
    /// Rain/water and sun/carbon bonus (weather_affinity only)
    pub weather_exact_multiplier: f64,
    /// Cloud/biodiversity bonus (weather_affinity only)
    pub weather_soft_multiplier: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            policy: RewardPolicyKind::NightSymbiosis,
            symbiosis_multiplier: 2.0,
            night_multiplier: 1.5,
            night_start_hour: 21,
            night_end_hour: 6,
            weather_exact_multiplier: 2.0,
            weather_soft_multiplier: 1.5,
        }
    }
}

impl RewardConfig {
    /// Build the configured policy.
    pub fn build_policy(&self) -> Arc<dyn RewardPolicy> {
        match self.policy {
            RewardPolicyKind::NightSymbiosis => Arc::new(NightSymbiosisPolicy {
                symbiosis_multiplier: self.symbiosis_multiplier,
                night_multiplier: self.night_multiplier,
            }),
            RewardPolicyKind::WeatherAffinity => Arc::new(WeatherAffinityPolicy {
                symbiosis_multiplier: self.symbiosis_multiplier,
                exact_match_multiplier: self.weather_exact_multiplier,
                soft_match_multiplier: self.weather_soft_multiplier,
            }),
        }
    }
}

/// Progression configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    /// Allow the same Guardian to complete a mission more than once
    pub allow_repeat_completions: bool,
    /// Experience awarded for a species scan
    pub scan_bonus_xp: u64,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            allow_repeat_completions: false,
            scan_bonus_xp: 50,
        }
    }
}

/// Collective mission configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectiveConfig {
    /// Feed mission impact into collective goals
    pub enabled: bool,
}

impl Default for CollectiveConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Feed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Records fetched from each source
    pub per_source_limit: usize,
    /// Display name used when an actor cannot be resolved
    pub fallback_actor_name: String,
    /// Refresh interval (ms)
    pub poll_interval_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            per_source_limit: 10,
            fallback_actor_name: "Anonymous Guardian".to_string(),
            poll_interval_ms: 10_000,
        }
    }
}

impl FeedConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Territory monitoring configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerritoryConfig {
    /// Stability below this value is critical
    pub critical_threshold: f64,
    /// Refresh interval (ms)
    pub poll_interval_ms: u64,
    /// Escalation signal interval while critical (ms)
    pub escalation_interval_ms: u64,
}

impl Default for TerritoryConfig {
    fn default() -> Self {
        Self {
            critical_threshold: guardian_core::DEFAULT_CRITICAL_THRESHOLD,
            poll_interval_ms: 10_000,
            escalation_interval_ms: 5_000,
        }
    }
}

impl TerritoryConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn escalation_interval(&self) -> Duration {
        Duration::from_millis(self.escalation_interval_ms)
    }
}

/// Spot connectivity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// A link is active while both ends saw activity within this window (ms)
    pub activity_window_ms: i64,
    /// Collapse s->t and t->s into one link
    pub dedupe_links: bool,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            activity_window_ms: guardian_core::connectivity::DEFAULT_ACTIVITY_WINDOW_MS,
            dedupe_links: true,
        }
    }
}

/// Spot stewardship configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StewardshipConfig {
    /// Echoes returned for one spot
    pub echo_limit: usize,
}

impl Default for StewardshipConfig {
    fn default() -> Self {
        Self { echo_limit: 50 }
    }
}

/// General configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
