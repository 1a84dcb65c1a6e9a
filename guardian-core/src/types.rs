//! Core records of the Living Territory.
//!
//! These mirror the rows held by the persistence collaborator. Category-like
//! fields are closed enums so every rule over them is matched exhaustively.
//!
//! With the `typescript` feature enabled, these types can be exported to
//! TypeScript using ts-rs for consistency with the web client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Ecological dimension a mission contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "lowercase")]
pub enum ImpactType {
    /// Carbon captured (kg)
    Carbon,
    /// Water preserved (litres)
    Water,
    /// Biodiversity surface/quality units
    Biodiversity,
}

impl ImpactType {
    /// Get string representation for prompts and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Carbon => "carbon",
            Self::Water => "water",
            Self::Biodiversity => "biodiversity",
        }
    }

    /// All impact types
    pub fn all() -> [Self; 3] {
        [Self::Carbon, Self::Water, Self::Biodiversity]
    }
}

/// Kind of work a mission asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "lowercase")]
pub enum MissionCategory {
    Observation,
    Action,
    Report,
    Coop,
    Emergency,
}

/// Category of a territory-wide goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectiveCategory {
    #[default]
    Standard,
    Emergency,
}

/// Local weather reported to the Guardian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeatherType {
    Sunny,
    Rainy,
    Cloudy,
    Storm,
    Misty,
}

impl WeatherType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sunny => "SUNNY",
            Self::Rainy => "RAINY",
            Self::Cloudy => "CLOUDY",
            Self::Storm => "STORM",
            Self::Misty => "MISTY",
        }
    }
}

/// Metric a badge threshold is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum RequirementType {
    /// Number of mission completions
    MissionCount,
    /// Profile level
    Level,
    /// Number of distinct spots with at least one completion
    TerritoryExplorer,
}

/// Source stream of a feed item or resonance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityType {
    Mission,
    Scan,
}

/// A Guardian's progression record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Profile {
    pub id: String,
    pub username: String,
    /// Accumulated experience
    pub xp: u64,
    /// Always `level_for_xp(xp)`
    pub level: u32,
    /// Swarm (guild) membership
    pub swarm_id: Option<String>,
    pub avatar_url: Option<String>,
}

impl Profile {
    /// Create the profile a Guardian receives at first sign-in.
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            xp: 0,
            level: 1,
            swarm_id: None,
            avatar_url: None,
        }
    }
}

/// A location-bound mission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Mission {
    pub id: String,
    pub spot_id: String,
    pub title: String,
    pub description: String,
    /// Base reward before modifiers
    pub xp_reward: u32,
    pub category: MissionCategory,
    pub impact_type: ImpactType,
    /// Contribution made to a matching collective goal
    pub impact_value: f64,
    #[serde(default)]
    pub priority: bool,
}

/// One completion attempt of a mission by a Guardian. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct MissionCompletion {
    pub id: String,
    pub user_id: String,
    pub mission_id: String,
    #[cfg_attr(feature = "typescript", ts(type = "string"))]
    pub completed_at: DateTime<Utc>,
    pub xp_earned: u64,
    #[serde(default)]
    pub symbiosis: bool,
    #[cfg_attr(feature = "typescript", ts(type = "unknown"))]
    pub proof: Option<serde_json::Value>,
}

/// A territory-wide goal fed by every Guardian's missions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct CollectiveMission {
    pub id: String,
    pub title: String,
    pub description: String,
    pub goal_value: f64,
    /// Monotonically non-decreasing
    pub current_value: f64,
    pub unit: String,
    pub impact_type: ImpactType,
    /// Sticky once true
    pub is_completed: bool,
    pub victory_chronicle: Option<String>,
    #[serde(default)]
    pub category: CollectiveCategory,
}

impl CollectiveMission {
    /// Fraction of the goal reached, capped at 1.0.
    pub fn progress(&self) -> f64 {
        if self.goal_value <= 0.0 {
            return 1.0;
        }
        (self.current_value / self.goal_value).clamp(0.0, 1.0)
    }

    /// Amount still missing before the goal is met.
    pub fn remaining(&self) -> f64 {
        (self.goal_value - self.current_value).max(0.0)
    }
}

/// Static badge catalog entry. Ownership is stored separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Badge {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub requirement_type: RequirementType,
    pub requirement_value: u64,
}

/// A badge unlocked by a Guardian. Unique per (user, badge).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct BadgeOwnership {
    pub user_id: String,
    pub badge_id: String,
    #[cfg_attr(feature = "typescript", ts(type = "string"))]
    pub unlocked_at: DateTime<Utc>,
}

/// Shared game-state zone. Updated externally, only read by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Territory {
    pub id: String,
    pub name: String,
    /// 0..=100
    pub health_score: f64,
    /// 0..=100
    pub stability_score: f64,
    pub active_nodes: u32,
    pub total_xp: u64,
}

/// A point of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Spot {
    pub id: String,
    pub territory_id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[cfg_attr(feature = "typescript", ts(type = "string | null"))]
    pub last_activity: Option<DateTime<Utc>>,
    /// Not guaranteed symmetric across spots
    #[serde(default)]
    #[cfg_attr(feature = "typescript", ts(type = "Array<string>"))]
    pub connected_spot_ids: BTreeSet<String>,
    /// Guardian who adopted the spot. Set once.
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub owner_name: Option<String>,
    /// Voice of the spot's spirit, chosen by the owner
    #[serde(default)]
    pub spirit_personality: Option<String>,
}

/// Personality a spirit takes when its spot is adopted.
pub const DEFAULT_SPIRIT_PERSONALITY: &str = "Protective and mysterious.";

impl Spot {
    pub fn is_owned(&self) -> bool {
        self.owner_id.is_some()
    }

    pub fn is_owned_by(&self, profile_id: &str) -> bool {
        self.owner_id.as_deref() == Some(profile_id)
    }
}

/// Output of the vision classifier. Confidence is advisory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct BioScanResult {
    pub common_name: String,
    pub scientific_name: String,
    pub ecology_fact: String,
    pub confidence: f64,
}

/// A persisted species scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ScanRecord {
    pub id: String,
    pub user_id: String,
    pub common_name: String,
    pub scientific_name: String,
    pub ecology_fact: String,
    pub confidence: f64,
    #[cfg_attr(feature = "typescript", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
}

impl ScanRecord {
    /// Build a record for a freshly classified scan.
    pub fn from_result(user_id: impl Into<String>, result: BioScanResult) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            common_name: result.common_name,
            scientific_name: result.scientific_name,
            ecology_fact: result.ecology_fact,
            confidence: result.confidence,
            created_at: Utc::now(),
        }
    }
}

/// One user's endorsement of one activity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Resonance {
    pub user_id: String,
    pub activity_type: ActivityType,
    pub activity_id: String,
}

/// A narrative log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Chronicle {
    pub id: String,
    pub title: String,
    pub content: String,
    /// Collective mission the chronicle celebrates, if any
    pub collective_mission_id: Option<String>,
    #[cfg_attr(feature = "typescript", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
}

impl Chronicle {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            content: content.into(),
            collective_mission_id: None,
            created_at: Utc::now(),
        }
    }
}

/// A Guardian's message left at a spot, kept both as written and as the
/// spirit retold it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Echo {
    pub id: String,
    pub spot_id: String,
    pub user_id: String,
    pub username: String,
    /// Poetized text shown to other Guardians
    pub content: String,
    pub original_content: String,
    #[cfg_attr(feature = "typescript", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
}

impl Echo {
    pub fn new(
        spot_id: impl Into<String>,
        author: &Profile,
        content: impl Into<String>,
        original_content: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            spot_id: spot_id.into(),
            user_id: author.id.clone(),
            username: author.username.clone(),
            content: content.into(),
            original_content: original_content.into(),
            created_at: Utc::now(),
        }
    }
}

/// A merged, display-ready activity. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct FeedItem {
    #[serde(rename = "type")]
    pub item_type: ActivityType,
    pub activity_id: String,
    #[cfg_attr(feature = "typescript", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
    pub actor_name: String,
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub resonance_count: u32,
}

/// Cumulated ecological impact of a Guardian.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ImpactStats {
    /// kg
    pub carbon: f64,
    /// litres
    pub water: f64,
    pub biodiversity: f64,
}

impl ImpactStats {
    pub fn add(&mut self, impact_type: ImpactType, value: f64) {
        match impact_type {
            ImpactType::Carbon => self.carbon += value,
            ImpactType::Water => self.water += value,
            ImpactType::Biodiversity => self.biodiversity += value,
        }
    }

    pub fn get(&self, impact_type: ImpactType) -> f64 {
        match impact_type {
            ImpactType::Carbon => self.carbon,
            ImpactType::Water => self.water,
            ImpactType::Biodiversity => self.biodiversity,
        }
    }
}
