//! Core types for the symbiosis engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use guardian_core::{AlertState, Badge, MissionCompletion, ScanRecord, Territory};
use spirit_agent::ServiceError;

use crate::store::StoreError;

/// Result of adding experience to a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpUpdate {
    pub profile_id: String,
    pub previous_xp: u64,
    pub xp: u64,
    pub previous_level: u32,
    pub level: u32,
}

impl XpUpdate {
    pub fn leveled_up(&self) -> bool {
        self.level > self.previous_level
    }
}

/// Position of a Guardian inside the current level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub level: u32,
    pub xp: u64,
    /// Percent of the current level already earned
    pub percent: f64,
    pub xp_to_next_level: u64,
}

/// What a contribution to the collective goals did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ContributionOutcome {
    /// Added to an open collective mission
    Applied {
        mission_id: String,
        previous_value: f64,
        current_value: f64,
        /// This contribution reached the goal
        completed_now: bool,
    },
    /// No open collective mission for the impact type
    Dropped,
}

impl ContributionOutcome {
    pub fn completed_now(&self) -> bool {
        matches!(self, Self::Applied { completed_now: true, .. })
    }
}

/// Everything a mission completion changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionOutcome {
    pub completion: MissionCompletion,
    pub xp: XpUpdate,
    /// `None` when collective contributions are disabled
    pub contribution: Option<ContributionOutcome>,
    pub unlocked_badges: Vec<Badge>,
}

/// Everything a species scan changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub scan: ScanRecord,
    pub xp: XpUpdate,
    pub unlocked_badges: Vec<Badge>,
}

/// Territory reading with its classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerritorySnapshot {
    pub territory: Territory,
    pub alert: AlertState,
    /// Health score clamped for the circular gauge
    pub gauge: f64,
    /// The persistence collaborator was unreachable and `territory` is the default reading
    pub degraded: bool,
}

/// Why a stability alert was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// The alert state changed
    Transition,
    /// Periodic signal while the territory stays critical
    Escalation,
}

/// Signal emitted by a territory watch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityAlert {
    pub territory_id: String,
    pub kind: AlertKind,
    pub state: AlertState,
    pub stability_score: f64,
    pub at: DateTime<Utc>,
}

/// Table a realtime notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    MissionCompletions,
    Scans,
    Resonances,
    CollectiveMissions,
    Chronicles,
    Missions,
    Echoes,
}

impl Table {
    /// Inserts into this table change the symbiosis feed.
    pub fn affects_feed(&self) -> bool {
        matches!(self, Self::MissionCompletions | Self::Scans | Self::Resonances)
    }
}

/// Insert notification from the realtime bus. Advisory only: a receiver
/// re-fetches instead of applying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeEvent {
    pub table: Table,
    pub record_id: String,
}

impl RealtimeEvent {
    pub fn inserted(table: Table, record_id: impl Into<String>) -> Self {
        Self {
            table,
            record_id: record_id.into(),
        }
    }
}

/// Error types for the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Referenced record does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// No actor bound to the call
    #[error("No Guardian bound to this call")]
    Unauthenticated,

    /// Persistence or generative service failure
    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    /// The Guardian already completed this mission
    #[error("Mission {mission_id} already completed by {actor_id}")]
    AlreadyCompleted { actor_id: String, mission_id: String },

    /// Victory requested before the goal was reached
    #[error("Collective mission not completed: {0}")]
    NotCompleted(String),

    /// Victory narrative already attached
    #[error("Collective mission already finalized: {0}")]
    AlreadyFinalized(String),

    /// Uniqueness constraint rejected a write
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The Guardian's level is below what the action needs
    #[error("Level {required} required, Guardian is level {level}")]
    LevelTooLow { required: u32, level: u32 },

    /// Only the spot's owner may do this
    #[error("{actor_id} does not protect spot {spot_id}")]
    NotSpotOwner { actor_id: String, spot_id: String },

    /// Moderation refused the echo
    #[error("Echo rejected by the spirit")]
    EchoRejected,

    /// Rejected argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::Unavailable(msg) => Self::CollaboratorUnavailable(msg),
            StoreError::Conflict(msg) => Self::Conflict(msg),
        }
    }
}

impl From<ServiceError> for EngineError {
    fn from(err: ServiceError) -> Self {
        Self::CollaboratorUnavailable(err.to_string())
    }
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Resolve the bound actor or fail with `Unauthenticated`.
pub fn require_actor(actor_id: Option<&str>) -> Result<&str> {
    match actor_id {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => Err(EngineError::Unauthenticated),
    }
}
