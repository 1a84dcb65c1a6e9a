//! Repository traits for the persistence collaborator.
//!
//! Each engine component receives only the repositories it reads or writes.
//! Listing methods that take a `limit` return newest first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use guardian_core::{
    Badge, BadgeOwnership, Chronicle, CollectiveMission, Echo, Mission, MissionCompletion, Profile,
    Resonance, ScanRecord, Spot, Territory,
};

/// Error types for repository operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Record does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Storage cannot be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Uniqueness constraint violated
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get_profile(&self, id: &str) -> StoreResult<Option<Profile>>;

    /// Insert a profile unless one with the same id exists. Returns the stored profile.
    async fn create_profile(&self, profile: Profile) -> StoreResult<Profile>;

    /// Write xp and level in one update.
    async fn update_progress(&self, id: &str, xp: u64, level: u32) -> StoreResult<()>;
}

#[async_trait]
pub trait MissionRepository: Send + Sync {
    async fn get_mission(&self, id: &str) -> StoreResult<Option<Mission>>;

    async fn missions_for_spot(&self, spot_id: &str) -> StoreResult<Vec<Mission>>;

    /// Add a dynamically generated mission.
    async fn insert_mission(&self, mission: Mission) -> StoreResult<()>;
}

#[async_trait]
pub trait CompletionRepository: Send + Sync {
    /// Append a completion. With `unique_per_actor` the store rejects a
    /// second (user, mission) pair with `Conflict`.
    async fn insert_completion(
        &self,
        completion: MissionCompletion,
        unique_per_actor: bool,
    ) -> StoreResult<()>;

    /// Delete a completion by id. Missing ids are `NotFound`.
    async fn remove_completion(&self, id: &str) -> StoreResult<()>;

    async fn has_completed(&self, user_id: &str, mission_id: &str) -> StoreResult<bool>;

    async fn completions_by_user(&self, user_id: &str) -> StoreResult<Vec<MissionCompletion>>;

    async fn recent_completions(&self, limit: usize) -> StoreResult<Vec<MissionCompletion>>;
}

#[async_trait]
pub trait CollectiveRepository: Send + Sync {
    /// All collective missions in stored order.
    async fn list_collective(&self) -> StoreResult<Vec<CollectiveMission>>;

    async fn get_collective(&self, id: &str) -> StoreResult<Option<CollectiveMission>>;

    /// Replace an existing collective mission.
    async fn save_collective(&self, mission: CollectiveMission) -> StoreResult<()>;
}

#[async_trait]
pub trait BadgeRepository: Send + Sync {
    async fn catalog(&self) -> StoreResult<Vec<Badge>>;

    async fn owned_badges(&self, user_id: &str) -> StoreResult<Vec<BadgeOwnership>>;

    /// Returns `false` when the (user, badge) pair is already owned.
    async fn insert_ownership(&self, ownership: BadgeOwnership) -> StoreResult<bool>;
}

#[async_trait]
pub trait TerritoryRepository: Send + Sync {
    async fn get_territory(&self, id: &str) -> StoreResult<Option<Territory>>;
}

#[async_trait]
pub trait SpotRepository: Send + Sync {
    /// Spots of a territory, or all spots when `territory_id` is `None`.
    async fn list_spots(&self, territory_id: Option<&str>) -> StoreResult<Vec<Spot>>;

    async fn touch_spot(&self, id: &str, at: DateTime<Utc>) -> StoreResult<()>;

    async fn get_spot(&self, id: &str) -> StoreResult<Option<Spot>>;

    /// Record the spot's owner and initial spirit personality. Fails with
    /// `Conflict` when the spot already has an owner.
    async fn assign_owner(
        &self,
        spot_id: &str,
        owner_id: &str,
        owner_name: &str,
        personality: &str,
    ) -> StoreResult<Spot>;

    async fn set_spirit_personality(&self, spot_id: &str, personality: &str) -> StoreResult<Spot>;
}

#[async_trait]
pub trait EchoRepository: Send + Sync {
    async fn insert_echo(&self, echo: Echo) -> StoreResult<()>;

    /// Echoes left at a spot, newest first.
    async fn echoes_for_spot(&self, spot_id: &str, limit: usize) -> StoreResult<Vec<Echo>>;
}

#[async_trait]
pub trait ScanRepository: Send + Sync {
    async fn insert_scan(&self, scan: ScanRecord) -> StoreResult<()>;

    async fn recent_scans(&self, limit: usize) -> StoreResult<Vec<ScanRecord>>;
}

#[async_trait]
pub trait ResonanceRepository: Send + Sync {
    /// Returns `false` when the user already resonated with the activity.
    async fn insert_resonance(&self, resonance: Resonance) -> StoreResult<bool>;

    async fn all_resonances(&self) -> StoreResult<Vec<Resonance>>;
}

#[async_trait]
pub trait ChronicleRepository: Send + Sync {
    async fn insert_chronicle(&self, chronicle: Chronicle) -> StoreResult<()>;

    async fn recent_chronicles(&self, limit: usize) -> StoreResult<Vec<Chronicle>>;
}
