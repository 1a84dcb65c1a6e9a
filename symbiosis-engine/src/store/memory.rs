//! In-memory store implementing every repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, RwLock};
use tracing::trace;

use guardian_core::{
    Badge, BadgeOwnership, Chronicle, CollectiveMission, Echo, Mission, MissionCompletion, Profile,
    Resonance, ScanRecord, Spot, Territory,
};

use super::seed::SeedData;
use super::traits::*;
use crate::types::{RealtimeEvent, Table};

/// In-memory persistence with an availability switch and optional insert notifications.
pub struct MemoryStore {
    available: AtomicBool,
    profiles: RwLock<HashMap<String, Profile>>,
    missions: RwLock<Vec<Mission>>,
    completions: RwLock<Vec<MissionCompletion>>,
    collectives: RwLock<Vec<CollectiveMission>>,
    badges: RwLock<Vec<Badge>>,
    ownerships: RwLock<Vec<BadgeOwnership>>,
    territories: RwLock<HashMap<String, Territory>>,
    spots: RwLock<Vec<Spot>>,
    scans: RwLock<Vec<ScanRecord>>,
    resonances: RwLock<Vec<Resonance>>,
    chronicles: RwLock<Vec<Chronicle>>,
    echoes: RwLock<Vec<Echo>>,
    events: Option<mpsc::Sender<RealtimeEvent>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::from_seed(SeedData::default())
    }

    /// Create a store holding the Alpha sector world.
    pub fn seeded() -> Self {
        Self::from_seed(SeedData::alpha_sector())
    }

    /// Create a store holding `seed`.
    pub fn from_seed(seed: SeedData) -> Self {
        Self {
            available: AtomicBool::new(true),
            profiles: RwLock::new(HashMap::new()),
            missions: RwLock::new(seed.missions),
            completions: RwLock::new(Vec::new()),
            collectives: RwLock::new(seed.collectives),
            badges: RwLock::new(seed.badges),
            ownerships: RwLock::new(Vec::new()),
            territories: RwLock::new(
                seed.territories
                    .into_iter()
                    .map(|t| (t.id.clone(), t))
                    .collect(),
            ),
            spots: RwLock::new(seed.spots),
            scans: RwLock::new(Vec::new()),
            resonances: RwLock::new(Vec::new()),
            chronicles: RwLock::new(Vec::new()),
            echoes: RwLock::new(seed.echoes),
            events: None,
        }
    }

    /// Publish insert notifications on `sender`.
    pub fn with_events(mut self, sender: mpsc::Sender<RealtimeEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Simulate an outage (`false`) or recovery (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Update territory scores, as the external territory process does.
    pub async fn set_territory_scores(&self, id: &str, health: f64, stability: f64) -> StoreResult<()> {
        self.check()?;
        let mut territories = self.territories.write().await;
        let territory = territories
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("territory", id))?;
        territory.health_score = health;
        territory.stability_score = stability;
        Ok(())
    }

    /// Add a collective mission after construction.
    pub async fn add_collective(&self, mission: CollectiveMission) {
        self.collectives.write().await.push(mission);
    }

    /// Add a spot after construction.
    pub async fn add_spot(&self, spot: Spot) {
        self.spots.write().await.push(spot);
    }

    /// Insert a completion bypassing the engine, e.g. with a fixed timestamp.
    pub async fn push_completion(&self, completion: MissionCompletion) {
        self.completions.write().await.push(completion);
    }

    /// Insert a scan bypassing the engine.
    pub async fn push_scan(&self, scan: ScanRecord) {
        self.scans.write().await.push(scan);
    }

    pub async fn ownership_count(&self, user_id: &str) -> usize {
        self.ownerships
            .read()
            .await
            .iter()
            .filter(|o| o.user_id == user_id)
            .count()
    }

    fn check(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store offline".to_string()))
        }
    }

    fn emit(&self, table: Table, record_id: &str) {
        if let Some(sender) = &self.events {
            if sender.try_send(RealtimeEvent::inserted(table, record_id)).is_err() {
                trace!(table = ?table, record_id, "Realtime notification dropped");
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn newest_first<T: Clone, K: Ord>(items: &[T], key: impl Fn(&T) -> K, limit: usize) -> Vec<T> {
    let mut sorted = items.to_vec();
    sorted.sort_by(|a, b| key(b).cmp(&key(a)));
    sorted.truncate(limit);
    sorted
}

#[async_trait]
impl ProfileRepository for MemoryStore {
    async fn get_profile(&self, id: &str) -> StoreResult<Option<Profile>> {
        self.check()?;
        Ok(self.profiles.read().await.get(id).cloned())
    }

    async fn create_profile(&self, profile: Profile) -> StoreResult<Profile> {
        self.check()?;
        let mut profiles = self.profiles.write().await;
        let stored = profiles
            .entry(profile.id.clone())
            .or_insert(profile)
            .clone();
        Ok(stored)
    }

    async fn update_progress(&self, id: &str, xp: u64, level: u32) -> StoreResult<()> {
        self.check()?;
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("profile", id))?;
        profile.xp = xp;
        profile.level = level;
        Ok(())
    }
}

#[async_trait]
impl MissionRepository for MemoryStore {
    async fn get_mission(&self, id: &str) -> StoreResult<Option<Mission>> {
        self.check()?;
        Ok(self.missions.read().await.iter().find(|m| m.id == id).cloned())
    }

    async fn missions_for_spot(&self, spot_id: &str) -> StoreResult<Vec<Mission>> {
        self.check()?;
        Ok(self
            .missions
            .read()
            .await
            .iter()
            .filter(|m| m.spot_id == spot_id)
            .cloned()
            .collect())
    }

    async fn insert_mission(&self, mission: Mission) -> StoreResult<()> {
        self.check()?;
        let mut missions = self.missions.write().await;
        if missions.iter().any(|m| m.id == mission.id) {
            return Err(StoreError::Conflict(format!("mission {} exists", mission.id)));
        }
        let id = mission.id.clone();
        missions.push(mission);
        drop(missions);
        self.emit(Table::Missions, &id);
        Ok(())
    }
}

#[async_trait]
impl CompletionRepository for MemoryStore {
    async fn insert_completion(
        &self,
        completion: MissionCompletion,
        unique_per_actor: bool,
    ) -> StoreResult<()> {
        self.check()?;
        let mut completions = self.completions.write().await;
        if unique_per_actor
            && completions
                .iter()
                .any(|c| c.user_id == completion.user_id && c.mission_id == completion.mission_id)
        {
            return Err(StoreError::Conflict(format!(
                "{} already completed {}",
                completion.user_id, completion.mission_id
            )));
        }
        let id = completion.id.clone();
        completions.push(completion);
        drop(completions);
        self.emit(Table::MissionCompletions, &id);
        Ok(())
    }

    async fn remove_completion(&self, id: &str) -> StoreResult<()> {
        self.check()?;
        let mut completions = self.completions.write().await;
        let index = completions
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| StoreError::not_found("completion", id))?;
        completions.remove(index);
        Ok(())
    }

    async fn has_completed(&self, user_id: &str, mission_id: &str) -> StoreResult<bool> {
        self.check()?;
        Ok(self
            .completions
            .read()
            .await
            .iter()
            .any(|c| c.user_id == user_id && c.mission_id == mission_id))
    }

    async fn completions_by_user(&self, user_id: &str) -> StoreResult<Vec<MissionCompletion>> {
        self.check()?;
        Ok(self
            .completions
            .read()
            .await
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn recent_completions(&self, limit: usize) -> StoreResult<Vec<MissionCompletion>> {
        self.check()?;
        let completions = self.completions.read().await;
        Ok(newest_first(completions.as_slice(), |c| c.completed_at, limit))
    }
}

#[async_trait]
impl CollectiveRepository for MemoryStore {
    async fn list_collective(&self) -> StoreResult<Vec<CollectiveMission>> {
        self.check()?;
        Ok(self.collectives.read().await.clone())
    }

    async fn get_collective(&self, id: &str) -> StoreResult<Option<CollectiveMission>> {
        self.check()?;
        Ok(self.collectives.read().await.iter().find(|m| m.id == id).cloned())
    }

    async fn save_collective(&self, mission: CollectiveMission) -> StoreResult<()> {
        self.check()?;
        let mut collectives = self.collectives.write().await;
        let slot = collectives
            .iter_mut()
            .find(|m| m.id == mission.id)
            .ok_or_else(|| StoreError::not_found("collective mission", mission.id.clone()))?;
        *slot = mission;
        Ok(())
    }
}

#[async_trait]
impl BadgeRepository for MemoryStore {
    async fn catalog(&self) -> StoreResult<Vec<Badge>> {
        self.check()?;
        Ok(self.badges.read().await.clone())
    }

    async fn owned_badges(&self, user_id: &str) -> StoreResult<Vec<BadgeOwnership>> {
        self.check()?;
        Ok(self
            .ownerships
            .read()
            .await
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_ownership(&self, ownership: BadgeOwnership) -> StoreResult<bool> {
        self.check()?;
        let mut ownerships = self.ownerships.write().await;
        if ownerships
            .iter()
            .any(|o| o.user_id == ownership.user_id && o.badge_id == ownership.badge_id)
        {
            return Ok(false);
        }
        ownerships.push(ownership);
        Ok(true)
    }
}

#[async_trait]
impl TerritoryRepository for MemoryStore {
    async fn get_territory(&self, id: &str) -> StoreResult<Option<Territory>> {
        self.check()?;
        Ok(self.territories.read().await.get(id).cloned())
    }
}

#[async_trait]
impl SpotRepository for MemoryStore {
    async fn list_spots(&self, territory_id: Option<&str>) -> StoreResult<Vec<Spot>> {
        self.check()?;
        Ok(self
            .spots
            .read()
            .await
            .iter()
            .filter(|s| territory_id.map_or(true, |t| s.territory_id == t))
            .cloned()
            .collect())
    }

    async fn touch_spot(&self, id: &str, at: DateTime<Utc>) -> StoreResult<()> {
        self.check()?;
        let mut spots = self.spots.write().await;
        let spot = spots
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::not_found("spot", id))?;
        if spot.last_activity.map_or(true, |last| last < at) {
            spot.last_activity = Some(at);
        }
        Ok(())
    }

    async fn get_spot(&self, id: &str) -> StoreResult<Option<Spot>> {
        self.check()?;
        Ok(self.spots.read().await.iter().find(|s| s.id == id).cloned())
    }

    async fn assign_owner(
        &self,
        spot_id: &str,
        owner_id: &str,
        owner_name: &str,
        personality: &str,
    ) -> StoreResult<Spot> {
        self.check()?;
        let mut spots = self.spots.write().await;
        let spot = spots
            .iter_mut()
            .find(|s| s.id == spot_id)
            .ok_or_else(|| StoreError::not_found("spot", spot_id))?;
        if let Some(current) = &spot.owner_id {
            return Err(StoreError::Conflict(format!("spot {spot_id} already protected by {current}")));
        }
        spot.owner_id = Some(owner_id.to_string());
        spot.owner_name = Some(owner_name.to_string());
        spot.spirit_personality = Some(personality.to_string());
        Ok(spot.clone())
    }

    async fn set_spirit_personality(&self, spot_id: &str, personality: &str) -> StoreResult<Spot> {
        self.check()?;
        let mut spots = self.spots.write().await;
        let spot = spots
            .iter_mut()
            .find(|s| s.id == spot_id)
            .ok_or_else(|| StoreError::not_found("spot", spot_id))?;
        spot.spirit_personality = Some(personality.to_string());
        Ok(spot.clone())
    }
}

#[async_trait]
impl EchoRepository for MemoryStore {
    async fn insert_echo(&self, echo: Echo) -> StoreResult<()> {
        self.check()?;
        let id = echo.id.clone();
        self.echoes.write().await.push(echo);
        self.emit(Table::Echoes, &id);
        Ok(())
    }

    async fn echoes_for_spot(&self, spot_id: &str, limit: usize) -> StoreResult<Vec<Echo>> {
        self.check()?;
        let echoes: Vec<Echo> = self
            .echoes
            .read()
            .await
            .iter()
            .filter(|e| e.spot_id == spot_id)
            .cloned()
            .collect();
        Ok(newest_first(&echoes, |e| e.created_at, limit))
    }
}

#[async_trait]
impl ScanRepository for MemoryStore {
    async fn insert_scan(&self, scan: ScanRecord) -> StoreResult<()> {
        self.check()?;
        let id = scan.id.clone();
        self.scans.write().await.push(scan);
        self.emit(Table::Scans, &id);
        Ok(())
    }

    async fn recent_scans(&self, limit: usize) -> StoreResult<Vec<ScanRecord>> {
        self.check()?;
        let scans = self.scans.read().await;
        Ok(newest_first(scans.as_slice(), |s| s.created_at, limit))
    }
}

#[async_trait]
impl ResonanceRepository for MemoryStore {
    async fn insert_resonance(&self, resonance: Resonance) -> StoreResult<bool> {
        self.check()?;
        let mut resonances = self.resonances.write().await;
        if resonances.iter().any(|r| {
            r.user_id == resonance.user_id
                && r.activity_type == resonance.activity_type
                && r.activity_id == resonance.activity_id
        }) {
            return Ok(false);
        }
        let id = resonance.activity_id.clone();
        resonances.push(resonance);
        drop(resonances);
        self.emit(Table::Resonances, &id);
        Ok(true)
    }

    async fn all_resonances(&self) -> StoreResult<Vec<Resonance>> {
        self.check()?;
        Ok(self.resonances.read().await.clone())
    }
}

#[async_trait]
impl ChronicleRepository for MemoryStore {
    async fn insert_chronicle(&self, chronicle: Chronicle) -> StoreResult<()> {
        self.check()?;
        let id = chronicle.id.clone();
        self.chronicles.write().await.push(chronicle);
        self.emit(Table::Chronicles, &id);
        Ok(())
    }

    async fn recent_chronicles(&self, limit: usize) -> StoreResult<Vec<Chronicle>> {
        self.check()?;
        let chronicles = self.chronicles.read().await;
        Ok(newest_first(chronicles.as_slice(), |c| c.created_at, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn completion(id: &str, user: &str, mission: &str, at: DateTime<Utc>) -> MissionCompletion {
        MissionCompletion {
            id: id.to_string(),
            user_id: user.to_string(),
            mission_id: mission.to_string(),
            completed_at: at,
            xp_earned: 100,
            symbiosis: false,
            proof: None,
        }
    }

    #[tokio::test]
    async fn test_unavailable() {
        let store = MemoryStore::seeded();
        store.set_available(false);
        assert!(matches!(
            store.get_mission("m1").await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_available(true);
        assert!(store.get_mission("m1").await.unwrap().is_some());
    }

    #[test]
    fn test_seeded_lists_by_territory() {
        let store = MemoryStore::seeded();
        let spots = tokio_test::block_on(store.list_spots(Some("t1"))).unwrap();
        assert_eq!(spots.len(), 4);
        assert!(tokio_test::block_on(store.list_spots(Some("t9"))).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_profile_keeps_existing() {
        let store = MemoryStore::new();
        store.create_profile(Profile::new("u1", "Alpha")).await.unwrap();
        store.update_progress("u1", 700, 2).await.unwrap();

        let again = store.create_profile(Profile::new("u1", "Other")).await.unwrap();
        assert_eq!(again.username, "Alpha");
        assert_eq!(again.xp, 700);
    }

    #[tokio::test]
    async fn test_update_progress_missing() {
        let store = MemoryStore::new();
        let result = store.update_progress("ghost", 10, 1).await;
        assert!(matches!(result, Err(StoreError::NotFound { entity: "profile", .. })));
    }

    #[tokio::test]
    async fn test_unique_completion() {
        let store = MemoryStore::seeded();
        let now = Utc::now();
        store
            .insert_completion(completion("c1", "u1", "m1", now), true)
            .await
            .unwrap();
        let second = store
            .insert_completion(completion("c2", "u1", "m1", now), true)
            .await;
        assert!(matches!(second, Err(StoreError::Conflict(_))));

        store
            .insert_completion(completion("c3", "u1", "m1", now), false)
            .await
            .unwrap();
        assert_eq!(store.completions_by_user("u1").await.unwrap().len(), 2);

        store.remove_completion("c1").await.unwrap();
        assert_eq!(store.completions_by_user("u1").await.unwrap().len(), 1);
        assert!(matches!(
            store.remove_completion("c1").await,
            Err(StoreError::NotFound { entity: "completion", .. })
        ));
    }

    #[tokio::test]
    async fn test_recent_completions_newest_first() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.push_completion(completion("old", "u1", "m1", now - Duration::minutes(5))).await;
        store.push_completion(completion("new", "u1", "m2", now)).await;
        store.push_completion(completion("mid", "u1", "m3", now - Duration::minutes(1))).await;

        let recent = store.recent_completions(2).await.unwrap();
        let ids: Vec<_> = recent.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid"]);
    }

    #[tokio::test]
    async fn test_spot_has_single_owner() {
        let store = MemoryStore::seeded();
        let spot = store.assign_owner("s1", "u1", "Alpha", "Calm.").await.unwrap();
        assert!(spot.is_owned_by("u1"));

        let second = store.assign_owner("s1", "u2", "Beta", "Loud.").await;
        assert!(matches!(second, Err(StoreError::Conflict(_))));
        let stored = store.get_spot("s1").await.unwrap().unwrap();
        assert_eq!(stored.owner_name.as_deref(), Some("Alpha"));
        assert_eq!(stored.spirit_personality.as_deref(), Some("Calm."));

        assert!(matches!(
            store.assign_owner("s404", "u1", "Alpha", "Calm.").await,
            Err(StoreError::NotFound { entity: "spot", .. })
        ));
    }

    #[tokio::test]
    async fn test_echoes_for_spot_newest_first() {
        let store = MemoryStore::seeded();
        let author = Profile::new("u1", "Alpha");
        let mut older = Echo::new("s1", &author, "Roots hum.", "hello");
        older.created_at = Utc::now() - Duration::hours(1);
        store.insert_echo(older).await.unwrap();
        let mut newer = Echo::new("s1", &author, "Leaves answer.", "hi");
        newer.created_at = Utc::now() + Duration::seconds(1);
        store.insert_echo(newer).await.unwrap();
        store.insert_echo(Echo::new("s2", &author, "Water sings.", "yo")).await.unwrap();

        let echoes = store.echoes_for_spot("s1", 10).await.unwrap();
        let contents: Vec<_> = echoes.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["Leaves answer.", "The wind carries the memory of deep roots.", "Roots hum."]
        );
        assert_eq!(store.echoes_for_spot("s1", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ownership_unique() {
        let store = MemoryStore::seeded();
        let ownership = BadgeOwnership {
            user_id: "u1".to_string(),
            badge_id: "b1".to_string(),
            unlocked_at: Utc::now(),
        };
        assert!(store.insert_ownership(ownership.clone()).await.unwrap());
        assert!(!store.insert_ownership(ownership).await.unwrap());
        assert_eq!(store.ownership_count("u1").await, 1);
    }

    #[tokio::test]
    async fn test_touch_spot_monotonic() {
        let store = MemoryStore::seeded();
        let now = Utc::now();
        store.touch_spot("s1", now).await.unwrap();
        store.touch_spot("s1", now - Duration::hours(2)).await.unwrap();

        let spots = store.list_spots(Some("t1")).await.unwrap();
        let s1 = spots.iter().find(|s| s.id == "s1").unwrap();
        assert_eq!(s1.last_activity, Some(now));
        assert!(store.touch_spot("s9", now).await.is_err());
    }

    #[tokio::test]
    async fn test_insert_notifications() {
        let (tx, mut rx) = mpsc::channel(8);
        let store = MemoryStore::seeded().with_events(tx);
        store
            .insert_completion(completion("c1", "u1", "m1", Utc::now()), false)
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event, RealtimeEvent::inserted(Table::MissionCompletions, "c1"));
    }
}
