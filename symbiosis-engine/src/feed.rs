//! SymbiosisFeedMerger - one ranked feed from the mission and scan streams.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use guardian_core::{merge_feed, ActivityType, FeedItem, Mission, Resonance};

use crate::config::FeedConfig;
use crate::store::{
    CompletionRepository, MissionRepository, ProfileRepository, ResonanceRepository, ScanRepository,
};
use crate::types::{require_actor, Result};

/// Read-side feed view.
pub struct SymbiosisFeedMerger {
    completions: Arc<dyn CompletionRepository>,
    scans: Arc<dyn ScanRepository>,
    missions: Arc<dyn MissionRepository>,
    profiles: Arc<dyn ProfileRepository>,
    resonances: Arc<dyn ResonanceRepository>,
    config: FeedConfig,
}

impl SymbiosisFeedMerger {
    pub fn new(
        completions: Arc<dyn CompletionRepository>,
        scans: Arc<dyn ScanRepository>,
        missions: Arc<dyn MissionRepository>,
        profiles: Arc<dyn ProfileRepository>,
        resonances: Arc<dyn ResonanceRepository>,
        config: FeedConfig,
    ) -> Self {
        Self {
            completions,
            scans,
            missions,
            profiles,
            resonances,
            config,
        }
    }

    /// Feed with the configured per-source limit.
    pub async fn get_feed(&self) -> Result<Vec<FeedItem>> {
        self.get_feed_with_limit(self.config.per_source_limit).await
    }

    /// Latest `limit` completions and `limit` scans, newest first.
    pub async fn get_feed_with_limit(&self, limit: usize) -> Result<Vec<FeedItem>> {
        let (completions, scans, resonances) = futures::try_join!(
            self.completions.recent_completions(limit),
            self.scans.recent_scans(limit),
            self.resonances.all_resonances(),
        )?;

        let mut names = ActorNames::new(self.profiles.as_ref(), &self.config.fallback_actor_name);
        let mut missions: HashMap<String, Option<Mission>> = HashMap::new();

        let mut mission_items = Vec::with_capacity(completions.len());
        for completion in &completions {
            if !missions.contains_key(&completion.mission_id) {
                let mission = self.lookup_mission(&completion.mission_id).await;
                missions.insert(completion.mission_id.clone(), mission);
            }
            let mission = missions.get(&completion.mission_id).and_then(Option::as_ref);
            let actor = names.resolve(&completion.user_id).await;
            mission_items.push(FeedItem::from_completion(completion, mission, actor));
        }

        let mut scan_items = Vec::with_capacity(scans.len());
        for scan in &scans {
            let actor = names.resolve(&scan.user_id).await;
            scan_items.push(FeedItem::from_scan(scan, actor));
        }

        let feed = merge_feed(mission_items, scan_items, &resonances);
        debug!(items = feed.len(), resonances = resonances.len(), "Feed merged");
        Ok(feed)
    }

    /// Resonate with a feed item. Returns `false` if the actor already did.
    pub async fn resonate(
        &self,
        actor_id: Option<&str>,
        activity_type: ActivityType,
        activity_id: &str,
    ) -> Result<bool> {
        let actor_id = require_actor(actor_id)?;
        let inserted = self
            .resonances
            .insert_resonance(Resonance {
                user_id: actor_id.to_string(),
                activity_type,
                activity_id: activity_id.to_string(),
            })
            .await?;
        debug!(actor_id = %actor_id, activity_id = %activity_id, inserted, "Resonance");
        Ok(inserted)
    }

    async fn lookup_mission(&self, mission_id: &str) -> Option<Mission> {
        match self.missions.get_mission(mission_id).await {
            Ok(mission) => mission,
            Err(e) => {
                warn!(mission_id = %mission_id, error = %e, "Mission lookup failed for feed item");
                None
            }
        }
    }
}

/// Display names resolved once per merge.
struct ActorNames<'a> {
    profiles: &'a dyn ProfileRepository,
    fallback: &'a str,
    cache: HashMap<String, String>,
}

impl<'a> ActorNames<'a> {
    fn new(profiles: &'a dyn ProfileRepository, fallback: &'a str) -> Self {
        Self {
            profiles,
            fallback,
            cache: HashMap::new(),
        }
    }

    async fn resolve(&mut self, user_id: &str) -> String {
        if let Some(name) = self.cache.get(user_id) {
            return name.clone();
        }
        let name = match self.profiles.get_profile(user_id).await {
            Ok(Some(profile)) if !profile.username.is_empty() => profile.username,
            Ok(_) => self.fallback.to_string(),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Actor lookup failed, using fallback name");
                self.fallback.to_string()
            }
        };
        self.cache.insert(user_id.to_string(), name.clone());
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::EngineError;
    use chrono::{Duration, Utc};
    use guardian_core::{MissionCompletion, Profile, ScanRecord};

    fn merger(store: Arc<MemoryStore>, limit: usize) -> SymbiosisFeedMerger {
        SymbiosisFeedMerger::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store,
            FeedConfig {
                per_source_limit: limit,
                ..Default::default()
            },
        )
    }

    fn completion(id: &str, user: &str, mission: &str, minutes_ago: i64) -> MissionCompletion {
        MissionCompletion {
            id: id.to_string(),
            user_id: user.to_string(),
            mission_id: mission.to_string(),
            completed_at: Utc::now() - Duration::minutes(minutes_ago),
            xp_earned: 150,
            symbiosis: false,
            proof: None,
        }
    }

    fn scan(id: &str, user: &str, minutes_ago: i64) -> ScanRecord {
        ScanRecord {
            id: id.to_string(),
            user_id: user.to_string(),
            common_name: "Great tit".to_string(),
            scientific_name: "Parus major".to_string(),
            ecology_fact: "Eats caterpillars.".to_string(),
            confidence: 0.9,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    async fn seeded_feed_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::seeded());
        store.create_profile(Profile::new("u1", "Alpha")).await.unwrap();
        store.push_completion(completion("c1", "u1", "m1", 30)).await;
        store.push_completion(completion("c2", "u2", "m2", 5)).await;
        store.push_scan(scan("sc1", "u1", 10)).await;
        store.push_scan(scan("sc2", "u1", 1)).await;
        store
    }

    #[tokio::test]
    async fn test_feed_sorted_with_fallback_names() {
        let store = seeded_feed_store().await;
        let feed = merger(store, 10).get_feed().await.unwrap();

        let ids: Vec<_> = feed.iter().map(|i| i.activity_id.as_str()).collect();
        assert_eq!(ids, vec!["sc2", "c2", "sc1", "c1"]);

        let c2 = &feed[1];
        assert_eq!(c2.actor_name, "Anonymous Guardian");
        assert_eq!(c2.title, "Riverbank Cleanup");
        assert_eq!(c2.subtitle, "+150 XP");
        assert_eq!(feed[0].actor_name, "Alpha");
    }

    #[tokio::test]
    async fn test_per_source_limit() {
        let store = seeded_feed_store().await;
        let feed = merger(store, 1).get_feed().await.unwrap();
        let ids: Vec<_> = feed.iter().map(|i| i.activity_id.as_str()).collect();
        assert_eq!(ids, vec!["sc2", "c2"]);
    }

    #[tokio::test]
    async fn test_resonance_counts() {
        let store = seeded_feed_store().await;
        let merger = merger(store, 10);

        for user in ["u1", "u2", "u3"] {
            assert!(merger.resonate(Some(user), ActivityType::Mission, "c1").await.unwrap());
        }
        assert!(!merger.resonate(Some("u1"), ActivityType::Mission, "c1").await.unwrap());

        let feed = merger.get_feed().await.unwrap();
        let c1 = feed.iter().find(|i| i.activity_id == "c1").unwrap();
        assert_eq!(c1.resonance_count, 3);
        let sc1 = feed.iter().find(|i| i.activity_id == "sc1").unwrap();
        assert_eq!(sc1.resonance_count, 0);
    }

    #[tokio::test]
    async fn test_resonate_requires_actor() {
        let store = seeded_feed_store().await;
        let result = merger(store, 10).resonate(None, ActivityType::Scan, "sc1").await;
        assert!(matches!(result, Err(EngineError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_unknown_mission_title() {
        let store = Arc::new(MemoryStore::new());
        store.push_completion(completion("c1", "u1", "gone", 1)).await;
        let feed = merger(store, 10).get_feed().await.unwrap();
        assert_eq!(feed[0].title, "Unknown mission");
    }
}
