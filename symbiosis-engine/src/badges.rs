//! BadgeEvaluator - unlocks catalog badges whose thresholds are met.

use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use guardian_core::{Badge, BadgeOwnership, RequirementType};

use crate::store::{BadgeRepository, CompletionRepository, MissionRepository, ProfileRepository};
use crate::sync::{badge_key, KeyedLocks};
use crate::types::{EngineError, Result};

/// Metrics a badge requirement is compared against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BadgeMetrics {
    pub mission_count: u64,
    pub level: u64,
    /// Distinct spots with at least one completed mission
    pub spots_explored: u64,
}

impl BadgeMetrics {
    pub fn value_for(&self, requirement: RequirementType) -> u64 {
        match requirement {
            RequirementType::MissionCount => self.mission_count,
            RequirementType::Level => self.level,
            RequirementType::TerritoryExplorer => self.spots_explored,
        }
    }

    pub fn meets(&self, badge: &Badge) -> bool {
        self.value_for(badge.requirement_type) >= badge.requirement_value
    }
}

/// Badge unlock evaluation.
pub struct BadgeEvaluator {
    badges: Arc<dyn BadgeRepository>,
    completions: Arc<dyn CompletionRepository>,
    missions: Arc<dyn MissionRepository>,
    profiles: Arc<dyn ProfileRepository>,
    locks: Arc<KeyedLocks>,
}

impl BadgeEvaluator {
    pub fn new(
        badges: Arc<dyn BadgeRepository>,
        completions: Arc<dyn CompletionRepository>,
        missions: Arc<dyn MissionRepository>,
        profiles: Arc<dyn ProfileRepository>,
        locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            badges,
            completions,
            missions,
            profiles,
            locks,
        }
    }

    /// Current metrics of a Guardian.
    pub async fn metrics(&self, actor_id: &str) -> Result<BadgeMetrics> {
        let profile = self
            .profiles
            .get_profile(actor_id)
            .await?
            .ok_or_else(|| EngineError::not_found("profile", actor_id))?;
        let completions = self.completions.completions_by_user(actor_id).await?;

        let mut spots = HashSet::new();
        let mut seen_missions = HashSet::new();
        for completion in &completions {
            if !seen_missions.insert(completion.mission_id.as_str()) {
                continue;
            }
            if let Some(mission) = self.missions.get_mission(&completion.mission_id).await? {
                spots.insert(mission.spot_id);
            }
        }

        Ok(BadgeMetrics {
            mission_count: completions.len() as u64,
            level: u64::from(profile.level),
            spots_explored: spots.len() as u64,
        })
    }

    /// Unlock every badge whose threshold is met and not yet owned.
    /// Returns the badges unlocked by this call; calling it again without a
    /// state change unlocks nothing.
    pub async fn recheck(&self, actor_id: &str) -> Result<Vec<Badge>> {
        let _guard = self.locks.lock(badge_key(actor_id)).await;

        let metrics = self.metrics(actor_id).await?;
        let owned: HashSet<String> = self
            .badges
            .owned_badges(actor_id)
            .await?
            .into_iter()
            .map(|o| o.badge_id)
            .collect();

        let mut unlocked = Vec::new();
        for badge in self.badges.catalog().await? {
            if owned.contains(&badge.id) || !metrics.meets(&badge) {
                continue;
            }
            let inserted = self
                .badges
                .insert_ownership(BadgeOwnership {
                    user_id: actor_id.to_string(),
                    badge_id: badge.id.clone(),
                    unlocked_at: Utc::now(),
                })
                .await?;
            if inserted {
                info!(actor_id = %actor_id, badge_id = %badge.id, badge = %badge.name, "Badge unlocked");
                unlocked.push(badge);
            }
        }

        debug!(actor_id = %actor_id, metrics = ?metrics, unlocked = unlocked.len(), "Badges rechecked");
        Ok(unlocked)
    }

    /// Badges owned by a Guardian, in catalog order.
    pub async fn owned(&self, actor_id: &str) -> Result<Vec<Badge>> {
        let owned: HashSet<String> = self
            .badges
            .owned_badges(actor_id)
            .await?
            .into_iter()
            .map(|o| o.badge_id)
            .collect();
        Ok(self
            .badges
            .catalog()
            .await?
            .into_iter()
            .filter(|b| owned.contains(&b.id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use guardian_core::{MissionCompletion, Profile};

    fn evaluator(store: Arc<MemoryStore>) -> BadgeEvaluator {
        BadgeEvaluator::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store,
            Arc::new(KeyedLocks::new()),
        )
    }

    fn completion(id: &str, mission: &str) -> MissionCompletion {
        MissionCompletion {
            id: id.to_string(),
            user_id: "u1".to_string(),
            mission_id: mission.to_string(),
            completed_at: Utc::now(),
            xp_earned: 150,
            symbiosis: false,
            proof: None,
        }
    }

    fn ids(badges: &[Badge]) -> Vec<&str> {
        badges.iter().map(|b| b.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_recheck_idempotent() {
        let store = Arc::new(MemoryStore::seeded());
        store.create_profile(Profile::new("u1", "Alpha")).await.unwrap();
        store.update_progress("u1", 600, 2).await.unwrap();
        store.push_completion(completion("c1", "m1")).await;
        let evaluator = evaluator(store.clone());

        let first = evaluator.recheck("u1").await.unwrap();
        assert_eq!(ids(&first), vec!["b1", "b2"]);

        let second = evaluator.recheck("u1").await.unwrap();
        assert!(second.is_empty());
        assert_eq!(store.ownership_count("u1").await, 2);
    }

    #[tokio::test]
    async fn test_territory_explorer_counts_distinct_spots() {
        let store = Arc::new(MemoryStore::seeded());
        store.create_profile(Profile::new("u1", "Alpha")).await.unwrap();
        for (id, mission) in [("c1", "m1"), ("c2", "m1"), ("c3", "m2")] {
            store.push_completion(completion(id, mission)).await;
        }
        let evaluator = evaluator(store.clone());

        let metrics = evaluator.metrics("u1").await.unwrap();
        assert_eq!(metrics.mission_count, 3);
        assert_eq!(metrics.spots_explored, 2);
        assert!(!ids(&evaluator.recheck("u1").await.unwrap()).contains(&"b5"));

        store.push_completion(completion("c4", "m3")).await;
        assert!(ids(&evaluator.recheck("u1").await.unwrap()).contains(&"b5"));
    }

    #[tokio::test]
    async fn test_concurrent_recheck_no_duplicates() {
        let store = Arc::new(MemoryStore::seeded());
        store.create_profile(Profile::new("u1", "Alpha")).await.unwrap();
        store.push_completion(completion("c1", "m1")).await;
        let evaluator = Arc::new(evaluator(store.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let evaluator = evaluator.clone();
            handles.push(tokio::spawn(async move { evaluator.recheck("u1").await }));
        }
        let mut total = 0;
        for handle in handles {
            total += handle.await.unwrap().unwrap().len();
        }
        assert_eq!(total, 1);
        assert_eq!(ids(&evaluator.owned("u1").await.unwrap()), vec!["b1"]);
    }

    #[tokio::test]
    async fn test_recheck_unknown_actor() {
        let store = Arc::new(MemoryStore::seeded());
        let evaluator = evaluator(store);
        assert!(matches!(
            evaluator.recheck("ghost").await,
            Err(EngineError::NotFound { .. })
        ));
    }
}
