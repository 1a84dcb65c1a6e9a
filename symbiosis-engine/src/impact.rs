//! Per-Guardian impact totals.

use std::collections::HashMap;
use std::sync::Arc;

use guardian_core::ImpactStats;

use crate::store::{CompletionRepository, MissionRepository};
use crate::types::Result;

/// Sums the impact of a Guardian's completed missions.
pub struct ImpactCalculator {
    completions: Arc<dyn CompletionRepository>,
    missions: Arc<dyn MissionRepository>,
}

impl ImpactCalculator {
    pub fn new(completions: Arc<dyn CompletionRepository>, missions: Arc<dyn MissionRepository>) -> Self {
        Self { completions, missions }
    }

    /// Completions whose mission no longer resolves count for nothing.
    pub async fn stats(&self, actor_id: &str) -> Result<ImpactStats> {
        let completions = self.completions.completions_by_user(actor_id).await?;

        let mut per_mission: HashMap<&str, u32> = HashMap::new();
        for completion in &completions {
            *per_mission.entry(completion.mission_id.as_str()).or_insert(0) += 1;
        }

        let mut stats = ImpactStats::default();
        for (mission_id, count) in per_mission {
            if let Some(mission) = self.missions.get_mission(mission_id).await? {
                stats.add(mission.impact_type, mission.impact_value * f64::from(count));
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Utc;
    use guardian_core::MissionCompletion;

    fn completion(id: &str, mission: &str) -> MissionCompletion {
        MissionCompletion {
            id: id.to_string(),
            user_id: "u1".to_string(),
            mission_id: mission.to_string(),
            completed_at: Utc::now(),
            xp_earned: 100,
            symbiosis: false,
            proof: None,
        }
    }

    #[tokio::test]
    async fn test_stats() {
        let store = Arc::new(MemoryStore::seeded());
        for (id, mission) in [("c1", "m1"), ("c2", "m2"), ("c3", "m2"), ("c4", "m3"), ("c5", "gone")] {
            store.push_completion(completion(id, mission)).await;
        }
        let calculator = ImpactCalculator::new(store.clone(), store);

        let stats = calculator.stats("u1").await.unwrap();
        assert_eq!(stats.carbon, 2.5);
        assert_eq!(stats.water, 100.0);
        assert_eq!(stats.biodiversity, 5.0);
        assert_eq!(calculator.stats("u2").await.unwrap(), ImpactStats::default());
    }
}
