//! CollectiveMissionAggregator - accumulates contributions toward territory goals.
//!
//! Contributions of one impact type are applied one at a time. A goal is
//! selected as the first open collective mission of that impact type in stored
//! order; once reached it is closed for good and later contributions move on
//! to the next open goal or are dropped.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use guardian_core::{Chronicle, CollectiveMission, ImpactType};
use spirit_agent::SpiritOracle;

use crate::store::{ChronicleRepository, CollectiveRepository};
use crate::sync::{collective_key, KeyedLocks};
use crate::types::{ContributionOutcome, EngineError, Result};

/// Territory-wide goal accumulator.
pub struct CollectiveMissionAggregator {
    collectives: Arc<dyn CollectiveRepository>,
    chronicles: Arc<dyn ChronicleRepository>,
    oracle: Arc<SpiritOracle>,
    locks: Arc<KeyedLocks>,
}

impl CollectiveMissionAggregator {
    pub fn new(
        collectives: Arc<dyn CollectiveRepository>,
        chronicles: Arc<dyn ChronicleRepository>,
        oracle: Arc<SpiritOracle>,
        locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            collectives,
            chronicles,
            oracle,
            locks,
        }
    }

    /// Add `delta` to the first open goal of `impact_type`.
    pub async fn contribute(&self, impact_type: ImpactType, delta: f64) -> Result<ContributionOutcome> {
        if !delta.is_finite() || delta <= 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "contribution must be positive, got {}",
                delta
            )));
        }

        let _guard = self.locks.lock(collective_key(impact_type)).await;

        let target = self
            .collectives
            .list_collective()
            .await?
            .into_iter()
            .find(|m| !m.is_completed && m.impact_type == impact_type);

        let Some(mut mission) = target else {
            debug!(impact = impact_type.as_str(), delta, "No open collective goal, contribution dropped");
            return Ok(ContributionOutcome::Dropped);
        };

        let previous_value = mission.current_value;
        mission.current_value += delta;
        let completed_now = mission.current_value >= mission.goal_value;
        if completed_now {
            mission.is_completed = true;
        }

        let mission_id = mission.id.clone();
        let current_value = mission.current_value;
        self.collectives.save_collective(mission).await?;

        if completed_now {
            info!(
                mission_id = %mission_id,
                current_value,
                "Collective goal reached"
            );
        } else {
            debug!(mission_id = %mission_id, previous_value, current_value, "Contribution applied");
        }

        Ok(ContributionOutcome::Applied {
            mission_id,
            previous_value,
            current_value,
            completed_now,
        })
    }

    pub async fn mission(&self, id: &str) -> Result<CollectiveMission> {
        self.collectives
            .get_collective(id)
            .await?
            .ok_or_else(|| EngineError::not_found("collective mission", id))
    }

    /// Collective missions still accepting contributions.
    pub async fn open_missions(&self) -> Result<Vec<CollectiveMission>> {
        Ok(self
            .collectives
            .list_collective()
            .await?
            .into_iter()
            .filter(|m| !m.is_completed)
            .collect())
    }

    /// Attach the victory narrative of a completed goal and record its chronicle.
    ///
    /// Without a `narrative` the oracle writes one; if it cannot, a canned
    /// line is used. Fails with `NotCompleted` before the goal is reached and
    /// with `AlreadyFinalized` once a narrative exists.
    pub async fn finalize_victory(&self, mission_id: &str, narrative: Option<String>) -> Result<Chronicle> {
        let mission = self.mission(mission_id).await?;
        Self::check_finalizable(&mission)?;

        let narrative = match narrative {
            Some(text) if !text.trim().is_empty() => text,
            _ => {
                self.oracle
                    .narrate_victory(&mission.title, mission.goal_value, &mission.unit)
                    .await
            }
        };

        let _guard = self.locks.lock(collective_key(mission.impact_type)).await;

        // Re-read under the lock: another caller may have finalized meanwhile.
        let mut mission = self.mission(mission_id).await?;
        Self::check_finalizable(&mission)?;

        mission.victory_chronicle = Some(narrative.clone());
        let title = format!("Victory: {}", mission.title);
        self.collectives.save_collective(mission).await?;

        let chronicle = Chronicle {
            collective_mission_id: Some(mission_id.to_string()),
            created_at: Utc::now(),
            ..Chronicle::new(title, narrative)
        };
        if let Err(e) = self.chronicles.insert_chronicle(chronicle.clone()).await {
            warn!(mission_id = %mission_id, error = %e, "Victory narrative saved but chronicle write failed");
            return Err(e.into());
        }

        info!(mission_id = %mission_id, chronicle_id = %chronicle.id, "Victory finalized");
        Ok(chronicle)
    }

    fn check_finalizable(mission: &CollectiveMission) -> Result<()> {
        if !mission.is_completed {
            return Err(EngineError::NotCompleted(mission.id.clone()));
        }
        if mission.victory_chronicle.is_some() {
            return Err(EngineError::AlreadyFinalized(mission.id.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use guardian_core::CollectiveCategory;
    use spirit_agent::service::FALLBACK_VICTORY;
    use spirit_agent::MockBackend;

    fn aggregator(store: Arc<MemoryStore>, oracle: SpiritOracle) -> CollectiveMissionAggregator {
        CollectiveMissionAggregator::new(
            store.clone(),
            store,
            Arc::new(oracle),
            Arc::new(KeyedLocks::new()),
        )
    }

    fn water_goal(id: &str, goal: f64, current: f64) -> CollectiveMission {
        CollectiveMission {
            id: id.to_string(),
            title: format!("Goal {}", id),
            description: String::new(),
            goal_value: goal,
            current_value: current,
            unit: "Litres".to_string(),
            impact_type: ImpactType::Water,
            is_completed: false,
            victory_chronicle: None,
            category: CollectiveCategory::Standard,
        }
    }

    #[tokio::test]
    async fn test_contribute_reaches_goal_once() {
        let store = Arc::new(MemoryStore::seeded());
        let agg = aggregator(store, SpiritOracle::offline());

        let outcome = agg.contribute(ImpactType::Water, 400.0).await.unwrap();
        assert_eq!(
            outcome,
            ContributionOutcome::Applied {
                mission_id: "cm1".to_string(),
                previous_value: 650.0,
                current_value: 1050.0,
                completed_now: true,
            }
        );

        let after = agg.contribute(ImpactType::Water, 50.0).await.unwrap();
        assert_eq!(after, ContributionOutcome::Dropped);

        let mission = agg.mission("cm1").await.unwrap();
        assert_eq!(mission.current_value, 1050.0);
        assert!(mission.is_completed);
    }

    #[tokio::test]
    async fn test_first_open_goal_wins() {
        let store = Arc::new(MemoryStore::seeded());
        store.add_collective(water_goal("cm2", 100.0, 0.0)).await;
        let agg = aggregator(store, SpiritOracle::offline());

        let outcome = agg.contribute(ImpactType::Water, 10.0).await.unwrap();
        assert!(matches!(outcome, ContributionOutcome::Applied { ref mission_id, .. } if mission_id == "cm1"));

        agg.contribute(ImpactType::Water, 400.0).await.unwrap();
        let next = agg.contribute(ImpactType::Water, 10.0).await.unwrap();
        assert!(matches!(next, ContributionOutcome::Applied { ref mission_id, .. } if mission_id == "cm2"));
    }

    #[tokio::test]
    async fn test_unmatched_impact_dropped() {
        let store = Arc::new(MemoryStore::seeded());
        let agg = aggregator(store, SpiritOracle::offline());
        let outcome = agg.contribute(ImpactType::Carbon, 2.5).await.unwrap();
        assert_eq!(outcome, ContributionOutcome::Dropped);
    }

    #[tokio::test]
    async fn test_rejects_non_positive_delta() {
        let store = Arc::new(MemoryStore::seeded());
        let agg = aggregator(store, SpiritOracle::offline());
        for delta in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let result = agg.contribute(ImpactType::Water, delta).await;
            assert!(matches!(result, Err(EngineError::InvalidInput(_))));
        }
        assert_eq!(agg.mission("cm1").await.unwrap().current_value, 650.0);
    }

    #[tokio::test]
    async fn test_concurrent_contributions_not_lost() {
        let store = Arc::new(MemoryStore::new());
        store.add_collective(water_goal("cm9", 1_000_000.0, 0.0)).await;
        let agg = Arc::new(aggregator(store, SpiritOracle::offline()));

        let mut handles = Vec::new();
        for _ in 0..25 {
            let agg = agg.clone();
            handles.push(tokio::spawn(async move { agg.contribute(ImpactType::Water, 4.0).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(agg.mission("cm9").await.unwrap().current_value, 100.0);
    }

    #[tokio::test]
    async fn test_finalize_victory_lifecycle() {
        let store = Arc::new(MemoryStore::seeded());
        let backend = Arc::new(MockBackend::default().with_response("The waters sing again."));
        let agg = aggregator(store.clone(), SpiritOracle::new(vec![backend]));

        let early = agg.finalize_victory("cm1", None).await;
        assert!(matches!(early, Err(EngineError::NotCompleted(_))));

        agg.contribute(ImpactType::Water, 350.0).await.unwrap();
        let chronicle = agg.finalize_victory("cm1", None).await.unwrap();
        assert_eq!(chronicle.content, "The waters sing again.");
        assert_eq!(chronicle.collective_mission_id.as_deref(), Some("cm1"));

        let again = agg.finalize_victory("cm1", Some("Twice".to_string())).await;
        assert!(matches!(again, Err(EngineError::AlreadyFinalized(_))));

        let mission = agg.mission("cm1").await.unwrap();
        assert_eq!(mission.victory_chronicle.as_deref(), Some("The waters sing again."));
        assert_eq!(store.recent_chronicles(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_finalize_victory_fallback_and_not_found() {
        let store = Arc::new(MemoryStore::seeded());
        let agg = aggregator(store, SpiritOracle::offline());

        assert!(matches!(
            agg.finalize_victory("nope", None).await,
            Err(EngineError::NotFound { .. })
        ));

        agg.contribute(ImpactType::Water, 500.0).await.unwrap();
        let chronicle = agg.finalize_victory("cm1", None).await.unwrap();
        assert_eq!(chronicle.content, FALLBACK_VICTORY);
    }
}
