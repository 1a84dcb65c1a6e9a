//! MissionCompletionProcessor - turns mission and scan events into progression.
//!
//! A completion runs these steps in order:
//!
//! 1. validate the mission and resolve the Guardian's profile
//! 2. persist the completion record
//! 3. `ProfileLedger::add_xp`
//! 4. `CollectiveMissionAggregator::contribute` (when collective goals are wired)
//! 5. `BadgeEvaluator::recheck`
//!
//! A failing step fails the call. When step 3 or 4 fails, the experience
//! already granted is revoked and the completion record is removed, so the
//! Guardian can retry. A failed badge recheck leaves the completion in place;
//! badges are derived from stored progress and the next recheck catches up.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use guardian_core::{
    compute_reward, BioScanResult, Mission, MissionCompletion, RewardContext, RewardPolicy,
    ScanRecord,
};
use spirit_agent::{ImageInput, SpiritOracle};

use crate::aggregator::CollectiveMissionAggregator;
use crate::badges::BadgeEvaluator;
use crate::config::ProgressionConfig;
use crate::ledger::ProfileLedger;
use crate::store::{CompletionRepository, MissionRepository, ScanRepository, SpotRepository, StoreError};
use crate::sync::{completion_key, KeyedLocks};
use crate::types::{
    require_actor, CompletionOutcome, ContributionOutcome, EngineError, Result, ScanOutcome, XpUpdate,
};

/// Collaborators of the processor.
pub struct ProcessorDeps {
    pub missions: Arc<dyn MissionRepository>,
    pub completions: Arc<dyn CompletionRepository>,
    pub scans: Arc<dyn ScanRepository>,
    pub spots: Arc<dyn SpotRepository>,
    pub ledger: Arc<ProfileLedger>,
    pub aggregator: Arc<CollectiveMissionAggregator>,
    pub badges: Arc<BadgeEvaluator>,
    pub oracle: Arc<SpiritOracle>,
    pub locks: Arc<KeyedLocks>,
}

/// Mission completion and scan processing.
pub struct MissionCompletionProcessor {
    deps: ProcessorDeps,
    policy: Arc<dyn RewardPolicy>,
    config: ProgressionConfig,
    collective_enabled: bool,
}

impl MissionCompletionProcessor {
    pub fn new(
        deps: ProcessorDeps,
        policy: Arc<dyn RewardPolicy>,
        config: ProgressionConfig,
        collective_enabled: bool,
    ) -> Self {
        Self {
            deps,
            policy,
            config,
            collective_enabled,
        }
    }

    /// Name of the active reward policy.
    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Reward for `mission` under `context`.
    pub fn reward_for(&self, mission: &Mission, context: &RewardContext) -> u64 {
        compute_reward(self.policy.as_ref(), mission, context)
    }

    pub async fn mission(&self, mission_id: &str) -> Result<Mission> {
        self.deps
            .missions
            .get_mission(mission_id)
            .await?
            .ok_or_else(|| EngineError::not_found("mission", mission_id))
    }

    /// Complete a mission for the bound actor.
    pub async fn complete_mission(
        &self,
        mission_id: &str,
        actor_id: Option<&str>,
        context: &RewardContext,
        proof: Option<serde_json::Value>,
    ) -> Result<CompletionOutcome> {
        let actor_id = require_actor(actor_id)?;
        let mission = self.mission(mission_id).await?;
        validate_mission(&mission)?;
        self.deps.ledger.profile(actor_id).await?;

        let completion = {
            let _guard = self.deps.locks.lock(completion_key(actor_id)).await;

            let unique = !self.config.allow_repeat_completions;
            if unique && self.deps.completions.has_completed(actor_id, mission_id).await? {
                return Err(already_completed(actor_id, mission_id));
            }

            let completion = MissionCompletion {
                id: uuid::Uuid::new_v4().to_string(),
                user_id: actor_id.to_string(),
                mission_id: mission.id.clone(),
                completed_at: Utc::now(),
                xp_earned: self.reward_for(&mission, context),
                symbiosis: context.is_symbiosis,
                proof,
            };

            match self.deps.completions.insert_completion(completion.clone(), unique).await {
                Ok(()) => completion,
                Err(StoreError::Conflict(_)) => return Err(already_completed(actor_id, mission_id)),
                Err(e) => return Err(e.into()),
            }
        };

        info!(
            actor_id = %actor_id,
            mission_id = %mission_id,
            xp_earned = completion.xp_earned,
            symbiosis = completion.symbiosis,
            policy = self.policy.name(),
            "Mission completed"
        );

        let (xp, contribution) = match self.settle(actor_id, &mission, &completion).await {
            Ok(settled) => settled,
            Err(e) => {
                self.withdraw(&completion).await;
                return Err(e);
            }
        };

        let unlocked_badges = self.deps.badges.recheck(actor_id).await?;

        Ok(CompletionOutcome {
            completion,
            xp,
            contribution,
            unlocked_badges,
        })
    }

    /// Identify a species photo, then record it.
    pub async fn record_scan(&self, actor_id: Option<&str>, image: &ImageInput) -> Result<ScanOutcome> {
        let actor_id = require_actor(actor_id)?;
        let result = self.deps.oracle.identify_species(image).await?;
        self.record_scan_result(Some(actor_id), result).await
    }

    /// Record an already classified scan and award the discovery bonus.
    pub async fn record_scan_result(
        &self,
        actor_id: Option<&str>,
        result: BioScanResult,
    ) -> Result<ScanOutcome> {
        let actor_id = require_actor(actor_id)?;

        let scan = ScanRecord::from_result(actor_id, result);
        self.deps.scans.insert_scan(scan.clone()).await?;

        debug!(
            actor_id = %actor_id,
            species = %scan.scientific_name,
            confidence = scan.confidence,
            "Scan recorded"
        );

        let xp = self.deps.ledger.add_xp(actor_id, self.config.scan_bonus_xp).await?;
        let unlocked_badges = self.deps.badges.recheck(actor_id).await?;

        Ok(ScanOutcome {
            scan,
            xp,
            unlocked_badges,
        })
    }

    /// Spot activity, experience and the collective contribution of a stored completion.
    async fn settle(
        &self,
        actor_id: &str,
        mission: &Mission,
        completion: &MissionCompletion,
    ) -> Result<(XpUpdate, Option<ContributionOutcome>)> {
        self.touch_spot(&mission.spot_id, completion.completed_at).await?;

        let xp = self.deps.ledger.add_xp(actor_id, completion.xp_earned).await?;
        if !self.collective_enabled {
            return Ok((xp, None));
        }

        match self
            .deps
            .aggregator
            .contribute(mission.impact_type, mission.impact_value)
            .await
        {
            Ok(contribution) => Ok((xp, Some(contribution))),
            Err(e) => {
                if let Err(revoke) = self.deps.ledger.revoke_xp(actor_id, completion.xp_earned).await {
                    error!(
                        actor_id = %actor_id,
                        amount = completion.xp_earned,
                        error = %revoke,
                        "Experience of a failed completion could not be revoked"
                    );
                }
                Err(e)
            }
        }
    }

    /// Remove a completion whose follow-up steps failed.
    async fn withdraw(&self, completion: &MissionCompletion) {
        match self.deps.completions.remove_completion(&completion.id).await {
            Ok(()) => warn!(
                actor_id = %completion.user_id,
                mission_id = %completion.mission_id,
                "Completion withdrawn after a failed step"
            ),
            Err(e) => error!(
                completion_id = %completion.id,
                error = %e,
                "Failed completion could not be withdrawn"
            ),
        }
    }

    async fn touch_spot(&self, spot_id: &str, at: chrono::DateTime<Utc>) -> Result<()> {
        match self.deps.spots.touch_spot(spot_id, at).await {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound { .. }) => {
                warn!(spot_id = %spot_id, "Mission spot unknown, activity not recorded");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Reject missions whose completion could not be fully applied.
pub(crate) fn validate_mission(mission: &Mission) -> Result<()> {
    if mission.xp_reward == 0 {
        return Err(EngineError::InvalidInput(format!(
            "mission {} has no xp reward",
            mission.id
        )));
    }
    if !mission.impact_value.is_finite() || mission.impact_value <= 0.0 {
        return Err(EngineError::InvalidInput(format!(
            "impact value {} of mission {}",
            mission.impact_value, mission.id
        )));
    }
    Ok(())
}

fn already_completed(actor_id: &str, mission_id: &str) -> EngineError {
    EngineError::AlreadyCompleted {
        actor_id: actor_id.to_string(),
        mission_id: mission_id.to_string(),
    }
}
