//! ProfileLedger - owns a Guardian's experience and level.

use std::sync::Arc;
use tracing::{debug, info};

use guardian_core::progression::{level_for_xp, level_progress_percent, xp_to_next_level};
use guardian_core::Profile;

use crate::store::ProfileRepository;
use crate::sync::{profile_key, KeyedLocks};
use crate::types::{EngineError, LevelProgress, Result, XpUpdate};

/// Experience and level bookkeeping.
pub struct ProfileLedger {
    profiles: Arc<dyn ProfileRepository>,
    locks: Arc<KeyedLocks>,
}

impl ProfileLedger {
    pub fn new(profiles: Arc<dyn ProfileRepository>, locks: Arc<KeyedLocks>) -> Self {
        Self { profiles, locks }
    }

    /// Create the profile at first sign-in, or return the existing one.
    pub async fn ensure_profile(&self, id: &str, username: &str) -> Result<Profile> {
        if let Some(profile) = self.profiles.get_profile(id).await? {
            return Ok(profile);
        }
        let profile = self.profiles.create_profile(Profile::new(id, username)).await?;
        info!(profile_id = %id, username = %profile.username, "Guardian profile created");
        Ok(profile)
    }

    pub async fn profile(&self, id: &str) -> Result<Profile> {
        self.profiles
            .get_profile(id)
            .await?
            .ok_or_else(|| EngineError::not_found("profile", id))
    }

    /// Add experience and recompute the level in one write.
    pub async fn add_xp(&self, profile_id: &str, amount: u64) -> Result<XpUpdate> {
        let update = self.write_xp(profile_id, |xp| xp.saturating_add(amount)).await?;

        if update.leveled_up() {
            info!(profile_id = %profile_id, level = update.level, "Guardian reached a new level");
        } else {
            debug!(profile_id = %profile_id, amount, xp = update.xp, "Experience added");
        }

        Ok(update)
    }

    /// Take back experience granted by a completion that did not go through.
    /// Never drops below zero.
    pub async fn revoke_xp(&self, profile_id: &str, amount: u64) -> Result<XpUpdate> {
        let update = self.write_xp(profile_id, |xp| xp.saturating_sub(amount)).await?;
        info!(profile_id = %profile_id, amount, xp = update.xp, "Experience revoked");
        Ok(update)
    }

    async fn write_xp(&self, profile_id: &str, apply: impl FnOnce(u64) -> u64) -> Result<XpUpdate> {
        let _guard = self.locks.lock(profile_key(profile_id)).await;

        let profile = self.profile(profile_id).await?;
        let xp = apply(profile.xp);
        let level = level_for_xp(xp);

        self.profiles.update_progress(profile_id, xp, level).await?;

        Ok(XpUpdate {
            profile_id: profile_id.to_string(),
            previous_xp: profile.xp,
            xp,
            previous_level: profile.level,
            level,
        })
    }

    pub async fn level_progress(&self, profile_id: &str) -> Result<LevelProgress> {
        let profile = self.profile(profile_id).await?;
        Ok(LevelProgress {
            level: level_for_xp(profile.xp),
            xp: profile.xp,
            percent: level_progress_percent(profile.xp),
            xp_to_next_level: xp_to_next_level(profile.xp),
        })
    }
}
