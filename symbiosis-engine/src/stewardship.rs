//! SpotStewardship - spot adoption, spirit personalities and echoes.
//!
//! A Guardian of high enough level may adopt one unowned spot and shape how
//! its spirit speaks. Any Guardian may leave an echo at a spot; the spirit
//! retells it before it is stored, and moderation can refuse it.

use std::sync::Arc;
use tracing::{debug, info};

use guardian_core::{can_adopt, Echo, Spot, ADOPTION_MIN_LEVEL, DEFAULT_SPIRIT_PERSONALITY};
use spirit_agent::{EchoOutcome, SpiritContext, SpiritOracle};

use crate::config::StewardshipConfig;
use crate::ledger::ProfileLedger;
use crate::store::{EchoRepository, MissionRepository, SpotRepository};
use crate::types::{require_actor, EngineError, Result};

pub struct SpotStewardship {
    spots: Arc<dyn SpotRepository>,
    echoes: Arc<dyn EchoRepository>,
    missions: Arc<dyn MissionRepository>,
    ledger: Arc<ProfileLedger>,
    oracle: Arc<SpiritOracle>,
    config: StewardshipConfig,
}

impl SpotStewardship {
    pub fn new(
        spots: Arc<dyn SpotRepository>,
        echoes: Arc<dyn EchoRepository>,
        missions: Arc<dyn MissionRepository>,
        ledger: Arc<ProfileLedger>,
        oracle: Arc<SpiritOracle>,
        config: StewardshipConfig,
    ) -> Self {
        Self {
            spots,
            echoes,
            missions,
            ledger,
            oracle,
            config,
        }
    }

    pub async fn spot(&self, spot_id: &str) -> Result<Spot> {
        self.spots
            .get_spot(spot_id)
            .await?
            .ok_or_else(|| EngineError::not_found("spot", spot_id))
    }

    /// Make the actor the spot's protector. The spirit starts with the
    /// default personality.
    pub async fn adopt(&self, actor_id: Option<&str>, spot_id: &str) -> Result<Spot> {
        let actor_id = require_actor(actor_id)?;
        let spot = self.spot(spot_id).await?;
        let profile = self.ledger.profile(actor_id).await?;

        if !can_adopt(profile.level) {
            return Err(EngineError::LevelTooLow {
                required: ADOPTION_MIN_LEVEL,
                level: profile.level,
            });
        }
        if let Some(owner) = &spot.owner_id {
            return Err(EngineError::Conflict(format!(
                "spot {} already protected by {}",
                spot_id, owner
            )));
        }

        // The store re-checks ownership atomically
        let adopted = self
            .spots
            .assign_owner(spot_id, actor_id, &profile.username, DEFAULT_SPIRIT_PERSONALITY)
            .await?;

        info!(actor_id = %actor_id, spot_id = %spot_id, "Spot adopted");
        Ok(adopted)
    }

    /// Owner-only change of the spirit's personality.
    pub async fn update_spirit_personality(
        &self,
        actor_id: Option<&str>,
        spot_id: &str,
        personality: &str,
    ) -> Result<Spot> {
        let actor_id = require_actor(actor_id)?;
        let personality = personality.trim();
        if personality.is_empty() {
            return Err(EngineError::InvalidInput("spirit personality is empty".to_string()));
        }

        let spot = self.spot(spot_id).await?;
        if !spot.is_owned_by(actor_id) {
            return Err(EngineError::NotSpotOwner {
                actor_id: actor_id.to_string(),
                spot_id: spot_id.to_string(),
            });
        }

        let updated = self.spots.set_spirit_personality(spot_id, personality).await?;
        debug!(spot_id = %spot_id, "Spirit personality updated");
        Ok(updated)
    }

    /// Poetize and store a Guardian's message at a spot.
    pub async fn add_echo(&self, actor_id: Option<&str>, spot_id: &str, message: &str) -> Result<Echo> {
        let actor_id = require_actor(actor_id)?;
        let message = message.trim();
        if message.is_empty() {
            return Err(EngineError::InvalidInput("echo is empty".to_string()));
        }

        self.spot(spot_id).await?;
        let author = self.ledger.profile(actor_id).await?;

        let content = match self.oracle.poetize_echo(message).await {
            EchoOutcome::Poetized(text) => text,
            EchoOutcome::Corrupted => return Err(EngineError::EchoRejected),
        };

        let echo = Echo::new(spot_id, &author, content, message);
        self.echoes.insert_echo(echo.clone()).await?;

        debug!(actor_id = %actor_id, spot_id = %spot_id, echo_id = %echo.id, "Echo left");
        Ok(echo)
    }

    /// Echoes of a spot, newest first.
    pub async fn echoes(&self, spot_id: &str) -> Result<Vec<Echo>> {
        Ok(self.echoes.echoes_for_spot(spot_id, self.config.echo_limit).await?)
    }

    /// System instruction for talking with the spot's spirit.
    pub async fn spirit_instruction(&self, spot_id: &str) -> Result<String> {
        let spot = self.spot(spot_id).await?;
        let missions = self.missions.missions_for_spot(spot_id).await?;

        let context = SpiritContext {
            spot_description: format!("{} in territory {}", spot.name, spot.territory_id),
            spot_name: spot.name,
            owner_name: spot.owner_name,
            personality: spot.spirit_personality,
            mission_titles: missions.into_iter().map(|m| m.title).collect(),
        };
        Ok(self.oracle.spirit_instruction(&context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, ProfileRepository};
    use crate::sync::KeyedLocks;
    use guardian_core::Profile;
    use spirit_agent::service::FALLBACK_ECHO;
    use spirit_agent::{LlmBackend, MockBackend, CORRUPTED_SIGNAL};

    fn stewardship(store: Arc<MemoryStore>, oracle: SpiritOracle) -> SpotStewardship {
        let ledger = Arc::new(ProfileLedger::new(store.clone(), Arc::new(KeyedLocks::new())));
        SpotStewardship::new(
            store.clone(),
            store.clone(),
            store,
            ledger,
            Arc::new(oracle),
            StewardshipConfig::default(),
        )
    }

    async fn guardian(store: &MemoryStore, id: &str, xp: u64) {
        store.create_profile(Profile::new(id, id.to_uppercase())).await.unwrap();
        store
            .update_progress(id, xp, guardian_core::level_for_xp(xp))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_adoption_needs_level_ten() {
        let store = Arc::new(MemoryStore::seeded());
        let steward = stewardship(store.clone(), SpiritOracle::offline());
        guardian(&store, "u1", 4_499).await;

        let early = steward.adopt(Some("u1"), "s1").await;
        assert!(matches!(early, Err(EngineError::LevelTooLow { required: 10, level: 9 })));
        assert!(!store.get_spot("s1").await.unwrap().unwrap().is_owned());

        store.update_progress("u1", 4_500, 10).await.unwrap();
        let spot = steward.adopt(Some("u1"), "s1").await.unwrap();
        assert!(spot.is_owned_by("u1"));
        assert_eq!(spot.owner_name.as_deref(), Some("U1"));
        assert_eq!(spot.spirit_personality.as_deref(), Some(DEFAULT_SPIRIT_PERSONALITY));
    }

    #[tokio::test]
    async fn test_owned_spot_cannot_be_adopted_again() {
        let store = Arc::new(MemoryStore::seeded());
        let steward = stewardship(store.clone(), SpiritOracle::offline());
        guardian(&store, "u1", 5_000).await;
        guardian(&store, "u2", 9_000).await;

        steward.adopt(Some("u1"), "s2").await.unwrap();
        assert!(matches!(steward.adopt(Some("u2"), "s2").await, Err(EngineError::Conflict(_))));
        assert!(matches!(steward.adopt(Some("u1"), "s2").await, Err(EngineError::Conflict(_))));
        assert!(matches!(
            steward.adopt(Some("u2"), "s404").await,
            Err(EngineError::NotFound { entity: "spot", .. })
        ));
        assert!(matches!(steward.adopt(None, "s3").await, Err(EngineError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_concurrent_adoption_has_one_winner() {
        let store = Arc::new(MemoryStore::seeded());
        let steward = Arc::new(stewardship(store.clone(), SpiritOracle::offline()));
        for id in ["u1", "u2", "u3", "u4"] {
            guardian(&store, id, 6_000).await;
        }

        let handles: Vec<_> = ["u1", "u2", "u3", "u4"]
            .into_iter()
            .map(|id| {
                let steward = steward.clone();
                tokio::spawn(async move { steward.adopt(Some(id), "s3").await })
            })
            .collect();
        let results = futures::future::join_all(handles).await;

        let winners = results.into_iter().filter(|r| matches!(r, Ok(Ok(_)))).count();
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_only_owner_changes_personality() {
        let store = Arc::new(MemoryStore::seeded());
        let steward = stewardship(store.clone(), SpiritOracle::offline());
        guardian(&store, "u1", 5_000).await;
        guardian(&store, "u2", 0).await;
        steward.adopt(Some("u1"), "s1").await.unwrap();

        let denied = steward.update_spirit_personality(Some("u2"), "s1", "Grumpy.").await;
        assert!(matches!(denied, Err(EngineError::NotSpotOwner { .. })));
        assert!(matches!(
            steward.update_spirit_personality(Some("u1"), "s1", "   ").await,
            Err(EngineError::InvalidInput(_))
        ));
        // Unowned spots have no one allowed to change them
        assert!(matches!(
            steward.update_spirit_personality(Some("u1"), "s2", "Calm.").await,
            Err(EngineError::NotSpotOwner { .. })
        ));

        let spot = steward
            .update_spirit_personality(Some("u1"), "s1", " Playful and wise. ")
            .await
            .unwrap();
        assert_eq!(spot.spirit_personality.as_deref(), Some("Playful and wise."));

        let instruction = steward.spirit_instruction("s1").await.unwrap();
        assert!(instruction.contains("Playful and wise."));
        assert!(instruction.contains("Your appointed Protector is U1."));
        assert!(instruction.contains("Growth Measurement"));
    }

    #[tokio::test]
    async fn test_add_echo_keeps_both_texts() {
        let backend: Arc<dyn LlmBackend> =
            Arc::new(MockBackend::new("mock").with_response("The spring remembers your laughter."));
        let store = Arc::new(MemoryStore::seeded());
        let steward = stewardship(store.clone(), SpiritOracle::new(vec![backend]));
        guardian(&store, "u1", 0).await;

        let echo = steward.add_echo(Some("u1"), "s1", "  loved it here  ").await.unwrap();
        assert_eq!(echo.content, "The spring remembers your laughter.");
        assert_eq!(echo.original_content, "loved it here");
        assert_eq!(echo.username, "U1");

        let echoes = steward.echoes("s1").await.unwrap();
        assert_eq!(echoes.len(), 2);
        assert_eq!(echoes[0].id, echo.id);
        assert!(steward.echoes("s2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_echo_offline_uses_fallback() {
        let store = Arc::new(MemoryStore::seeded());
        let steward = stewardship(store.clone(), SpiritOracle::offline());
        guardian(&store, "u1", 0).await;

        let echo = steward.add_echo(Some("u1"), "s2", "hello").await.unwrap();
        assert_eq!(echo.content, FALLBACK_ECHO);
        assert_eq!(echo.original_content, "hello");
    }

    #[tokio::test]
    async fn test_corrupted_echo_not_stored() {
        let backend: Arc<dyn LlmBackend> = Arc::new(MockBackend::new("mock").with_response(CORRUPTED_SIGNAL));
        let store = Arc::new(MemoryStore::seeded());
        let steward = stewardship(store.clone(), SpiritOracle::new(vec![backend]));
        guardian(&store, "u1", 0).await;

        let result = steward.add_echo(Some("u1"), "s2", "something hateful").await;
        assert!(matches!(result, Err(EngineError::EchoRejected)));
        assert!(steward.echoes("s2").await.unwrap().is_empty());

        assert!(matches!(
            steward.add_echo(Some("u1"), "s2", "  ").await,
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            steward.add_echo(Some("u1"), "s404", "hi").await,
            Err(EngineError::NotFound { entity: "spot", .. })
        ));
    }
}
