//! SymbiosisEngine - facade over the engine components.
//!
//! Wires the components to one set of repositories, one oracle and one lock
//! table, and binds the Guardian of the current session. Every mutating call
//! resolves the bound Guardian first.

use chrono::{Local, Timelike};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use guardian_core::reward::is_within_window;
use guardian_core::{
    ActivityType, AlertState, Badge, BioScanResult, Chronicle, CollectiveMission, ConnectivityGraph,
    Echo, FeedItem, ImpactStats, ImpactType, Mission, Profile, RewardContext, RewardPolicy, Spot,
    WeatherType,
};
use spirit_agent::{ImageInput, SpiritOracle};

use crate::aggregator::CollectiveMissionAggregator;
use crate::badges::BadgeEvaluator;
use crate::config::{EngineConfig, RewardPolicyKind};
use crate::connectivity::SpatialConnectivityGrapher;
use crate::feed::SymbiosisFeedMerger;
use crate::impact::ImpactCalculator;
use crate::ledger::ProfileLedger;
use crate::polling::PollingTask;
use crate::processor::{validate_mission, MissionCompletionProcessor, ProcessorDeps};
use crate::realtime::{FeedStore, RealtimeDispatcher};
use crate::stewardship::SpotStewardship;
use crate::store::{
    BadgeRepository, ChronicleRepository, CollectiveRepository, CompletionRepository, EchoRepository,
    MissionRepository, ProfileRepository, Repositories, ResonanceRepository, ScanRepository,
    SpotRepository, TerritoryRepository,
};
use crate::sync::KeyedLocks;
use crate::territory::{TerritoryStabilityMonitor, TerritoryWatch};
use crate::types::{
    require_actor, CompletionOutcome, ContributionOutcome, EngineError, LevelProgress, Result,
    ScanOutcome, StabilityAlert, TerritorySnapshot,
};

/// The progression and symbiosis engine.
pub struct SymbiosisEngine {
    /// Configuration
    config: EngineConfig,
    /// Persistence collaborator
    repositories: Repositories,
    /// Generative-content collaborator
    oracle: Arc<SpiritOracle>,
    /// Guardian bound to this session
    session: RwLock<Option<String>>,
    ledger: Arc<ProfileLedger>,
    aggregator: Arc<CollectiveMissionAggregator>,
    badges: Arc<BadgeEvaluator>,
    processor: MissionCompletionProcessor,
    feed: Arc<SymbiosisFeedMerger>,
    feed_store: Arc<FeedStore>,
    territory: Arc<TerritoryStabilityMonitor>,
    connectivity: SpatialConnectivityGrapher,
    impact: ImpactCalculator,
    stewardship: SpotStewardship,
}

impl SymbiosisEngine {
    /// Start building an engine.
    pub fn builder() -> SymbiosisEngineBuilder {
        SymbiosisEngineBuilder::new()
    }

    fn assemble(
        config: EngineConfig,
        repositories: Repositories,
        oracle: Arc<SpiritOracle>,
        policy: Arc<dyn RewardPolicy>,
    ) -> Self {
        let locks = Arc::new(KeyedLocks::new());

        let ledger = Arc::new(ProfileLedger::new(repositories.profiles.clone(), locks.clone()));
        let aggregator = Arc::new(CollectiveMissionAggregator::new(
            repositories.collectives.clone(),
            repositories.chronicles.clone(),
            oracle.clone(),
            locks.clone(),
        ));
        let badges = Arc::new(BadgeEvaluator::new(
            repositories.badges.clone(),
            repositories.completions.clone(),
            repositories.missions.clone(),
            repositories.profiles.clone(),
            locks.clone(),
        ));
        let processor = MissionCompletionProcessor::new(
            ProcessorDeps {
                missions: repositories.missions.clone(),
                completions: repositories.completions.clone(),
                scans: repositories.scans.clone(),
                spots: repositories.spots.clone(),
                ledger: ledger.clone(),
                aggregator: aggregator.clone(),
                badges: badges.clone(),
                oracle: oracle.clone(),
                locks,
            },
            policy,
            config.progression.clone(),
            config.collective.enabled,
        );
        let feed = Arc::new(SymbiosisFeedMerger::new(
            repositories.completions.clone(),
            repositories.scans.clone(),
            repositories.missions.clone(),
            repositories.profiles.clone(),
            repositories.resonances.clone(),
            config.feed.clone(),
        ));
        let territory = Arc::new(TerritoryStabilityMonitor::new(
            repositories.territories.clone(),
            config.territory.clone(),
        ));
        let connectivity =
            SpatialConnectivityGrapher::new(repositories.spots.clone(), config.connectivity.clone());
        let impact = ImpactCalculator::new(repositories.completions.clone(), repositories.missions.clone());
        let stewardship = SpotStewardship::new(
            repositories.spots.clone(),
            repositories.echoes.clone(),
            repositories.missions.clone(),
            ledger.clone(),
            oracle.clone(),
            config.stewardship.clone(),
        );

        info!(
            policy = processor.policy_name(),
            collective = config.collective.enabled,
            repeat_completions = config.progression.allow_repeat_completions,
            "SymbiosisEngine assembled"
        );

        Self {
            config,
            repositories,
            oracle,
            session: RwLock::new(None),
            ledger,
            aggregator,
            badges,
            processor,
            feed,
            feed_store: Arc::new(FeedStore::new()),
            territory,
            connectivity,
            impact,
            stewardship,
        }
    }

    // ===== Session =====

    /// Bind a Guardian to the session, creating the profile on first sign-in.
    pub async fn sign_in(&self, actor_id: &str, username: &str) -> Result<Profile> {
        let actor_id = require_actor(Some(actor_id))?;
        let profile = self.ledger.ensure_profile(actor_id, username).await?;
        *self.session.write().await = Some(profile.id.clone());
        info!(actor_id = %profile.id, level = profile.level, "Guardian signed in");
        Ok(profile)
    }

    pub async fn sign_out(&self) {
        if let Some(actor_id) = self.session.write().await.take() {
            info!(actor_id = %actor_id, "Guardian signed out");
        }
    }

    /// Guardian bound to the session, if any.
    pub async fn current_actor(&self) -> Option<String> {
        self.session.read().await.clone()
    }

    pub async fn profile(&self) -> Result<Profile> {
        let actor = self.actor().await?;
        self.ledger.profile(&actor).await
    }

    async fn actor(&self) -> Result<String> {
        let actor = self.current_actor().await;
        require_actor(actor.as_deref()).map(str::to_string)
    }

    // ===== Progression =====

    /// Complete a mission for the bound Guardian.
    pub async fn complete_mission(
        &self,
        mission_id: &str,
        context: &RewardContext,
        proof: Option<serde_json::Value>,
    ) -> Result<CompletionOutcome> {
        let actor = self.current_actor().await;
        self.processor
            .complete_mission(mission_id, actor.as_deref(), context, proof)
            .await
    }

    /// Complete a mission with the reward context taken from the local clock.
    pub async fn complete_mission_now(
        &self,
        mission_id: &str,
        is_symbiosis: bool,
        weather: Option<WeatherType>,
    ) -> Result<CompletionOutcome> {
        let context = self.context_at_hour(Local::now().hour(), is_symbiosis, weather);
        self.complete_mission(mission_id, &context, None).await
    }

    /// Reward context for a local clock hour under the configured night window.
    pub fn context_at_hour(&self, hour: u32, is_symbiosis: bool, weather: Option<WeatherType>) -> RewardContext {
        let reward = &self.config.reward;
        RewardContext {
            is_symbiosis,
            is_night_hour: is_within_window(hour, reward.night_start_hour, reward.night_end_hour),
            weather,
        }
    }

    /// Reward a mission would earn under `context`, without completing it.
    pub async fn preview_reward(&self, mission_id: &str, context: &RewardContext) -> Result<u64> {
        let mission = self.processor.mission(mission_id).await?;
        Ok(self.processor.reward_for(&mission, context))
    }

    pub async fn record_scan(&self, image: &ImageInput) -> Result<ScanOutcome> {
        let actor = self.current_actor().await;
        self.processor.record_scan(actor.as_deref(), image).await
    }

    pub async fn record_scan_result(&self, result: BioScanResult) -> Result<ScanOutcome> {
        let actor = self.current_actor().await;
        self.processor.record_scan_result(actor.as_deref(), result).await
    }

    pub async fn level_progress(&self) -> Result<LevelProgress> {
        let actor = self.actor().await?;
        self.ledger.level_progress(&actor).await
    }

    /// Make a generated mission available like any seeded one.
    pub async fn insert_mission(&self, mission: Mission) -> Result<()> {
        if mission.id.trim().is_empty() {
            return Err(EngineError::InvalidInput("mission id is empty".to_string()));
        }
        validate_mission(&mission)?;
        debug!(mission_id = %mission.id, spot_id = %mission.spot_id, "Inserting mission");
        self.repositories.missions.insert_mission(mission).await?;
        Ok(())
    }

    // ===== Collective goals =====

    /// Contribute impact directly to the collective goals.
    pub async fn contribute(&self, impact_type: ImpactType, delta: f64) -> Result<ContributionOutcome> {
        self.actor().await?;
        self.aggregator.contribute(impact_type, delta).await
    }

    pub async fn collective_mission(&self, id: &str) -> Result<CollectiveMission> {
        self.aggregator.mission(id).await
    }

    pub async fn open_collective_missions(&self) -> Result<Vec<CollectiveMission>> {
        self.aggregator.open_missions().await
    }

    /// Attach the victory chronicle to a completed collective mission.
    pub async fn finalize_victory(&self, mission_id: &str, narrative: Option<String>) -> Result<Chronicle> {
        self.aggregator.finalize_victory(mission_id, narrative).await
    }

    // ===== Badges =====

    /// Unlock every badge the bound Guardian now qualifies for.
    pub async fn recheck_badges(&self) -> Result<Vec<Badge>> {
        let actor = self.actor().await?;
        self.badges.recheck(&actor).await
    }

    pub async fn owned_badges(&self) -> Result<Vec<Badge>> {
        let actor = self.actor().await?;
        self.badges.owned(&actor).await
    }

    // ===== Feed =====

    pub async fn get_feed(&self) -> Result<Vec<FeedItem>> {
        self.feed.get_feed().await
    }

    /// Resonate with a feed item. `false` if the Guardian already did.
    pub async fn resonate(&self, activity_type: ActivityType, activity_id: &str) -> Result<bool> {
        let actor = self.current_actor().await;
        self.feed.resonate(actor.as_deref(), activity_type, activity_id).await
    }

    /// Canonical feed state shared with views.
    pub fn feed_store(&self) -> Arc<FeedStore> {
        self.feed_store.clone()
    }

    /// Dispatcher refreshing the feed store from realtime events.
    pub fn realtime_dispatcher(&self) -> RealtimeDispatcher {
        RealtimeDispatcher::new(self.feed.clone(), self.feed_store.clone())
    }

    /// Refresh the feed store on the configured interval.
    pub fn start_feed_polling(&self) -> PollingTask {
        let dispatcher = self.realtime_dispatcher();
        PollingTask::start("feed-refresh", self.config.feed.poll_interval(), move || {
            let dispatcher = dispatcher.clone();
            async move {
                if let Err(e) = dispatcher.refresh().await {
                    warn!(error = %e, "Periodic feed refresh failed");
                }
            }
        })
    }

    // ===== Territory =====

    pub fn classify(&self, stability_score: f64) -> AlertState {
        self.territory.classify(stability_score)
    }

    pub async fn territory_snapshot(&self, territory_id: &str) -> Result<TerritorySnapshot> {
        self.territory.snapshot(territory_id).await
    }

    /// Watch a territory, sending alerts until the returned watch is stopped.
    pub fn start_territory_watch(&self, territory_id: &str, alerts: mpsc::Sender<StabilityAlert>) -> TerritoryWatch {
        self.territory.watch(territory_id, alerts)
    }

    pub async fn connectivity(&self, territory_id: Option<&str>) -> Result<ConnectivityGraph> {
        self.connectivity.graph(territory_id).await
    }

    // ===== Spots =====

    pub async fn spot(&self, spot_id: &str) -> Result<Spot> {
        self.stewardship.spot(spot_id).await
    }

    /// Adopt a spot for the bound Guardian. Needs level 10 and an unowned spot.
    pub async fn adopt_spot(&self, spot_id: &str) -> Result<Spot> {
        let actor = self.current_actor().await;
        self.stewardship.adopt(actor.as_deref(), spot_id).await
    }

    /// Change the spirit personality of a spot the bound Guardian owns.
    pub async fn update_spirit_personality(&self, spot_id: &str, personality: &str) -> Result<Spot> {
        let actor = self.current_actor().await;
        self.stewardship
            .update_spirit_personality(actor.as_deref(), spot_id, personality)
            .await
    }

    /// Leave an echo at a spot. The stored content is the spirit's retelling.
    pub async fn add_echo(&self, spot_id: &str, message: &str) -> Result<Echo> {
        let actor = self.current_actor().await;
        self.stewardship.add_echo(actor.as_deref(), spot_id, message).await
    }

    /// Echoes left at a spot, newest first.
    pub async fn echoes(&self, spot_id: &str) -> Result<Vec<Echo>> {
        self.stewardship.echoes(spot_id).await
    }

    pub async fn spirit_instruction(&self, spot_id: &str) -> Result<String> {
        self.stewardship.spirit_instruction(spot_id).await
    }

    // ===== Impact and narrative =====

    pub async fn impact_stats(&self) -> Result<ImpactStats> {
        let actor = self.actor().await?;
        self.impact.stats(&actor).await
    }

    /// Oracle summary of the bound Guardian's progress.
    pub async fn guardian_report(&self) -> Result<String> {
        let profile = self.profile().await?;
        let impact = self.impact.stats(&profile.id).await?;
        Ok(self
            .oracle
            .guardian_report(&profile.username, profile.level, &impact)
            .await)
    }

    pub fn oracle(&self) -> &Arc<SpiritOracle> {
        &self.oracle
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Name of the active reward policy.
    pub fn reward_policy(&self) -> &'static str {
        self.processor.policy_name()
    }
}

/// Builder for SymbiosisEngine.
pub struct SymbiosisEngineBuilder {
    config: EngineConfig,
    repositories: Option<Repositories>,
    oracle: Option<Arc<SpiritOracle>>,
    policy: Option<Arc<dyn RewardPolicy>>,
}

impl SymbiosisEngineBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            repositories: None,
            oracle: None,
            policy: None,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_repositories(mut self, repositories: Repositories) -> Self {
        self.repositories = Some(repositories);
        self
    }

    /// Use one backing store for every repository.
    pub fn with_store<S>(self, store: Arc<S>) -> Self
    where
        S: ProfileRepository
            + MissionRepository
            + CompletionRepository
            + CollectiveRepository
            + BadgeRepository
            + TerritoryRepository
            + SpotRepository
            + ScanRepository
            + ResonanceRepository
            + ChronicleRepository
            + EchoRepository
            + 'static,
    {
        self.with_repositories(Repositories::from_store(store))
    }

    /// Set the oracle. Defaults to an offline oracle.
    pub fn with_oracle(mut self, oracle: Arc<SpiritOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Use a custom reward policy instead of the configured one.
    pub fn reward_policy(mut self, policy: Arc<dyn RewardPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn reward_policy_kind(mut self, kind: RewardPolicyKind) -> Self {
        self.config.reward.policy = kind;
        self
    }

    pub fn allow_repeat_completions(mut self, allow: bool) -> Self {
        self.config.progression.allow_repeat_completions = allow;
        self
    }

    /// Enable/disable the collective goal wiring.
    pub fn collective_enabled(mut self, enabled: bool) -> Self {
        self.config.collective.enabled = enabled;
        self
    }

    /// Build the engine.
    pub fn build(self) -> Result<SymbiosisEngine> {
        validate(&self.config)?;
        let repositories = self
            .repositories
            .ok_or_else(|| EngineError::Config("no repositories configured".to_string()))?;
        let oracle = self.oracle.unwrap_or_else(|| Arc::new(SpiritOracle::offline()));
        let policy = self.policy.unwrap_or_else(|| self.config.reward.build_policy());
        Ok(SymbiosisEngine::assemble(self.config, repositories, oracle, policy))
    }
}

impl Default for SymbiosisEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn validate(config: &EngineConfig) -> Result<()> {
    let reward = &config.reward;
    if reward.night_start_hour > 23 || reward.night_end_hour > 23 {
        return Err(EngineError::Config(format!(
            "night window {}..{} is not on a 24h clock",
            reward.night_start_hour, reward.night_end_hour
        )));
    }
    let multipliers = [
        reward.symbiosis_multiplier,
        reward.night_multiplier,
        reward.weather_exact_multiplier,
        reward.weather_soft_multiplier,
    ];
    if multipliers.iter().any(|m| !m.is_finite() || *m < 0.0) {
        return Err(EngineError::Config("reward multipliers must be finite and non-negative".to_string()));
    }
    if !config.territory.critical_threshold.is_finite() {
        return Err(EngineError::Config("critical threshold must be finite".to_string()));
    }
    if config.connectivity.activity_window_ms <= 0 {
        return Err(EngineError::Config("activity window must be positive".to_string()));
    }
    if config.feed.per_source_limit == 0 {
        return Err(EngineError::Config("feed per_source_limit must be at least 1".to_string()));
    }
    Ok(())
}
