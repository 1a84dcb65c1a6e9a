//! symbiosis-sim - runs a short Guardian session against the seeded territory.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use guardian_core::{ActivityType, ImpactType, WeatherType};
use spirit_agent::{ImageInput, LlmBackend, MockBackend, OpenAiBackend, SpiritOracle, VisionBackend};
use symbiosis_engine::config::RewardPolicyKind;
use symbiosis_engine::{EngineConfig, MemoryStore, RealtimeDispatcher, SymbiosisEngine};

#[derive(Parser, Debug)]
#[command(author, version, about = "Living Territory progression simulator", long_about = None)]
struct Cli {
    /// YAML engine configuration.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Territory to report on.
    #[arg(long, default_value = "t1")]
    territory: String,
    /// Reward policy, overriding the configuration.
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,
    /// Guardian id to sign in as.
    #[arg(long, default_value = "guardian-1")]
    user: String,
    /// Guardian display name.
    #[arg(long, default_value = "Sylva")]
    name: String,
    /// Local hour used for the reward context.
    #[arg(long, default_value_t = 22)]
    hour: u32,
    /// OpenAI-compatible endpoint for narrative text. Falls back to a mock.
    #[arg(long)]
    llm_url: Option<String>,
    #[arg(long, default_value = "llama3.2")]
    llm_model: String,
    /// Debug logging.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyArg {
    NightSymbiosis,
    WeatherAffinity,
}

impl From<PolicyArg> for RewardPolicyKind {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::NightSymbiosis => RewardPolicyKind::NightSymbiosis,
            PolicyArg::WeatherAffinity => RewardPolicyKind::WeatherAffinity,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            let yaml = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            EngineConfig::from_yaml(&yaml).with_context(|| format!("parsing config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    if let Some(policy) = cli.policy {
        config.reward.policy = policy.into();
    }

    let level = if cli.verbose { "debug" } else { config.general.log_level.as_str() };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .compact()
        .init();

    info!("symbiosis-sim v{} starting", env!("CARGO_PKG_VERSION"));

    let (events_tx, events_rx) = RealtimeDispatcher::channel(64);
    let store = Arc::new(MemoryStore::seeded().with_events(events_tx));

    let mock = Arc::new(MockBackend::new("sim").with_response(
        "Fifty Guardians carried water back to the spring, and the spring remembered.",
    ));
    let mut text_backends: Vec<Arc<dyn LlmBackend>> = Vec::new();
    if let Some(url) = &cli.llm_url {
        text_backends.push(Arc::new(OpenAiBackend::new(url.clone(), cli.llm_model.clone(), None)));
    }
    text_backends.push(mock.clone());
    let vision: Vec<Arc<dyn VisionBackend>> = vec![mock];
    let oracle = Arc::new(SpiritOracle::new(text_backends).with_vision(vision));

    let engine = SymbiosisEngine::builder()
        .with_config(config)
        .with_store(store)
        .with_oracle(oracle)
        .build()?;

    let dispatcher = engine.realtime_dispatcher().spawn(events_rx);

    let profile = engine.sign_in(&cli.user, &cli.name).await?;
    info!(guardian = %profile.username, policy = engine.reward_policy(), "Session started");

    // Missions
    for (mission_id, symbiosis, weather) in [
        ("m2", true, Some(WeatherType::Rainy)),
        ("m1", false, Some(WeatherType::Sunny)),
        ("m3", false, Some(WeatherType::Cloudy)),
    ] {
        let context = engine.context_at_hour(cli.hour, symbiosis, weather);
        let outcome = engine.complete_mission(mission_id, &context, None).await?;
        println!(
            "{:<4} +{:>4} XP  level {}{}",
            mission_id,
            outcome.completion.xp_earned,
            outcome.xp.level,
            if outcome.xp.leveled_up() { "  (level up)" } else { "" }
        );
        for badge in &outcome.unlocked_badges {
            println!("      badge unlocked: {}", badge.name);
        }
    }

    // Scan
    let scan = engine.record_scan(&ImageInput::jpeg("c2ltdWxhdGVk")).await?;
    println!(
        "scan {} ({}) +{} XP",
        scan.scan.common_name, scan.scan.scientific_name, scan.xp.xp - scan.xp.previous_xp
    );

    // Spot stewardship
    let echo = engine.add_echo("s2", "The spring runs clear again").await?;
    println!("echo at s2: {}", echo.content);
    match engine.adopt_spot("s2").await {
        Ok(spot) => println!("adopted {} ({})", spot.name, spot.spirit_personality.unwrap_or_default()),
        Err(e) => println!("adoption refused: {}", e),
    }

    // Collective goal
    let outcome = engine.contribute(ImpactType::Water, 400.0).await?;
    if outcome.completed_now() {
        let chronicle = engine.finalize_victory("cm1", None).await?;
        println!("\n{}\n  {}", chronicle.title, chronicle.content);
    }

    // Feed
    let feed = engine.get_feed().await?;
    if let Some(first) = feed.first() {
        engine.resonate(first.item_type, &first.activity_id).await?;
    }
    println!("\nFeed");
    for item in engine.get_feed().await? {
        let kind = match item.item_type {
            ActivityType::Mission => "mission",
            ActivityType::Scan => "scan",
        };
        println!(
            "  [{:<7}] {:<22} {:<20} by {} ({} resonance)",
            kind, item.title, item.subtitle, item.actor_name, item.resonance_count
        );
    }

    // Territory
    let snapshot = engine.territory_snapshot(&cli.territory).await?;
    println!(
        "\nTerritory {} health {:.0} stability {:.0} -> {:?}",
        snapshot.territory.name, snapshot.gauge, snapshot.territory.stability_score, snapshot.alert
    );
    let graph = engine.connectivity(Some(&cli.territory)).await?;
    for position in &graph.positions {
        println!("  {:<4} ({:>5.1}, {:>5.1})", position.spot_id, position.x, position.y);
    }
    for link in &graph.links {
        println!("  {} - {} {:?}", link.from, link.to, link.state);
    }

    let progress = engine.level_progress().await?;
    let impact = engine.impact_stats().await?;
    println!(
        "\nLevel {} ({:.0}%, {} XP to next)  carbon {} kg  water {} L  biodiversity {}",
        progress.level,
        progress.percent,
        progress.xp_to_next_level,
        impact.carbon,
        impact.water,
        impact.biodiversity
    );
    println!("{}", engine.guardian_report().await?);

    engine.sign_out().await;
    dispatcher.abort();
    info!(feed_revision = engine.feed_store().current().revision, "Session finished");
    Ok(())
}
