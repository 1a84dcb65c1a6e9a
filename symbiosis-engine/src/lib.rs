//! Symbiosis Engine - progression and collective goals of the Living Territory
//!
//! Turns Guardian activity into experience, badges, collective progress and a
//! shared feed, and watches territory stability.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      SymbiosisEngine                         │
//! │                (session, builder, config)                    │
//! └───────┬──────────────────┬──────────────────┬────────────────┘
//!         │                  │                  │
//!         ▼                  ▼                  ▼
//! ┌───────────────┐  ┌───────────────┐  ┌────────────────────┐
//! │ MissionComp.  │  │ FeedMerger    │  │ TerritoryStability │
//! │ Processor     │  │ + FeedStore   │  │ Monitor            │
//! └──┬─────┬───┬──┘  │ + Realtime    │  │ + Connectivity     │
//!    │     │   │     └───────────────┘  └────────────────────┘
//!    ▼     ▼   ▼
//! Ledger  Aggregator  BadgeEvaluator
//!    │     │   │
//!    └─────┴───┴──► Repositories (traits)  ◄── MemoryStore
//!
//! SpotStewardship: spot adoption, spirit personality, echoes
//! ```
//!
//! Writes on the same profile, collective goal or Guardian badge set are
//! serialized through [`sync::KeyedLocks`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use guardian_core::RewardContext;
//! use symbiosis_engine::{MemoryStore, SymbiosisEngine};
//!
//! # async fn run() -> symbiosis_engine::Result<()> {
//! let engine = SymbiosisEngine::builder()
//!     .with_store(Arc::new(MemoryStore::seeded()))
//!     .build()?;
//!
//! engine.sign_in("u1", "Sylva").await?;
//! let outcome = engine
//!     .complete_mission("m2", &RewardContext::at_hour(22, true), None)
//!     .await?;
//! println!("+{} XP", outcome.completion.xp_earned);
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod badges;
pub mod config;
pub mod connectivity;
pub mod engine;
pub mod feed;
pub mod impact;
pub mod ledger;
pub mod polling;
pub mod processor;
pub mod realtime;
pub mod stewardship;
pub mod store;
pub mod sync;
pub mod territory;
pub mod types;

// Re-export main types for convenience
pub use aggregator::CollectiveMissionAggregator;
pub use badges::{BadgeEvaluator, BadgeMetrics};
pub use config::EngineConfig;
pub use connectivity::SpatialConnectivityGrapher;
pub use engine::{SymbiosisEngine, SymbiosisEngineBuilder};
pub use feed::SymbiosisFeedMerger;
pub use impact::ImpactCalculator;
pub use ledger::ProfileLedger;
pub use polling::PollingTask;
pub use processor::MissionCompletionProcessor;
pub use realtime::{FeedSnapshot, FeedStore, RealtimeDispatcher};
pub use stewardship::SpotStewardship;
pub use store::{MemoryStore, Repositories, SeedData, StoreError};
pub use territory::{TerritoryStabilityMonitor, TerritoryWatch};
pub use types::{
    AlertKind, CompletionOutcome, ContributionOutcome, EngineError, LevelProgress, RealtimeEvent,
    Result, ScanOutcome, StabilityAlert, Table, TerritorySnapshot, XpUpdate,
};
