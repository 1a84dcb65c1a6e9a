//! Persistence boundary.
//!
//! The engine talks to storage only through the repository traits.
//! [`MemoryStore`] implements all of them for tests and the simulator.

pub mod memory;
pub mod seed;
pub mod traits;

pub use memory::MemoryStore;
pub use seed::SeedData;
pub use traits::*;

use std::sync::Arc;

/// Repository handles injected into the engine components.
#[derive(Clone)]
pub struct Repositories {
    pub profiles: Arc<dyn ProfileRepository>,
    pub missions: Arc<dyn MissionRepository>,
    pub completions: Arc<dyn CompletionRepository>,
    pub collectives: Arc<dyn CollectiveRepository>,
    pub badges: Arc<dyn BadgeRepository>,
    pub territories: Arc<dyn TerritoryRepository>,
    pub spots: Arc<dyn SpotRepository>,
    pub scans: Arc<dyn ScanRepository>,
    pub resonances: Arc<dyn ResonanceRepository>,
    pub chronicles: Arc<dyn ChronicleRepository>,
    pub echoes: Arc<dyn EchoRepository>,
}

impl Repositories {
    /// Use one backing store for every repository.
    pub fn from_store<S>(store: Arc<S>) -> Self
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
        Self {
            profiles: store.clone(),
            missions: store.clone(),
            completions: store.clone(),
            collectives: store.clone(),
            badges: store.clone(),
            territories: store.clone(),
            spots: store.clone(),
            scans: store.clone(),
            resonances: store.clone(),
            chronicles: store.clone(),
            echoes: store,
        }
    }
}
