//! Guardian Core - records and pure rules of the Living Territory.
//!
//! Everything in this crate is free of I/O. The engine crate feeds it
//! records fetched from the persistence collaborator and acts on the results.
//!
//! - **Progression**: experience to level mapping
//! - **Reward**: mission reward policies (night/symbiosis or weather affinity)
//! - **Stability**: territory alert classification
//! - **Connectivity**: spot projection and link activity
//! - **Feed**: merge of mission and scan streams with resonance counts
//!
//! With the `typescript` feature enabled the records derive `ts_rs::TS` so the
//! web client can share their shapes.

pub mod connectivity;
pub mod feed;
pub mod progression;
pub mod reward;
pub mod stability;
pub mod types;

pub use connectivity::{project_spot, ConnectivityGraph, LinkState, SpotLink, SpotPosition};
pub use feed::merge_feed;
pub use progression::{can_adopt, level_for_xp, level_progress_percent, ADOPTION_MIN_LEVEL, XP_PER_LEVEL};
pub use reward::{
    compute_reward, is_night_hour, NightSymbiosisPolicy, RewardContext, RewardPolicy,
    WeatherAffinityPolicy,
};
pub use stability::{classify, AlertState, DEFAULT_CRITICAL_THRESHOLD};
pub use types::*;
