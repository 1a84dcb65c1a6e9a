//! Spot projection and link activity.
//!
//! The projection is a display convenience, not a map transform: it folds
//! coordinates into a bounded square so spots can be drawn on a radar.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::types::Spot;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Default recency window for an active link (1 hour).
pub const DEFAULT_ACTIVITY_WINDOW_MS: i64 = 3_600_000;

const PROJECTION_SCALE: f64 = 1000.0;
const PROJECTION_SPAN: f64 = 80.0;
const PROJECTION_OFFSET: f64 = 10.0;

/// Position of a spot in display space, both axes in [10, 90].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct SpotPosition {
    pub spot_id: String,
    pub x: f64,
    pub y: f64,
}

/// Whether both ends of a link saw recent activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Active,
    Dormant,
}

/// A link between two known spots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct SpotLink {
    pub from: String,
    pub to: String,
    pub state: LinkState,
}

/// Projected spots and classified links.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ConnectivityGraph {
    pub positions: Vec<SpotPosition>,
    pub links: Vec<SpotLink>,
}

impl ConnectivityGraph {
    /// Build the graph for `spots` as seen at `now`.
    ///
    /// With `dedupe`, a relationship listed on both sides yields a single link
    /// keyed by the sorted id pair.
    pub fn build(spots: &[Spot], now: DateTime<Utc>, window_ms: i64, dedupe: bool) -> Self {
        Self {
            positions: spots.iter().map(project_spot).collect(),
            links: build_links(spots, now, window_ms, dedupe),
        }
    }

    pub fn active_links(&self) -> impl Iterator<Item = &SpotLink> {
        self.links.iter().filter(|l| l.state == LinkState::Active)
    }
}

fn fold_axis(value: f64) -> f64 {
    let value = if value.is_finite() { value } else { 0.0 };
    let mut scaled = value * PROJECTION_SCALE;
    if !scaled.is_finite() {
        // Near f64::MAX the product overflows; fold first, then scale
        scaled = value.rem_euclid(PROJECTION_SPAN / PROJECTION_SCALE) * PROJECTION_SCALE;
    }
    let folded = scaled.rem_euclid(PROJECTION_SPAN);
    // Products too large for f64 precision can fold to exactly SPAN
    folded.clamp(0.0, PROJECTION_SPAN) + PROJECTION_OFFSET
}

/// Project one spot: `x = (lon*1000 mod 80) + 10`, `y = (lat*1000 mod 80) + 10`.
pub fn project_spot(spot: &Spot) -> SpotPosition {
    SpotPosition {
        spot_id: spot.id.clone(),
        x: fold_axis(spot.longitude),
        y: fold_axis(spot.latitude),
    }
}

/// Whether `last_activity` is strictly within `window_ms` of `now`.
///
/// Timestamps in the future count as recent.
pub fn is_recent(last_activity: Option<DateTime<Utc>>, now: DateTime<Utc>, window_ms: i64) -> bool {
    match last_activity {
        Some(at) => (now - at).num_milliseconds() < window_ms,
        None => false,
    }
}

/// Classify every link declared in `connected_spot_ids` that resolves to a known spot.
pub fn build_links(spots: &[Spot], now: DateTime<Utc>, window_ms: i64, dedupe: bool) -> Vec<SpotLink> {
    let by_id: HashMap<&str, &Spot> = spots.iter().map(|s| (s.id.as_str(), s)).collect();
    let mut seen: BTreeSet<(String, String)> = BTreeSet::new();
    let mut links = Vec::new();

    for spot in spots {
        for target_id in &spot.connected_spot_ids {
            if target_id == &spot.id {
                continue;
            }
            let Some(target) = by_id.get(target_id.as_str()) else {
                continue;
            };

            if dedupe {
                let key = if spot.id <= *target_id {
                    (spot.id.clone(), target_id.clone())
                } else {
                    (target_id.clone(), spot.id.clone())
                };
                if !seen.insert(key) {
                    continue;
                }
            }

            let active = is_recent(spot.last_activity, now, window_ms)
                && is_recent(target.last_activity, now, window_ms);

            links.push(SpotLink {
                from: spot.id.clone(),
                to: target.id.clone(),
                state: if active { LinkState::Active } else { LinkState::Dormant },
            });
        }
    }

    links
}
