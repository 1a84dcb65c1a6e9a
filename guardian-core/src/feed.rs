//! Merge of the mission and scan streams into one ranked feed.

use std::collections::HashMap;

use crate::types::{ActivityType, FeedItem, Mission, MissionCompletion, Resonance, ScanRecord};

const UNKNOWN_MISSION_TITLE: &str = "Unknown mission";

impl FeedItem {
    /// Feed entry for a mission completion. `mission` may be missing if it
    /// was removed after the completion was recorded.
    pub fn from_completion(
        completion: &MissionCompletion,
        mission: Option<&Mission>,
        actor_name: impl Into<String>,
    ) -> Self {
        let (title, description) = match mission {
            Some(m) => (m.title.clone(), m.description.clone()),
            None => (UNKNOWN_MISSION_TITLE.to_string(), String::new()),
        };
        Self {
            item_type: ActivityType::Mission,
            activity_id: completion.id.clone(),
            created_at: completion.completed_at,
            actor_name: actor_name.into(),
            title,
            subtitle: format!("+{} XP", completion.xp_earned),
            description,
            resonance_count: 0,
        }
    }

    /// Feed entry for a species scan.
    pub fn from_scan(scan: &ScanRecord, actor_name: impl Into<String>) -> Self {
        Self {
            item_type: ActivityType::Scan,
            activity_id: scan.id.clone(),
            created_at: scan.created_at,
            actor_name: actor_name.into(),
            title: scan.common_name.clone(),
            subtitle: scan.scientific_name.clone(),
            description: scan.ecology_fact.clone(),
            resonance_count: 0,
        }
    }
}

/// Count resonance rows per activity id.
pub fn resonance_counts(resonances: &[Resonance]) -> HashMap<&str, u32> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for r in resonances {
        *counts.entry(r.activity_id.as_str()).or_insert(0) += 1;
    }
    counts
}

/// Concatenate both streams, attach resonance counts and sort by
/// `created_at` descending. Ties keep the fetch order (missions first).
pub fn merge_feed(
    missions: Vec<FeedItem>,
    scans: Vec<FeedItem>,
    resonances: &[Resonance],
) -> Vec<FeedItem> {
    let counts = resonance_counts(resonances);

    let mut feed: Vec<FeedItem> = missions
        .into_iter()
        .chain(scans)
        .map(|mut item| {
            item.resonance_count = counts.get(item.activity_id.as_str()).copied().unwrap_or(0);
            item
        })
        .collect();

    feed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    feed
}
