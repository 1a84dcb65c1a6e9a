//! Starting world of the Living Territory.

use chrono::Utc;
use std::collections::BTreeSet;

use guardian_core::{
    Badge, CollectiveCategory, CollectiveMission, Echo, ImpactType, Mission, MissionCategory,
    RequirementType, Spot, Territory,
};

/// Records loaded into a fresh store.
#[derive(Debug, Clone, Default)]
pub struct SeedData {
    pub territories: Vec<Territory>,
    pub spots: Vec<Spot>,
    pub missions: Vec<Mission>,
    pub collectives: Vec<CollectiveMission>,
    pub badges: Vec<Badge>,
    pub echoes: Vec<Echo>,
}

impl SeedData {
    /// Alpha sector: four spots, one mission each, the water goal and the badge catalog.
    pub fn alpha_sector() -> Self {
        Self {
            territories: vec![Territory {
                id: "t1".to_string(),
                name: "Alpha Sector".to_string(),
                health_score: 78.0,
                stability_score: 64.0,
                active_nodes: 4,
                total_xp: 0,
            }],
            spots: vec![
                spot("s1", "The Thousand-Year Oak", 45.123, 5.456, &["s2"]),
                spot("s2", "Emerald Spring", 45.125, 5.458, &["s1", "s3"]),
                spot("s3", "Firefly Glade", 45.120, 5.460, &["s4"]),
                spot("s4", "Lichen Trail", 45.122, 5.462, &["s3"]),
            ],
            missions: vec![
                mission(
                    "m1",
                    "s1",
                    "Growth Measurement",
                    "Measure the trunk's girth.",
                    150,
                    MissionCategory::Observation,
                    ImpactType::Carbon,
                    2.5,
                ),
                mission(
                    "m2",
                    "s2",
                    "Riverbank Cleanup",
                    "Remove unnatural debris from the banks.",
                    200,
                    MissionCategory::Action,
                    ImpactType::Water,
                    50.0,
                ),
                mission(
                    "m3",
                    "s3",
                    "Floral Inventory",
                    "Identify three species of flowers.",
                    180,
                    MissionCategory::Observation,
                    ImpactType::Biodiversity,
                    5.0,
                ),
                mission(
                    "m4",
                    "s4",
                    "Invasive Alert",
                    "Report invasive plants along the trail.",
                    120,
                    MissionCategory::Report,
                    ImpactType::Biodiversity,
                    3.0,
                ),
            ],
            collectives: vec![CollectiveMission {
                id: "cm1".to_string(),
                title: "Great Water Resonance".to_string(),
                description: "Purify 1000 litres of water across the Alpha sector.".to_string(),
                goal_value: 1000.0,
                current_value: 650.0,
                unit: "Litres".to_string(),
                impact_type: ImpactType::Water,
                is_completed: false,
                victory_chronicle: None,
                category: CollectiveCategory::Standard,
            }],
            badges: vec![
                badge("b1", "Novice Guardian", "First steps in the territory.", "fas fa-seedling", RequirementType::MissionCount, 1),
                badge("b2", "Symbiotic Spirit", "Spoke with the Spirit.", "fas fa-ghost", RequirementType::Level, 2),
                badge("b3", "Water Hero", "Saved more than 100L of water.", "fas fa-tint", RequirementType::MissionCount, 5),
                badge("b4", "Sanctuary Master", "Adopted a sanctuary of their own.", "fas fa-fort-awesome", RequirementType::Level, 10),
                badge("b5", "Pathfinder", "Completed missions on three spots.", "fas fa-compass", RequirementType::TerritoryExplorer, 3),
            ],
            echoes: vec![Echo {
                id: "e1".to_string(),
                spot_id: "s1".to_string(),
                user_id: "u0".to_string(),
                username: "The Elder".to_string(),
                content: "The wind carries the memory of deep roots.".to_string(),
                original_content: "First message".to_string(),
                created_at: Utc::now(),
            }],
        }
    }
}

fn spot(id: &str, name: &str, latitude: f64, longitude: f64, links: &[&str]) -> Spot {
    Spot {
        id: id.to_string(),
        territory_id: "t1".to_string(),
        name: name.to_string(),
        latitude,
        longitude,
        last_activity: None,
        connected_spot_ids: links.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
        owner_id: None,
        owner_name: None,
        spirit_personality: None,
    }
}

#[allow(clippy::too_many_arguments)]
fn mission(
    id: &str,
    spot_id: &str,
    title: &str,
    description: &str,
    xp_reward: u32,
    category: MissionCategory,
    impact_type: ImpactType,
    impact_value: f64,
) -> Mission {
    Mission {
        id: id.to_string(),
        spot_id: spot_id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        xp_reward,
        category,
        impact_type,
        impact_value,
        priority: false,
    }
}

fn badge(
    id: &str,
    name: &str,
    description: &str,
    icon: &str,
    requirement_type: RequirementType,
    requirement_value: u64,
) -> Badge {
    Badge {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        icon: icon.to_string(),
        requirement_type,
        requirement_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alpha_sector() {
        let seed = SeedData::alpha_sector();
        assert_eq!(seed.spots.len(), 4);
        assert_eq!(seed.missions.len(), 4);
        assert_eq!(seed.collectives[0].remaining(), 350.0);
        assert!(seed
            .missions
            .iter()
            .all(|m| seed.spots.iter().any(|s| s.id == m.spot_id)));
        assert!(seed.spots.iter().all(|s| !s.is_owned()));
        assert_eq!(seed.echoes[0].spot_id, "s1");
    }
}
