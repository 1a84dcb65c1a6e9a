//! Mission reward policies.
//!
//! `xp_earned = round(base_reward * multiplier)` where the multiplier is the
//! product of the modifiers a policy recognises. Two policies exist and are
//! never combined:
//!
//! - [`NightSymbiosisPolicy`]: symbiosis x2, night hour x1.5 (default)
//! - [`WeatherAffinityPolicy`]: symbiosis x2, weather matching the mission's
//!   impact type x2 (rain/water, sun/carbon) or x1.5 (cloud/biodiversity)

use serde::{Deserialize, Serialize};

use crate::types::{ImpactType, Mission, WeatherType};

/// Evaluation-time modifiers of a mission completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardContext {
    /// Cooperative completion
    pub is_symbiosis: bool,
    /// Local hour in [21, 24) or [0, 6)
    pub is_night_hour: bool,
    /// Weather at completion, when known
    pub weather: Option<WeatherType>,
}

impl RewardContext {
    /// Context derived from the local clock hour.
    pub fn at_hour(hour: u32, is_symbiosis: bool) -> Self {
        Self {
            is_symbiosis,
            is_night_hour: is_night_hour(hour),
            weather: None,
        }
    }

    pub fn with_weather(mut self, weather: WeatherType) -> Self {
        self.weather = Some(weather);
        self
    }

    pub fn with_symbiosis(mut self, is_symbiosis: bool) -> Self {
        self.is_symbiosis = is_symbiosis;
        self
    }
}

/// Night window used by the default policy: [21, 24) and [0, 6).
pub fn is_night_hour(hour: u32) -> bool {
    is_within_window(hour, 21, 6)
}

/// Whether `hour` lies in `[start, end)` on a 24h clock, wrapping past midnight.
pub fn is_within_window(hour: u32, start: u32, end: u32) -> bool {
    let hour = hour % 24;
    if start <= end {
        hour >= start && hour < end
    } else {
        hour >= start || hour < end
    }
}

/// Strategy that turns a context into a reward multiplier.
pub trait RewardPolicy: Send + Sync {
    /// Policy identifier for logs.
    fn name(&self) -> &'static str;

    /// Product of all modifiers that apply to this mission in this context.
    fn multiplier(&self, mission: &Mission, context: &RewardContext) -> f64;
}

/// Symbiosis and night-hour bonuses.
#[derive(Debug, Clone)]
pub struct NightSymbiosisPolicy {
    pub symbiosis_multiplier: f64,
    pub night_multiplier: f64,
}

impl Default for NightSymbiosisPolicy {
    fn default() -> Self {
        Self {
            symbiosis_multiplier: 2.0,
            night_multiplier: 1.5,
        }
    }
}

impl RewardPolicy for NightSymbiosisPolicy {
    fn name(&self) -> &'static str {
        "night_symbiosis"
    }

    fn multiplier(&self, _mission: &Mission, context: &RewardContext) -> f64 {
        let mut multiplier = 1.0;
        if context.is_symbiosis {
            multiplier *= self.symbiosis_multiplier;
        }
        if context.is_night_hour {
            multiplier *= self.night_multiplier;
        }
        multiplier
    }
}

/// Symbiosis bonus plus a weather/impact affinity bonus.
#[derive(Debug, Clone)]
pub struct WeatherAffinityPolicy {
    pub symbiosis_multiplier: f64,
    /// Rain on water missions, sun on carbon missions
    pub exact_match_multiplier: f64,
    /// Cloud on biodiversity missions
    pub soft_match_multiplier: f64,
}

impl Default for WeatherAffinityPolicy {
    fn default() -> Self {
        Self {
            symbiosis_multiplier: 2.0,
            exact_match_multiplier: 2.0,
            soft_match_multiplier: 1.5,
        }
    }
}

impl WeatherAffinityPolicy {
    fn affinity(&self, weather: WeatherType, impact: ImpactType) -> f64 {
        match (weather, impact) {
            (WeatherType::Rainy, ImpactType::Water) => self.exact_match_multiplier,
            (WeatherType::Sunny, ImpactType::Carbon) => self.exact_match_multiplier,
            (WeatherType::Cloudy, ImpactType::Biodiversity) => self.soft_match_multiplier,
            _ => 1.0,
        }
    }
}

impl RewardPolicy for WeatherAffinityPolicy {
    fn name(&self) -> &'static str {
        "weather_affinity"
    }

    fn multiplier(&self, mission: &Mission, context: &RewardContext) -> f64 {
        let mut multiplier = 1.0;
        if context.is_symbiosis {
            multiplier *= self.symbiosis_multiplier;
        }
        if let Some(weather) = context.weather {
            multiplier *= self.affinity(weather, mission.impact_type);
        }
        multiplier
    }
}

/// Integer reward for completing `mission` under `context`.
pub fn compute_reward(policy: &dyn RewardPolicy, mission: &Mission, context: &RewardContext) -> u64 {
    let raw = f64::from(mission.xp_reward) * policy.multiplier(mission, context);
    if !raw.is_finite() || raw <= 0.0 {
        return 0;
    }
    raw.round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MissionCategory;

    fn mission(xp_reward: u32, impact_type: ImpactType) -> Mission {
        Mission {
            id: "m1".to_string(),
            spot_id: "s1".to_string(),
            title: "Growth Measurement".to_string(),
            description: "Measure the trunk.".to_string(),
            xp_reward,
            category: MissionCategory::Observation,
            impact_type,
            impact_value: 2.5,
            priority: false,
        }
    }

    #[test]
    fn test_night_window() {
        assert!(is_night_hour(21));
        assert!(is_night_hour(23));
        assert!(is_night_hour(0));
        assert!(is_night_hour(5));
        assert!(!is_night_hour(6));
        assert!(!is_night_hour(12));
        assert!(!is_night_hour(20));
    }

    #[test]
    fn test_non_wrapping_window() {
        assert!(is_within_window(9, 8, 17));
        assert!(!is_within_window(17, 8, 17));
    }

    #[test]
    fn test_symbiosis_at_night() {
        let policy = NightSymbiosisPolicy::default();
        let context = RewardContext {
            is_symbiosis: true,
            is_night_hour: true,
            weather: None,
        };
        assert_eq!(compute_reward(&policy, &mission(150, ImpactType::Carbon), &context), 450);
    }

    #[test]
    fn test_plain_reward() {
        let policy = NightSymbiosisPolicy::default();
        let context = RewardContext::at_hour(12, false);
        assert_eq!(compute_reward(&policy, &mission(150, ImpactType::Carbon), &context), 150);
    }

    #[test]
    fn test_night_rounds_half_up() {
        let policy = NightSymbiosisPolicy::default();
        let context = RewardContext::at_hour(22, false);
        // 15 * 1.5 = 22.5
        assert_eq!(compute_reward(&policy, &mission(15, ImpactType::Water), &context), 23);
    }

    #[test]
    fn test_night_policy_ignores_weather() {
        let policy = NightSymbiosisPolicy::default();
        let context = RewardContext::at_hour(12, false).with_weather(WeatherType::Rainy);
        assert_eq!(compute_reward(&policy, &mission(200, ImpactType::Water), &context), 200);
    }

    #[test]
    fn test_weather_affinity() {
        let policy = WeatherAffinityPolicy::default();
        let rainy = RewardContext::default().with_weather(WeatherType::Rainy);
        let sunny = RewardContext::default().with_weather(WeatherType::Sunny);
        let cloudy = RewardContext::default().with_weather(WeatherType::Cloudy);

        assert_eq!(compute_reward(&policy, &mission(200, ImpactType::Water), &rainy), 400);
        assert_eq!(compute_reward(&policy, &mission(150, ImpactType::Carbon), &sunny), 300);
        assert_eq!(compute_reward(&policy, &mission(180, ImpactType::Biodiversity), &cloudy), 270);
        assert_eq!(compute_reward(&policy, &mission(150, ImpactType::Carbon), &rainy), 150);
    }

    #[test]
    fn test_weather_policy_ignores_night() {
        let policy = WeatherAffinityPolicy::default();
        let context = RewardContext::at_hour(23, false);
        assert_eq!(compute_reward(&policy, &mission(120, ImpactType::Biodiversity), &context), 120);
    }

    #[test]
    fn test_symbiosis_applies_under_both_policies() {
        let context = RewardContext::default().with_symbiosis(true);
        let m = mission(100, ImpactType::Water);
        assert_eq!(compute_reward(&NightSymbiosisPolicy::default(), &m, &context), 200);
        assert_eq!(compute_reward(&WeatherAffinityPolicy::default(), &m, &context), 200);
    }
}
