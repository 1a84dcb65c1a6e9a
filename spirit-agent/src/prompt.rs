//! Prompt assembly for narrative requests.
//!
//! Every prompt asks for short flavor text. Results decorate state that has
//! already been decided by the engine.

use guardian_core::{ImpactStats, WeatherType};

/// Marker a moderated echo is replaced with.
pub const CORRUPTED_SIGNAL: &str = "ENTROPIC INTERFERENCE: CORRUPTED SIGNAL";

/// What the spirit of a spot knows about its place.
#[derive(Debug, Clone, Default)]
pub struct SpiritContext {
    pub spot_name: String,
    pub spot_description: String,
    pub owner_name: Option<String>,
    pub personality: Option<String>,
    pub mission_titles: Vec<String>,
}

/// Assembles narrative prompts.
pub struct PromptAssembler;

impl PromptAssembler {
    /// Persona shared by all narrative requests.
    pub fn system_prompt() -> String {
        "You are the Spirit of the Living Territory. You speak briefly, poetically, \
         and always about nature and the Guardians who protect it."
            .to_string()
    }

    /// Epic chronicle for a completed collective mission.
    pub fn victory_chronicle(mission_title: &str, goal_value: f64, unit: &str) -> String {
        format!(
            "Write an epic Victory Chronicle for the Living Territory.\n\
             The Guardians completed the collective mission \"{}\" (goal: {} {}).\n\
             The tone must be solemn, futuristic and deeply ecological. Max 50 words.",
            mission_title,
            format_amount(goal_value),
            unit
        )
    }

    /// Poetic rewrite of a Guardian's message, with moderation.
    pub fn poetize_echo(raw_message: &str) -> String {
        format!(
            "You are the Poetic Moderator of the Living Territory. A Guardian left this message: \"{}\".\n\
             Rewrite it so it is poetic, mysterious and tied to nature (max 25 words).\n\
             If the message is hateful or inappropriate, answer ONLY: \"{}\"",
            raw_message.trim(),
            CORRUPTED_SIGNAL
        )
    }

    /// Short advice for a Guardian heading out.
    pub fn weather_advice(weather: WeatherType, temperature_c: f64) -> String {
        format!(
            "The current weather is {} at {:.0}°C.\n\
             Give short poetic advice (max 15 words) to a Guardian leaving to explore.",
            weather.as_str(),
            temperature_c
        )
    }

    /// Prophetic report on a Guardian's impact.
    pub fn guardian_report(username: &str, level: u32, impact: &ImpactStats) -> String {
        format!(
            "Oracle of the Living Territory. Analyse: {}, level {}, water impact {}L, carbon {}kg, \
             biodiversity {}. Short prophetic report (max 40 words).",
            username,
            level,
            format_amount(impact.water),
            format_amount(impact.carbon),
            format_amount(impact.biodiversity)
        )
    }

    /// System instruction for a live conversation with a spot's spirit.
    pub fn spirit_instruction(context: &SpiritContext) -> String {
        let mut prompt = String::new();

        prompt.push_str(&format!(
            "You are the Spirit of the Forest for the spot \"{}\".\n",
            context.spot_name
        ));
        if let Some(owner) = &context.owner_name {
            prompt.push_str(&format!("Your appointed Protector is {}.\n", owner));
        }
        prompt.push_str(&format!(
            "Your personality: {}\n",
            context
                .personality
                .as_deref()
                .unwrap_or("Ancestral, protective, speaks in short riddles.")
        ));
        prompt.push_str(&format!("Place: {}\n", context.spot_description));
        if !context.mission_titles.is_empty() {
            prompt.push_str(&format!(
                "Available missions: {}.\n",
                context.mission_titles.join(", ")
            ));
        }
        prompt.push_str("Be mysterious and benevolent.");

        prompt
    }
}

/// Render whole amounts without a trailing `.0`.
fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.1}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_victory_prompt() {
        let prompt = PromptAssembler::victory_chronicle("Great Water Resonance", 1000.0, "Litres");
        assert!(prompt.contains("\"Great Water Resonance\""));
        assert!(prompt.contains("1000 Litres"));
    }

    #[test]
    fn test_echo_prompt_mentions_marker() {
        let prompt = PromptAssembler::poetize_echo("  the river is clear today ");
        assert!(prompt.contains("\"the river is clear today\""));
        assert!(prompt.contains(CORRUPTED_SIGNAL));
    }

    #[test]
    fn test_spirit_instruction_defaults() {
        let context = SpiritContext {
            spot_name: "The Thousand-Year Oak".to_string(),
            spot_description: "An ancestor watching over the valley.".to_string(),
            mission_titles: vec!["Growth Measurement".to_string()],
            ..Default::default()
        };
        let prompt = PromptAssembler::spirit_instruction(&context);
        assert!(prompt.contains("speaks in short riddles"));
        assert!(prompt.contains("Growth Measurement"));
        assert!(!prompt.contains("Protector"));
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(2.5), "2.5");
        assert_eq!(format_amount(50.0), "50");
    }
}
