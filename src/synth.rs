//! # Strategy Synthesizer
//! Builds the prompt from the normalized attributes and the two numeric
//! signals, hands it to the text backend, and returns the text verbatim.

use tracing::debug;

use crate::artifact::anon_id;
use crate::error::Result;
use crate::features::FeatureRecord;
use crate::llm::{DynGenerator, StrategyPrompt};

/// Rendered in place of the trend when no forecaster is available.
pub const TREND_NOT_AVAILABLE: &str = "not available";

/// Who the backend is asked to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub expected_output: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            role: "Marketing strategy expert".into(),
            goal: "Generate a campaign plan based on the customer and campaign attributes".into(),
            backstory: "Expert in bank marketing campaigns, using age/job/marital/duration/campaign/contact/month \
                        to predict subscription success and allocate budgets."
                .into(),
            expected_output: "Detailed strategy with budget split, considering attributes like duration and job \
                              for high subscription probability."
                .into(),
        }
    }
}

pub struct StrategySynthesizer {
    generator: DynGenerator,
    persona: Persona,
}

impl StrategySynthesizer {
    pub fn new(generator: DynGenerator) -> Self {
        Self::with_persona(generator, Persona::default())
    }

    pub fn with_persona(generator: DynGenerator, persona: Persona) -> Self {
        Self { generator, persona }
    }

    pub fn provider_name(&self) -> &'static str {
        self.generator.provider_name()
    }

    pub fn build_prompt(
        &self,
        features: &FeatureRecord,
        probability: f64,
        trend: Option<f64>,
    ) -> StrategyPrompt {
        let p = &self.persona;
        let system = format!(
            "You are a {}. Goal: {}. Background: {}",
            p.role, p.goal, p.backstory
        );

        let trend_text = match trend {
            Some(t) => format!("{t:.2}"),
            None => TREND_NOT_AVAILABLE.to_string(),
        };
        let user = format!(
            "Age: {}, Job: {}, Marital: {}, Education: {}, Duration: {}s, Campaign: {}, \
             Contact: {}, Month: {}, Previous contacts: {}, Previous outcome: {}, Budget: {}. \
             Success prob: {:.2}, Trend: {}.\nExpected output: {}",
            features.age,
            features.job,
            features.marital,
            features.education,
            features.duration,
            features.campaign,
            features.contact,
            features.month,
            features.previous,
            features.poutcome,
            features.budget,
            probability,
            trend_text,
            p.expected_output,
        );
        StrategyPrompt { system, user }
    }

    pub async fn synthesize(
        &self,
        features: &FeatureRecord,
        probability: f64,
        trend: Option<f64>,
    ) -> Result<String> {
        let prompt = self.build_prompt(features, probability, trend);
        // Never log raw prompt text. Only hashed id + length.
        debug!(
            prompt_id = %anon_id(&prompt.user),
            prompt_chars = prompt.user.len(),
            provider = self.generator.provider_name(),
            "Synthesizing strategy"
        );
        self.generator.synthesize(&prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{CampaignInput, FeatureNormalizer};
    use crate::llm::MockGenerator;
    use std::sync::Arc;

    fn synth() -> StrategySynthesizer {
        StrategySynthesizer::new(Arc::new(MockGenerator::new("ok")))
    }

    #[test]
    fn prompt_renders_signals() {
        let f = FeatureNormalizer::normalize(&CampaignInput::default());
        let p = synth().build_prompt(&f, 0.6234, Some(41.256));
        assert!(p.user.contains("Age: 30, Job: admin., Marital: single"), "{}", p.user);
        assert!(p.user.contains("Duration: 500s"));
        assert!(p.user.contains("Budget: 10000"));
        assert!(p.user.contains("Success prob: 0.62, Trend: 41.26."));
        assert!(p.system.contains("Marketing strategy expert"));
    }

    #[test]
    fn missing_trend_is_rendered_as_text() {
        let f = FeatureNormalizer::normalize(&CampaignInput::default());
        let p = synth().build_prompt(&f, 0.35, None);
        assert!(p.user.contains("Trend: not available."), "{}", p.user);
    }
}
