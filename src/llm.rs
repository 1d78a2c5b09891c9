//! Text-generation backend: provider abstraction + concrete providers.
//!
//! The real provider talks to an OpenAI-compatible chat completions API. A
//! disabled client (no credential or `enabled = false`) fails every call with
//! `SynthesisUnavailable`; mock and failing clients exist for local runs and
//! tests and are selected with `AI_TEST_MODE=mock|error`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::AiConfig;
use crate::error::{Result, StrategyError};

/// Prompt handed to the backend: persona as the system message, task as the user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyPrompt {
    pub system: String,
    pub user: String,
}

/// Trait object used by the synthesizer (handlers/tests inject their own).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate free text for the prompt. Errors are `SynthesisUnavailable`.
    async fn synthesize(&self, prompt: &StrategyPrompt) -> Result<String>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynGenerator = Arc<dyn TextGenerator>;

/// Factory: build a generator according to config and environment variables.
///
/// * `AI_TEST_MODE=mock` → deterministic mock text.
/// * `AI_TEST_MODE=error` → every call fails.
/// * `enabled == false`, unknown provider, or no credential → disabled client.
/// * otherwise the OpenAI provider.
pub fn build_generator(config: &AiConfig) -> DynGenerator {
    match std::env::var("AI_TEST_MODE").ok().as_deref() {
        Some("mock") => {
            return Arc::new(MockGenerator::new(
                "Mock strategy: focus spend on the primary channel and review weekly.",
            ))
        }
        Some("error") => return Arc::new(FailingGenerator),
        _ => {}
    }

    if !config.enabled {
        return Arc::new(DisabledGenerator::new("text generation disabled in config"));
    }
    if config.provider != "openai" {
        warn!(provider = %config.provider, "Unsupported text-generation provider");
        return Arc::new(DisabledGenerator::new(format!(
            "unsupported provider '{}'",
            config.provider
        )));
    }
    let Some(api_key) = config.resolve_api_key() else {
        warn!("OPENAI_API_KEY not set; strategy synthesis will fail until it is configured");
        return Arc::new(DisabledGenerator::new("OPENAI_API_KEY environment variable not set"));
    };
    match OpenAiGenerator::new(config, api_key) {
        Ok(g) => Arc::new(g),
        Err(e) => Arc::new(DisabledGenerator::new(e.to_string())),
    }
}

/// OpenAI provider (Chat Completions API).
pub struct OpenAiGenerator {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiGenerator {
    pub fn new(config: &AiConfig, api_key: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("campaign-strategist/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StrategyError::SynthesisUnavailable(format!("http client: {e}")))?;
        Ok(Self {
            http,
            api_key,
            model: config.model.clone(),
            endpoint: format!("{}/chat/completions", config.base_url),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}
#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
}
#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}
#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}
#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn synthesize(&self, prompt: &StrategyPrompt) -> Result<String> {
        let unavailable = |msg: String| StrategyError::SynthesisUnavailable(msg);

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: &prompt.system,
                },
                Msg {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| unavailable(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(unavailable(format!("backend returned HTTP {status}")));
        }
        let body: Resp = resp
            .json()
            .await
            .map_err(|e| unavailable(format!("malformed backend response: {e}")))?;
        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(unavailable("backend returned no text".into()));
        }
        debug!(chars = text.len(), model = %self.model, "Strategy text generated");
        Ok(text)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Fails every call; used when synthesis is not configured.
pub struct DisabledGenerator {
    reason: String,
}

impl DisabledGenerator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl TextGenerator for DisabledGenerator {
    async fn synthesize(&self, _prompt: &StrategyPrompt) -> Result<String> {
        Err(StrategyError::SynthesisUnavailable(self.reason.clone()))
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Returns fixed text; for tests and local runs.
#[derive(Clone)]
pub struct MockGenerator {
    pub fixed: String,
}

impl MockGenerator {
    pub fn new(fixed: impl Into<String>) -> Self {
        Self {
            fixed: fixed.into(),
        }
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn synthesize(&self, _prompt: &StrategyPrompt) -> Result<String> {
        Ok(self.fixed.clone())
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Simulates a backend outage.
pub struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn synthesize(&self, _prompt: &StrategyPrompt) -> Result<String> {
        Err(StrategyError::SynthesisUnavailable(
            "simulated backend failure".into(),
        ))
    }
    fn provider_name(&self) -> &'static str {
        "error"
    }
}
