//! The agent runner.
//!
//! Every agent goes through the same linear sequence:
//!
//! 1. no usable credential -> fallback, no network call
//! 2. build prompt -> generation client (bounded by `timeout`)
//! 3. parse the reply into the agent's output type
//! 4. any failure in 2-3 -> fallback
//! 5. echo caller-supplied fields onto whichever output survived
//!
//! The fallback is never surfaced as an error. Degradation is reported through
//! [`Generation::degraded`] instead.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::agents::{Agent, GeneratedContent};
use crate::config::GeminiConfig;
use crate::gemini::{GeminiClient, GenerationClient, GenerationClientError};
use crate::parse::{parse_typed, ParseFailure};

/// Note attached to every templated result.
pub const DEMO_NOTE: &str = "Demo content - generation service unavailable";

/// Why a result came from the fallback generator.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("no valid Gemini API key configured")]
    MissingCredential,

    #[error("generation call failed: {0}")]
    Client(#[from] GenerationClientError),

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Parse(#[from] ParseFailure),
}

impl GenerationError {
    /// Short machine-readable label (used in the degraded response header).
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::MissingCredential => "missing-credential",
            GenerationError::Client(_) => "transport",
            GenerationError::Timeout(_) => "timeout",
            GenerationError::Parse(_) => "parse",
        }
    }
}

/// Output of one agent run: the content plus, when degraded, the reason.
#[derive(Debug)]
pub struct Generation<T> {
    pub content: T,
    pub degraded: Option<GenerationError>,
}

impl<T> Generation<T> {
    pub fn is_live(&self) -> bool {
        self.degraded.is_none()
    }

    /// Genuine model output only; fallback content is discarded.
    pub fn into_live(self) -> Result<T, GenerationError> {
        match self.degraded {
            None => Ok(self.content),
            Some(e) => Err(e),
        }
    }
}

#[derive(Clone)]
pub struct Generator {
    client: Option<Arc<dyn GenerationClient>>,
    timeout: Duration,
}

impl Generator {
    pub fn new(client: Option<Arc<dyn GenerationClient>>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// A runner with no client; every agent returns fallback content.
    pub fn offline() -> Self {
        Self::new(None, Duration::from_secs(0))
    }

    /// Build from configuration, reading the API key from the environment once.
    pub fn from_config(config: &GeminiConfig) -> Self {
        let timeout = Duration::from_secs(config.request_timeout_seconds);
        match GeminiClient::from_config(config) {
            Some(client) => {
                tracing::info!(model = %config.model, "Gemini generation client configured");
                Self::new(Some(Arc::new(client)), timeout)
            }
            None => {
                tracing::warn!(
                    env = %config.api_key_env,
                    "No valid Gemini API key found, agents will serve demo content"
                );
                Self::new(None, timeout)
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    pub async fn run_agent<A: Agent>(&self, agent: &A, request: &A::Request) -> Generation<A::Output> {
        let started = Instant::now();
        let kind = A::KIND;

        let (mut content, degraded) = match self.generate_live(agent, request).await {
            Ok(output) => {
                tracing::info!(
                    agent = kind.slug(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Generated content with Gemini"
                );
                (output, None)
            }
            Err(GenerationError::MissingCredential) => {
                tracing::debug!(agent = kind.slug(), "Serving demo content, no credential");
                (agent.fallback(request), Some(GenerationError::MissingCredential))
            }
            Err(e) => {
                tracing::warn!(
                    agent = kind.slug(),
                    reason = e.kind(),
                    error = %e,
                    "Generation failed, falling back to demo content"
                );
                (agent.fallback(request), Some(e))
            }
        };

        agent.echo(request, &mut content);

        Generation { content, degraded }
    }

    async fn generate_live<A: Agent>(
        &self,
        agent: &A,
        request: &A::Request,
    ) -> Result<A::Output, GenerationError> {
        let client = self.client.as_ref().ok_or(GenerationError::MissingCredential)?;

        let prompt = agent.build_prompt(request);
        let raw = tokio::time::timeout(self.timeout, client.generate(&prompt))
            .await
            .map_err(|_| GenerationError::Timeout(self.timeout))??;

        let mut output: A::Output = parse_typed(&raw)?;
        output.set_note(None);
        agent.enrich_live(request, &mut output);
        Ok(output)
    }
}

// ============================================================================
// TESTS
// ============================================================================
