//! Provider chain with bounded retries and per-provider circuit breaking.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{Completion, CompletionRequest, LLMProvider, ProviderError, ProviderKind};
use crate::config::AiConfig;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl RetryPolicy {
    pub fn from_config(ai: &AiConfig) -> Self {
        Self {
            max_retries: ai.max_retries,
            base_delay: Duration::from_millis(ai.retry_base_delay_ms),
            failure_threshold: ai.circuit_failure_threshold.max(1),
            cooldown: Duration::from_secs(ai.circuit_cooldown_secs),
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&AiConfig::default())
    }
}

#[derive(Debug, Default)]
struct Circuit {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Tries each provider in order until one answers.
pub struct ProviderRouter {
    providers: Vec<Box<dyn LLMProvider>>,
    circuits: Mutex<HashMap<ProviderKind, Circuit>>,
    policy: RetryPolicy,
}

impl ProviderRouter {
    pub fn new(providers: Vec<Box<dyn LLMProvider>>, policy: RetryPolicy) -> Self {
        Self {
            providers,
            circuits: Mutex::new(HashMap::new()),
            policy,
        }
    }

    /// A router with no providers; every call fails.
    pub fn empty() -> Self {
        Self::new(Vec::new(), RetryPolicy::default())
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// First provider in the chain.
    pub fn primary(&self) -> Option<&dyn LLMProvider> {
        self.providers.first().map(|p| p.as_ref())
    }

    /// Provider kinds in the order they are tried.
    pub fn chain(&self) -> Vec<ProviderKind> {
        self.providers.iter().map(|p| p.kind()).collect()
    }

    /// Whether calls to `kind` are currently being skipped.
    pub fn is_open(&self, kind: ProviderKind) -> bool {
        let Ok(circuits) = self.circuits.lock() else {
            return false;
        };
        circuits
            .get(&kind)
            .and_then(|c| c.opened_at)
            .is_some_and(|opened| opened.elapsed() < self.policy.cooldown)
    }

    /// Ask each provider in turn. Returns the last error when all of them fail.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        let mut last_error = None;

        for provider in &self.providers {
            let kind = provider.kind();
            if self.is_open(kind) {
                debug!("Skipping {}: circuit open", kind);
                last_error = Some(ProviderError::CircuitOpen(kind));
                continue;
            }

            match self.call_with_retry(provider.as_ref(), request).await {
                Ok(completion) => {
                    self.record_success(kind);
                    return Ok(completion);
                }
                Err(e) => {
                    warn!("Provider {} failed: {}", kind, e);
                    self.record_failure(kind);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ProviderError::NotConfigured(
                ProviderKind::Ollama,
                "no provider is available".to_string(),
            )
        }))
    }

    async fn call_with_retry(
        &self,
        provider: &dyn LLMProvider,
        request: &CompletionRequest,
    ) -> Result<Completion, ProviderError> {
        let attempts = self.policy.max_retries + 1;
        let mut attempt = 0;

        loop {
            match provider.complete(request).await {
                Ok(completion) => return Ok(completion),
                Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                    let delay = self.policy.delay(attempt);
                    warn!(
                        "{} request failed (attempt {}/{}), retrying in {:?}: {}",
                        provider.kind(),
                        attempt + 1,
                        attempts,
                        delay,
                        e
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn record_success(&self, kind: ProviderKind) {
        if let Ok(mut circuits) = self.circuits.lock() {
            let circuit = circuits.entry(kind).or_default();
            if circuit.opened_at.is_some() {
                info!("Provider {} recovered, closing circuit", kind);
            }
            *circuit = Circuit::default();
        }
    }

    fn record_failure(&self, kind: ProviderKind) {
        if let Ok(mut circuits) = self.circuits.lock() {
            let circuit = circuits.entry(kind).or_default();
            circuit.consecutive_failures += 1;
            if circuit.consecutive_failures >= self.policy.failure_threshold {
                warn!(
                    "Provider {} failed {} times in a row, pausing it for {:?}",
                    kind, circuit.consecutive_failures, self.policy.cooldown
                );
                circuit.opened_at = Some(Instant::now());
            }
        }
    }
}
