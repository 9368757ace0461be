use std::time::Duration;
use thiserror::Error;

use super::ProviderKind;

/// Why a provider call failed.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{0} provider is not configured: {1}")]
    NotConfigured(ProviderKind, String),

    #[error("{provider} request timed out after {timeout:?}")]
    Timeout {
        provider: ProviderKind,
        timeout: Duration,
    },

    #[error("{provider} returned HTTP {status}: {body}")]
    Http {
        provider: ProviderKind,
        status: u16,
        body: String,
    },

    #[error("{provider} API error: {message}")]
    Api {
        provider: ProviderKind,
        message: String,
    },

    #[error("{0} returned an empty response")]
    EmptyResponse(ProviderKind),

    #[error("{provider} transport error: {source}")]
    Transport {
        provider: ProviderKind,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} sent an unexpected response: {message}")]
    InvalidResponse {
        provider: ProviderKind,
        message: String,
    },

    #[error("{0} is temporarily disabled after repeated failures")]
    CircuitOpen(ProviderKind),
}

impl ProviderError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Timeout { .. } | ProviderError::Transport { .. } => true,
            ProviderError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Classify a reqwest failure.
    pub fn from_reqwest(provider: ProviderKind, timeout: Duration, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout { provider, timeout }
        } else if err.is_decode() {
            ProviderError::InvalidResponse {
                provider,
                message: err.to_string(),
            }
        } else {
            ProviderError::Transport {
                provider,
                source: err,
            }
        }
    }
}
