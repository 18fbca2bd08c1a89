//! The injected transport seam.
//!
//! The core never speaks a provider wire protocol itself; the surrounding
//! platform supplies a [`ModelTransport`] and the executor drives it.

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

use crate::catalog::ModelRef;

/// A model request, provider-neutral.
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub system_prompt: String,
    pub prompt: String,
    /// Additional context chunks (retrieved documents, code excerpts).
    pub context: Vec<String>,
    /// Upper bound on completion tokens, when the caller has one.
    pub max_output_tokens: Option<u32>,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_context(mut self, chunk: impl Into<String>) -> Self {
        self.context.push(chunk.into());
        self
    }
}

/// A completed model response.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
}

/// A failed transport call. Carries the upstream status code when the
/// transport saw one; classification turns this into retry-vs-abort policy.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// The injected async call to a provider.
#[async_trait]
pub trait ModelTransport: Send + Sync {
    async fn complete(
        &self,
        request: &LlmRequest,
        model: &ModelRef,
        credential: &SecretString,
    ) -> Result<LlmResponse, TransportError>;
}
