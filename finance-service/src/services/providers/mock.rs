//! Mock text provider for testing and for running without an API key.

use super::{GenerationParams, ProviderError, TextProvider, TextResponse};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

enum Behaviour {
    Reply(Option<String>),
    Fail,
}

pub struct MockTextProvider {
    behaviour: Behaviour,
    calls: AtomicU64,
}

impl MockTextProvider {
    /// Answers every prompt with `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            behaviour: Behaviour::Reply(Some(text.into())),
            calls: AtomicU64::new(0),
        }
    }

    /// Answers every prompt with an empty candidate.
    pub fn silent() -> Self {
        Self {
            behaviour: Behaviour::Reply(None),
            calls: AtomicU64::new(0),
        }
    }

    /// Fails every prompt as an upstream API error.
    pub fn failing() -> Self {
        Self {
            behaviour: Behaviour::Fail,
            calls: AtomicU64::new(0),
        }
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    async fn generate(
        &self,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<TextResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.behaviour {
            Behaviour::Reply(text) => Ok(TextResponse {
                text: text.clone(),
                input_tokens: prompt.len() as i32 / 4,
                output_tokens: text.as_ref().map_or(0, |t| t.len() as i32 / 4),
            }),
            Behaviour::Fail => Err(ProviderError::ApiError(
                "[MOCK] text generation failed".to_string(),
            )),
        }
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}
