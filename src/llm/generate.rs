use async_trait::async_trait;

use super::chat::{self, ChatMessage};
use super::retry::{with_retry, RetryPolicy};
use super::Generator;
use crate::config::LlmConfig;
use crate::error::CapabilityError;

const CAPABILITY: &str = "generation";

/// Answer generation through the configured chat model.
pub struct ChatGenerator {
    client: reqwest::Client,
    config: LlmConfig,
    retry: RetryPolicy,
}

impl ChatGenerator {
    pub fn new(client: reqwest::Client, config: LlmConfig, retry: RetryPolicy) -> Self {
        Self {
            client,
            config,
            retry,
        }
    }
}

#[async_trait]
impl Generator for ChatGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, CapabilityError> {
        let messages = [ChatMessage::user(prompt)];
        let reply = with_retry(&self.retry, CAPABILITY, || {
            chat::complete(
                &self.client,
                &self.config,
                CAPABILITY,
                &messages,
                self.config.temperature,
            )
        })
        .await?;

        if reply.trim().is_empty() {
            return Err(CapabilityError::permanent(CAPABILITY, "empty completion"));
        }
        Ok(reply)
    }
}
