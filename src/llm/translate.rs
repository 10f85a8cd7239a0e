//! Query translation through the chat model.

use async_trait::async_trait;

use super::chat::{self, ChatMessage};
use super::retry::{with_retry, RetryPolicy};
use super::Translator;
use crate::config::LlmConfig;
use crate::error::CapabilityError;

const CAPABILITY: &str = "translation";

/// Translate `text`, skipping the call when both languages are the same.
/// Output is trimmed and unwrapped; an empty translation is a permanent failure.
pub async fn translate(
    translator: &dyn Translator,
    text: &str,
    source_lang: &str,
    target_lang: &str,
) -> Result<String, CapabilityError> {
    if source_lang.eq_ignore_ascii_case(target_lang) {
        return Ok(text.to_string());
    }

    let translated = translator.translate(text, source_lang, target_lang).await?;
    let translated = clean_translation(&translated);
    if translated.is_empty() {
        return Err(CapabilityError::permanent(CAPABILITY, "empty translation"));
    }
    Ok(translated)
}

pub struct LlmTranslator {
    client: reqwest::Client,
    config: LlmConfig,
    retry: RetryPolicy,
}

impl LlmTranslator {
    pub fn new(client: reqwest::Client, config: LlmConfig, retry: RetryPolicy) -> Self {
        Self {
            client,
            config,
            retry,
        }
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, CapabilityError> {
        let messages = build_messages(text, source_lang, target_lang);
        with_retry(&self.retry, CAPABILITY, || {
            chat::complete(&self.client, &self.config, CAPABILITY, &messages, 0.0)
        })
        .await
    }
}

fn build_messages(text: &str, source_lang: &str, target_lang: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(format!(
            "You translate programming questions from language code '{source_lang}' to \
             language code '{target_lang}'. Keep code, identifiers and library names unchanged. \
             Respond with ONLY the translated text. No explanation, no quotes."
        )),
        ChatMessage::user(text),
    ]
}

/// Strip the wrapping a chat model tends to add around a bare translation.
fn clean_translation(reply: &str) -> String {
    let mut text = reply.trim();
    if let Some(rest) = text.strip_prefix("Translation:") {
        text = rest.trim();
    }
    for (open, close) in [('"', '"'), ('\'', '\''), ('“', '”'), ('`', '`')] {
        if text.len() > 1 && text.starts_with(open) && text.ends_with(close) {
            text = text[open.len_utf8()..text.len() - close.len_utf8()].trim();
        }
    }
    text.to_string()
}
