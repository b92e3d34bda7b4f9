//! Text provider collaborator.
//!
//! Generates the text a session types from a prompt. Providers are best
//! effort: callers fetch through `fetch_text`, which bounds the wait and
//! rejects empty output. Retrying is left to the caller.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use typist_core::error::{Result, TypistError};

#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Produce text for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Returns the same text for every prompt.
#[derive(Debug, Clone)]
pub struct StaticTextProvider {
    text: String,
}

impl StaticTextProvider {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl TextProvider for StaticTextProvider {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Ok(self.text.clone())
    }
}

/// Ask `provider` for text, giving up after `timeout`.
pub async fn fetch_text(
    provider: &dyn TextProvider,
    prompt: &str,
    timeout: Duration,
) -> Result<String> {
    if prompt.trim().is_empty() {
        return Err(TypistError::Validation("prompt must not be empty".into()));
    }

    let text = match tokio::time::timeout(timeout, provider.generate(prompt)).await {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!("Text provider failed: {}", e);
            return Err(match e {
                TypistError::Provider(_) => e,
                other => TypistError::Provider(other.to_string()),
            });
        }
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs(), "Text provider timed out");
            return Err(TypistError::Provider(format!(
                "no text within {}s",
                timeout.as_secs()
            )));
        }
    };

    if text.is_empty() {
        return Err(TypistError::Provider("provider returned empty text".into()));
    }
    info!(chars = text.chars().count(), "Text provider returned text");
    Ok(text)
}
