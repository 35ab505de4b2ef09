mod openai;

pub use openai::OpenAIChat;

use crate::config::Config;
use crate::error::CompletionError;
use crate::types::PromptMessage;
use anyhow::Result;
use std::sync::Arc;

/// Trait for chat completion (the language model boundary)
pub trait CompletionProvider: Send + Sync {
    /// Send the conversation and return the assistant's reply text
    fn complete(&self, messages: &[PromptMessage]) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Build the OpenAI chat provider from `[chat]` and `[openai]`
pub fn create_provider(config: &Config) -> Result<Arc<dyn CompletionProvider>> {
    let api_key = config
        .openai
        .api_key
        .clone()
        .ok_or(CompletionError::NotConfigured)?;

    Ok(Arc::new(OpenAIChat::new(
        &config.chat.model,
        api_key,
        &config.chat.api_base_url,
        config.chat.timeout_secs,
        config.chat.max_retries,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key() {
        let mut config = Config::default();
        config.openai.api_key = None;
        let err = create_provider(&config).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<CompletionError>(),
            Some(CompletionError::NotConfigured)
        ));
    }

    #[test]
    fn test_uses_chat_model() {
        let mut config = Config::default();
        config.openai.api_key = Some("sk-test".to_string());
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "gpt-4-turbo-preview");
    }
}
