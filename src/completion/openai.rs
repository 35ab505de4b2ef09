use super::CompletionProvider;
use crate::error::CompletionError;
use crate::http::{build_client, post_json_with_retry};
use crate::types::PromptMessage;
use anyhow::Result;

/// Chat provider backed by the OpenAI `/chat/completions` endpoint
pub struct OpenAIChat {
    url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
    max_retries: u32,
}

impl OpenAIChat {
    pub fn new(
        model: &str,
        api_key: String,
        api_base_url: &str,
        timeout_secs: u64,
        max_retries: u32,
    ) -> Self {
        Self {
            url: format!("{}/chat/completions", api_base_url.trim_end_matches('/')),
            api_key,
            model: model.to_string(),
            timeout_secs,
            max_retries,
        }
    }

    fn request_body(&self, messages: &[PromptMessage]) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": messages,
        })
    }
}

impl CompletionProvider for OpenAIChat {
    fn complete(&self, messages: &[PromptMessage]) -> Result<String> {
        tracing::debug!(
            "Requesting completion from {} ({} messages)",
            self.model,
            messages.len()
        );

        let client = build_client(self.timeout_secs)?;
        let json = post_json_with_retry(
            &client,
            &self.url,
            &self.api_key,
            &self.request_body(messages),
            self.max_retries,
        )
        .map_err(|e| CompletionError::RequestFailed(format!("{:#}", e)))?;

        Ok(parse_completion_response(&json)?)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Extract `choices[0].message.content`
fn parse_completion_response(json: &serde_json::Value) -> Result<String, CompletionError> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            CompletionError::InvalidResponse("response has no message content".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_uses_lowercase_roles() {
        let chat = OpenAIChat::new("gpt-4", "key".to_string(), "https://api.openai.com/v1", 5, 0);
        let body = chat.request_body(&[
            PromptMessage::system("be brief"),
            PromptMessage::user("what is orders?"),
        ]);

        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "what is orders?");
        assert_eq!(chat.url, "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_parse_response() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "orders holds one row per order"}}]
        });
        assert_eq!(
            parse_completion_response(&json).unwrap(),
            "orders holds one row per order"
        );
    }

    #[test]
    fn test_parse_response_without_choices() {
        let json = serde_json::json!({"choices": []});
        assert!(matches!(
            parse_completion_response(&json),
            Err(CompletionError::InvalidResponse(_))
        ));
    }
}
