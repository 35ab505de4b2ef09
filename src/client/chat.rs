use super::DocsClient;
use crate::instructions::ANSWER_QUESTION_INSTRUCTIONS;
use crate::types::{ChatAnswer, PromptMessage};
use anyhow::{Context, Result};
use std::collections::HashSet;

/// A multi-turn conversation about the models in the vector index.
///
/// Each question pulls the closest models from the index. A model's document
/// is added to the conversation the first time it is matched and never again.
pub struct ChatSession {
    client: DocsClient,
    instructions: Vec<String>,
    /// Model documents and earlier turns, in the order they were added
    history: Vec<PromptMessage>,
    context_ids: HashSet<String>,
    limit: usize,
}

impl ChatSession {
    pub fn new(client: DocsClient) -> Self {
        let limit = client.config.search.limit;
        Self {
            client,
            instructions: vec![ANSWER_QUESTION_INSTRUCTIONS.to_string()],
            history: Vec::new(),
            context_ids: HashSet::new(),
            limit,
        }
    }

    /// Number of models retrieved per question
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn instructions(&self) -> &[String] {
        &self.instructions
    }

    /// Replace the system instructions used for every following question
    pub fn set_instructions(&mut self, instructions: Vec<String>) {
        self.instructions = instructions;
    }

    pub fn history(&self) -> &[PromptMessage] {
        &self.history
    }

    /// Ids of every model document already in the conversation
    pub fn context_models(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.context_ids.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Forget earlier turns and injected documents
    pub fn clear(&mut self) {
        self.history.clear();
        self.context_ids.clear();
    }

    /// Names of the models closest to `question`, nearest first, without
    /// calling the language model
    pub async fn closest_models(&self, question: &str) -> Result<Vec<String>> {
        let results = self.client.index.query(question, self.limit).await?;
        Ok(results.into_iter().map(|r| r.id).collect())
    }

    /// Ask a question and record the exchange in the session
    pub async fn ask(&mut self, question: &str) -> Result<ChatAnswer> {
        tracing::info!("Asking question: {}", question);
        let closest = self
            .client
            .index
            .query(question, self.limit)
            .await
            .context("Failed to find models for the question")?;

        let model_ids: Vec<String> = closest.iter().map(|r| r.id.clone()).collect();
        tracing::debug!("Closest models: {}", model_ids.join(", "));

        let mut context = Vec::new();
        let mut new_context = Vec::new();
        for result in closest {
            if self.context_ids.contains(&result.id) {
                continue;
            }
            context.push(PromptMessage::system(result.document));
            new_context.push(result.id);
        }

        let user_message = PromptMessage::user(question);
        let mut prompt: Vec<PromptMessage> = self
            .instructions
            .iter()
            .map(|instruction| PromptMessage::system(instruction.as_str()))
            .collect();
        prompt.extend(self.history.iter().cloned());
        prompt.extend(context.iter().cloned());
        prompt.push(user_message.clone());

        let answer = self
            .client
            .complete(prompt)
            .await
            .context("Failed to answer question")?;

        // Only commit the turn once the model has answered
        self.context_ids.extend(new_context.iter().cloned());
        self.history.extend(context);
        self.history.push(user_message);
        self.history.push(PromptMessage::assistant(answer.as_str()));

        Ok(ChatAnswer {
            answer,
            model_ids,
            new_context,
        })
    }
}
