//! Deterministic stand-ins for the embedding and completion collaborators.

use crate::completion::CompletionProvider;
use crate::embedding::EmbeddingProvider;
use crate::types::PromptMessage;
use anyhow::{Result, anyhow, bail};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Bag-of-words embedder: every lowercase word of at least `min_word_len`
/// characters is hashed into one of `dimension` buckets and the vector is
/// L2-normalized
pub struct KeywordEmbedder {
    dimension: usize,
    min_word_len: usize,
    calls: AtomicUsize,
    texts_embedded: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self::with_dimension(64)
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            min_word_len: 1,
            calls: AtomicUsize::new(0),
            texts_embedded: AtomicUsize::new(0),
        }
    }

    /// Ignore words shorter than `len`, which keeps stop words like "is"
    /// and "of" from dominating short documents
    pub fn with_min_word_len(mut self, len: usize) -> Self {
        self.min_word_len = len.max(1);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn texts_embedded(&self) -> usize {
        self.texts_embedded.load(Ordering::SeqCst)
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for word in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|w| w.chars().count() >= self.min_word_len)
        {
            // FNV-1a
            let mut hash: u64 = 0xcbf29ce484222325;
            for byte in word.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(0x100000001b3);
            }
            vector[(hash % self.dimension as u64) as usize] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

impl Default for KeywordEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingProvider for KeywordEmbedder {
    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "keyword-hash"
    }
}

/// Completion provider that replays queued replies and records every prompt
#[derive(Default)]
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<Vec<PromptMessage>>>,
}

impl ScriptedCompletion {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<Vec<PromptMessage>> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl CompletionProvider for ScriptedCompletion {
    fn complete(&self, messages: &[PromptMessage]) -> Result<String> {
        self.prompts
            .lock()
            .map_err(|e| anyhow!("prompt log poisoned: {}", e))?
            .push(messages.to_vec());
        let reply = self
            .replies
            .lock()
            .map_err(|e| anyhow!("reply queue poisoned: {}", e))?
            .pop_front();
        match reply {
            Some(reply) => Ok(reply),
            None => bail!("no scripted reply left"),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_word_len_drops_short_words() {
        let embedder = KeywordEmbedder::with_dimension(128).with_min_word_len(3);
        assert_eq!(
            embedder.embed_one("is a of revenue"),
            embedder.embed_one("revenue")
        );
        assert_ne!(
            KeywordEmbedder::with_dimension(128).embed_one("is a of revenue"),
            embedder.embed_one("revenue")
        );
    }

    #[test]
    fn test_embeddings_are_normalized() {
        let vector = KeywordEmbedder::new().embed_one("daily revenue by customer");
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert!(KeywordEmbedder::new().embed_one("").iter().all(|v| *v == 0.0));
    }
}
