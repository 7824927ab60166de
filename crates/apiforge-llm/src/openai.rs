//! OpenAI-compatible chat and embeddings backend.
//!
//! Works against any server exposing `/chat/completions` and `/embeddings`
//! under a configurable base URL.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{LlmProvider, Message};
use crate::retry::send_with_retry;

const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    embedding_model: Option<String>,
    max_retries: u32,
}

impl fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiProvider {
    #[must_use]
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        embedding_model: Option<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_owned(),
            model,
            embedding_model,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

impl LlmProvider for OpenAiProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages,
        };

        let response = send_with_retry(self.name(), self.max_retries, || {
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
        })
        .await?;

        let response = response.error_for_status()?;
        let parsed: ChatResponse = response.json().await?;

        let Some(choice) = parsed.choices.into_iter().next() else {
            return Err(LlmError::EmptyResponse {
                provider: self.name().to_owned(),
            });
        };

        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(LlmError::ContentFiltered);
        }

        match choice.message.content {
            Some(content) if !content.is_empty() => Ok(content),
            _ => Err(LlmError::EmptyResponse {
                provider: self.name().to_owned(),
            }),
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let Some(ref model) = self.embedding_model else {
            return Err(LlmError::EmbedUnsupported {
                provider: self.name().to_owned(),
            });
        };

        let url = format!("{}/embeddings", self.base_url);
        let body = EmbeddingRequest { model, input: text };

        let response = send_with_retry(self.name(), self.max_retries, || {
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
        })
        .await?;

        let response = response.error_for_status()?;
        let parsed: EmbeddingResponse = response.json().await?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| LlmError::EmptyResponse {
                provider: self.name().to_owned(),
            })
    }

    fn supports_embeddings(&self) -> bool {
        self.embedding_model.is_some()
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Role;

    fn test_provider() -> OpenAiProvider {
        OpenAiProvider::new(
            "key".into(),
            "https://api.openai.com/v1".into(),
            "gpt-4o-mini".into(),
            None,
        )
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let p = OpenAiProvider::new("k".into(), "http://localhost:8080/v1/".into(), "m".into(), None);
        assert_eq!(p.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn supports_embeddings_without_model() {
        assert!(!test_provider().supports_embeddings());
    }

    #[test]
    fn supports_embeddings_with_model() {
        let p = OpenAiProvider::new(
            "k".into(),
            "http://localhost".into(),
            "m".into(),
            Some("text-embedding-3-small".into()),
        );
        assert!(p.supports_embeddings());
    }

    #[test]
    fn debug_omits_api_key() {
        let debug = format!("{:?}", test_provider());
        assert!(debug.contains("OpenAiProvider"));
        assert!(!debug.contains("key\""));
    }

    #[tokio::test]
    async fn chat_unreachable_errors() {
        let p = OpenAiProvider::new("k".into(), "http://127.0.0.1:1".into(), "m".into(), None);
        let msgs = vec![Message::new(Role::User, "hello")];
        assert!(p.chat(&msgs).await.is_err());
    }

    #[tokio::test]
    async fn embed_without_model_errors() {
        let result = test_provider().embed("test").await;
        assert!(matches!(result, Err(LlmError::EmbedUnsupported { .. })));
    }

    #[test]
    fn chat_response_parses() {
        let json = r#"{"choices":[{"message":{"content":"hi"},"finish_reason":"stop"}]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("hi"));
    }

    #[test]
    fn embedding_response_parses() {
        let json = r#"{"data":[{"embedding":[0.1,0.2]}]}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.data[0].embedding.len(), 2);
    }
}
