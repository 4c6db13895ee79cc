use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// Anything that turns a prompt into answer text.
#[async_trait]
pub trait AnswerModel: Send + Sync {
    async fn generate(&self, messages: &[Message]) -> Result<String>;
}

/// Sampling settings for legal answers: low temperature, bounded length.
#[derive(Debug, Clone, Copy)]
pub struct Generation {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for Generation {
    fn default() -> Self {
        Self {
            max_tokens: 2000,
            temperature: 0.3,
            top_p: 0.9,
        }
    }
}

pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    generation: Generation,
}

impl LlmClient {
    pub fn new(base_url: String, model: String, api_key: Option<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            model,
            api_key: api_key.filter(|k| !k.is_empty()),
            generation: Generation::default(),
        })
    }

    pub fn from_env() -> Result<Self> {
        let base_url = dotenv::var("LLM_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:1234/v1".to_string());
        let model = dotenv::var("LLM_MODEL").unwrap_or_else(|_| "qwen/qwen3-8b".to_string());
        let api_key = dotenv::var("LLM_API_KEY").ok();
        let timeout = dotenv::var("LLM_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(120);
        Self::new(base_url, model, api_key, timeout)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Resolve the chat completions endpoint from the base URL.
    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else if base.ends_with("/v1") {
            format!("{}/chat/completions", base)
        } else {
            format!("{}/v1/chat/completions", base)
        }
    }

    /// Non-streaming chat completion.
    pub async fn chat(&self, messages: &[Message]) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.generation.temperature,
            "top_p": self.generation.top_p,
            "max_tokens": self.generation.max_tokens,
        });

        let mut req = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let resp = req.send().await.context("LLM request failed")?;
        let status = resp.status();
        let text = resp.text().await.context("Failed to read LLM response")?;
        if !status.is_success() {
            bail!("LLM returned {}: {}", status, text.chars().take(300).collect::<String>());
        }
        parse_completion(&text)
    }
}

#[async_trait]
impl AnswerModel for LlmClient {
    async fn generate(&self, messages: &[Message]) -> Result<String> {
        let answer = self.chat(messages).await?;
        debug!(model = %self.model, chars = answer.chars().count(), "completion received");
        Ok(answer)
    }
}

/// Content of `choices[0].message.content`; a missing or blank completion
/// is an error so callers fall back to the apology.
pub fn parse_completion(body: &str) -> Result<String> {
    let json: serde_json::Value = serde_json::from_str(body).context("Failed to parse LLM JSON")?;
    let content = json["choices"]
        .get(0)
        .and_then(|c| c["message"]["content"].as_str())
        .unwrap_or("")
        .trim();
    if content.is_empty() {
        bail!("LLM returned an empty completion");
    }
    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> LlmClient {
        LlmClient::new(base.to_string(), "m".to_string(), Some(String::new()), 5).unwrap()
    }

    #[test]
    fn test_endpoint_resolution() {
        assert_eq!(client("http://h/v1").endpoint(), "http://h/v1/chat/completions");
        assert_eq!(client("http://h/").endpoint(), "http://h/v1/chat/completions");
        assert_eq!(
            client("http://h/v1/chat/completions").endpoint(),
            "http://h/v1/chat/completions"
        );
        assert!(client("http://h").api_key.is_none());
    }

    #[test]
    fn test_parse_completion() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":" Ответ "}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "Ответ");
        assert!(parse_completion(r#"{"choices":[{"message":{"content":null}}]}"#).is_err());
        assert!(parse_completion(r#"{"choices":[]}"#).is_err());
        assert!(parse_completion("not json").is_err());
    }
}
