//! Groq API client (OpenAI-compatible chat completions)
//!
//! The single LLM seam for the whole crew. Uses a long-lived
//! reqwest::Client for connection pooling.

use crate::error::CrewError;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{error, info};

const GROQ_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const GROQ_MODEL: &str = "llama-3.3-70b-versatile";

/// Chat completion seam. Agents and the query checker tool only ever see
/// this trait, so tests can script replies without a network.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Complete a single system + user prompt pair into assistant text.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Reusable Groq client (connection-pooled)
pub struct GroqClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GroqClient {
    pub fn new(api_key: String) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(CrewError::HttpError)?;

        Ok(Self {
            client,
            api_key,
            base_url: GROQ_CHAT_URL.to_string(),
            model: GROQ_MODEL.to_string(),
        })
    }
}

#[async_trait]
impl ChatModel for GroqClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(CrewError::LlmError(
                "GROQ_API_KEY not configured".to_string(),
            ));
        }

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: 0.2,
            max_tokens: 1024,
        };

        info!(model = %self.model, "Calling Groq API");

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Groq API request failed: {}", e);
                CrewError::LlmError(format!("Groq API error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Groq API error response ({}): {}", status, error_text);
            return Err(CrewError::LlmError(format!(
                "Groq API returned {}: {}",
                status, error_text
            )));
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Groq response: {}", e);
            CrewError::LlmError(format!("Groq parse error: {}", e))
        })?;

        let answer = chat_response
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .ok_or_else(|| CrewError::LlmError("No choices in Groq response".to_string()))?;

        if let Some(usage) = &chat_response.usage {
            info!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Groq response received"
            );
        }

        Ok(answer)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// Scripted chat model for development & testing.
/// Replies are popped in order; every call is recorded for inspection.
pub struct MockChatModel {
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockChatModel {
    pub fn scripted<S: Into<String>>(replies: Vec<S>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// All (system, user) prompt pairs seen so far.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().expect("mock lock poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("mock lock poisoned").len()
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        self.calls
            .lock()
            .expect("mock lock poisoned")
            .push((system.to_string(), user.to_string()));

        let reply = self
            .replies
            .lock()
            .expect("mock lock poisoned")
            .pop_front()
            .unwrap_or_else(|| "mock reply".to_string());

        Ok(reply)
    }
}
