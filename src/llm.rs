//! Chat-completions client used by the LLM router and planner
//!
//! Any OpenAI-compatible `/chat/completions` endpoint works. Uses a
//! long-lived reqwest::Client for connection pooling.

use crate::config::LlmConfig;
use crate::error::OrchestrationError;
use crate::models::{Message, MessageRole};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::time::Duration;
use tracing::{debug, error};

/// Seam between the orchestrator and the external model
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system_prompt: &str, messages: &[Message]) -> Result<String>;
}

/// Reusable chat-completions client (connection-pooled)
pub struct OpenAiChatClient {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl OpenAiChatClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(OrchestrationError::ConfigError(
                "OPENAI_API_KEY not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            endpoint: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatModel for OpenAiChatClient {
    async fn complete(&self, system_prompt: &str, messages: &[Message]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            temperature: 0.0,
            messages: build_request_messages(system_prompt, messages),
        };

        debug!(model = %self.model, message_count = request.messages.len(), "Calling chat model");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Chat model request failed: {}", e);
                OrchestrationError::LlmError(format!("Chat model request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Chat model error response ({}): {}", status, error_text);
            return Err(OrchestrationError::LlmError(format!(
                "Chat model returned {}: {}",
                status, error_text
            )));
        }

        let body: ChatResponse = response.json().await.map_err(|e| {
            OrchestrationError::LlmError(format!("Chat model parse error: {}", e))
        })?;

        extract_answer(body)
    }
}

fn build_request_messages<'a>(system_prompt: &'a str, messages: &'a [Message]) -> Vec<ChatMessage<'a>> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    out.push(ChatMessage {
        role: "system",
        content: system_prompt.into(),
    });

    for msg in messages {
        let (role, content): (&'static str, Cow<'a, str>) = match (msg.role, msg.worker) {
            (MessageRole::User, _) => ("user", msg.content.as_str().into()),
            (MessageRole::Assistant, _) => ("assistant", msg.content.as_str().into()),
            (MessageRole::System, _) => ("system", msg.content.as_str().into()),
            // Worker replies are shown to the model as tagged assistant turns.
            (MessageRole::Worker, Some(worker)) => {
                ("assistant", format!("[{}] {}", worker.label(), msg.content).into())
            }
            (MessageRole::Worker, None) => ("assistant", msg.content.as_str().into()),
        };
        out.push(ChatMessage { role, content });
    }

    out
}

fn extract_answer(body: ChatResponse) -> Result<String> {
    body.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| OrchestrationError::LlmError("Empty response from chat model".to_string()))
}

/// Strip a ```json fence around a model reply
pub fn strip_code_fence(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Cow<'a, str>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted model stubs shared by router, planner and dispatch tests

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned replies in order, then repeats the last one
    pub(crate) struct ScriptedChatModel {
        replies: Mutex<VecDeque<Result<String>>>,
        last: Mutex<Option<String>>,
        pub(crate) prompts: Mutex<Vec<String>>,
    }

    impl ScriptedChatModel {
        pub(crate) fn new(replies: Vec<&str>) -> Self {
            Self::with_results(replies.into_iter().map(|r| Ok(r.to_string())).collect())
        }

        pub(crate) fn with_results(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                last: Mutex::new(None),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedChatModel {
        async fn complete(&self, system_prompt: &str, _messages: &[Message]) -> Result<String> {
            self.prompts.lock().unwrap().push(system_prompt.to_string());

            let next = self.replies.lock().unwrap().pop_front();
            match next {
                Some(Ok(reply)) => {
                    *self.last.lock().unwrap() = Some(reply.clone());
                    Ok(reply)
                }
                Some(Err(e)) => Err(e),
                None => self
                    .last
                    .lock()
                    .unwrap()
                    .clone()
                    .ok_or_else(|| OrchestrationError::LlmError("script exhausted".to_string())),
            }
        }
    }
}
