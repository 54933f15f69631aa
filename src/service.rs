//! Chat service: one dispatch run per user turn on a persistent thread

use crate::config::AppConfig;
use crate::data::DataContext;
use crate::dispatch::Dispatcher;
use crate::error::OrchestrationError;
use crate::knowledge::FaqKnowledgeBase;
use crate::llm::{ChatModel, OpenAiChatClient};
use crate::models::{ConversationState, Message, Termination, WorkerId};
use crate::planner::{KeywordToolPlanner, LlmToolPlanner, ToolPlanner};
use crate::router::{KeywordRouter, LlmRouter, Router, CLARIFICATION_MESSAGE};
use crate::session::{InMemorySessionStore, SessionStore};
use crate::worker::create_workers;
use crate::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResponse {
    pub thread_id: Uuid,
    pub answer: String,
    pub workers: Vec<WorkerId>,
    pub termination: Termination,
    pub iterations: usize,
}

pub struct ChatService {
    dispatcher: Dispatcher,
    sessions: Arc<dyn SessionStore>,
    history_window: usize,
}

impl ChatService {
    pub fn new(
        dispatcher: Dispatcher,
        sessions: Arc<dyn SessionStore>,
        history_window: usize,
    ) -> Self {
        Self {
            dispatcher,
            sessions,
            history_window,
        }
    }

    pub async fn handle_turn(&self, thread_id: Uuid, utterance: &str) -> Result<TurnResponse> {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return Err(OrchestrationError::InvalidInput(
                "message must not be empty".to_string(),
            ));
        }

        let history = self.sessions.load(thread_id, self.history_window).await?;
        let prior = history.len();

        info!(thread_id = %thread_id, history = prior, "Handling chat turn");

        let mut state = ConversationState::from_history(history);
        state.push(Message::user(utterance));

        let outcome = self.dispatcher.run(state).await;

        let answer = outcome
            .final_answer()
            .unwrap_or(CLARIFICATION_MESSAGE)
            .to_string();

        let new_messages = outcome.state.messages()[prior..].to_vec();
        self.sessions.append(thread_id, new_messages).await?;

        Ok(TurnResponse {
            thread_id,
            answer,
            workers: outcome.workers_invoked,
            termination: outcome.termination,
            iterations: outcome.iterations,
        })
    }

    pub async fn history(&self, thread_id: Uuid) -> Result<Option<Vec<Message>>> {
        self.sessions.get(thread_id).await
    }

    pub async fn reset(&self, thread_id: Uuid) -> Result<bool> {
        self.sessions.delete(thread_id).await
    }
}

/// Wire everything from configuration: LLM router and planner when an API
/// key is configured, keyword ones otherwise
pub fn build_chat_service(config: &AppConfig) -> Result<ChatService> {
    let data = Arc::new(DataContext::load(&config.mock_data_dir));

    let (router, planner, responder): (
        Arc<dyn Router>,
        Arc<dyn ToolPlanner>,
        Option<Arc<dyn ChatModel>>,
    ) = match &config.llm {
        Some(llm) => {
            let model: Arc<dyn ChatModel> = Arc::new(OpenAiChatClient::new(llm)?);
            info!(model = %llm.model, "Using LLM router, planner and replies");
            (
                Arc::new(LlmRouter::new(model.clone())),
                Arc::new(LlmToolPlanner::new(model.clone())),
                Some(model),
            )
        }
        None => {
            info!("No LLM configured, using keyword router and planner");
            (
                Arc::new(KeywordRouter::new()),
                Arc::new(KeywordToolPlanner::new()),
                None,
            )
        }
    };

    let mut dispatcher = Dispatcher::new(
        router,
        create_workers(data, planner, responder),
        config.max_dispatch_iterations,
    )?;

    if let Some(path) = &config.knowledge_base_file {
        match FaqKnowledgeBase::load(path) {
            Ok(kb) => dispatcher = dispatcher.with_knowledge_base(Arc::new(kb)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Knowledge base unavailable")
            }
        }
    }

    Ok(ChatService::new(
        dispatcher,
        Arc::new(InMemorySessionStore::new()),
        config.history_window,
    ))
}

pub fn stable_uuid_from_string(input: &str) -> Uuid {
    let hash = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    Uuid::from_bytes(bytes)
}

/// Client thread id to UUID; a missing id starts a new thread
pub fn parse_or_stable_uuid(value: Option<&str>) -> Uuid {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Uuid::parse_str(v).unwrap_or_else(|_| stable_uuid_from_string(v)),
        _ => Uuid::new_v4(),
    }
}
