//! LLM supervisor router
//!
//! Asks the chat model for the next specialist label. One re-ask on an
//! unrecognised reply, then FINISH.

use super::{parse_route_label, Router};
use crate::llm::ChatModel;
use crate::models::{ConversationState, RouteTarget, RoutingDecision, WorkerId, FINISH_LABEL};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct LlmRouter {
    model: Arc<dyn ChatModel>,
}

impl LlmRouter {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    pub fn build_prompt(workers: &[WorkerId]) -> String {
        let specialists: Vec<String> = workers
            .iter()
            .map(|w| format!("- {}: {}", w.label(), w.description()))
            .collect();

        format!(
            "You are a financial assistant supervisor. Your job is to understand the user's financial query \
and route it to the correct specialist agent.
The available specialists and their functions are:
{}

Based on the user's request and the conversation history, choose the single next specialist agent to act.
If the query has been fully answered by previous agents or cannot be answered by any specialist, respond with '{}'.
Respond ONLY with the name of the next specialist agent ({}) or '{}'. Do not add any other explanation.",
            specialists.join("\n"),
            FINISH_LABEL,
            option_list(workers),
            FINISH_LABEL,
        )
    }

    fn build_reask_prompt(workers: &[WorkerId], previous: &str) -> String {
        format!(
            "{}\n\nYour previous reply '{}' is not a valid option. Valid options are: {}, {}. Reply with exactly one of them.",
            Self::build_prompt(workers),
            previous.trim(),
            option_list(workers),
            FINISH_LABEL,
        )
    }

    async fn ask(&self, prompt: &str, state: &ConversationState) -> Option<String> {
        match self.model.complete(prompt, state.messages()).await {
            Ok(reply) => Some(reply),
            Err(e) => {
                warn!(error = %e, "Routing model call failed, finishing");
                None
            }
        }
    }
}

fn option_list(workers: &[WorkerId]) -> String {
    workers
        .iter()
        .map(|w| w.label())
        .collect::<Vec<_>>()
        .join(", ")
}

fn decision_for(target: RouteTarget) -> RoutingDecision {
    match target {
        RouteTarget::Worker(worker) => RoutingDecision::worker(worker),
        RouteTarget::Finish => RoutingDecision::finish(),
    }
}

#[async_trait]
impl Router for LlmRouter {
    async fn route(&self, state: &ConversationState, workers: &[WorkerId]) -> RoutingDecision {
        let prompt = Self::build_prompt(workers);

        let Some(first) = self.ask(&prompt, state).await else {
            return RoutingDecision::finish();
        };
        debug!(raw = %first, "Supervisor reply");

        if let Some(target) = parse_route_label(&first, workers) {
            return decision_for(target);
        }

        info!(raw = %first, "Unrecognised routing label, asking again");

        let reask = Self::build_reask_prompt(workers, &first);
        let Some(second) = self.ask(&reask, state).await else {
            return RoutingDecision::finish();
        };

        match parse_route_label(&second, workers) {
            Some(target) => decision_for(target),
            None => {
                warn!(raw = %second, "Unrecognised routing label after re-ask, finishing");
                RoutingDecision::finish()
            }
        }
    }
}
