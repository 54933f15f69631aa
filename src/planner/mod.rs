//! Tool planner trait and implementations
//!
//! A planner picks which of a worker's lookups to run for the current turn
//! and fills in their arguments. It never executes anything.

use crate::models::{ConversationState, ToolInput, WorkerId};
use crate::tools::ToolSpec;
use crate::Result;
use async_trait::async_trait;

pub mod keyword;
pub mod llm;

pub use keyword::KeywordToolPlanner;
pub use llm::LlmToolPlanner;

/// Upper bound on lookups planned for one worker execution
pub const MAX_CALLS_PER_TURN: usize = 5;

/// Lookups chosen for one worker execution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolPlan {
    pub calls: Vec<ToolInput>,
    /// Reply for the user when no lookup can run yet, e.g. a missing account number
    pub clarification: Option<String>,
}

impl ToolPlan {
    pub fn calls(calls: Vec<ToolInput>) -> Self {
        Self {
            calls,
            clarification: None,
        }
    }

    pub fn clarification(text: impl Into<String>) -> Self {
        Self {
            calls: Vec::new(),
            clarification: Some(text.into()),
        }
    }
}

/// Trait for tool-call planning
#[async_trait]
pub trait ToolPlanner: Send + Sync {
    async fn plan(
        &self,
        worker: WorkerId,
        state: &ConversationState,
        tools: &[ToolSpec],
    ) -> Result<ToolPlan>;
}
