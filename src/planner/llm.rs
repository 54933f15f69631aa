//! LLM-backed tool planner
//!
//! Asks the chat model for a JSON list of tool calls. Tool names are not
//! validated here; the execution engine reports unknown tools as errors.

use super::{ToolPlan, ToolPlanner, MAX_CALLS_PER_TURN};
use crate::error::OrchestrationError;
use crate::llm::{strip_code_fence, ChatModel};
use crate::models::{ConversationState, ToolInput, WorkerId};
use crate::tools::ToolSpec;
use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub struct LlmToolPlanner {
    model: Arc<dyn ChatModel>,
}

impl LlmToolPlanner {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    fn build_prompt(worker: WorkerId, tools: &[ToolSpec]) -> String {
        let tool_lines: Vec<String> = tools
            .iter()
            .map(|t| format!("- {}: {} | arguments: {}", t.name, t.description, t.parameters))
            .collect();

        format!(
            r#"You are the {} of a banking assistant. {}

Decide which data lookups answer the user's latest request.

Available tools:
{}

Rules:
- Use only the tools listed above
- At most {} calls
- Exchange rates are QAR per one unit of the foreign currency
- Return ONLY valid JSON, no explanation text
- If essential information is missing (e.g. an account number for a balance check),
  reply instead with one sentence stating exactly what is required
- JSON format:

{{
  "calls": [
    {{ "tool_name": "<tool>", "arguments": {{ ... }} }}
  ]
}}
"#,
            worker.label(),
            worker.description(),
            tool_lines.join("\n"),
            MAX_CALLS_PER_TURN,
        )
    }
}

#[derive(Debug, Deserialize)]
struct PlannedCalls {
    #[serde(default)]
    calls: Vec<PlannedCall>,
}

#[derive(Debug, Deserialize)]
struct PlannedCall {
    tool_name: String,
    #[serde(default, alias = "tool_input", alias = "parameters")]
    arguments: Value,
}

/// Parse the model's reply into at most [`MAX_CALLS_PER_TURN`] calls.
///
/// A plain-text reply is the model asking for missing information and
/// becomes the plan's clarification. Broken JSON is a planning error.
pub fn parse_plan_response(response: &str) -> Result<ToolPlan> {
    let cleaned = strip_code_fence(response);

    if cleaned.is_empty() {
        return Err(OrchestrationError::PlanningError(
            "Empty tool plan".to_string(),
        ));
    }

    if !cleaned.starts_with('{') && !cleaned.starts_with('[') {
        return Ok(ToolPlan::clarification(cleaned));
    }

    let parsed: PlannedCalls = serde_json::from_str(cleaned).map_err(|e| {
        debug!(raw = %response, "Unparseable tool plan");
        OrchestrationError::PlanningError(format!("Failed to parse tool plan: {}", e))
    })?;

    Ok(ToolPlan::calls(
        parsed
            .calls
            .into_iter()
            .take(MAX_CALLS_PER_TURN)
            .map(|call| {
                let arguments = if call.arguments.is_null() {
                    Value::Object(Default::default())
                } else {
                    call.arguments
                };
                ToolInput::new(call.tool_name, arguments)
            })
            .collect(),
    ))
}

#[async_trait]
impl ToolPlanner for LlmToolPlanner {
    async fn plan(
        &self,
        worker: WorkerId,
        state: &ConversationState,
        tools: &[ToolSpec],
    ) -> Result<ToolPlan> {
        let prompt = Self::build_prompt(worker, tools);
        let response = self.model.complete(&prompt, state.messages()).await?;

        let plan = parse_plan_response(&response)?;
        debug!(
            worker = %worker,
            call_count = plan.calls.len(),
            clarification = plan.clarification.is_some(),
            "LLM plan parsed"
        );

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::sample_context;
    use crate::llm::testing::ScriptedChatModel;
    use crate::models::Message;
    use crate::tools::create_worker_registry;
    use serde_json::json;

    #[test]
    fn test_parse_fenced_response() {
        let calls = parse_plan_response(
            "```json\n{\"calls\":[{\"tool_name\":\"get_account_balance\",\"arguments\":{\"account_no\":\"A1\"}}]}\n```",
        )
        .unwrap();

        assert_eq!(
            calls,
            ToolPlan::calls(vec![ToolInput::new(
                "get_account_balance",
                json!({"account_no": "A1"})
            )])
        );
    }

    #[test]
    fn test_parse_caps_call_count() {
        let many: Vec<Value> = (0..8)
            .map(|_| json!({"tool_name": "get_account_summary"}))
            .collect();
        let response = json!({ "calls": many }).to_string();

        let plan = parse_plan_response(&response).unwrap();
        assert_eq!(plan.calls.len(), MAX_CALLS_PER_TURN);
        assert_eq!(plan.calls[0].parameters, json!({}));
    }

    #[test]
    fn test_prose_reply_is_clarification() {
        let plan =
            parse_plan_response("Which account number would you like the balance for?").unwrap();

        assert!(plan.calls.is_empty());
        assert_eq!(
            plan.clarification.as_deref(),
            Some("Which account number would you like the balance for?")
        );
    }

    #[test]
    fn test_broken_json_is_error_without_raw_text() {
        let err = parse_plan_response(r#"{"calls": [{"tool_name": "#).unwrap_err();

        assert!(matches!(err, OrchestrationError::PlanningError(_)));
        assert!(!err.to_string().contains("raw="));
        assert!(!err.to_string().contains("tool_name"));
    }

    #[tokio::test]
    async fn test_prompt_lists_worker_tools() {
        let model = Arc::new(ScriptedChatModel::new(vec![r#"{"calls": []}"#]));
        let planner = LlmToolPlanner::new(model.clone());
        let registry = create_worker_registry(WorkerId::Card, Arc::new(sample_context()));

        let mut state = ConversationState::new();
        state.push(Message::user("card details please"));

        let plan = planner
            .plan(WorkerId::Card, &state, &registry.specs())
            .await
            .unwrap();

        assert_eq!(plan, ToolPlan::default());
        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].contains("get_card_details"));
        assert!(prompts[0].contains("card_agent"));
    }
}
