//! Execution engine for planned tool calls
//!
//! Runs calls in order against one worker's registry. LLM is NOT allowed
//! here. Every call yields exactly one observation; failures are recorded
//! as `[{"Error": ...}]` data and never stop the remaining calls.

use crate::models::{error_sequence, ExecutionStatus, Observation, ToolInput};
use crate::planner::MAX_CALLS_PER_TURN;
use crate::tools::ToolRegistry;
use chrono::Utc;
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

pub struct ExecutionEngine {
    tool_registry: ToolRegistry,
}

impl ExecutionEngine {
    pub fn new(tool_registry: ToolRegistry) -> Self {
        Self { tool_registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.tool_registry
    }

    /// Execute calls in order; extra calls past the per-turn cap are skipped
    pub async fn execute_calls(&self, calls: &[ToolInput]) -> Vec<Observation> {
        let mut observations = Vec::with_capacity(calls.len());

        for (idx, call) in calls.iter().enumerate() {
            if idx >= MAX_CALLS_PER_TURN {
                warn!(
                    tool_name = %call.tool_name,
                    "Skipping call beyond per-turn limit"
                );
                observations.push(observation(
                    call,
                    error_sequence("Call limit exceeded for this turn."),
                    0,
                    ExecutionStatus::Skipped,
                ));
                continue;
            }

            debug!(step = idx + 1, tool_name = %call.tool_name, "Executing tool call");

            let start = Instant::now();

            let (tool_output, status) = match self.tool_registry.get(&call.tool_name) {
                Some(tool) => match tool.execute(call).await {
                    Ok(output) if output.success => (output.data, ExecutionStatus::Success),
                    Ok(output) => {
                        debug!(
                            tool_name = %call.tool_name,
                            error = ?output.error,
                            "Tool returned error data"
                        );
                        (output.data, ExecutionStatus::Failed)
                    }
                    Err(e) => {
                        warn!(tool_name = %call.tool_name, error = %e, "Tool execution failed");
                        (error_sequence(&e.to_string()), ExecutionStatus::Failed)
                    }
                },
                None => {
                    warn!(tool_name = %call.tool_name, "Tool not registered");
                    (
                        error_sequence(&format!("Tool '{}' is not available.", call.tool_name)),
                        ExecutionStatus::Skipped,
                    )
                }
            };

            let execution_time_ms = start.elapsed().as_millis() as u64;
            observations.push(observation(call, tool_output, execution_time_ms, status));
        }

        debug!(observation_count = observations.len(), "Tool calls completed");

        observations
    }
}

fn observation(
    call: &ToolInput,
    tool_output: serde_json::Value,
    execution_time_ms: u64,
    status: ExecutionStatus,
) -> Observation {
    Observation {
        observation_id: Uuid::new_v4(),
        tool_name: call.tool_name.clone(),
        tool_input: call.parameters.clone(),
        tool_output,
        execution_time_ms,
        created_at: Utc::now(),
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::sample_context;
    use crate::models::{error_message, WorkerId};
    use crate::tools::create_worker_registry;
    use serde_json::json;
    use std::sync::Arc;

    fn engine(worker: WorkerId) -> ExecutionEngine {
        ExecutionEngine::new(create_worker_registry(worker, Arc::new(sample_context())))
    }

    #[tokio::test]
    async fn test_execution_engine() {
        let observations = engine(WorkerId::Account)
            .execute_calls(&[ToolInput::new(
                "get_account_balance",
                json!({"account_no": "A1"}),
            )])
            .await;

        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].status, ExecutionStatus::Success);
        assert_eq!(observations[0].tool_output[0]["AvailableBalance"], json!(15250.75));
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_later_calls() {
        let observations = engine(WorkerId::Account)
            .execute_calls(&[
                ToolInput::new("get_card_details", json!({})),
                ToolInput::new("get_account_balance", json!({})),
                ToolInput::new("get_account_summary", json!({})),
            ])
            .await;

        assert_eq!(observations.len(), 3);

        // Tool from another worker's registry
        assert_eq!(observations[0].status, ExecutionStatus::Skipped);
        assert_eq!(
            error_message(&observations[0].tool_output),
            Some("Tool 'get_card_details' is not available.")
        );

        // Missing required argument
        assert_eq!(observations[1].status, ExecutionStatus::Failed);
        assert!(error_message(&observations[1].tool_output).is_some());

        assert_eq!(observations[2].status, ExecutionStatus::Success);
    }

    #[tokio::test]
    async fn test_calls_beyond_limit_are_skipped() {
        let calls: Vec<ToolInput> = (0..MAX_CALLS_PER_TURN + 2)
            .map(|_| ToolInput::new("get_account_summary", json!({})))
            .collect();

        let observations = engine(WorkerId::Account).execute_calls(&calls).await;

        assert_eq!(observations.len(), calls.len());
        assert!(observations[..MAX_CALLS_PER_TURN]
            .iter()
            .all(|o| o.status == ExecutionStatus::Success));
        assert_eq!(
            observations[MAX_CALLS_PER_TURN].status,
            ExecutionStatus::Skipped
        );
    }

    #[tokio::test]
    async fn test_identical_lookups_are_identical() {
        let engine = engine(WorkerId::Transaction);
        let call = ToolInput::new("get_transaction_details", json!({"transaction_id": "NOPE"}));

        let first = engine.execute_calls(std::slice::from_ref(&call)).await;
        let second = engine.execute_calls(std::slice::from_ref(&call)).await;

        assert_eq!(first[0].tool_output, second[0].tool_output);
        assert_eq!(first[0].tool_output, json!([{ "Error": "Transaction not found" }]));
    }
}
