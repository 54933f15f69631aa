//! Tool trait and registry
//!
//! Tools are deterministic data lookups over the read-only [`DataContext`].
//! A lookup miss is returned as data (`[{"Error": ...}]`), never as `Err`;
//! `Err` is reserved for malformed input.

pub mod account;
pub mod calculator;
pub mod card;
pub mod exchange;
pub mod transaction;

use crate::data::DataContext;
use crate::error::OrchestrationError;
use crate::models::{ToolInput, ToolOutput, WorkerId};
use crate::Result;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Trait for a single tool (deterministic execution)
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;

    /// Argument shape, shown to the LLM planner
    fn parameters(&self) -> Value;

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput>;
}

/// Name, description and argument shape of a registered tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// Tool registry for looking up and executing tools
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .values()
            .map(|tool| ToolSpec {
                name: tool.name(),
                description: tool.description(),
                parameters: tool.parameters(),
            })
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the fixed tool set owned by one worker.
pub fn create_worker_registry(worker: WorkerId, data: Arc<DataContext>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    match worker {
        WorkerId::Account => {
            registry.register(Arc::new(account::AccountSummaryTool::new(data.clone())));
            registry.register(Arc::new(account::AccountBalanceTool::new(data)));
        }
        WorkerId::Transaction => {
            registry.register(Arc::new(transaction::TransactionsTool::new(data.clone())));
            registry.register(Arc::new(transaction::TransactionDetailsTool::new(
                data.clone(),
            )));
            registry.register(Arc::new(transaction::CancelTransactionTool::new(
                data.clone(),
            )));
            registry.register(Arc::new(transaction::RaiseDisputeTool::new(data)));
        }
        WorkerId::Card => {
            registry.register(Arc::new(card::CardDetailsTool::new(data)));
        }
        WorkerId::ExchangeRate => {
            registry.register(Arc::new(exchange::ExchangeRatesTool::new(data.clone())));
            registry.register(Arc::new(exchange::ConvertCurrencyTool::new(data)));
            registry.register(Arc::new(calculator::BasicCalculatorTool));
        }
    }

    registry
}

// ===== Input helpers =====

pub(crate) fn ensure_object_parameters(input: &ToolInput) -> Result<()> {
    if input.parameters.is_object() || input.parameters.is_null() {
        Ok(())
    } else {
        Err(OrchestrationError::InvalidToolInput(format!(
            "{}: tool_input must be a JSON object",
            input.tool_name
        )))
    }
}

/// String argument; numbers are accepted and rendered as text.
pub(crate) fn optional_str(input: &ToolInput, key: &str) -> Option<String> {
    match input.parameters.get(key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn required_str(input: &ToolInput, key: &str) -> Result<String> {
    optional_str(input, key).ok_or_else(|| {
        OrchestrationError::InvalidToolInput(format!(
            "{}: expected '{}' in tool_input",
            input.tool_name, key
        ))
    })
}

/// Compare two JSON scalars as text
pub(crate) fn field_matches(record: &Value, field: &str, expected: &str) -> bool {
    match record.get(field) {
        Some(Value::String(s)) => s == expected,
        Some(Value::Number(n)) => n.to_string() == expected,
        _ => false,
    }
}
