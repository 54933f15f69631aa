//! Transaction history, detail lookups and simulated actions

use super::{ensure_object_parameters, field_matches, optional_str, required_str, Tool};
use crate::data::DataContext;
use crate::error::OrchestrationError;
use crate::models::{ToolInput, ToolOutput};
use crate::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

pub const NO_TRANSACTION_DATA: &str = "No transaction data available.";
pub const TRANSACTION_NOT_FOUND: &str = "Transaction not found";

/// Match on `DealReference` or `TransactionSeqNo`
fn find_transaction<'a>(records: &'a [Value], transaction_id: &str) -> Option<&'a Value> {
    records.iter().find(|tx| {
        field_matches(tx, "DealReference", transaction_id)
            || field_matches(tx, "TransactionSeqNo", transaction_id)
    })
}

/// Resolve the transaction or produce the error output to return.
fn lookup(data: &DataContext, transaction_id: &str) -> std::result::Result<Value, ToolOutput> {
    let records = match data.transactions() {
        Some(records) if !records.is_empty() => records,
        _ => return Err(ToolOutput::error(NO_TRANSACTION_DATA)),
    };

    find_transaction(records, transaction_id)
        .cloned()
        .ok_or_else(|| ToolOutput::error(TRANSACTION_NOT_FOUND))
}

fn confirmation(message: String) -> ToolOutput {
    ToolOutput::ok(json!([{ "Success": true, "Message": message }]))
}

// ===== get_transactions =====

pub struct TransactionsTool {
    data: Arc<DataContext>,
}

impl TransactionsTool {
    pub fn new(data: Arc<DataContext>) -> Self {
        Self { data }
    }
}

#[async_trait::async_trait]
impl Tool for TransactionsTool {
    fn name(&self) -> &'static str {
        "get_transactions"
    }

    fn description(&self) -> &'static str {
        "Retrieves the transaction history for the user's account, optionally limited to the most recent N."
    }

    fn parameters(&self) -> Value {
        json!({
            "account_number": "string, optional",
            "limit": "integer, optional"
        })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        ensure_object_parameters(input)?;

        // Mock transactions carry no account link; the filter is accepted but not applied.
        let _account_number = optional_str(input, "account_number");

        let limit = match input.parameters.get("limit") {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.as_u64().ok_or_else(|| {
                OrchestrationError::InvalidToolInput(
                    "get_transactions: 'limit' must be a non-negative integer".to_string(),
                )
            })?),
        };

        let records = match self.data.transactions() {
            Some(records) if !records.is_empty() => records,
            _ => return Ok(ToolOutput::error(NO_TRANSACTION_DATA)),
        };

        let selected: Vec<Value> = match limit {
            Some(n) if n > 0 => records.iter().take(n as usize).cloned().collect(),
            _ => records.clone(),
        };

        Ok(ToolOutput::ok(Value::Array(selected)))
    }
}

// ===== get_transaction_details =====

pub struct TransactionDetailsTool {
    data: Arc<DataContext>,
}

impl TransactionDetailsTool {
    pub fn new(data: Arc<DataContext>) -> Self {
        Self { data }
    }
}

#[async_trait::async_trait]
impl Tool for TransactionDetailsTool {
    fn name(&self) -> &'static str {
        "get_transaction_details"
    }

    fn description(&self) -> &'static str {
        "Retrieves a single transaction by its DealReference or TransactionSeqNo."
    }

    fn parameters(&self) -> Value {
        json!({ "transaction_id": "string, required" })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        ensure_object_parameters(input)?;
        let transaction_id = required_str(input, "transaction_id")?;

        Ok(match lookup(&self.data, &transaction_id) {
            Ok(tx) => ToolOutput::ok(json!([tx])),
            Err(output) => output,
        })
    }
}

// ===== cancel_transaction =====

pub struct CancelTransactionTool {
    data: Arc<DataContext>,
}

impl CancelTransactionTool {
    pub fn new(data: Arc<DataContext>) -> Self {
        Self { data }
    }
}

#[async_trait::async_trait]
impl Tool for CancelTransactionTool {
    fn name(&self) -> &'static str {
        "cancel_transaction"
    }

    fn description(&self) -> &'static str {
        "Submits a (simulated) cancellation request for a transaction."
    }

    fn parameters(&self) -> Value {
        json!({ "transaction_id": "string, required" })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        ensure_object_parameters(input)?;
        let transaction_id = required_str(input, "transaction_id")?;

        if let Err(output) = lookup(&self.data, &transaction_id) {
            return Ok(output);
        }

        info!(transaction_id = %transaction_id, "Simulated transaction cancellation");

        Ok(confirmation(format!(
            "Transaction {} cancellation request submitted.",
            transaction_id
        )))
    }
}

// ===== raise_dispute =====

pub struct RaiseDisputeTool {
    data: Arc<DataContext>,
}

impl RaiseDisputeTool {
    pub fn new(data: Arc<DataContext>) -> Self {
        Self { data }
    }
}

#[async_trait::async_trait]
impl Tool for RaiseDisputeTool {
    fn name(&self) -> &'static str {
        "raise_dispute"
    }

    fn description(&self) -> &'static str {
        "Submits a (simulated) dispute for a transaction that is eligible for dispute."
    }

    fn parameters(&self) -> Value {
        json!({
            "transaction_id": "string, required",
            "reason": "string, optional"
        })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        ensure_object_parameters(input)?;
        let transaction_id = required_str(input, "transaction_id")?;
        let reason = optional_str(input, "reason").unwrap_or_else(|| "Not specified".to_string());

        let tx = match lookup(&self.data, &transaction_id) {
            Ok(tx) => tx,
            Err(output) => return Ok(output),
        };

        if tx.get("IsEligibleForDispute").and_then(Value::as_bool) == Some(false) {
            return Ok(ToolOutput::error(format!(
                "Transaction {} is not eligible for dispute",
                transaction_id
            )));
        }

        info!(transaction_id = %transaction_id, reason = %reason, "Simulated dispute");

        Ok(confirmation(format!(
            "Dispute submitted for transaction {} with reason: '{}'.",
            transaction_id, reason
        )))
    }
}
