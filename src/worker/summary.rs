//! Renders tool observations into the worker's reply text

use crate::models::{error_message, ExecutionStatus, Observation};
use serde_json::Value;

pub const NO_LOOKUP_MESSAGE: &str = "No lookup matched this request.";

fn heading(tool_name: &str) -> &str {
    match tool_name {
        "get_account_summary" => "Account summary",
        "get_account_balance" => "Account balance",
        "get_transactions" => "Transactions",
        "get_transaction_details" => "Transaction details",
        "get_card_details" => "Card details",
        "get_exchange_rates" => "Exchange rates (QAR per unit)",
        "convert_currency" => "Currency conversion",
        "basic_calculator" => "Calculation",
        other => other,
    }
}

/// Message of a simulated action confirmation (`[{"Success": true, "Message": ...}]`)
fn confirmation_message(data: &Value) -> Option<&str> {
    match data.as_array().map(Vec::as_slice) {
        Some([only]) if only.get("Success").and_then(Value::as_bool) == Some(true) => {
            only.get("Message").and_then(Value::as_str)
        }
        _ => None,
    }
}

pub fn render_observation(observation: &Observation) -> String {
    let data = &observation.tool_output;

    if observation.status == ExecutionStatus::Failed || error_message(data).is_some() {
        return format!("Error from {}: {}", observation.tool_name, data);
    }

    if let Some(message) = confirmation_message(data) {
        return message.to_string();
    }

    let body = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
    format!("{}:\n{}", heading(&observation.tool_name), body)
}

pub fn summarize(observations: &[Observation]) -> String {
    if observations.is_empty() {
        return NO_LOOKUP_MESSAGE.to_string();
    }

    observations
        .iter()
        .map(render_observation)
        .collect::<Vec<_>>()
        .join("\n\n")
}
