//! Credit card lookups over the dashboard `Cards` section

use super::{ensure_object_parameters, field_matches, optional_str, Tool};
use crate::data::DataContext;
use crate::models::{ToolInput, ToolOutput};
use crate::Result;
use serde_json::{json, Value};
use std::sync::Arc;

pub const NO_CARD_DATA: &str = "No credit card data available.";
pub const CARD_NOT_FOUND: &str = "Card not found";

pub struct CardDetailsTool {
    data: Arc<DataContext>,
}

impl CardDetailsTool {
    pub fn new(data: Arc<DataContext>) -> Self {
        Self { data }
    }
}

/// Last whitespace-separated group of a masked card number
fn last_four(card: &Value) -> Option<&str> {
    card.get("CardNo")
        .and_then(Value::as_str)
        .and_then(|no| no.split_whitespace().last())
}

#[async_trait::async_trait]
impl Tool for CardDetailsTool {
    fn name(&self) -> &'static str {
        "get_card_details"
    }

    fn description(&self) -> &'static str {
        "Retrieves credit card details (limit, balances, due date). Optionally filter by the last 4 digits of the card number or the card serial number."
    }

    fn parameters(&self) -> Value {
        json!({ "card_identifier": "string, optional" })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        ensure_object_parameters(input)?;

        let cards = match self.data.cards() {
            Some(cards) if !cards.is_empty() => cards,
            _ => return Ok(ToolOutput::error(NO_CARD_DATA)),
        };

        let Some(identifier) = optional_str(input, "card_identifier") else {
            return Ok(ToolOutput::ok(Value::Array(cards.clone())));
        };

        let matched: Vec<Value> = cards
            .iter()
            .filter(|card| {
                last_four(card) == Some(identifier.as_str())
                    || field_matches(card, "CardSerNo", &identifier)
            })
            .cloned()
            .collect();

        if matched.is_empty() {
            Ok(ToolOutput::error(CARD_NOT_FOUND))
        } else {
            Ok(ToolOutput::ok(Value::Array(matched)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::sample_context;
    use crate::models::error_message;

    async fn run(params: Value) -> ToolOutput {
        CardDetailsTool::new(Arc::new(sample_context()))
            .execute(&ToolInput::new("get_card_details", params))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_all_cards_without_identifier() {
        let output = run(json!({})).await;
        assert_eq!(output.data.as_array().map(Vec::len), Some(1));
        assert_eq!(output.data[0]["OutstandindBalance"], json!(4500));
    }

    #[tokio::test]
    async fn test_match_by_last_four_and_serial() {
        let by_digits = run(json!({"card_identifier": "5884"})).await;
        let by_serial = run(json!({"card_identifier": "WMcVYNtwPLE1S2gqK1L9Hg=="})).await;
        assert_eq!(by_digits, by_serial);
        assert_eq!(by_digits.data[0]["CardLimit"], json!(20000));
    }

    #[tokio::test]
    async fn test_unknown_card() {
        let output = run(json!({"card_identifier": "0000"})).await;
        assert_eq!(error_message(&output.data), Some(CARD_NOT_FOUND));
    }

    #[tokio::test]
    async fn test_no_card_data() {
        let output = CardDetailsTool::new(Arc::new(DataContext::empty()))
            .execute(&ToolInput::new("get_card_details", json!({})))
            .await
            .unwrap();
        assert_eq!(error_message(&output.data), Some(NO_CARD_DATA));
    }
}
