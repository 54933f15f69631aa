//! Exchange rates (QAR per unit of foreign currency) and conversions

use super::{ensure_object_parameters, Tool};
use crate::data::DataContext;
use crate::error::OrchestrationError;
use crate::models::{ToolInput, ToolOutput};
use crate::Result;
use serde_json::{json, Value};
use std::sync::Arc;

pub const NO_RATE_DATA: &str = "Exchange rate data not available.";
pub const RATE_NOT_FOUND: &str = "Rate not found";

/// Base currency of the rate table
pub const BASE_CURRENCY: &str = "QAR";

#[derive(Debug, Clone, PartialEq)]
struct RateEntry {
    code: String,
    name: Value,
    rate: Value,
}

impl RateEntry {
    fn to_json(&self) -> Value {
        json!({ "Code": self.code, "Name": self.name, "Rate": self.rate })
    }
}

/// Rate table keyed by uppercase code, in file order
fn rate_table(data: &DataContext) -> Option<Vec<RateEntry>> {
    let rates = data.exchange_rates().filter(|r| !r.is_empty())?;

    let mut table: Vec<RateEntry> = Vec::with_capacity(rates.len());
    for rate in rates {
        let Some(code) = rate.get("Code").and_then(Value::as_str) else {
            continue;
        };
        if table.iter().any(|e| e.code.eq_ignore_ascii_case(code)) {
            continue;
        }
        table.push(RateEntry {
            code: code.to_string(),
            name: rate.get("Name").cloned().unwrap_or(Value::Null),
            rate: rate.get("Rate").cloned().unwrap_or(Value::Null),
        });
    }

    Some(table)
}

fn find_rate<'a>(table: &'a [RateEntry], code: &str) -> Option<&'a RateEntry> {
    table.iter().find(|e| e.code.eq_ignore_ascii_case(code))
}

fn missing_rate(code: &str) -> Value {
    json!({ "Code": code, "Error": RATE_NOT_FOUND })
}

/// Accepts `["USD","EUR"]` or `"USD, EUR"`
fn requested_codes(input: &ToolInput) -> Result<Vec<String>> {
    let raw: Vec<String> = match input.parameters.get("currency_codes") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str().map(str::to_string).ok_or_else(|| {
                    OrchestrationError::InvalidToolInput(
                        "get_exchange_rates: currency_codes must be strings".to_string(),
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?,
        Some(_) => {
            return Err(OrchestrationError::InvalidToolInput(
                "get_exchange_rates: currency_codes must be a list of codes".to_string(),
            ))
        }
    };

    let mut codes: Vec<String> = Vec::with_capacity(raw.len());
    for code in raw {
        let code = code.trim().to_ascii_uppercase();
        if !code.is_empty() && !codes.contains(&code) {
            codes.push(code);
        }
    }
    Ok(codes)
}

// ===== get_exchange_rates =====

pub struct ExchangeRatesTool {
    data: Arc<DataContext>,
}

impl ExchangeRatesTool {
    pub fn new(data: Arc<DataContext>) -> Self {
        Self { data }
    }
}

#[async_trait::async_trait]
impl Tool for ExchangeRatesTool {
    fn name(&self) -> &'static str {
        "get_exchange_rates"
    }

    fn description(&self) -> &'static str {
        "Fetches exchange rates relative to Qatari Riyal (QAR): how many QAR one unit of each currency buys. Omit currency_codes for all rates."
    }

    fn parameters(&self) -> Value {
        json!({ "currency_codes": "array of 3-letter codes, optional" })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        ensure_object_parameters(input)?;
        let codes = requested_codes(input)?;

        let Some(table) = rate_table(&self.data) else {
            return Ok(ToolOutput::error(NO_RATE_DATA));
        };

        if codes.is_empty() {
            return Ok(ToolOutput::ok(Value::Array(
                table.iter().map(RateEntry::to_json).collect(),
            )));
        }

        let results: Vec<Value> = codes
            .iter()
            .map(|code| match find_rate(&table, code) {
                Some(entry) => entry.to_json(),
                None => missing_rate(code),
            })
            .collect();

        Ok(ToolOutput::ok(Value::Array(results)))
    }
}

// ===== convert_currency =====

pub struct ConvertCurrencyTool {
    data: Arc<DataContext>,
}

impl ConvertCurrencyTool {
    pub fn new(data: Arc<DataContext>) -> Self {
        Self { data }
    }
}

/// QAR per unit for `code`; the base currency is always 1
fn qar_rate(table: &[RateEntry], code: &str) -> Option<f64> {
    if code.eq_ignore_ascii_case(BASE_CURRENCY) {
        return Some(1.0);
    }
    find_rate(table, code)
        .and_then(|e| e.rate.as_f64())
        .filter(|r| *r > 0.0)
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[async_trait::async_trait]
impl Tool for ConvertCurrencyTool {
    fn name(&self) -> &'static str {
        "convert_currency"
    }

    fn description(&self) -> &'static str {
        "Converts an amount between two currencies using the QAR rate table."
    }

    fn parameters(&self) -> Value {
        json!({
            "amount": "number, required",
            "from": "3-letter code, required",
            "to": "3-letter code, required"
        })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        ensure_object_parameters(input)?;

        let amount = match input.parameters.get("amount") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|a| a.is_finite())
        .ok_or_else(|| {
            OrchestrationError::InvalidToolInput(
                "convert_currency: expected numeric 'amount'".to_string(),
            )
        })?;

        let code = |key: &str| -> Result<String> {
            input
                .parameters
                .get(key)
                .and_then(Value::as_str)
                .map(|s| s.trim().to_ascii_uppercase())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    OrchestrationError::InvalidToolInput(format!(
                        "convert_currency: expected '{}' currency code",
                        key
                    ))
                })
        };
        let from = code("from")?;
        let to = code("to")?;

        let Some(table) = rate_table(&self.data) else {
            return Ok(ToolOutput::error(NO_RATE_DATA));
        };

        let from_rate = qar_rate(&table, &from);
        let to_rate = qar_rate(&table, &to);

        let (Some(from_rate), Some(to_rate)) = (from_rate, to_rate) else {
            let codes = [(&from, from_rate), (&to, to_rate)];
            let errors: Vec<Value> = codes
                .iter()
                .filter(|(_, rate)| rate.is_none())
                .map(|(code, _)| missing_rate(code))
                .collect();

            return Ok(ToolOutput {
                success: false,
                data: Value::Array(errors),
                error: Some(RATE_NOT_FOUND.to_string()),
            });
        };

        let converted = amount * from_rate / to_rate;

        Ok(ToolOutput::ok(json!([{
            "From": from,
            "To": to,
            "Amount": amount,
            "Rate": round4(from_rate / to_rate),
            "ConvertedAmount": round4(converted)
        }])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::sample_context;
    use crate::models::error_message;

    fn data() -> Arc<DataContext> {
        Arc::new(sample_context())
    }

    async fn rates(params: Value) -> ToolOutput {
        ExchangeRatesTool::new(data())
            .execute(&ToolInput::new("get_exchange_rates", params))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_all_rates_when_codes_omitted() {
        let omitted = rates(json!({})).await;
        let empty = rates(json!({"currency_codes": []})).await;

        assert_eq!(omitted.data.as_array().map(Vec::len), Some(4));
        assert_eq!(omitted, empty);
    }

    #[tokio::test]
    async fn test_codes_case_insensitive_and_deduplicated() {
        let output = rates(json!({"currency_codes": ["usd", "USD", "eur"]})).await;
        assert_eq!(
            output.data,
            json!([
                { "Code": "USD", "Name": "US Dollar", "Rate": 3.64 },
                { "Code": "EUR", "Name": "Euro", "Rate": 3.95 }
            ])
        );
    }

    #[tokio::test]
    async fn test_unknown_code_reported_per_entry() {
        let output = rates(json!({"currency_codes": ["USD", "xyz"]})).await;
        assert_eq!(output.data[1], json!({ "Code": "XYZ", "Error": "Rate not found" }));
        assert_eq!(output.data[0]["Rate"], json!(3.64));
    }

    #[tokio::test]
    async fn test_no_rate_data() {
        let output = ExchangeRatesTool::new(Arc::new(DataContext::empty()))
            .execute(&ToolInput::new("get_exchange_rates", json!({})))
            .await
            .unwrap();
        assert_eq!(error_message(&output.data), Some(NO_RATE_DATA));
    }

    #[tokio::test]
    async fn test_convert_through_qar() {
        let tool = ConvertCurrencyTool::new(data());

        let to_qar = tool
            .execute(&ToolInput::new(
                "convert_currency",
                json!({"amount": 100, "from": "USD", "to": "QAR"}),
            ))
            .await
            .unwrap();
        assert_eq!(to_qar.data[0]["ConvertedAmount"], json!(364.0));

        let cross = tool
            .execute(&ToolInput::new(
                "convert_currency",
                json!({"amount": "395", "from": "eur", "to": "usd"}),
            ))
            .await
            .unwrap();
        // 395 * 3.95 / 3.64
        assert_eq!(cross.data[0]["ConvertedAmount"], json!(428.6401));
    }

    #[tokio::test]
    async fn test_convert_unknown_code() {
        let output = ConvertCurrencyTool::new(data())
            .execute(&ToolInput::new(
                "convert_currency",
                json!({"amount": 10, "from": "USD", "to": "ABC"}),
            ))
            .await
            .unwrap();

        assert!(!output.success);
        assert_eq!(output.data, json!([{ "Code": "ABC", "Error": "Rate not found" }]));
    }

    #[tokio::test]
    async fn test_convert_requires_amount() {
        let result = ConvertCurrencyTool::new(data())
            .execute(&ToolInput::new(
                "convert_currency",
                json!({"from": "USD", "to": "EUR"}),
            ))
            .await;
        assert!(result.is_err());
    }
}
