//! Account lookups over the dashboard `Accounts` section

use super::{ensure_object_parameters, field_matches, required_str, Tool};
use crate::data::DataContext;
use crate::models::{ToolInput, ToolOutput};
use crate::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub const NO_ACCOUNT_DATA: &str = "No account summary data available.";
pub const ACCOUNT_NOT_FOUND: &str = "Account not found";

pub struct AccountSummaryTool {
    data: Arc<DataContext>,
}

impl AccountSummaryTool {
    pub fn new(data: Arc<DataContext>) -> Self {
        Self { data }
    }
}

#[async_trait::async_trait]
impl Tool for AccountSummaryTool {
    fn name(&self) -> &'static str {
        "get_account_summary"
    }

    fn description(&self) -> &'static str {
        "Retrieves the summary of the user's accounts, including balance and type."
    }

    fn parameters(&self) -> Value {
        json!({})
    }

    async fn execute(&self, _input: &ToolInput) -> Result<ToolOutput> {
        match self.data.accounts() {
            Some(accounts) if !accounts.is_empty() => Ok(ToolOutput::ok(Value::Array(accounts.clone()))),
            _ => Ok(ToolOutput::error(NO_ACCOUNT_DATA)),
        }
    }
}

pub struct AccountBalanceTool {
    data: Arc<DataContext>,
}

impl AccountBalanceTool {
    pub fn new(data: Arc<DataContext>) -> Self {
        Self { data }
    }
}

#[async_trait::async_trait]
impl Tool for AccountBalanceTool {
    fn name(&self) -> &'static str {
        "get_account_balance"
    }

    fn description(&self) -> &'static str {
        "Retrieves the available balance for a specific account number (matches AccountNo or DisplayAccountNo)."
    }

    fn parameters(&self) -> Value {
        json!({ "account_no": "string, required" })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        ensure_object_parameters(input)?;
        let account_no = required_str(input, "account_no")?;

        let accounts = match self.data.accounts() {
            Some(accounts) if !accounts.is_empty() => accounts,
            _ => return Ok(ToolOutput::error(NO_ACCOUNT_DATA)),
        };

        let found = accounts.iter().find(|acc| {
            field_matches(acc, "AccountNo", &account_no)
                || field_matches(acc, "DisplayAccountNo", &account_no)
        });

        debug!(account_no = %account_no, found = found.is_some(), "Account balance lookup");

        Ok(match found {
            Some(acc) => ToolOutput::ok(json!([{
                "AccountNo": acc.get("AccountNo").cloned().unwrap_or(Value::Null),
                "DisplayAccountNo": acc.get("DisplayAccountNo").cloned().unwrap_or(Value::Null),
                "AvailableBalance": acc.get("AvailableBalance").cloned().unwrap_or(Value::Null),
                "CurrencyCode": acc.get("CurrencyCode").cloned().unwrap_or(Value::Null),
            }])),
            None => ToolOutput::error(ACCOUNT_NOT_FOUND),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::sample_context;
    use crate::models::error_message;

    fn balance_tool() -> AccountBalanceTool {
        AccountBalanceTool::new(Arc::new(sample_context()))
    }

    #[tokio::test]
    async fn test_summary_returns_all_accounts() {
        let tool = AccountSummaryTool::new(Arc::new(sample_context()));
        let output = tool
            .execute(&ToolInput::new("get_account_summary", json!({})))
            .await
            .unwrap();

        assert!(output.success);
        assert_eq!(output.data.as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_summary_without_data() {
        let tool = AccountSummaryTool::new(Arc::new(DataContext::empty()));
        let output = tool
            .execute(&ToolInput::new("get_account_summary", json!({})))
            .await
            .unwrap();

        assert_eq!(error_message(&output.data), Some(NO_ACCOUNT_DATA));
    }

    #[tokio::test]
    async fn test_balance_for_known_account() {
        let output = balance_tool()
            .execute(&ToolInput::new(
                "get_account_balance",
                json!({"account_no": "A1"}),
            ))
            .await
            .unwrap();

        assert!(output.success);
        assert_eq!(output.data[0]["AvailableBalance"], json!(15250.75));
        assert_eq!(output.data[0]["CurrencyCode"], json!("QAR"));
    }

    #[tokio::test]
    async fn test_balance_matches_display_number() {
        let output = balance_tool()
            .execute(&ToolInput::new(
                "get_account_balance",
                json!({"account_no": "4080-201040-001"}),
            ))
            .await
            .unwrap();

        assert_eq!(output.data[0]["AccountNo"], json!("4080201040001"));
    }

    #[tokio::test]
    async fn test_balance_unknown_account() {
        let output = balance_tool()
            .execute(&ToolInput::new(
                "get_account_balance",
                json!({"account_no": "ZZ9"}),
            ))
            .await
            .unwrap();

        assert!(!output.success);
        assert_eq!(output.data, json!([{ "Error": "Account not found" }]));
    }

    #[tokio::test]
    async fn test_balance_requires_account_no() {
        let result = balance_tool()
            .execute(&ToolInput::new("get_account_balance", json!({})))
            .await;
        assert!(result.is_err());
    }
}
