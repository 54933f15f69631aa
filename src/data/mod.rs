//! Read-only mock data context
//!
//! Loaded once at startup from the mock JSON directory and handed to every
//! worker's tools at construction time. Missing or malformed files leave the
//! corresponding section unavailable; lookups then answer with an error
//! sequence instead of failing.

use crate::error::OrchestrationError;
use crate::Result;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

pub const DASHBOARD_FILE: &str = "dashboard_landing.json";
pub const TRANSACTIONS_FILE: &str = "account_transactions.json";
pub const EXCHANGE_RATES_FILE: &str = "exchange_rates.json";

/// Envelope shared by every mock data file
#[derive(Debug, Deserialize)]
struct MockEnvelope {
    #[serde(rename = "IsSucceeded", default)]
    is_succeeded: Option<bool>,
    #[serde(rename = "ActDescription", default)]
    act_description: Option<String>,
    #[serde(rename = "ResponseData", default)]
    response_data: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct DataContext {
    dashboard: Option<Value>,
    transactions: Option<Value>,
    exchange_rates: Option<Value>,
}

impl DataContext {
    /// Context with every section unavailable
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load all mock files from `dir`. Never fails.
    pub fn load(dir: &Path) -> Self {
        let context = Self {
            dashboard: load_section(&dir.join(DASHBOARD_FILE)),
            transactions: load_section(&dir.join(TRANSACTIONS_FILE)),
            exchange_rates: load_section(&dir.join(EXCHANGE_RATES_FILE)),
        };

        info!(
            dir = %dir.display(),
            dashboard = context.dashboard.is_some(),
            transactions = context.transactions.is_some(),
            exchange_rates = context.exchange_rates.is_some(),
            "Mock data loaded"
        );

        context
    }

    /// Build from already-parsed envelopes (`{"ResponseData": ...}`)
    pub fn from_envelopes(dashboard: Value, transactions: Value, exchange_rates: Value) -> Self {
        Self {
            dashboard: unwrap_envelope(dashboard, "dashboard").ok(),
            transactions: unwrap_envelope(transactions, "transactions").ok(),
            exchange_rates: unwrap_envelope(exchange_rates, "exchange_rates").ok(),
        }
    }

    pub fn accounts(&self) -> Option<&Vec<Value>> {
        self.dashboard
            .as_ref()
            .and_then(|d| d.get("Accounts"))
            .and_then(Value::as_array)
    }

    pub fn cards(&self) -> Option<&Vec<Value>> {
        self.dashboard
            .as_ref()
            .and_then(|d| d.get("Cards"))
            .and_then(Value::as_array)
    }

    pub fn transactions(&self) -> Option<&Vec<Value>> {
        self.transactions.as_ref().and_then(Value::as_array)
    }

    pub fn exchange_rates(&self) -> Option<&Vec<Value>> {
        self.exchange_rates.as_ref().and_then(Value::as_array)
    }
}

fn load_section(path: &Path) -> Option<Value> {
    match read_envelope(path) {
        Ok(data) => Some(data),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Mock data section unavailable");
            None
        }
    }
}

fn read_envelope(path: &Path) -> Result<Value> {
    let raw = fs::read_to_string(path)?;
    let parsed: Value = serde_json::from_str(&raw)?;
    unwrap_envelope(parsed, &path.display().to_string())
}

fn unwrap_envelope(raw: Value, source: &str) -> Result<Value> {
    let envelope: MockEnvelope = serde_json::from_value(raw)?;

    if envelope.is_succeeded == Some(false) {
        return Err(OrchestrationError::DataUnavailable(format!(
            "{} reported failure: {}",
            source,
            envelope
                .act_description
                .as_deref()
                .unwrap_or("Failed status in data")
        )));
    }

    match envelope.response_data {
        Some(Value::Null) | None => Err(OrchestrationError::DataUnavailable(format!(
            "{} has no ResponseData",
            source
        ))),
        Some(data) => Ok(data),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, body: &str) {
        let mut file = fs::File::create(dir.join(name)).unwrap();
        file.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            DASHBOARD_FILE,
            r#"{"IsSucceeded": true, "ResponseData": {"Accounts": [{"AccountNo": "A1"}], "Cards": []}}"#,
        );
        write_file(
            dir.path(),
            EXCHANGE_RATES_FILE,
            r#"{"IsSucceeded": true, "ResponseData": [{"Code": "USD", "Name": "US Dollar", "Rate": 3.64}]}"#,
        );

        let context = DataContext::load(dir.path());

        assert_eq!(context.accounts().map(Vec::len), Some(1));
        assert_eq!(context.cards().map(Vec::len), Some(0));
        assert_eq!(context.exchange_rates().map(Vec::len), Some(1));
        // account_transactions.json was never written
        assert!(context.transactions().is_none());
    }

    #[test]
    fn test_malformed_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), TRANSACTIONS_FILE, "{ not json");

        let context = DataContext::load(dir.path());
        assert!(context.transactions().is_none());
    }

    #[test]
    fn test_failed_envelope_is_unavailable() {
        let context = DataContext::from_envelopes(
            json!({"IsSucceeded": false, "ActDescription": "Upstream down", "ResponseData": {"Accounts": []}}),
            json!({"ResponseData": null}),
            json!({"ResponseData": []}),
        );

        assert!(context.accounts().is_none());
        assert!(context.transactions().is_none());
        assert_eq!(context.exchange_rates().map(Vec::len), Some(0));
    }

    #[test]
    fn test_missing_section_key() {
        let context = DataContext::from_envelopes(
            json!({"ResponseData": {}}),
            json!({}),
            json!({}),
        );
        assert!(context.accounts().is_none());
        assert!(context.cards().is_none());
    }
}
