//! Deterministic planner: pulls identifiers out of the latest user message
//!
//! Used when no LLM is configured and throughout the test suite.

use super::{ToolPlan, ToolPlanner};
use crate::models::{ConversationState, ToolInput, WorkerId};
use crate::tools::exchange::BASE_CURRENCY;
use crate::tools::ToolSpec;
use crate::Result;
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

/// ISO codes recognised even when typed in lowercase
const KNOWN_CURRENCIES: &[&str] = &[
    "USD", "EUR", "GBP", "INR", "QAR", "AED", "SAR", "KWD", "BHD", "OMR", "JPY", "CNY", "CHF",
    "CAD", "AUD", "PKR", "EGP", "PHP", "LKR", "NPR", "BDT",
];

const CURRENCY_NAMES: &[(&str, &str)] = &[
    ("dollar", "USD"),
    ("dollars", "USD"),
    ("euro", "EUR"),
    ("euros", "EUR"),
    ("pound", "GBP"),
    ("pounds", "GBP"),
    ("sterling", "GBP"),
    ("rupee", "INR"),
    ("rupees", "INR"),
    ("riyal", "QAR"),
    ("riyals", "QAR"),
    ("dirham", "AED"),
    ("dirhams", "AED"),
    ("yen", "JPY"),
    ("yuan", "CNY"),
    ("franc", "CHF"),
    ("francs", "CHF"),
];

/// Words skipped between an anchor ("account", "transaction") and its value
const FILLERS: &[&str] = &["number", "no", "#", "id", "is", "ref", "reference", "with", "of"];

#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordToolPlanner;

impl KeywordToolPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Tool calls for `worker` given the user's utterance
    pub fn plan_for(&self, worker: WorkerId, utterance: &str) -> Vec<ToolInput> {
        let tokens = tokenize(utterance);
        // ASCII lowering keeps byte offsets valid for slicing `utterance`
        let lowered = utterance.to_ascii_lowercase();

        match worker {
            WorkerId::Account => plan_account(&tokens),
            WorkerId::Transaction => plan_transaction(&tokens, utterance, &lowered),
            WorkerId::Card => plan_card(&tokens),
            WorkerId::ExchangeRate => plan_exchange(&tokens),
        }
    }
}

#[async_trait]
impl ToolPlanner for KeywordToolPlanner {
    async fn plan(
        &self,
        worker: WorkerId,
        state: &ConversationState,
        _tools: &[ToolSpec],
    ) -> Result<ToolPlan> {
        let utterance = state.latest_user_utterance().unwrap_or_default();
        let calls = self.plan_for(worker, utterance);

        debug!(
            worker = %worker,
            tools = ?calls.iter().map(|c| c.tool_name.as_str()).collect::<Vec<_>>(),
            "Keyword plan"
        );

        Ok(ToolPlan::calls(calls))
    }
}

// ===== Per-worker plans =====

fn plan_account(tokens: &[&str]) -> Vec<ToolInput> {
    let account_no = value_after(tokens, &["account", "acc", "a/c"])
        .or_else(|| tokens.iter().copied().find(|t| is_long_number(t)));

    match account_no {
        Some(account_no) => vec![ToolInput::new(
            "get_account_balance",
            json!({ "account_no": account_no }),
        )],
        None => vec![ToolInput::new("get_account_summary", json!({}))],
    }
}

fn plan_transaction(tokens: &[&str], utterance: &str, lowered: &str) -> Vec<ToolInput> {
    let transaction_id = value_after(tokens, &["transaction", "txn", "reference", "ref", "id"])
        .or_else(|| tokens.iter().copied().find(|t| is_reference(t)));

    let wants_cancel = lowered.contains("cancel");
    let wants_dispute = lowered.contains("dispute");

    match transaction_id {
        Some(id) if wants_dispute => {
            let mut params = json!({ "transaction_id": id });
            if let Some(reason) = dispute_reason(utterance, lowered) {
                params["reason"] = json!(reason);
            }
            vec![ToolInput::new("raise_dispute", params)]
        }
        Some(id) if wants_cancel => vec![ToolInput::new(
            "cancel_transaction",
            json!({ "transaction_id": id }),
        )],
        Some(id) => vec![ToolInput::new(
            "get_transaction_details",
            json!({ "transaction_id": id }),
        )],
        None => {
            let limit = ["last", "recent", "latest", "top", "first"]
                .iter()
                .find_map(|anchor| {
                    let idx = tokens.iter().position(|t| t.eq_ignore_ascii_case(anchor))?;
                    tokens.get(idx + 1)?.parse::<u64>().ok()
                });

            let params = match limit {
                Some(limit) => json!({ "limit": limit }),
                None => json!({}),
            };
            vec![ToolInput::new("get_transactions", params)]
        }
    }
}

fn plan_card(tokens: &[&str]) -> Vec<ToolInput> {
    let identifier = tokens
        .iter()
        .copied()
        .find(|t| t.len() == 4 && t.chars().all(|c| c.is_ascii_digit()))
        .or_else(|| tokens.iter().copied().find(|t| t.ends_with('=')))
        .or_else(|| value_after(tokens, &["card", "serial"]));

    let params = match identifier {
        Some(identifier) => json!({ "card_identifier": identifier }),
        None => json!({}),
    };
    vec![ToolInput::new("get_card_details", params)]
}

fn plan_exchange(tokens: &[&str]) -> Vec<ToolInput> {
    if let Some(expression) = arithmetic_expression(tokens) {
        return vec![ToolInput::new(
            "basic_calculator",
            json!({ "expression": expression }),
        )];
    }

    let codes = currency_codes(tokens);
    let amount = tokens.iter().find_map(|t| parse_amount(t));

    // An amount next to a currency is a conversion.
    if let (Some(amount), Some(from)) = (amount, codes.first()) {
        let to = codes
            .get(1)
            .cloned()
            .unwrap_or_else(|| BASE_CURRENCY.to_string());
        if *from != to {
            return vec![ToolInput::new(
                "convert_currency",
                json!({ "amount": amount, "from": from, "to": to }),
            )];
        }
    }

    let foreign: Vec<String> = codes
        .into_iter()
        .filter(|c| c != BASE_CURRENCY)
        .collect();

    let params = if foreign.is_empty() {
        json!({})
    } else {
        json!({ "currency_codes": foreign })
    };
    vec![ToolInput::new("get_exchange_rates", params)]
}

// ===== Extraction helpers =====

fn tokenize(text: &str) -> Vec<&str> {
    text.split_whitespace()
        .map(|t| t.trim_matches(|c: char| matches!(c, '?' | ',' | '.' | '!' | ';' | ':' | '(' | ')' | '"' | '\'')))
        .filter(|t| !t.is_empty())
        .collect()
}

fn has_digit(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_digit())
}

fn is_long_number(token: &str) -> bool {
    token.len() >= 8 && token.chars().all(|c| c.is_ascii_digit() || c == '-')
}

/// Mixed letters and digits, e.g. `090325T54843`
pub(crate) fn is_reference(token: &str) -> bool {
    token.len() >= 6
        && has_digit(token)
        && token.chars().any(|c| c.is_ascii_alphabetic())
        && token.chars().all(|c| c.is_ascii_alphanumeric())
}

/// First identifier-looking token after one of `anchors`, skipping fillers
fn value_after<'a>(tokens: &[&'a str], anchors: &[&str]) -> Option<&'a str> {
    for (idx, token) in tokens.iter().enumerate() {
        if !anchors.iter().any(|a| token.eq_ignore_ascii_case(a)) {
            continue;
        }
        let candidate = tokens[idx + 1..]
            .iter()
            .copied()
            .find(|t| !FILLERS.iter().any(|f| t.eq_ignore_ascii_case(f)));

        if let Some(candidate) = candidate.filter(|c| has_digit(c)) {
            return Some(candidate);
        }
    }
    None
}

fn dispute_reason(utterance: &str, lowered: &str) -> Option<String> {
    ["because", "reason:", "reason is", "due to"]
        .iter()
        .find_map(|marker| {
            let start = lowered.find(marker)? + marker.len();
            let reason = utterance.get(start..)?.trim().trim_end_matches(['.', '!']);
            (!reason.is_empty()).then(|| reason.to_string())
        })
}

fn parse_amount(token: &str) -> Option<f64> {
    let cleaned: String = token.chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite() && *v > 0.0)
}

fn currency_codes(tokens: &[&str]) -> Vec<String> {
    let mut codes: Vec<String> = Vec::new();

    for token in tokens {
        let lower = token.to_lowercase();
        let code = if let Some((_, code)) = CURRENCY_NAMES.iter().find(|(name, _)| *name == lower) {
            Some(code.to_string())
        } else if token.len() == 3 && token.chars().all(|c| c.is_ascii_alphabetic()) {
            let upper = token.to_ascii_uppercase();
            let typed_upper = token.chars().all(|c| c.is_ascii_uppercase());
            (KNOWN_CURRENCIES.contains(&upper.as_str()) || typed_upper).then_some(upper)
        } else {
            None
        };

        if let Some(code) = code {
            if !codes.contains(&code) {
                codes.push(code);
            }
        }
    }

    codes
}

/// `a op b` found as three consecutive tokens
fn arithmetic_expression(tokens: &[&str]) -> Option<String> {
    tokens.windows(3).find_map(|w| {
        let is_number = |t: &str| t.parse::<f64>().is_ok();
        let is_op = matches!(w[1], "+" | "-" | "*" | "/" | "x");
        if is_number(w[0]) && is_op && is_number(w[2]) {
            let op = if w[1] == "x" { "*" } else { w[1] };
            Some(format!("{} {} {}", w[0], op, w[2]))
        } else {
            None
        }
    })
}
