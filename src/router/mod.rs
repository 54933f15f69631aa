//! Router: decides the next worker or FINISH
//!
//! Routing is infallible. Anything the router cannot interpret becomes
//! FINISH, so an unknown label never reaches the dispatch loop.

pub mod llm;

pub use llm::LlmRouter;

use crate::models::{ConversationState, RouteTarget, RoutingDecision, WorkerId, FINISH_LABEL};
use crate::planner::keyword::is_reference;
use async_trait::async_trait;
use tracing::debug;

pub const CAPABILITIES_MESSAGE: &str = "I am a Finance Bank Agent. I can help you with the following financial tasks:
- Get a summary of your accounts and check the balance of a specific account.
- View recent transaction history or the details of a specific transaction.
- Request cancellation of a transaction or raise a dispute (simulated).
- Get details for your credit cards (limit, balances, due date).
- Look up exchange rates against the Qatari Riyal and convert amounts.

Please include account numbers, card identifiers (last 4 digits or serial number), transaction IDs or currency codes where relevant.";

pub const OUT_OF_SCOPE_MESSAGE: &str = "I am a Finance Bank Agent and can only assist with financial matters related to your accounts, cards, transactions, and exchange rates.";

pub const CLARIFICATION_MESSAGE: &str = "I'm sorry, I couldn't understand that request. As a Finance Bank Agent, I can help with account balances, transactions, card details, and exchange rates. Could you please rephrase your financial query?";

/// Trait for routing (LLM or deterministic)
#[async_trait]
pub trait Router: Send + Sync {
    /// Pick one of `workers` or FINISH. Must not fail.
    async fn route(&self, state: &ConversationState, workers: &[WorkerId]) -> RoutingDecision;
}

/// Interpret a raw routing label against the registered workers.
///
/// Trims whitespace, surrounding quotes or backticks and a trailing period,
/// then compares case-insensitively.
pub fn parse_route_label(raw: &str, workers: &[WorkerId]) -> Option<RouteTarget> {
    let strip = |s: &str| -> String {
        s.trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
            .trim()
            .to_string()
    };
    let cleaned = strip(strip(raw).trim_end_matches('.'));

    if cleaned.eq_ignore_ascii_case(FINISH_LABEL) {
        return Some(RouteTarget::Finish);
    }

    WorkerId::from_label(&cleaned)
        .filter(|w| workers.contains(w))
        .map(RouteTarget::Worker)
}

//
// ================= Keyword Router =================
//

const META_QUERIES: &[&str] = &[
    "help",
    "capabilities",
    "what can you do",
    "what can you help with",
    "what can you help me with",
    "what do you do",
];

const OUT_OF_SCOPE_KEYWORDS: &[&str] = &[
    "weather", "news", "recipe", "joke", "translate", "capital of", "movie", "sports",
];

/// Weight of a primary keyword; one is enough to pick a follow-up worker
const PRIMARY_WEIGHT: u32 = 2;
const SECONDARY_WEIGHT: u32 = 1;

const ACCOUNT_PRIMARY: &[&str] = &["account", "accounts"];
const ACCOUNT_SECONDARY: &[&str] = &["balance", "balances", "summary", "dashboard", "savings", "deposit"];

const TRANSACTION_PRIMARY: &[&str] = &["transaction", "transactions", "txn"];
/// Count for the transaction worker only next to a transaction reference
const TRANSACTION_ACTIONS: &[&str] = &["dispute", "cancel"];
const TRANSACTION_SECONDARY: &[&str] = &[
    "history", "payment", "payments", "spent", "purchase", "charged", "statement",
];

const CARD_PRIMARY: &[&str] = &["card", "cards", "credit"];
const CARD_SECONDARY: &[&str] = &["limit", "due", "outstanding", "visa", "mastercard"];

const EXCHANGE_PRIMARY: &[&str] = &["exchange", "rate", "rates", "convert", "conversion", "currency"];
const EXCHANGE_SECONDARY: &[&str] = &[
    "usd", "eur", "gbp", "inr", "dollar", "dollars", "euro", "euros", "pound", "rupee", "forex",
    "fx", "calculate",
];

fn keywords(worker: WorkerId) -> (&'static [&'static str], &'static [&'static str]) {
    match worker {
        WorkerId::Account => (ACCOUNT_PRIMARY, ACCOUNT_SECONDARY),
        WorkerId::Transaction => (TRANSACTION_PRIMARY, TRANSACTION_SECONDARY),
        WorkerId::Card => (CARD_PRIMARY, CARD_SECONDARY),
        WorkerId::ExchangeRate => (EXCHANGE_PRIMARY, EXCHANGE_SECONDARY),
    }
}

/// Deterministic router based on weighted keyword scores
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordRouter;

impl KeywordRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn score(worker: WorkerId, words: &[String]) -> u32 {
        let (primary, secondary) = keywords(worker);

        // "cancel my card" is not a transaction request
        let transaction_context = worker == WorkerId::Transaction
            && words
                .iter()
                .any(|w| TRANSACTION_PRIMARY.contains(&w.as_str()) || is_reference(w));

        words
            .iter()
            .map(|w| {
                if transaction_context && TRANSACTION_ACTIONS.contains(&w.as_str()) {
                    PRIMARY_WEIGHT
                } else if primary.contains(&w.as_str()) {
                    PRIMARY_WEIGHT
                } else if secondary.contains(&w.as_str()) {
                    SECONDARY_WEIGHT
                } else {
                    0
                }
            })
            .sum()
    }

    fn decide(utterance: &str, invoked: &[WorkerId], workers: &[WorkerId]) -> RoutingDecision {
        let lowered = utterance.trim().to_lowercase();
        let normalized = lowered.trim_end_matches(['?', '!', '.']).trim();

        let words: Vec<String> = lowered
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();

        let best = workers
            .iter()
            .copied()
            .filter(|w| !invoked.contains(w))
            .map(|w| (w, Self::score(w, &words)))
            // Ties go to the earlier registered worker.
            .fold(None::<(WorkerId, u32)>, |best, (w, s)| match best {
                Some((_, top)) if top >= s => best,
                _ => Some((w, s)),
            });

        if invoked.is_empty() {
            if META_QUERIES.contains(&normalized) {
                return RoutingDecision::finish().with_rationale(CAPABILITIES_MESSAGE);
            }

            return match best {
                Some((worker, score)) if score > 0 => RoutingDecision::worker(worker),
                _ if OUT_OF_SCOPE_KEYWORDS.iter().any(|k| lowered.contains(k)) => {
                    RoutingDecision::finish().with_rationale(OUT_OF_SCOPE_MESSAGE)
                }
                _ => RoutingDecision::finish().with_rationale(CLARIFICATION_MESSAGE),
            };
        }

        // Follow-up workers need their own primary keyword in the request.
        match best {
            Some((worker, score)) if score >= PRIMARY_WEIGHT => RoutingDecision::worker(worker),
            _ => RoutingDecision::finish(),
        }
    }
}

#[async_trait]
impl Router for KeywordRouter {
    async fn route(&self, state: &ConversationState, workers: &[WorkerId]) -> RoutingDecision {
        let Some(utterance) = state.latest_user_utterance() else {
            return RoutingDecision::finish();
        };

        let invoked = state.workers_in_current_turn();
        let decision = Self::decide(utterance, &invoked, workers);

        debug!(target_label = %decision.target, invoked = ?invoked, "Keyword routing decision");

        decision
    }
}
