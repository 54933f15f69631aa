//! Core data models for the finance chat orchestrator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use uuid::Uuid;

/// Wire label of the terminal routing decision
pub const FINISH_LABEL: &str = "FINISH";

//
// ================= Workers =================
//

/// Closed set of specialist workers the supervisor can route to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum WorkerId {
    Account,
    Transaction,
    Card,
    ExchangeRate,
}

impl WorkerId {
    pub const ALL: [WorkerId; 4] = [
        WorkerId::Account,
        WorkerId::Transaction,
        WorkerId::Card,
        WorkerId::ExchangeRate,
    ];

    /// Routing label used in prompts and message tags
    pub fn label(&self) -> &'static str {
        match self {
            WorkerId::Account => "account_agent",
            WorkerId::Transaction => "transaction_agent",
            WorkerId::Card => "card_agent",
            WorkerId::ExchangeRate => "exchange_rate_agent",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            WorkerId::Account => "Handles queries about account summaries (balance, type).",
            WorkerId::Transaction => {
                "Handles queries about transaction history, cancellations and disputes."
            }
            WorkerId::Card => {
                "Handles queries about credit card details (limit, balance, due date)."
            }
            WorkerId::ExchangeRate => {
                "Handles queries about currency exchange rates and performs conversions."
            }
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|w| w.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

//
// ================= Routing =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind", content = "worker")]
pub enum RouteTarget {
    Worker(WorkerId),
    Finish,
}

impl fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteTarget::Worker(worker) => write!(f, "{}", worker),
            RouteTarget::Finish => f.write_str(FINISH_LABEL),
        }
    }
}

/// One routing round's output. Never persisted past the current iteration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutingDecision {
    pub target: RouteTarget,
    pub rationale: Option<String>,
}

impl RoutingDecision {
    pub fn worker(worker: WorkerId) -> Self {
        Self {
            target: RouteTarget::Worker(worker),
            rationale: None,
        }
    }

    pub fn finish() -> Self {
        Self {
            target: RouteTarget::Finish,
            rationale: None,
        }
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    pub fn is_finish(&self) -> bool {
        self.target == RouteTarget::Finish
    }
}

//
// ================= Conversation =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    Worker,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub message_id: Uuid,
    pub role: MessageRole,
    /// Set only on worker messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<WorkerId>,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: MessageRole, worker: Option<WorkerId>, content: String) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            role,
            worker,
            content,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::User, None, content.into())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Assistant, None, content.into())
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::System, None, content.into())
    }

    pub fn from_worker(worker: WorkerId, content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Worker, Some(worker), content.into())
    }
}

/// Append-only conversation state owned by the dispatch loop for one turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationState {
    messages: Vec<Message>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_history(history: Vec<Message>) -> Self {
        Self { messages: history }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    fn last_user_index(&self) -> Option<usize> {
        self.messages
            .iter()
            .rposition(|m| m.role == MessageRole::User)
    }

    /// Content of the most recent user message
    pub fn latest_user_utterance(&self) -> Option<&str> {
        self.last_user_index()
            .map(|idx| self.messages[idx].content.as_str())
    }

    /// Messages appended after the most recent user message
    pub fn current_turn(&self) -> &[Message] {
        match self.last_user_index() {
            Some(idx) => &self.messages[idx + 1..],
            None => &[],
        }
    }

    /// Workers that already replied in the current turn, in order
    pub fn workers_in_current_turn(&self) -> Vec<WorkerId> {
        self.current_turn()
            .iter()
            .filter_map(|m| m.worker)
            .collect()
    }

    /// Plain-text transcript for prompts
    pub fn format_transcript(&self) -> String {
        let mut transcript = String::new();

        for msg in &self.messages {
            let speaker = match (msg.role, msg.worker) {
                (MessageRole::User, _) => "User".to_string(),
                (MessageRole::Assistant, _) => "Assistant".to_string(),
                (MessageRole::System, _) => "System".to_string(),
                (MessageRole::Worker, Some(worker)) => worker.label().to_string(),
                (MessageRole::Worker, None) => "Worker".to_string(),
            };
            transcript.push_str(&format!("{}: {}\n", speaker, msg.content));
        }

        transcript
    }
}

//
// ================= Tool I/O =================
//

/// A single data-lookup call: tool name plus fixed-shape JSON arguments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInput {
    pub tool_name: String,
    pub parameters: Value,
}

impl ToolInput {
    pub fn new(tool_name: impl Into<String>, parameters: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            parameters,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolOutput {
    pub success: bool,
    pub data: Value,
    pub error: Option<String>,
}

impl ToolOutput {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    /// Single-element error sequence: `[{"Error": message}]`
    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            data: error_sequence(&message),
            error: Some(message),
        }
    }
}

pub fn error_sequence(message: &str) -> Value {
    json!([{ "Error": message }])
}

/// Returns the message when `data` is exactly `[{"Error": msg}]`
pub fn error_message(data: &Value) -> Option<&str> {
    match data.as_array().map(Vec::as_slice) {
        Some([only]) => {
            let obj = only.as_object()?;
            if obj.len() == 1 {
                obj.get("Error").and_then(Value::as_str)
            } else {
                None
            }
        }
        _ => None,
    }
}

//
// ================= Execution =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    pub observation_id: Uuid,
    pub tool_name: String,
    pub tool_input: Value,
    pub tool_output: Value,
    pub execution_time_ms: u64,
    pub created_at: DateTime<Utc>,
    pub status: ExecutionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failed,
    Skipped,
}

/// What a worker hands back to the dispatch loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerReport {
    pub worker: WorkerId,
    pub content: String,
    pub observations: Vec<Observation>,
}

//
// ================= Dispatch Outcome =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPhase {
    Routing,
    Executing(WorkerId),
    Done,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Finished,
    IterationCapReached,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub state: ConversationState,
    pub termination: Termination,
    /// Worker executions performed in this turn
    pub iterations: usize,
    pub workers_invoked: Vec<WorkerId>,
    pub trace: Vec<String>,
    pub execution_time_ms: u64,
}

impl DispatchOutcome {
    /// The final assistant-facing message of the turn
    pub fn final_answer(&self) -> Option<&str> {
        self.state
            .current_turn()
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
            .map(|m| m.content.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_labels_round_trip() {
        for worker in WorkerId::ALL {
            assert_eq!(WorkerId::from_label(worker.label()), Some(worker));
        }
        assert_eq!(WorkerId::from_label("ACCOUNT_AGENT"), Some(WorkerId::Account));
        assert_eq!(WorkerId::from_label("loan_agent"), None);
        assert_eq!(WorkerId::from_label(FINISH_LABEL), None);
    }

    #[test]
    fn test_current_turn_starts_after_latest_user_message() {
        let mut state = ConversationState::new();
        state.push(Message::user("first question"));
        state.push(Message::from_worker(WorkerId::Account, "answer one"));
        state.push(Message::assistant("answer one"));
        state.push(Message::user("second question"));
        state.push(Message::from_worker(WorkerId::Card, "card answer"));

        assert_eq!(state.latest_user_utterance(), Some("second question"));
        assert_eq!(state.current_turn().len(), 1);
        assert_eq!(state.workers_in_current_turn(), vec![WorkerId::Card]);
    }

    #[test]
    fn test_empty_state_has_no_turn() {
        let state = ConversationState::new();
        assert!(state.latest_user_utterance().is_none());
        assert!(state.current_turn().is_empty());
    }

    #[test]
    fn test_error_sequence_detection() {
        let output = ToolOutput::error("Transaction not found");
        assert!(!output.success);
        assert_eq!(output.data, json!([{ "Error": "Transaction not found" }]));
        assert_eq!(error_message(&output.data), Some("Transaction not found"));

        let per_code = json!([{ "Code": "XYZ", "Error": "Rate not found" }]);
        assert_eq!(error_message(&per_code), None);
    }

    #[test]
    fn test_transcript_tags_workers() {
        let mut state = ConversationState::new();
        state.push(Message::user("rate for USD"));
        state.push(Message::from_worker(WorkerId::ExchangeRate, "3.64"));

        let transcript = state.format_transcript();
        assert!(transcript.contains("User: rate for USD"));
        assert!(transcript.contains("exchange_rate_agent: 3.64"));
    }
}
