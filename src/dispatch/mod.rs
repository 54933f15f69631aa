//! Supervised dispatch loop
//!
//! ROUTING → EXECUTING(worker) → ROUTING → ... → DONE
//!
//! One routing decision per iteration, one worker at a time. The loop ends
//! on FINISH or when the iteration cap is reached; worker failures are
//! recorded in the conversation and never end the turn on their own.

use crate::error::OrchestrationError;
use crate::knowledge::KnowledgeBase;
use crate::models::{
    error_sequence, ConversationState, DispatchOutcome, DispatchPhase, Message, MessageRole,
    RouteTarget, RoutingDecision, Termination, WorkerId,
};
use crate::router::{Router, CLARIFICATION_MESSAGE};
use crate::worker::Worker;
use crate::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct Dispatcher {
    router: Arc<dyn Router>,
    workers: BTreeMap<WorkerId, Arc<dyn Worker>>,
    max_iterations: usize,
    knowledge_base: Option<Arc<dyn KnowledgeBase>>,
}

impl Dispatcher {
    pub fn new(
        router: Arc<dyn Router>,
        workers: Vec<Arc<dyn Worker>>,
        max_iterations: usize,
    ) -> Result<Self> {
        if max_iterations == 0 {
            return Err(OrchestrationError::ConfigError(
                "max_iterations must be at least 1".to_string(),
            ));
        }

        let workers = workers.into_iter().map(|w| (w.id(), w)).collect();

        Ok(Self {
            router,
            workers,
            max_iterations,
            knowledge_base: None,
        })
    }

    pub fn with_knowledge_base(mut self, knowledge_base: Arc<dyn KnowledgeBase>) -> Self {
        self.knowledge_base = Some(knowledge_base);
        self
    }

    pub fn registered_workers(&self) -> Vec<WorkerId> {
        self.workers.keys().copied().collect()
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Out-of-vocabulary targets become FINISH here as well as in the router
    fn validate(&self, decision: RoutingDecision) -> RoutingDecision {
        match decision.target {
            RouteTarget::Worker(worker) if !self.workers.contains_key(&worker) => {
                warn!(worker = %worker, "Router chose an unregistered worker, finishing");
                RoutingDecision::finish()
            }
            _ => decision,
        }
    }

    /// Run one turn. `state` must already end with the user's message.
    pub async fn run(&self, mut state: ConversationState) -> DispatchOutcome {
        let start_time = Instant::now();
        let registered = self.registered_workers();
        let mut trace = Vec::new();
        let mut iterations = 0;
        let mut workers_invoked = Vec::new();
        let mut rationale: Option<String> = None;

        info!(
            history = state.len(),
            max_iterations = self.max_iterations,
            "Dispatcher: starting turn"
        );

        trace.push("INPUT: User message received".to_string());

        if let Some(kb) = &self.knowledge_base {
            let context = match state.latest_user_utterance() {
                Some(utterance) => kb.lookup(utterance).await,
                None => None,
            };

            if let Some(context) = context {
                trace.push("KNOWLEDGE: Supplementary context added".to_string());
                state.push(Message::system(context));
            }
        }

        let mut phase = DispatchPhase::Routing;

        let termination = loop {
            match phase {
                DispatchPhase::Routing => {
                    if iterations >= self.max_iterations {
                        warn!(iterations, "Iteration cap reached, forcing completion");
                        trace.push(format!(
                            "DONE: Iteration cap of {} reached",
                            self.max_iterations
                        ));
                        break Termination::IterationCapReached;
                    }

                    let decision = self.validate(self.router.route(&state, &registered).await);

                    info!(iteration = iterations + 1, target = %decision.target, "Routing decision");
                    trace.push(format!("ROUTE: {}", decision.target));

                    phase = match decision.target {
                        RouteTarget::Worker(worker) => DispatchPhase::Executing(worker),
                        RouteTarget::Finish => {
                            rationale = decision.rationale;
                            DispatchPhase::Done
                        }
                    };
                }

                DispatchPhase::Executing(worker_id) => {
                    iterations += 1;
                    workers_invoked.push(worker_id);

                    let message = match self.workers.get(&worker_id) {
                        Some(worker) => match worker.run(&state).await {
                            Ok(report) => {
                                trace.push(format!(
                                    "EXECUTE: {} ({} lookup(s))",
                                    worker_id,
                                    report.observations.len()
                                ));
                                Message::from_worker(worker_id, report.content)
                            }
                            Err(e) => {
                                warn!(worker = %worker_id, error = %e, "Worker failed");
                                trace.push(format!("EXECUTE: {} failed", worker_id));
                                Message::from_worker(
                                    worker_id,
                                    format!(
                                        "Error from {}: {}",
                                        worker_id,
                                        error_sequence(&e.to_string())
                                    ),
                                )
                            }
                        },
                        // validate() keeps unregistered workers out of this phase
                        None => Message::from_worker(
                            worker_id,
                            error_sequence("Worker not registered").to_string(),
                        ),
                    };

                    debug!(worker = %worker_id, iteration = iterations, "Worker message appended");
                    state.push(message);
                    phase = DispatchPhase::Routing;
                }

                DispatchPhase::Done => {
                    trace.push("DONE: Router finished".to_string());
                    break Termination::Finished;
                }
            }
        };

        let answer = final_answer(&state, rationale);
        state.push(Message::assistant(answer));

        let execution_time_ms = start_time.elapsed().as_millis() as u64;

        info!(
            termination = ?termination,
            iterations,
            workers = ?workers_invoked,
            execution_time_ms,
            "Dispatcher: turn complete"
        );

        DispatchOutcome {
            state,
            termination,
            iterations,
            workers_invoked,
            trace,
            execution_time_ms,
        }
    }
}

fn final_answer(state: &ConversationState, rationale: Option<String>) -> String {
    let replies: Vec<&str> = state
        .current_turn()
        .iter()
        .filter(|m| m.role == MessageRole::Worker)
        .map(|m| m.content.as_str())
        .collect();

    if !replies.is_empty() {
        return replies.join("\n\n");
    }

    rationale.unwrap_or_else(|| CLARIFICATION_MESSAGE.to_string())
}
