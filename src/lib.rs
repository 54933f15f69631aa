//! Finance Chat Orchestrator
//!
//! A finance chatbot built around a supervised dispatch loop:
//! - A router picks one specialist worker (account, transaction, card,
//!   exchange rate) or FINISH for each round
//! - Workers answer from read-only mock banking data through tool registries
//! - Failures become error-shaped data in the conversation, never a crash
//! - Threads are kept in memory and served over a CLI and an HTTP API
//!
//! DISPATCH LOOP:
//! INPUT → ROUTE → EXECUTE → ROUTE → ... → DONE

pub mod api;
pub mod config;
pub mod data;
pub mod dispatch;
pub mod error;
pub mod execution;
pub mod knowledge;
pub mod llm;
pub mod models;
pub mod planner;
pub mod router;
pub mod service;
pub mod session;
pub mod tools;
pub mod worker;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use service::{build_chat_service, ChatService, TurnResponse};
