//! Class-scoped AI assistant: one-shot questions, chat sessions, and the
//! handlers that expose them.

pub mod chat;
pub mod handlers;
pub mod query;
pub mod registry;
