#![warn(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Request handling for the Lexia agent.
//!
//! An [`Agent`] owns its collaborators (provider resolver, conversation
//! memory, tools, attachment loader) and answers one [`AgentRequest`] at a
//! time per call, streaming output to a [`ResponseSink`]. Many requests may
//! run concurrently against one agent.
//!
//! [`AgentRequest`]: lexia_core::AgentRequest
//! [`ResponseSink`]: lexia_core::ResponseSink

mod accumulator;
mod agent;
mod error;

pub use accumulator::ToolCallAccumulator;
pub use agent::{Agent, AgentConfig, TurnOutcome};
pub use error::AgentError;
