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

pub mod openai;
pub mod relay;
pub mod retry;
pub mod sse;

pub use openai::{OpenAIProvider, OpenAIProviderResolver};
pub use relay::{RelaySink, RelaySinkFactory};
pub use retry::{RetryPolicy, retry_with_backoff};
