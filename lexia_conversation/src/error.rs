use thiserror::Error;

/// Failures while answering one request.
#[derive(Debug, Error)]
pub enum AgentError {
    /// A credential or setting the request needs is absent.
    #[error("{0} not found in variables")]
    ConfigurationMissing(String),

    #[error("Error processing message: {0}")]
    Upstream(#[from] anyhow::Error),

    #[error("Response sink failed: {0}")]
    Sink(#[source] anyhow::Error),

    #[error("Invalid arguments for function {name}: {reason}")]
    InvalidToolCall { name: String, reason: String },
}

impl AgentError {
    /// Message reported to the client through the sink.
    #[must_use]
    pub fn client_message(&self) -> String {
        self.to_string()
    }
}
