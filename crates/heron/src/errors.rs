use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    #[error("Provider error: {0}")]
    Provider(#[from] anyhow::Error),

    #[error("Agent stopped after {0} iterations without a final answer")]
    IterationLimit(usize),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Outcome of a single tool body. Recoverable failures become tool output the
/// model can read; fatal ones abort the agent run.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{0}")]
    Recoverable(String),

    #[error(transparent)]
    Fatal(#[from] AgentError),
}

impl ToolError {
    pub fn recoverable<S: Into<String>>(message: S) -> Self {
        ToolError::Recoverable(message.into())
    }
}

impl From<anyhow::Error> for ToolError {
    fn from(err: anyhow::Error) -> Self {
        ToolError::Fatal(AgentError::Provider(err))
    }
}

pub type ToolResult<T> = Result<T, ToolError>;
