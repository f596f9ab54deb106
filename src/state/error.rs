use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to initialize model client: {0}")]
    Llm(#[source] anyhow::Error),

    #[error("Failed to initialize document store: {0}")]
    Store(#[source] anyhow::Error),

    #[error("Failed to initialize conversation store: {0}")]
    Conversations(#[source] anyhow::Error),
}
