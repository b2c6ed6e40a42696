use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentDeskError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("dispatch error: {0}")]
    Dispatch(String),
    #[error("render error: {0}")]
    Render(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

pub use crate::Result;
