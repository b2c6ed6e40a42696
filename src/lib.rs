pub mod agents;
pub mod charts;
pub mod chatlog;
pub mod config;
pub mod daemon;
pub mod domains;
pub mod error;
pub mod interfaces;
pub mod logging;
pub mod providers;
pub mod scheduler;
pub mod services;

pub type Result<T> = std::result::Result<T, error::AgentDeskError>;
