// Core modules
pub mod broker;
pub mod channel;
pub mod commands;
pub mod config;
pub mod decision;
pub mod error;
pub mod models;
pub mod monitor;
pub mod orchestrator;
pub mod parser;
pub mod symbols;

// Re-export commonly used types
pub use error::{ModificationError, ParseError, PlacementError, StaleDataError};
pub use models::*;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
