// Signal lifecycle and order orchestration
pub mod book;
pub mod engine;

pub use book::{SignalBook, SignalGroup};
pub use engine::{BreakEvenCandidate, Orchestrator};
