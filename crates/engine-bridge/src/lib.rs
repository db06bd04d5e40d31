//! Background position evaluation through a UCI engine process.

pub mod bridge;
pub mod config;
pub mod error;
pub mod snapshot;
pub mod uci;

pub use bridge::{EngineStatus, EvalBridge};
pub use config::{EngineConfig, SearchLimits, HANDSHAKE, SEARCH_LIMITS};
pub use error::EngineError;
pub use snapshot::EvalSnapshot;
pub use uci::{parse_line, EngineMessage, InfoLine, Score, SuggestedMove};
