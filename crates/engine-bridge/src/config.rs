//! Engine configuration. Only the binary location comes from the
//! environment; search settings are fixed.

use std::env;

/// Sent once after spawning, before `readyok` is awaited.
pub const HANDSHAKE: &[&str] = &[
    "uci",
    "setoption name MultiPV value 1",
    "setoption name Threads value 1",
    "setoption name Hash value 16",
    "setoption name Skill Level value 10",
    "setoption name Move Overhead value 10",
    "setoption name Minimum Thinking Time value 20",
    "setoption name Slow Mover value 80",
    "isready",
];

/// Bounds passed with every `go`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchLimits {
    pub movetime_ms: u32,
    pub depth: u32,
}

pub const SEARCH_LIMITS: SearchLimits = SearchLimits {
    movetime_ms: 500,
    depth: 15,
};

impl SearchLimits {
    pub fn go_command(&self) -> String {
        format!("go movetime {} depth {}", self.movetime_ms, self.depth)
    }
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Path to the UCI engine binary
    pub path: String,
}

impl EngineConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_env() -> Self {
        let path = env::var("STOCKFISH_PATH")
            .unwrap_or_else(|_| "/usr/local/bin/stockfish".to_string());
        Self { path }
    }
}
