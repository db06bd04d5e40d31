use std::env;

use engine_bridge::EngineConfig;

pub const DEFAULT_CHESS_COM_BASE_URL: &str = "https://api.chess.com/pub";

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub chess_com_base_url: String,
    pub stockfish_path: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            chess_com_base_url: env::var("CHESS_COM_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_CHESS_COM_BASE_URL.to_string()),
            stockfish_path: env::var("STOCKFISH_PATH")
                .unwrap_or_else(|_| "/usr/local/bin/stockfish".to_string()),
        }
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig::new(self.stockfish_path.clone())
    }
}
