use std::time::Duration;

use futures::future::try_join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;

/// Chess.com returns this many of the newest games across the latest archives.
pub const RECENT_GAMES_LIMIT: usize = 25;
const RECENT_ARCHIVES: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamePlayer {
    pub username: String,
    #[serde(default)]
    pub rating: u32,
    /// Chess.com result code: win, checkmated, resigned, agreed, ...
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChessComGame {
    pub url: String,
    #[serde(default)]
    pub pgn: String,
    #[serde(default)]
    pub time_control: String,
    pub end_time: i64,
    #[serde(default)]
    pub rated: bool,
    #[serde(default)]
    pub time_class: String,
    #[serde(default = "default_rules")]
    pub rules: String,
    #[serde(default)]
    pub fen: String,
    pub white: GamePlayer,
    pub black: GamePlayer,
}

fn default_rules() -> String {
    "chess".to_string()
}

#[derive(Deserialize)]
struct Archives {
    #[serde(default)]
    archives: Vec<String>,
}

#[derive(Deserialize)]
struct ArchiveGames {
    #[serde(default)]
    games: Vec<ChessComGame>,
}

#[derive(Clone)]
pub struct ChessComClient {
    client: Client,
    base_url: String,
}

impl ChessComClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent("ChessLookup/1.0")
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(format!("HTTP client setup failed: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, AppError> {
        tracing::debug!(url, "Chess.com request");
        let resp = self.client.get(url).send().await?.error_for_status()?;
        Ok(resp.json().await?)
    }

    /// Player profile with `country` reduced from its API URL to the code.
    pub async fn fetch_profile(&self, username: &str) -> Result<Value, AppError> {
        let url = format!("{}/player/{}", self.base_url, username);
        let mut profile: Value = self.get(&url).await?;

        let code = profile
            .get("country")
            .and_then(Value::as_str)
            .and_then(country_code);
        if let (Some(code), Some(obj)) = (code, profile.as_object_mut()) {
            obj.insert("country".to_string(), Value::String(code));
        }
        Ok(profile)
    }

    pub async fn fetch_stats(&self, username: &str) -> Result<Value, AppError> {
        let url = format!("{}/player/{}/stats", self.base_url, username);
        self.get(&url).await
    }

    /// Monthly archive URLs, oldest first as Chess.com lists them.
    pub async fn fetch_archives(&self, username: &str) -> Result<Vec<String>, AppError> {
        let url = format!("{}/player/{}/games/archives", self.base_url, username);
        let archives: Archives = self.get(&url).await?;
        Ok(archives.archives)
    }

    /// The newest games from the latest two monthly archives, newest first.
    pub async fn fetch_recent_games(&self, username: &str) -> Result<Vec<ChessComGame>, AppError> {
        let archives = self.fetch_archives(username).await?;
        let latest = &archives[archives.len().saturating_sub(RECENT_ARCHIVES)..];
        if latest.is_empty() {
            return Ok(Vec::new());
        }

        let months: Vec<ArchiveGames> =
            try_join_all(latest.iter().map(|url| self.get::<ArchiveGames>(url))).await?;

        let games = months.into_iter().flat_map(|m| m.games).collect();
        Ok(newest_first(games, RECENT_GAMES_LIMIT))
    }
}

/// "https://api.chess.com/pub/country/US" -> "US"
pub fn country_code(country_url: &str) -> Option<String> {
    country_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|code| !code.is_empty())
        .map(str::to_string)
}

fn newest_first(mut games: Vec<ChessComGame>, limit: usize) -> Vec<ChessComGame> {
    games.sort_by(|a, b| b.end_time.cmp(&a.end_time));
    games.truncate(limit);
    games
}
