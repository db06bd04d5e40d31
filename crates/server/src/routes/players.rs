use std::str::FromStr;

use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use chess_core::{
    detect_opening,
    pgn::{extract_header, parse_game},
    MoveRecord, OpeningInfo,
};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clients::chess_com::{ChessComClient, ChessComGame, GamePlayer};
use crate::error::AppError;

/// Result codes Chess.com reports for the drawn side(s) of a game.
const DRAW_RESULTS: &[&str] = &[
    "stalemate",
    "draw",
    "agreed",
    "repetition",
    "insufficient",
    "50move",
    "timevsinsufficient",
];
const LOSS_RESULTS: &[&str] = &["checkmated", "resigned", "timeout", "abandoned", "lose"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

impl Outcome {
    pub fn from_result_code(code: &str) -> Option<Self> {
        let code = code.to_ascii_lowercase();
        if code == "win" {
            Some(Outcome::Win)
        } else if LOSS_RESULTS.contains(&code.as_str()) {
            Some(Outcome::Loss)
        } else if DRAW_RESULTS.contains(&code.as_str()) {
            Some(Outcome::Draw)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResultFilter {
    #[default]
    All,
    Only(Outcome),
}

impl FromStr for ResultFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "all" => Ok(ResultFilter::All),
            "win" => Ok(ResultFilter::Only(Outcome::Win)),
            "loss" => Ok(ResultFilter::Only(Outcome::Loss)),
            "draw" => Ok(ResultFilter::Only(Outcome::Draw)),
            other => Err(AppError::BadRequest(format!("Unknown result filter: {other}"))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct GamesQuery {
    pub result: Option<String>,
    pub time_class: Option<String>,
    pub opponent: Option<String>,
}

/// Filter over the recent games list, from the looked-up player's side.
#[derive(Debug, Clone, Default)]
pub struct GameFilter {
    pub result: ResultFilter,
    /// `None` matches every time class.
    pub time_class: Option<String>,
    /// Lowercased opponent-name fragment.
    pub opponent: Option<String>,
}

impl TryFrom<GamesQuery> for GameFilter {
    type Error = AppError;

    fn try_from(q: GamesQuery) -> Result<Self, Self::Error> {
        let result = q.result.as_deref().unwrap_or("all").parse()?;
        let time_class = q
            .time_class
            .map(|tc| tc.trim().to_ascii_lowercase())
            .filter(|tc| !tc.is_empty() && tc != "all");
        let opponent = q
            .opponent
            .map(|o| o.trim().to_lowercase())
            .filter(|o| !o.is_empty());
        Ok(Self {
            result,
            time_class,
            opponent,
        })
    }
}

impl GameFilter {
    pub fn matches(&self, username: &str, game: &ChessComGame) -> bool {
        let (player, opponent) = sides(username, game);

        if let ResultFilter::Only(wanted) = self.result {
            if Outcome::from_result_code(&player.result) != Some(wanted) {
                return false;
            }
        }
        if let Some(tc) = &self.time_class {
            if !game.time_class.eq_ignore_ascii_case(tc) {
                return false;
            }
        }
        if let Some(fragment) = &self.opponent {
            if !opponent.username.to_lowercase().contains(fragment.as_str()) {
                return false;
            }
        }
        true
    }
}

/// The looked-up player's side first, then the opponent's.
fn sides<'a>(username: &str, game: &'a ChessComGame) -> (&'a GamePlayer, &'a GamePlayer) {
    if game.white.username.eq_ignore_ascii_case(username) {
        (&game.white, &game.black)
    } else {
        (&game.black, &game.white)
    }
}

#[derive(Serialize)]
pub struct GameSummary {
    #[serde(flatten)]
    pub game: ChessComGame,
    /// Calendar date the game ended, UTC.
    pub end_date: Option<String>,
    pub player_outcome: Option<Outcome>,
    pub opening: Option<OpeningInfo>,
    pub move_history: Vec<MoveRecord>,
}

impl GameSummary {
    pub fn new(username: &str, game: ChessComGame) -> Self {
        let (player, _) = sides(username, &game);
        let player_outcome = Outcome::from_result_code(&player.result);
        let end_date = DateTime::from_timestamp(game.end_time, 0)
            .map(|dt| dt.date_naive().format("%Y-%m-%d").to_string());

        let (opening, move_history) = match parse_game(&game.pgn, None) {
            Ok(parsed) => {
                let moves: Vec<_> = parsed.plies.iter().map(|p| p.mv).collect();
                let records = chess_core::game_data::pair_plies(&parsed.sans());
                let opening = detect_opening(&moves).or_else(|| {
                    opening_from_headers(&game.pgn, parsed.metadata.eco.as_deref())
                });
                (opening, records)
            }
            Err(e) => {
                tracing::debug!(url = %game.url, error = %e, "Could not read game notation");
                (None, Vec::new())
            }
        };

        Self {
            game,
            end_date,
            player_outcome,
            opening,
            move_history,
        }
    }
}

/// Chess.com tags its games with an `ECOUrl` whose last segment names the line.
fn opening_from_headers(pgn: &str, eco: Option<&str>) -> Option<OpeningInfo> {
    let url = extract_header(pgn, "ECOUrl")?;
    let slug = url.trim_end_matches('/').rsplit('/').next()?;
    if slug.is_empty() {
        return None;
    }
    Some(OpeningInfo {
        name: slug.replace('-', " "),
        eco: eco.unwrap_or_default().to_string(),
    })
}

fn validate_username(username: &str) -> Result<String, AppError> {
    let username = username.trim();
    let valid = !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(AppError::BadRequest("Invalid username".into()));
    }
    Ok(username.to_ascii_lowercase())
}

pub async fn get_player_profile(
    Extension(client): Extension<ChessComClient>,
    Path(username): Path<String>,
) -> Result<Json<Value>, AppError> {
    let username = validate_username(&username)?;
    Ok(Json(client.fetch_profile(&username).await?))
}

pub async fn get_player_stats(
    Extension(client): Extension<ChessComClient>,
    Path(username): Path<String>,
) -> Result<Json<Value>, AppError> {
    let username = validate_username(&username)?;
    Ok(Json(client.fetch_stats(&username).await?))
}

pub async fn get_player_games(
    Extension(client): Extension<ChessComClient>,
    Path(username): Path<String>,
    Query(q): Query<GamesQuery>,
) -> Result<Json<Vec<GameSummary>>, AppError> {
    let username = validate_username(&username)?;
    let filter = GameFilter::try_from(q)?;

    let games = client.fetch_recent_games(&username).await?;
    let total = games.len();
    let summaries: Vec<GameSummary> = games
        .into_iter()
        // Variant games cannot be replayed with standard rules
        .filter(|g| g.rules == "chess")
        .filter(|g| filter.matches(&username, g))
        .map(|g| GameSummary::new(&username, g))
        .collect();

    tracing::info!(username = %username, total, shown = summaries.len(), "Recent games");
    Ok(Json(summaries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn game(white: (&str, &str), black: (&str, &str), time_class: &str) -> ChessComGame {
        serde_json::from_value(json!({
            "url": "https://www.chess.com/game/live/1",
            "pgn": "[White \"a\"]\n\n1. e4 e5 2. Nf3 Nc6 3. Bb5 a6 1-0",
            "end_time": 1_700_000_000,
            "time_class": time_class,
            "rules": "chess",
            "white": { "username": white.0, "rating": 1500, "result": white.1 },
            "black": { "username": black.0, "rating": 1500, "result": black.1 },
        }))
        .unwrap()
    }

    fn filter(result: &str, time_class: &str, opponent: &str) -> GameFilter {
        GameFilter::try_from(GamesQuery {
            result: Some(result.into()),
            time_class: Some(time_class.into()),
            opponent: Some(opponent.into()),
        })
        .unwrap()
    }

    #[test]
    fn test_outcome_codes() {
        assert_eq!(Outcome::from_result_code("win"), Some(Outcome::Win));
        assert_eq!(Outcome::from_result_code("timeout"), Some(Outcome::Loss));
        assert_eq!(Outcome::from_result_code("50move"), Some(Outcome::Draw));
        assert_eq!(Outcome::from_result_code("Agreed"), Some(Outcome::Draw));
        assert_eq!(Outcome::from_result_code("bughousepartnerlose"), None);
    }

    #[test]
    fn test_result_filter_uses_players_side() {
        let g = game(("Hikaru", "win"), ("magnus", "resigned"), "blitz");
        assert!(filter("win", "all", "").matches("hikaru", &g));
        assert!(!filter("win", "all", "").matches("magnus", &g));
        assert!(filter("loss", "all", "").matches("magnus", &g));
        assert!(!filter("draw", "all", "").matches("magnus", &g));
    }

    #[test]
    fn test_time_class_and_opponent() {
        let g = game(("hikaru", "agreed"), ("MagnusCarlsen", "agreed"), "rapid");
        assert!(filter("all", "Rapid", "carl").matches("hikaru", &g));
        assert!(!filter("all", "blitz", "").matches("hikaru", &g));
        // The player's own name never matches the opponent search.
        assert!(!filter("all", "all", "hika").matches("hikaru", &g));
    }

    #[test]
    fn test_unknown_result_filter_rejected() {
        let err = GameFilter::try_from(GamesQuery {
            result: Some("wins".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_summary_attaches_opening_and_moves() {
        let g = game(("hikaru", "win"), ("magnus", "resigned"), "blitz");
        let summary = GameSummary::new("hikaru", g);
        assert_eq!(summary.player_outcome, Some(Outcome::Win));
        assert_eq!(summary.opening.unwrap().name, "Ruy Lopez");
        assert_eq!(summary.move_history.len(), 3);
        assert_eq!(summary.move_history[2], MoveRecord::new(3, "Bb5", "a6"));
        assert_eq!(summary.end_date.as_deref(), Some("2023-11-14"));
    }

    #[test]
    fn test_opening_falls_back_to_eco_url() {
        let pgn = "[ECO \"A00\"]\n[ECOUrl \"https://www.chess.com/openings/Grob-Opening\"]\n\n1. g4 d5 *";
        let opening = opening_from_headers(pgn, Some("A00")).unwrap();
        assert_eq!(opening.name, "Grob Opening");
        assert_eq!(opening.eco, "A00");
        assert_eq!(opening_from_headers("1. g4 d5 *", None), None);
    }

    #[test]
    fn test_summary_json_is_snake_case() {
        let g = game(("hikaru", "win"), ("magnus", "resigned"), "blitz");
        let json = serde_json::to_value(GameSummary::new("hikaru", g)).unwrap();
        for key in ["end_time", "time_class", "end_date", "player_outcome", "move_history"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["move_history"][0]["white_notation"], "e4");
        assert_eq!(json["player_outcome"], "win");
    }

    #[test]
    fn test_username_validation() {
        assert_eq!(validate_username(" Hikaru ").unwrap(), "hikaru");
        assert!(validate_username("../etc").is_err());
        assert!(validate_username("").is_err());
    }
}
