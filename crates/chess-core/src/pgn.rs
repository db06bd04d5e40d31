//! PGN loading: regex-based header/comment stripping, with every move
//! checked against shakmaty.

use std::sync::LazyLock;

use regex::Regex;
use shakmaty::{fen::Fen, san::SanPlus, CastlingMode, Chess, EnPassantMode};

use crate::error::NotationError;
use crate::game_data::{GameMetadata, Ply};

pub const STANDARD_START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\[(\w+)\s+"([^"]*)"\]"#).expect("header regex"));
static TAG_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\[\w+\s+"(?:[^"\\]|\\.)*"\]"#).expect("tag regex"));
static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^}]*\}|;[^\n]*").expect("comment regex"));
static VARIATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^()]*\)").expect("variation regex"));
static MOVE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.+").expect("move number regex"));

const RESULT_TOKENS: [&str; 4] = ["1-0", "0-1", "1/2-1/2", "*"];

/// A game whose every ply has been resolved by the rules engine.
#[derive(Debug, Clone)]
pub struct ParsedGame {
    pub metadata: GameMetadata,
    pub start: Chess,
    pub plies: Vec<Ply>,
}

impl ParsedGame {
    pub fn sans(&self) -> Vec<String> {
        self.plies.iter().map(|p| p.san.clone()).collect()
    }
}

/// Parse full notation text. `initial_fen` overrides any FEN header.
pub fn parse_game(text: &str, initial_fen: Option<&str>) -> Result<ParsedGame, NotationError> {
    let metadata = parse_headers(text);
    let start = start_position(initial_fen.or(metadata.fen.as_deref()))?;
    let tokens = movetext_tokens(text);
    let plies = replay_sans(&start, &tokens)?;

    Ok(ParsedGame {
        metadata,
        start,
        plies,
    })
}

/// Collect the tag pairs this crate cares about.
pub fn parse_headers(text: &str) -> GameMetadata {
    let mut metadata = GameMetadata {
        white: "Unknown".to_string(),
        black: "Unknown".to_string(),
        result: "*".to_string(),
        ..GameMetadata::default()
    };

    for cap in HEADER_RE.captures_iter(text) {
        let value = cap[2].to_string();
        match &cap[1] {
            "White" => metadata.white = value,
            "Black" => metadata.black = value,
            "Result" => metadata.result = value,
            "Date" => metadata.date = Some(value),
            "TimeControl" => metadata.time_control = Some(value),
            "ECO" => metadata.eco = Some(value),
            "Event" => metadata.event = Some(value),
            "Link" => metadata.link = Some(value),
            "FEN" => metadata.fen = Some(value),
            _ => {}
        }
    }

    metadata
}

/// Resolve a starting position, defaulting to the standard one.
pub fn start_position(fen: Option<&str>) -> Result<Chess, NotationError> {
    let Some(fen) = fen.map(str::trim).filter(|f| !f.is_empty()) else {
        return Ok(Chess::default());
    };

    let parsed: Fen = fen
        .parse()
        .map_err(|_| NotationError::InvalidFen(fen.to_string()))?;
    parsed
        .into_position(CastlingMode::Standard)
        .map_err(|_| NotationError::InvalidFen(fen.to_string()))
}

/// Render a position as FEN text.
pub fn to_fen(pos: &Chess) -> String {
    Fen::from_position(pos, EnPassantMode::Legal).to_string()
}

/// Split movetext into bare SAN tokens.
fn movetext_tokens(text: &str) -> Vec<String> {
    let no_headers = TAG_LINE_RE.replace_all(text, " ");
    let mut body = COMMENT_RE.replace_all(&no_headers, " ").into_owned();

    // Innermost variations first until nothing nests.
    loop {
        let stripped = VARIATION_RE.replace_all(&body, " ").into_owned();
        if stripped == body {
            break;
        }
        body = stripped;
    }

    body.split_whitespace()
        .map(|token| MOVE_NUMBER_RE.replace(token, "").into_owned())
        .filter(|token| !token.is_empty())
        .filter(|token| !token.starts_with('$'))
        .filter(|token| !RESULT_TOKENS.contains(&token.as_str()))
        .map(|token| token.trim_end_matches(['!', '?']).to_string())
        .map(|token| {
            // Castling is sometimes written with zeros.
            if token.starts_with("0-0") {
                token.replace('0', "O")
            } else {
                token
            }
        })
        .collect()
}

/// Play each token from `start`, failing on the first one the rules engine rejects.
fn replay_sans(start: &Chess, tokens: &[String]) -> Result<Vec<Ply>, NotationError> {
    let mut pos = start.clone();
    let mut plies = Vec::with_capacity(tokens.len());

    for (ply, token) in tokens.iter().enumerate() {
        let san_plus = SanPlus::from_ascii(token.as_bytes()).map_err(|_| NotationError::InvalidSan {
            ply,
            san: token.clone(),
        })?;
        let mv = san_plus
            .san
            .to_move(&pos)
            .map_err(|_| NotationError::IllegalMove {
                ply,
                san: token.clone(),
            })?;
        let rendered = SanPlus::from_move_and_play_unchecked(&mut pos, mv);
        plies.push(Ply {
            san: rendered.to_string(),
            mv,
        });
    }

    Ok(plies)
}

/// Extract a string value from a PGN header (e.g. WhiteTitle, BlackTitle).
pub fn extract_header(pgn: &str, header_name: &str) -> Option<String> {
    let pattern = format!(r#"\[{}\s+"([^"]*)"\]"#, regex::escape(header_name));
    let re = Regex::new(&pattern).ok()?;
    let value = re.captures(pgn)?.get(1)?.as_str().to_string();
    if value.is_empty() { None } else { Some(value) }
}
