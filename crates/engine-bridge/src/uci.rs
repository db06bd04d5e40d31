//! Parsing of the engine's line-oriented UCI output.

use shakmaty::{uci::UciMove, Role, Square};

/// Score as reported by the engine, from the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Centipawns(i32),
    /// Mate in N moves (positive = side to move mates, negative = gets mated)
    Mate(i32),
}

/// A depth/score progress line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoLine {
    pub depth: u32,
    pub score: Score,
    pub pv: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestedMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Role>,
}

impl SuggestedMove {
    pub fn parse(uci: &str) -> Option<Self> {
        match uci.parse::<UciMove>().ok()? {
            UciMove::Normal {
                from,
                to,
                promotion,
            } => Some(Self {
                from,
                to,
                promotion,
            }),
            _ => None,
        }
    }
}

/// The engine messages the bridge reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineMessage {
    ReadyOk,
    Info(InfoLine),
    /// `None` for `bestmove (none)` in mated or stalemated positions.
    BestMove(Option<SuggestedMove>),
}

/// Classify one output line. Anything unrecognized yields `None`.
pub fn parse_line(line: &str) -> Option<EngineMessage> {
    let trimmed = line.trim();

    if trimmed == "readyok" {
        return Some(EngineMessage::ReadyOk);
    }

    if trimmed.starts_with("bestmove") {
        let best = trimmed
            .split_whitespace()
            .nth(1)
            .and_then(SuggestedMove::parse);
        return Some(EngineMessage::BestMove(best));
    }

    if trimmed.starts_with("info") {
        let depth = parse_depth(trimmed)?;
        let score = match (parse_cp(trimmed), parse_mate(trimmed)) {
            (_, Some(mate)) => Score::Mate(mate),
            (Some(cp), None) => Score::Centipawns(cp),
            (None, None) => return None,
        };
        return Some(EngineMessage::Info(InfoLine {
            depth,
            score,
            pv: parse_pv(trimmed),
        }));
    }

    None
}

/// Value following the first `key` token.
fn value_after<T: std::str::FromStr>(line: &str, key: &str) -> Option<T> {
    let mut tokens = line.split_whitespace();
    tokens.find(|t| *t == key)?;
    tokens.next()?.parse().ok()
}

fn parse_depth(line: &str) -> Option<u32> {
    value_after(line, "depth")
}

fn parse_cp(line: &str) -> Option<i32> {
    value_after(line, "cp")
}

fn parse_mate(line: &str) -> Option<i32> {
    value_after(line, "mate")
}

/// Moves after `pv`, up to a trailing `bmc` or `string` field.
fn parse_pv(line: &str) -> Vec<String> {
    line.split_whitespace()
        .skip_while(|t| *t != "pv")
        .skip(1)
        .take_while(|t| !t.starts_with("bmc") && *t != "string")
        .map(str::to_string)
        .collect()
}
