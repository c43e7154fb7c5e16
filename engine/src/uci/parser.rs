use smallvec::SmallVec;

use crate::analysis::{AnalysisLine, LineMove, Score, Side};
use crate::options::{is_supported, EngineOption, OptionKind, OptionValue};
use crate::target::AnalysisTarget;

/// Decoded form of one line of engine output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    CurrentMove {
        mv: String,
        number: u32,
        depth: u32,
    },
    PrincipalVariation(AnalysisLine),
    /// End of one `go` cycle.
    BestMoveFound {
        mv: Option<String>,
        ponder: Option<String>,
    },
    EngineIdentity {
        name: String,
    },
    OptionDeclared(EngineOption),
    OptionsReady,
    Ignored,
}

type Tokens<'a> = SmallVec<[&'a str; 32]>;

/// Decode a single line of engine output.
///
/// Dispatch is by marker tokens anywhere in the line, first match wins:
/// `currmove`, `pv`, `bestmove`, `id`+`name`, `option`+`name`, `uciok`.
/// Missing or malformed companion values fall back to defaults; nothing here
/// is ever an error.
pub fn decode(line: &str, target: Option<&AnalysisTarget>) -> EngineEvent {
    let tokens: Tokens = line.split_whitespace().collect();
    if tokens.is_empty() {
        return EngineEvent::Ignored;
    }
    let has = |marker: &str| tokens.iter().any(|t| *t == marker);

    if has("currmove") {
        EngineEvent::CurrentMove {
            mv: value_after(&tokens, "currmove").unwrap_or_default().to_string(),
            number: number_after(&tokens, "currmovenumber"),
            depth: number_after(&tokens, "depth"),
        }
    } else if has("pv") {
        EngineEvent::PrincipalVariation(parse_info_line(&tokens, target))
    } else if has("bestmove") {
        EngineEvent::BestMoveFound {
            mv: value_after(&tokens, "bestmove").map(str::to_string),
            ponder: value_after(&tokens, "ponder").map(str::to_string),
        }
    } else if has("id") && has("name") {
        let name = line
            .find("id name ")
            .map(|at| line[at + "id name ".len()..].trim())
            .unwrap_or_default();
        EngineEvent::EngineIdentity {
            name: name.to_string(),
        }
    } else if has("option") && has("name") {
        match parse_option(&tokens) {
            Some(option) => EngineEvent::OptionDeclared(option),
            None => EngineEvent::Ignored,
        }
    } else if has("uciok") {
        EngineEvent::OptionsReady
    } else {
        EngineEvent::Ignored
    }
}

fn value_after<'a>(tokens: &[&'a str], key: &str) -> Option<&'a str> {
    let at = tokens.iter().position(|t| *t == key)?;
    tokens.get(at + 1).copied()
}

fn number_after(tokens: &[&str], key: &str) -> u32 {
    value_after(tokens, key)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

/// Parse an `info ... pv ...` line into a structured line.
fn parse_info_line(tokens: &[&str], target: Option<&AnalysisTarget>) -> AnalysisLine {
    let mut line = AnalysisLine {
        multipv: 1,
        ..Default::default()
    };
    let mut moves: Tokens = SmallVec::new();
    let mut i = 0;

    while i < tokens.len() {
        match tokens[i] {
            "depth" => {
                i += 1;
                line.depth = tokens.get(i).and_then(|s| s.parse().ok()).unwrap_or(0);
            }
            "seldepth" => {
                i += 1;
                line.seldepth = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "multipv" => {
                i += 1;
                line.multipv = tokens.get(i).and_then(|s| s.parse().ok()).unwrap_or(1);
            }
            "time" => {
                i += 1;
                line.time_ms = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "nodes" => {
                i += 1;
                line.nodes = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "nps" => {
                i += 1;
                line.nps = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "score" => {
                i += 1;
                if let Some(&score_type) = tokens.get(i) {
                    i += 1;
                    if let Some(value_str) = tokens.get(i) {
                        line.score = match score_type {
                            "cp" => value_str.parse().ok().map(Score::Centipawns),
                            "mate" => value_str.parse().ok().map(Score::Mate),
                            _ => None,
                        };
                    }
                }
            }
            "pv" => {
                // Collect all moves until next keyword
                i += 1;
                while i < tokens.len() && !is_keyword(tokens[i]) {
                    moves.push(tokens[i]);
                    i += 1;
                }
                continue;
            }
            _ => {
                // Unknown keyword or bound marker, skip
            }
        }
        i += 1;
    }

    line.white_score = match (line.score, target.and_then(AnalysisTarget::side_to_move)) {
        (Some(score), Some(Side::White)) => Some(score),
        (Some(score), Some(Side::Black)) => Some(score.negate()),
        _ => None,
    };
    line.moves = match target {
        Some(target) => target.resolve_moves(&moves),
        None => moves.iter().map(|uci| LineMove::unresolved(uci)).collect(),
    };
    line
}

fn is_keyword(token: &str) -> bool {
    matches!(
        token,
        "depth"
            | "seldepth"
            | "time"
            | "nodes"
            | "score"
            | "pv"
            | "multipv"
            | "currmove"
            | "currmovenumber"
            | "hashfull"
            | "nps"
            | "tbhits"
            | "sbhits"
            | "cpuload"
            | "string"
            | "refutation"
            | "currline"
    )
}

/// Parse `option name <N..> type <t> default <d..> [min <a>] [max <b>]`.
///
/// Returns `None` for options off the supported list.
fn parse_option(tokens: &[&str]) -> Option<EngineOption> {
    let name_at = tokens.iter().position(|t| *t == "name")?;
    let rest = &tokens[name_at + 1..];
    let name_end = rest.iter().position(|t| *t == "type").unwrap_or(rest.len());
    let name = rest[..name_end].join(" ");
    if !is_supported(&name) {
        return None;
    }
    let kind = OptionKind::classify(&name)?;

    let fields = &rest[name_end..];
    let option_type = value_after(fields, "type").unwrap_or_default();
    let default = fields
        .iter()
        .position(|t| *t == "default")
        .map(|at| {
            fields[at + 1..]
                .iter()
                .take_while(|t| !matches!(**t, "min" | "max" | "var"))
                .copied()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();

    let default = match default.parse::<i64>() {
        Ok(value) if option_type == "spin" => OptionValue::Integer(value),
        _ if default == "<empty>" => OptionValue::Text(String::new()),
        _ => OptionValue::Text(default),
    };

    Some(EngineOption {
        name,
        kind,
        default,
        min: value_after(fields, "min").and_then(|s| s.parse().ok()),
        max: value_after(fields, "max").and_then(|s| s.parse().ok()),
    })
}
