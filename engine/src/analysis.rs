//! Engine analysis types handed to callers.

use serde::Serialize;

/// Engine evaluation score.
///
/// Centipawns: positive = side-to-move is better.
/// Mate: positive N = side-to-move mates in N moves,
/// negative N = side-to-move gets mated in N moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Score {
    Centipawns(i32),
    Mate(i32),
}

impl Score {
    pub fn display(&self) -> String {
        match self {
            Self::Centipawns(cp) => format!("{:+.2}", *cp as f64 / 100.0),
            Self::Mate(m) => {
                if *m > 0 {
                    format!("+M{}", m)
                } else {
                    format!("-M{}", m.unsigned_abs())
                }
            }
        }
    }

    /// Negate the score (flip perspective).
    pub fn negate(&self) -> Self {
        match self {
            Self::Centipawns(cp) => Self::Centipawns(cp.saturating_neg()),
            Self::Mate(m) => Self::Mate(m.saturating_neg()),
        }
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    White,
    Black,
}

impl From<cozy_chess::Color> for Side {
    fn from(color: cozy_chess::Color) -> Self {
        match color {
            cozy_chess::Color::White => Self::White,
            cozy_chess::Color::Black => Self::Black,
        }
    }
}

/// One move of a principal variation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineMove {
    /// Move exactly as the engine wrote it, e.g. `e1g1` or `e7e8q`.
    pub uci: String,
    /// Full-move number and mover, known when the target resolved to a board.
    pub move_number: Option<u32>,
    pub side: Option<Side>,
}

impl LineMove {
    pub fn unresolved(uci: &str) -> Self {
        Self {
            uci: uci.to_string(),
            move_number: None,
            side: None,
        }
    }
}

/// A principal variation report, resolved against the analysis target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisLine {
    pub depth: u32,
    pub seldepth: Option<u32>,
    /// 1-based line index when the engine reports several lines.
    pub multipv: u32,
    /// Score from the side to move's point of view, as reported.
    pub score: Option<Score>,
    /// Score from White's point of view, when the side to move is known.
    pub white_score: Option<Score>,
    pub nodes: Option<u64>,
    pub nps: Option<u64>,
    pub time_ms: Option<u64>,
    pub moves: Vec<LineMove>,
}

impl AnalysisLine {
    pub fn first_move(&self) -> Option<&str> {
        self.moves.first().map(|mv| mv.uci.as_str())
    }

    /// Moves joined with spaces, prefixed with move numbers when known.
    pub fn format_moves(&self) -> String {
        let mut out = String::new();
        for (i, mv) in self.moves.iter().enumerate() {
            if !out.is_empty() {
                out.push(' ');
            }
            match (mv.move_number, mv.side) {
                (Some(n), Some(Side::White)) => out.push_str(&format!("{}. ", n)),
                (Some(n), Some(Side::Black)) if i == 0 => out.push_str(&format!("{}... ", n)),
                _ => {}
            }
            out.push_str(&mv.uci);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(uci: &str, number: u32, side: Side) -> LineMove {
        LineMove {
            uci: uci.to_string(),
            move_number: Some(number),
            side: Some(side),
        }
    }

    #[test]
    fn test_score_display() {
        assert_eq!(Score::Centipawns(35).display(), "+0.35");
        assert_eq!(Score::Centipawns(-120).display(), "-1.20");
        assert_eq!(Score::Mate(3).display(), "+M3");
        assert_eq!(Score::Mate(-2).display(), "-M2");
    }

    #[test]
    fn test_score_negate() {
        assert_eq!(Score::Centipawns(35).negate(), Score::Centipawns(-35));
        assert_eq!(Score::Mate(-4).negate(), Score::Mate(4));
        assert_eq!(
            Score::Centipawns(i32::MIN).negate(),
            Score::Centipawns(i32::MAX)
        );
        assert_eq!(Score::Mate(i32::MIN).negate(), Score::Mate(i32::MAX));
        assert_eq!(Score::Mate(i32::MIN).display(), "-M2147483648");
    }

    #[test]
    fn test_format_moves_from_black() {
        let line = AnalysisLine {
            moves: vec![
                mv("e7e5", 1, Side::Black),
                mv("g1f3", 2, Side::White),
                mv("b8c6", 2, Side::Black),
            ],
            ..Default::default()
        };
        assert_eq!(line.format_moves(), "1... e7e5 2. g1f3 b8c6");
        assert_eq!(line.first_move(), Some("e7e5"));
    }

    #[test]
    fn test_format_moves_unresolved() {
        let line = AnalysisLine {
            moves: vec![LineMove::unresolved("e2e4")],
            ..Default::default()
        };
        assert_eq!(line.format_moves(), "e2e4");
    }
}
