//! The position handed to the engine with `position <target>`.

use cozy_chess::{Board, File, Move, Piece, Square};

use crate::analysis::{LineMove, Side};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("Analysis target is empty")]
    Empty,
    #[error("Analysis target contains a line break")]
    LineBreak,
}

/// Caller-supplied description of what to analyze.
///
/// The text is passed to the engine verbatim after `position `, so it takes the
/// usual forms `startpos [moves ...]` or `fen <fen> [moves ...]`. When the text
/// can be understood, the resulting board is kept so principal variations can
/// be annotated; otherwise the target is still usable, only unresolved.
#[derive(Debug, Clone)]
pub struct AnalysisTarget {
    text: String,
    board: Option<Board>,
}

impl PartialEq for AnalysisTarget {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for AnalysisTarget {}

impl AnalysisTarget {
    pub fn new(text: impl Into<String>) -> Result<Self, TargetError> {
        let text = text.into();
        if text.contains(['\n', '\r']) {
            return Err(TargetError::LineBreak);
        }
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(TargetError::Empty);
        }

        let board = resolve_board(&text);
        if board.is_none() {
            tracing::debug!("Analysis target could not be resolved to a board: {}", text);
        }
        Ok(Self { text, board })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn board(&self) -> Option<&Board> {
        self.board.as_ref()
    }

    pub fn side_to_move(&self) -> Option<Side> {
        self.board.as_ref().map(|b| Side::from(b.side_to_move()))
    }

    /// Annotate engine moves with move numbers, stopping at the first illegal one.
    ///
    /// Without a resolved board every move is kept as-is.
    pub fn resolve_moves(&self, moves: &[&str]) -> Vec<LineMove> {
        let Some(start) = &self.board else {
            return moves.iter().map(|uci| LineMove::unresolved(uci)).collect();
        };

        let mut board = start.clone();
        let mut resolved = Vec::with_capacity(moves.len());
        for uci in moves {
            let Some(mv) = to_board_move(&board, uci) else {
                tracing::trace!("Principal variation truncated at {}", uci);
                break;
            };
            resolved.push(LineMove {
                uci: uci.to_string(),
                move_number: Some(u32::from(board.fullmove_number())),
                side: Some(Side::from(board.side_to_move())),
            });
            board.play_unchecked(mv);
        }
        resolved
    }
}

impl std::fmt::Display for AnalysisTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

fn resolve_board(text: &str) -> Option<Board> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let moves_at = tokens.iter().position(|&t| t == "moves");
    let (setup, moves) = match moves_at {
        Some(i) => (&tokens[..i], &tokens[i + 1..]),
        None => (&tokens[..], &[][..]),
    };

    let mut board = match setup {
        ["startpos"] => Board::default(),
        ["fen", fen @ ..] if !fen.is_empty() => fen.join(" ").parse().ok()?,
        _ => return None,
    };

    for uci in moves {
        let mv = to_board_move(&board, uci)?;
        board.play_unchecked(mv);
    }
    Some(board)
}

/// Parse a UCI move and map it onto the board's move encoding.
///
/// UCI castles by moving the king two squares (e1g1); the board encodes
/// castling as the king capturing its own rook (e1h1).
fn to_board_move(board: &Board, uci: &str) -> Option<Move> {
    let mv: Move = uci.parse().ok()?;
    if board.is_legal(mv) {
        return Some(mv);
    }

    let is_king = board.piece_on(mv.from) == Some(Piece::King);
    let same_rank = mv.from.rank() == mv.to.rank();
    if !is_king || !same_rank || mv.from.file() != File::E || mv.promotion.is_some() {
        return None;
    }
    let rook_file = match mv.to.file() {
        File::G => File::H,
        File::C => File::A,
        _ => return None,
    };
    let castle = Move {
        from: mv.from,
        to: Square::new(rook_file, mv.from.rank()),
        promotion: None,
    };
    board.is_legal(castle).then_some(castle)
}
