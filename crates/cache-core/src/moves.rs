//! Minimal move record exchanged with the move validator.

use std::fmt;

use crate::piece::Piece;
use crate::square::Square;

/// A candidate move decoded from cached data.
///
/// The cache only knows a move's endpoints and promotion tag. The owner's
/// validator is free to fill in anything else it tracks, which is why it
/// receives the move by mutable reference.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub promoted_piece: Piece,
    /// Set on moves recovered from the cache as a best-move hint.
    pub is_best: bool,
}

impl Move {
    #[inline]
    pub fn new(from: Square, to: Square, promoted_piece: Piece) -> Move {
        Move {
            from,
            to,
            promoted_piece,
            is_best: false,
        }
    }
}

impl fmt::Display for Move {
    /// Long algebraic notation, e.g. `e7e8q`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if self.promoted_piece != Piece::None {
            write!(f, "{}", self.promoted_piece.to_char().to_ascii_lowercase())?;
        }
        Ok(())
    }
}
