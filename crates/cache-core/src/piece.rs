use std::fmt;

/// Chess piece tag as stored in a cached best move.
///
/// Only the promotion pieces ever appear in a best move, but the tag covers the
/// full piece set so that a move validator can hand any piece back.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Piece {
    #[default]
    None = 0,
    WhitePawn = 1,
    WhiteKnight = 2,
    WhiteBishop = 3,
    WhiteRook = 4,
    WhiteQueen = 5,
    WhiteKing = 6,
    BlackPawn = 7,
    BlackKnight = 8,
    BlackBishop = 9,
    BlackRook = 10,
    BlackQueen = 11,
    BlackKing = 12,
}

impl Piece {
    /// Highest valid tag value.
    pub const MAX_TAG: u8 = Piece::BlackKing as u8;

    /// Converts a raw tag into a `Piece`.
    ///
    /// # Returns
    /// `Some(Piece)` for tags 0-12, `None` otherwise.
    #[inline]
    pub fn from_u8(tag: u8) -> Option<Piece> {
        if tag <= Self::MAX_TAG {
            // SAFETY: `Piece` is `repr(u8)` with contiguous discriminants 0..=12.
            Some(unsafe { std::mem::transmute::<u8, Piece>(tag) })
        } else {
            None
        }
    }

    /// FEN letter of the piece, `'-'` for `None`.
    pub fn to_char(self) -> char {
        match self {
            Piece::None => '-',
            Piece::WhitePawn => 'P',
            Piece::WhiteKnight => 'N',
            Piece::WhiteBishop => 'B',
            Piece::WhiteRook => 'R',
            Piece::WhiteQueen => 'Q',
            Piece::WhiteKing => 'K',
            Piece::BlackPawn => 'p',
            Piece::BlackKnight => 'n',
            Piece::BlackBishop => 'b',
            Piece::BlackRook => 'r',
            Piece::BlackQueen => 'q',
            Piece::BlackKing => 'k',
        }
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u8() {
        assert_eq!(Piece::from_u8(0), Some(Piece::None));
        assert_eq!(Piece::from_u8(5), Some(Piece::WhiteQueen));
        assert_eq!(Piece::from_u8(12), Some(Piece::BlackKing));
        assert_eq!(Piece::from_u8(13), None);
        assert_eq!(Piece::from_u8(15), None);
    }

    #[test]
    fn test_tags_match_discriminants() {
        for tag in 0..=Piece::MAX_TAG {
            assert_eq!(Piece::from_u8(tag).map(|p| p as u8), Some(tag));
        }
    }

    #[test]
    fn test_to_char() {
        assert_eq!(Piece::WhiteQueen.to_char(), 'Q');
        assert_eq!(Piece::BlackKnight.to_string(), "n");
        assert_eq!(Piece::None.to_string(), "-");
    }
}
