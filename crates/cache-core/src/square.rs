use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A square on a chess board, ranging from A1 to H8.
///
/// Squares are indexed rank by rank starting from the white side:
///
/// ```text
///   A  B  C  D  E  F  G  H
/// 8 56 57 58 59 60 61 62 63
/// 7 48 49 50 51 52 53 54 55
/// 6 40 41 42 43 44 45 46 47
/// 5 32 33 34 35 36 37 38 39
/// 4 24 25 26 27 28 29 30 31
/// 3 16 17 18 19 20 21 22 23
/// 2 08 09 10 11 12 13 14 15
/// 1 00 01 02 03 04 05 06 07
/// ```
///
/// `Illegal` (index 64) marks "no square". A cached entry whose best-move origin
/// is `Illegal` carries no best move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
#[rustfmt::skip]
pub enum Square {
    A1, B1, C1, D1, E1, F1, G1, H1,
    A2, B2, C2, D2, E2, F2, G2, H2,
    A3, B3, C3, D3, E3, F3, G3, H3,
    A4, B4, C4, D4, E4, F4, G4, H4,
    A5, B5, C5, D5, E5, F5, G5, H5,
    A6, B6, C6, D6, E6, F6, G6, H6,
    A7, B7, C7, D7, E7, F7, G7, H7,
    A8, B8, C8, D8, E8, F8, G8, H8,
    Illegal,
}

pub const BOARD_SIZE: usize = 8;
pub const TOTAL_SQUARES: usize = BOARD_SIZE * BOARD_SIZE;

impl Square {
    /// Returns the square index (0-63, or 64 for `Square::Illegal`).
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Returns `true` for the 64 board squares.
    #[inline]
    pub fn is_legal(self) -> bool {
        self != Square::Illegal
    }

    /// Converts a `u8` into a `Square` without bounds checking.
    ///
    /// # Arguments
    /// * `index` - 0-63 for board squares, 64 for `Illegal`.
    #[inline]
    pub fn from_u8_unchecked(index: u8) -> Square {
        debug_assert!(
            index as usize <= TOTAL_SQUARES,
            "Index out of bounds for Square enum. index: {index:?}"
        );
        // SAFETY: `Square` is `repr(u8)` with contiguous discriminants 0..=64.
        unsafe { std::mem::transmute(index) }
    }

    /// Safely converts a `u8` into a `Square`.
    ///
    /// # Returns
    /// `Some(Square)` if the index is 0-64, `None` otherwise.
    #[inline]
    pub fn from_u8(index: u8) -> Option<Square> {
        if index as usize <= TOTAL_SQUARES {
            Some(Square::from_u8_unchecked(index))
        } else {
            None
        }
    }

    /// Returns the file (0 = A, 7 = H).
    ///
    /// # Panics
    ///
    /// Panics if called on `Square::Illegal`.
    #[inline]
    pub fn file(self) -> usize {
        assert!(self.is_legal(), "Square::file called on Square::Illegal");
        self.index() % BOARD_SIZE
    }

    /// Returns the rank (0 = rank 1, 7 = rank 8).
    ///
    /// # Panics
    ///
    /// Panics if called on `Square::Illegal`.
    #[inline]
    pub fn rank(self) -> usize {
        assert!(self.is_legal(), "Square::rank called on Square::Illegal");
        self.index() / BOARD_SIZE
    }

    /// Creates a `Square` from file and rank coordinates.
    ///
    /// # Panics
    ///
    /// Panics if either `file` or `rank` is >= 8.
    pub fn from_file_rank(file: u8, rank: u8) -> Square {
        assert!((file as usize) < BOARD_SIZE, "Invalid file: {file}");
        assert!((rank as usize) < BOARD_SIZE, "Invalid rank: {rank}");
        Self::from_u8_unchecked(rank * BOARD_SIZE as u8 + file)
    }

    /// Iterates over the 64 board squares from A1 to H8, excluding `Illegal`.
    #[inline]
    pub fn iter() -> impl Iterator<Item = Square> {
        (0..TOTAL_SQUARES as u8).map(Square::from_u8_unchecked)
    }
}

#[allow(clippy::derivable_impls)]
impl Default for Square {
    fn default() -> Self {
        Square::Illegal
    }
}

/// Error returned when parsing a square from algebraic notation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SquareError {
    #[error("invalid square format: must be 2 characters (e.g. 'e4')")]
    InvalidFormat,
    #[error("invalid file '{0}': must be a-h")]
    InvalidFile(char),
    #[error("invalid rank '{0}': must be 1-8")]
    InvalidRank(char),
}

impl FromStr for Square {
    type Err = SquareError;

    /// Parses algebraic notation such as `"e4"`; case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        let (Some(file_char), Some(rank_char), None) = (chars.next(), chars.next(), chars.next())
        else {
            return Err(SquareError::InvalidFormat);
        };

        let file = file_char.to_ascii_lowercase();
        if !('a'..='h').contains(&file) {
            return Err(SquareError::InvalidFile(file_char));
        }
        if !('1'..='8').contains(&rank_char) {
            return Err(SquareError::InvalidRank(rank_char));
        }

        Ok(Square::from_file_rank(
            file as u8 - b'a',
            rank_char as u8 - b'1',
        ))
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_legal() {
            return write!(f, "--");
        }

        let file = (self.file() as u8 + b'a') as char;
        let rank = (self.rank() as u8 + b'1') as char;
        write!(f, "{file}{rank}")
    }
}
