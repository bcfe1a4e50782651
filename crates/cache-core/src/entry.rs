//! Packed cache entries.

use thiserror::Error;

use crate::moves::Move;
use crate::piece::Piece;
use crate::square::Square;
use crate::types::{Depth, MAX_HORIZON, SCORE_MAX, SCORE_NOT_CACHED, Score};

/// How a cached score relates to the true value of the position.
///
/// - `Unknown`: no score stored
/// - `LowerBound`: score is a lower bound (fail-high)
/// - `UpperBound`: score is an upper bound (fail-low)
/// - `Exact`: score is the exact minimax value
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ScorePrecision {
    #[default]
    Unknown = 0,
    LowerBound = 1,
    UpperBound = 2,
    Exact = 3,
}

impl ScorePrecision {
    /// Classifies a search result against the window it was searched with.
    ///
    /// # Arguments
    ///
    /// * `best_score` - Best score found at the node
    /// * `alpha` - Lower edge of the search window
    /// * `beta` - Upper edge of the search window
    #[inline]
    pub fn from_window(best_score: Score, alpha: Score, beta: Score) -> ScorePrecision {
        if best_score >= beta {
            ScorePrecision::LowerBound
        } else if best_score <= alpha {
            ScorePrecision::UpperBound
        } else {
            ScorePrecision::Exact
        }
    }

    #[inline]
    fn from_bits(bits: u64) -> ScorePrecision {
        match bits & 0b11 {
            1 => ScorePrecision::LowerBound,
            2 => ScorePrecision::UpperBound,
            3 => ScorePrecision::Exact,
            _ => ScorePrecision::Unknown,
        }
    }
}

/// A payload field was outside its declared range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum EntryError {
    #[error("horizon {0} exceeds the maximum of {max}", max = MAX_HORIZON)]
    HorizonOutOfRange(Depth),
    #[error("score {0} is neither within +/-{max} nor the not-cached sentinel", max = SCORE_MAX)]
    ScoreOutOfRange(Score),
    #[error("square index {0} is out of range")]
    InvalidSquare(u8),
    #[error("piece tag {0} is out of range")]
    InvalidPiece(u8),
    #[error("reserved payload bits are set: {0:#x}")]
    ReservedBits(u64),
}

/// Search result packed into 64 bits.
///
/// # Layout
///
/// - 7 bits: Horizon (remaining depth searched)
/// - 7 bits: Best move origin square (64 = no move)
/// - 7 bits: Best move destination square
/// - 4 bits: Best move promoted piece tag
/// - 16 bits: Score (two's complement)
/// - 2 bits: Score precision
/// - 8 bits: Generation of the last access
/// - 13 bits: Reserved, always zero
///
/// A `Payload` can only be obtained through [`Payload::encode`],
/// [`Payload::from_raw`] or [`Payload::new`], all of which validate every
/// field, so the accessors never see out-of-range data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Payload(u64);

impl Payload {
    const HORIZON_SIZE: u32 = 7;
    const HORIZON_SHIFT: u32 = 0;
    const HORIZON_MASK: u64 = (1 << Self::HORIZON_SIZE) - 1;

    const FROM_SIZE: u32 = 7;
    const FROM_SHIFT: u32 = Self::HORIZON_SHIFT + Self::HORIZON_SIZE;
    const FROM_MASK: u64 = (1 << Self::FROM_SIZE) - 1;

    const TO_SIZE: u32 = 7;
    const TO_SHIFT: u32 = Self::FROM_SHIFT + Self::FROM_SIZE;
    const TO_MASK: u64 = (1 << Self::TO_SIZE) - 1;

    const PROMOTED_SIZE: u32 = 4;
    const PROMOTED_SHIFT: u32 = Self::TO_SHIFT + Self::TO_SIZE;
    const PROMOTED_MASK: u64 = (1 << Self::PROMOTED_SIZE) - 1;

    const SCORE_SIZE: u32 = 16;
    const SCORE_SHIFT: u32 = Self::PROMOTED_SHIFT + Self::PROMOTED_SIZE;
    const SCORE_MASK: u64 = (1 << Self::SCORE_SIZE) - 1;

    const PRECISION_SIZE: u32 = 2;
    const PRECISION_SHIFT: u32 = Self::SCORE_SHIFT + Self::SCORE_SIZE;
    const PRECISION_MASK: u64 = (1 << Self::PRECISION_SIZE) - 1;

    const GENERATION_SIZE: u32 = 8;
    const GENERATION_SHIFT: u32 = Self::PRECISION_SHIFT + Self::PRECISION_SIZE;
    const GENERATION_MASK: u64 = (1 << Self::GENERATION_SIZE) - 1;

    const USED_BITS: u32 = Self::GENERATION_SHIFT + Self::GENERATION_SIZE;
    const RESERVED_MASK: u64 = !((1 << Self::USED_BITS) - 1);

    /// The "empty" payload: no horizon, no best move, no score.
    pub const SENTINEL: Payload = Payload(Self::pack(
        0,
        Square::Illegal as u8,
        Square::Illegal as u8,
        Piece::None as u8,
        SCORE_NOT_CACHED,
        ScorePrecision::Unknown as u8,
        0,
    ));

    #[allow(clippy::too_many_arguments)]
    const fn pack(
        horizon: u8,
        from: u8,
        to: u8,
        promoted: u8,
        score: Score,
        precision: u8,
        last_accessed: u8,
    ) -> u64 {
        ((horizon as u64) << Self::HORIZON_SHIFT)
            | ((from as u64) << Self::FROM_SHIFT)
            | ((to as u64) << Self::TO_SHIFT)
            | ((promoted as u64) << Self::PROMOTED_SHIFT)
            | (((score as i16 as u16) as u64) << Self::SCORE_SHIFT)
            | ((precision as u64) << Self::PRECISION_SHIFT)
            | ((last_accessed as u64) << Self::GENERATION_SHIFT)
    }

    /// Packs all fields, rejecting out-of-range values.
    ///
    /// # Errors
    ///
    /// * [`EntryError::HorizonOutOfRange`] if `horizon` exceeds [`MAX_HORIZON`]
    /// * [`EntryError::ScoreOutOfRange`] if `score` is neither within
    ///   `-SCORE_MAX..=SCORE_MAX` nor [`SCORE_NOT_CACHED`]
    #[allow(clippy::too_many_arguments)]
    pub fn encode(
        horizon: Depth,
        best_move_from: Square,
        best_move_to: Square,
        promoted_piece: Piece,
        score: Score,
        score_precision: ScorePrecision,
        last_accessed: u8,
    ) -> Result<Payload, EntryError> {
        if horizon > MAX_HORIZON {
            return Err(EntryError::HorizonOutOfRange(horizon));
        }
        if !is_valid_score(score) {
            return Err(EntryError::ScoreOutOfRange(score));
        }

        Ok(Payload(Self::pack(
            horizon as u8,
            best_move_from as u8,
            best_move_to as u8,
            promoted_piece as u8,
            score,
            score_precision as u8,
            last_accessed,
        )))
    }

    /// Packs a search result as the search hands it over. The generation is
    /// left at zero; the cache stamps it on insert.
    ///
    /// # Errors
    ///
    /// Same as [`Payload::encode`].
    pub fn new(
        horizon: Depth,
        best_move: Option<Move>,
        score: Score,
        score_precision: ScorePrecision,
    ) -> Result<Payload, EntryError> {
        let (from, to, promoted) = match best_move {
            Some(mv) => (mv.from, mv.to, mv.promoted_piece),
            None => (Square::Illegal, Square::Illegal, Piece::None),
        };
        Self::encode(horizon, from, to, promoted, score, score_precision, 0)
    }

    /// Validates a raw word read back from storage.
    ///
    /// # Errors
    ///
    /// Returns the first field found outside its declared range.
    pub fn from_raw(raw: u64) -> Result<Payload, EntryError> {
        if raw & Self::RESERVED_MASK != 0 {
            return Err(EntryError::ReservedBits(raw & Self::RESERVED_MASK));
        }

        let from = ((raw >> Self::FROM_SHIFT) & Self::FROM_MASK) as u8;
        if Square::from_u8(from).is_none() {
            return Err(EntryError::InvalidSquare(from));
        }
        let to = ((raw >> Self::TO_SHIFT) & Self::TO_MASK) as u8;
        if Square::from_u8(to).is_none() {
            return Err(EntryError::InvalidSquare(to));
        }
        let promoted = ((raw >> Self::PROMOTED_SHIFT) & Self::PROMOTED_MASK) as u8;
        if Piece::from_u8(promoted).is_none() {
            return Err(EntryError::InvalidPiece(promoted));
        }
        let payload = Payload(raw);
        if !is_valid_score(payload.score()) {
            return Err(EntryError::ScoreOutOfRange(payload.score()));
        }

        Ok(payload)
    }

    /// Returns the packed representation.
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn horizon(self) -> Depth {
        ((self.0 >> Self::HORIZON_SHIFT) & Self::HORIZON_MASK) as Depth
    }

    #[inline]
    pub fn best_move_from(self) -> Square {
        Square::from_u8_unchecked(((self.0 >> Self::FROM_SHIFT) & Self::FROM_MASK) as u8)
    }

    #[inline]
    pub fn best_move_to(self) -> Square {
        Square::from_u8_unchecked(((self.0 >> Self::TO_SHIFT) & Self::TO_MASK) as u8)
    }

    #[inline]
    pub fn best_move_promoted_piece(self) -> Piece {
        let tag = ((self.0 >> Self::PROMOTED_SHIFT) & Self::PROMOTED_MASK) as u8;
        Piece::from_u8(tag).unwrap_or_default()
    }

    #[inline]
    pub fn score(self) -> Score {
        ((self.0 >> Self::SCORE_SHIFT) & Self::SCORE_MASK) as u16 as i16 as Score
    }

    #[inline]
    pub fn score_precision(self) -> ScorePrecision {
        ScorePrecision::from_bits((self.0 >> Self::PRECISION_SHIFT) & Self::PRECISION_MASK)
    }

    /// Generation of the search that last wrote or hit this entry.
    #[inline]
    pub fn last_accessed(self) -> u8 {
        ((self.0 >> Self::GENERATION_SHIFT) & Self::GENERATION_MASK) as u8
    }

    /// Returns a copy with the access generation replaced.
    #[inline]
    #[must_use]
    pub fn with_last_accessed(self, generation: u8) -> Payload {
        Payload(
            (self.0 & !(Self::GENERATION_MASK << Self::GENERATION_SHIFT))
                | ((generation as u64) << Self::GENERATION_SHIFT),
        )
    }

    /// Returns `true` if a best move origin is recorded.
    #[inline]
    pub fn has_best_move(self) -> bool {
        self.best_move_from().is_legal()
    }
}

#[inline]
fn is_valid_score(score: Score) -> bool {
    (-SCORE_MAX..=SCORE_MAX).contains(&score) || score == SCORE_NOT_CACHED
}

/// A fingerprint together with its payload, as held in one cache slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CachedPosition {
    /// Position fingerprint (Zobrist key).
    pub key: u64,
    pub payload: Payload,
}

impl CachedPosition {
    /// The empty slot, also returned for a cache miss.
    pub const SENTINEL: CachedPosition = CachedPosition {
        key: 0,
        payload: Payload::SENTINEL,
    };

    #[inline]
    pub fn new(key: u64, payload: Payload) -> CachedPosition {
        CachedPosition { key, payload }
    }

    /// Returns `true` if this is the sentinel entry (a miss or a never-written slot).
    #[inline]
    pub fn is_sentinel(&self) -> bool {
        *self == Self::SENTINEL
    }
}

impl Default for CachedPosition {
    fn default() -> Self {
        Self::SENTINEL
    }
}
