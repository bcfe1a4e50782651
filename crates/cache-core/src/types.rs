//! Common type aliases and score constants.

/// Remaining search depth ("horizon") reached for a cached position.
pub type Depth = u32;

/// Search score in centipawns.
pub type Score = i32;

/// Largest magnitude of a real search score, mate scores included.
pub const SCORE_MAX: Score = 30_000;

/// Score sentinel meaning "no score cached". Outside `-SCORE_MAX..=SCORE_MAX`.
pub const SCORE_NOT_CACHED: Score = i16::MAX as Score;

/// Largest horizon a payload can hold.
pub const MAX_HORIZON: Depth = 127;
