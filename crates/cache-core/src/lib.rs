pub mod cache;
pub mod entry;
pub mod moves;
pub mod options;
pub mod piece;
pub mod square;
pub mod stats;
pub mod types;
