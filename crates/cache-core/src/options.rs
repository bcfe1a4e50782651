use crate::cache::SLOTS_PER_MEBIBYTE;

/// Sizing options for a [`Cache`](crate::cache::Cache).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheOptions {
    /// Memory budget in MiB.
    pub size_mb: usize,
}

impl CacheOptions {
    /// Create options with the desired memory budget.
    #[must_use]
    pub fn new(size_mb: usize) -> Self {
        CacheOptions { size_mb }
    }

    /// Override the memory budget, e.g. from a `Hash` UCI option.
    #[must_use]
    pub fn with_size_mb(mut self, size_mb: usize) -> Self {
        self.size_mb = size_mb;
        self
    }

    /// Number of slots the memory budget buys.
    pub fn slot_count(&self) -> usize {
        self.size_mb.saturating_mul(SLOTS_PER_MEBIBYTE)
    }
}

impl Default for CacheOptions {
    fn default() -> Self {
        CacheOptions { size_mb: 64 }
    }
}
