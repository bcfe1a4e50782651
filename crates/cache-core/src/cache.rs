//! Set-associative position cache with generation-based replacement.

use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, AtomicUsize, Ordering};

use aligned_vec::{AVec, ConstAlign};
use log::{debug, trace, warn};
use thiserror::Error;

use crate::entry::{CachedPosition, Payload};
use crate::moves::Move;
use crate::options::CacheOptions;
use crate::stats::CacheStats;

/// Number of slots sharing one bucket index.
pub const BUCKET_SIZE: usize = 4;

/// Slots that fit in one MiB of memory.
pub const SLOTS_PER_MEBIBYTE: usize = 1024 * 1024 / mem::size_of::<CachedPosition>();

/// One bucket fills a 64-byte cache line.
const BUCKET_ALIGN: usize = 64;

/// Checks a candidate move against the live position.
///
/// Cached data is never trusted on its own: a fingerprint match may be a hash
/// collision or the product of a torn concurrent write.
pub trait MoveValidator: Send + Sync {
    /// Returns `true` if `mv` is legal in the current position. May complete the
    /// move with information the cache does not store.
    fn validate(&self, mv: &mut Move) -> bool;
}

impl<F> MoveValidator for F
where
    F: Fn(&mut Move) -> bool + Send + Sync,
{
    #[inline]
    fn validate(&self, mv: &mut Move) -> bool {
        self(mv)
    }
}

/// Rejected cache sizing request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("cache capacity must be positive")]
    ZeroCapacity,
    #[error("cache capacity {capacity} is not a multiple of the bucket size {bucket}", bucket = BUCKET_SIZE)]
    MisalignedCapacity { capacity: usize },
    #[error("cache size must be at least 1 MiB")]
    ZeroSize,
    #[error("cache size of {size_mb} MiB overflows the slot count")]
    TooLarge { size_mb: usize },
}

/// A single slot.
///
/// The fingerprint is stored XOR-ed with the payload so that a read racing a
/// write on another thread recombines into a fingerprint that does not match,
/// which turns a torn entry into a plain miss.
struct Slot {
    check: AtomicU64,
    payload: AtomicU64,
}

impl Slot {
    fn sentinel() -> Slot {
        let raw = Payload::SENTINEL.raw();
        Slot {
            check: AtomicU64::new(CachedPosition::SENTINEL.key ^ raw),
            payload: AtomicU64::new(raw),
        }
    }

    /// Returns the fingerprint and the raw payload word.
    #[inline]
    fn load(&self) -> (u64, u64) {
        let raw = self.payload.load(Ordering::Relaxed);
        let check = self.check.load(Ordering::Relaxed);
        (check ^ raw, raw)
    }

    #[inline]
    fn store(&self, entry: CachedPosition) {
        let raw = entry.payload.raw();
        self.payload.store(raw, Ordering::Relaxed);
        self.check.store(entry.key ^ raw, Ordering::Relaxed);
    }

    /// Writes `entry` into a slot last seen empty.
    ///
    /// Returns `true` if this call took the slot out of the empty state. When
    /// another thread got there first, `entry` still overwrites its data and
    /// `false` is returned.
    #[inline]
    fn claim(&self, entry: CachedPosition) -> bool {
        let raw = entry.payload.raw();
        let check = entry.key ^ raw;
        let claimed = self
            .check
            .compare_exchange(EMPTY_CHECK, check, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok();
        self.payload.store(raw, Ordering::Relaxed);
        if !claimed {
            self.check.store(check, Ordering::Relaxed);
        }
        claimed
    }
}

/// Check word of an empty slot.
const EMPTY_CHECK: u64 = CachedPosition::SENTINEL.key ^ Payload::SENTINEL.raw();

#[inline]
fn is_sentinel(key: u64, raw: u64) -> bool {
    key == CachedPosition::SENTINEL.key && raw == Payload::SENTINEL.raw()
}

/// Scrambles a fingerprint before bucket selection so that structure in the
/// Zobrist keys does not cluster entries into few buckets.
#[inline(always)]
fn mix(key: u64) -> u64 {
    use rapidhash::v3;
    v3::rapidhash_v3_nano_inline::<true, false>(&key.to_le_bytes(), &v3::DEFAULT_RAPID_SECRETS)
}

/// The position cache.
///
/// Slots are grouped into buckets of [`BUCKET_SIZE`]. A position may live in
/// any slot of its bucket; when a bucket is full, the slot touched in the
/// oldest generation is replaced.
///
/// Probing and inserting take `&self` and never lock, so one `Arc<Cache>` can
/// serve several search threads. Concurrent access may lose writes or produce
/// misses, never a decoded payload with out-of-range fields.
pub struct Cache {
    slots: AVec<Slot, ConstAlign<BUCKET_ALIGN>>,
    bucket_count: usize,
    entry_count: AtomicUsize,
    generation: AtomicU8,
    stats: Arc<CacheStats>,
    validator: Box<dyn MoveValidator>,
}

impl Cache {
    /// Creates a cache using `size_mb` MiB of memory.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::ZeroSize`] if `size_mb` is 0.
    pub fn new<V>(size_mb: usize, stats: Arc<CacheStats>, validator: V) -> Result<Cache, CacheError>
    where
        V: MoveValidator + 'static,
    {
        Self::with_capacity(slots_for_size(size_mb)?, stats, validator)
    }

    /// Creates a cache sized by `options`.
    ///
    /// # Errors
    ///
    /// See [`Cache::new`].
    pub fn from_options<V>(
        options: &CacheOptions,
        stats: Arc<CacheStats>,
        validator: V,
    ) -> Result<Cache, CacheError>
    where
        V: MoveValidator + 'static,
    {
        Self::new(options.size_mb, stats, validator)
    }

    /// Creates a cache holding exactly `capacity` slots.
    ///
    /// # Errors
    ///
    /// See [`Cache::set_capacity`].
    pub fn with_capacity<V>(
        capacity: usize,
        stats: Arc<CacheStats>,
        validator: V,
    ) -> Result<Cache, CacheError>
    where
        V: MoveValidator + 'static,
    {
        validate_capacity(capacity)?;
        let cache = Cache {
            slots: allocate(capacity),
            bucket_count: capacity / BUCKET_SIZE,
            entry_count: AtomicUsize::new(0),
            generation: AtomicU8::new(0),
            stats,
            validator: Box::new(validator),
        };
        debug!(
            "cache allocated: {} slots in {} buckets",
            capacity, cache.bucket_count
        );
        Ok(cache)
    }

    /// Reallocates the cache for a `size_mb` MiB budget, discarding all entries.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::ZeroSize`] or [`CacheError::TooLarge`]; the cache
    /// is left untouched.
    pub fn resize(&mut self, size_mb: usize) -> Result<(), CacheError> {
        self.set_capacity(slots_for_size(size_mb)?)?;
        debug!("cache resized to {size_mb} MiB");
        Ok(())
    }

    /// Reallocates the cache with `capacity` slots, discarding all entries and
    /// resetting the entry count and generation.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::ZeroCapacity`] or
    /// [`CacheError::MisalignedCapacity`]; the cache is left untouched.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<(), CacheError> {
        validate_capacity(capacity)?;

        // Release the old table before allocating the new one.
        drop(mem::replace(&mut self.slots, AVec::new(BUCKET_ALIGN)));
        self.slots = allocate(capacity);
        self.bucket_count = capacity / BUCKET_SIZE;
        self.entry_count.store(0, Ordering::Relaxed);
        self.generation.store(0, Ordering::Relaxed);

        debug!(
            "cache capacity set: {} slots in {} buckets",
            capacity, self.bucket_count
        );
        Ok(())
    }

    /// Overwrites every slot with the sentinel and zeroes the entry count and
    /// generation. Keeps the allocation.
    pub fn reset(&self) {
        for slot in self.slots.iter() {
            slot.store(CachedPosition::SENTINEL);
        }
        self.entry_count.store(0, Ordering::Relaxed);
        self.generation.store(0, Ordering::Relaxed);
        debug!("cache reset: {} slots cleared", self.slots.len());
    }

    /// Total number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    /// Number of slots written at least once since the last reset.
    ///
    /// Never exceeds [`Cache::capacity`]. Only the insert that moves a slot out
    /// of the empty state counts it, so concurrent inserts into the same empty
    /// slot count it once. A slot cleared back to the sentinel by storing an
    /// all-empty entry under fingerprint 0 is not uncounted.
    #[inline]
    pub fn entry_count(&self) -> usize {
        self.entry_count.load(Ordering::Relaxed)
    }

    /// Occupancy in permille, as reported through UCI `hashfull`.
    pub fn hashfull(&self) -> usize {
        self.entry_count() * 1000 / self.capacity()
    }

    /// Current search generation.
    #[inline]
    pub fn generation(&self) -> u8 {
        self.generation.load(Ordering::Relaxed)
    }

    /// Starts a new search episode. Wraps after 255.
    #[inline]
    pub fn advance_generation(&self) {
        self.generation.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn set_generation(&self, generation: u8) {
        self.generation.store(generation, Ordering::Relaxed);
    }

    /// Statistics sink shared with the owner.
    #[inline]
    pub fn stats(&self) -> &Arc<CacheStats> {
        &self.stats
    }

    /// Prefetches the bucket for `key` into the CPU cache.
    #[inline]
    pub fn prefetch(&self, key: u64) {
        #[cfg(target_arch = "x86_64")]
        unsafe {
            let index = self.bucket_index(key);
            let addr = self.slots.as_ptr().add(index) as *const i8;
            std::arch::x86_64::_mm_prefetch(addr, std::arch::x86_64::_MM_HINT_T0);
        }
        #[cfg(not(target_arch = "x86_64"))]
        let _ = key;
    }

    /// Looks up `key`.
    ///
    /// On a hit, the slot's access generation is stamped with the current
    /// generation and the updated entry is returned. On a miss, returns
    /// [`CachedPosition::SENTINEL`].
    #[inline]
    pub fn probe(&self, key: u64) -> CachedPosition {
        self.stats.record_probe();
        let generation = self.generation();

        for slot in self.bucket(key) {
            let (slot_key, raw) = slot.load();
            if slot_key != key || is_sentinel(slot_key, raw) {
                continue;
            }

            let payload = match Payload::from_raw(raw) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!("discarding corrupt cache slot for key {key:#018x}: {err}");
                    continue;
                }
            };

            self.stats.record_hit();
            let entry = CachedPosition::new(key, payload.with_last_accessed(generation));
            slot.store(entry);
            return entry;
        }

        CachedPosition::SENTINEL
    }

    /// Stores `entry`, stamped with the current generation.
    ///
    /// A slot already holding the same fingerprint is overwritten in place.
    /// Otherwise the slot with the oldest access generation is replaced, the
    /// lowest-indexed one on ties. An entry equal to the sentinel lands on an
    /// empty slot in place and is never counted as new occupancy.
    #[inline]
    pub fn insert(&self, entry: CachedPosition) {
        debug_assert!(Payload::from_raw(entry.payload.raw()).is_ok());
        let entry = CachedPosition::new(
            entry.key,
            entry.payload.with_last_accessed(self.generation()),
        );
        let clears = entry.is_sentinel();

        let bucket = self.bucket(entry.key);
        let mut oldest = 0;
        let mut oldest_generation = u8::MAX;
        let mut oldest_is_empty = false;

        for (i, slot) in bucket.iter().enumerate() {
            let (slot_key, raw) = slot.load();
            let empty = is_sentinel(slot_key, raw);
            if slot_key == entry.key && (!empty || clears) {
                slot.store(entry);
                return;
            }

            // A corrupt slot counts as the oldest possible.
            let last_accessed = Payload::from_raw(raw).map_or(0, |p| p.last_accessed());
            if i == 0 || last_accessed < oldest_generation {
                oldest = i;
                oldest_generation = last_accessed;
                oldest_is_empty = empty;
            }
        }

        let victim = &bucket[oldest];
        if oldest_is_empty && !clears {
            if victim.claim(entry) {
                self.count_new_entry();
            }
        } else {
            victim.store(entry);
        }
    }

    /// Bumps the occupancy count, saturating at the capacity.
    #[inline]
    fn count_new_entry(&self) {
        let capacity = self.capacity();
        let _ = self
            .entry_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |count| {
                (count < capacity).then_some(count + 1)
            });
    }

    /// Recovers the best move recorded in `payload`, if it is legal in the
    /// current position.
    ///
    /// Returns `None` when no move was recorded or when the validator rejects
    /// the decoded move.
    pub fn best_move(&self, payload: Payload) -> Option<Move> {
        self.stats.record_best_move_probe();
        let from = payload.best_move_from();
        if !from.is_legal() {
            return None;
        }

        let mut mv = Move {
            from,
            to: payload.best_move_to(),
            promoted_piece: payload.best_move_promoted_piece(),
            is_best: true,
        };
        let valid = self.validator.validate(&mut mv);
        self.stats.record_best_move(valid);

        if valid {
            Some(mv)
        } else {
            trace!("rejected cached best move {mv}");
            None
        }
    }

    /// Returns a copy of the slot at `index`, or `None` if `index` is out of
    /// range or the slot holds corrupt data. Does not touch the generation.
    pub fn slot(&self, index: usize) -> Option<CachedPosition> {
        let (key, raw) = self.slots.get(index)?.load();
        Payload::from_raw(raw)
            .ok()
            .map(|payload| CachedPosition::new(key, payload))
    }

    #[inline(always)]
    fn bucket(&self, key: u64) -> &[Slot] {
        let index = self.bucket_index(key);
        &self.slots[index..index + BUCKET_SIZE]
    }

    /// Index of the first slot of the bucket for `key`.
    #[inline(always)]
    fn bucket_index(&self, key: u64) -> usize {
        let index = mix(key) as i64 % self.bucket_count as i64;
        // Fold the signed remainder to its absolute value.
        let mask = index >> 63;
        let index = ((index ^ mask) - mask) as usize * BUCKET_SIZE;
        debug_assert!(index + BUCKET_SIZE <= self.slots.len());
        index
    }
}

fn validate_capacity(capacity: usize) -> Result<(), CacheError> {
    if capacity == 0 {
        return Err(CacheError::ZeroCapacity);
    }
    if capacity % BUCKET_SIZE != 0 {
        return Err(CacheError::MisalignedCapacity { capacity });
    }
    Ok(())
}

fn slots_for_size(size_mb: usize) -> Result<usize, CacheError> {
    if size_mb == 0 {
        return Err(CacheError::ZeroSize);
    }
    size_mb
        .checked_mul(SLOTS_PER_MEBIBYTE)
        .ok_or(CacheError::TooLarge { size_mb })
}

fn allocate(capacity: usize) -> AVec<Slot, ConstAlign<BUCKET_ALIGN>> {
    AVec::from_iter(BUCKET_ALIGN, (0..capacity).map(|_| Slot::sentinel()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::ScorePrecision;
    use crate::piece::Piece;
    use crate::square::Square;
    use crate::types::SCORE_NOT_CACHED;

    fn accept_all(_: &mut Move) -> bool {
        true
    }

    fn reject_all(_: &mut Move) -> bool {
        false
    }

    fn single_bucket() -> Cache {
        Cache::with_capacity(BUCKET_SIZE, Arc::new(CacheStats::new()), accept_all).unwrap()
    }

    fn entry(key: u64, score: i32) -> CachedPosition {
        let mv = Move::new(Square::E2, Square::E4, Piece::None);
        let payload = Payload::new(8, Some(mv), score, ScorePrecision::Exact).unwrap();
        CachedPosition::new(key, payload)
    }

    #[test]
    fn test_slots_per_mebibyte() {
        assert_eq!(mem::size_of::<CachedPosition>(), 16);
        assert_eq!(mem::size_of::<Slot>(), 16);
        assert_eq!(SLOTS_PER_MEBIBYTE, 65_536);
        assert_eq!(SLOTS_PER_MEBIBYTE % BUCKET_SIZE, 0);
    }

    #[test]
    fn test_new() {
        let cache = Cache::new(1, Arc::new(CacheStats::new()), accept_all).unwrap();
        assert_eq!(cache.capacity(), SLOTS_PER_MEBIBYTE);
        assert_eq!(cache.bucket_count(), SLOTS_PER_MEBIBYTE / BUCKET_SIZE);
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(cache.generation(), 0);
        assert_eq!(cache.slots.as_ptr() as usize % BUCKET_ALIGN, 0);
        assert!(cache.slot(0).unwrap().is_sentinel());
        assert!(cache.slot(cache.capacity() - 1).unwrap().is_sentinel());
        assert!(cache.slot(cache.capacity()).is_none());
    }

    #[test]
    fn test_invalid_sizes() {
        let stats = Arc::new(CacheStats::new());
        assert_eq!(
            Cache::with_capacity(0, stats.clone(), accept_all).err(),
            Some(CacheError::ZeroCapacity)
        );
        assert_eq!(
            Cache::with_capacity(6, stats.clone(), accept_all).err(),
            Some(CacheError::MisalignedCapacity { capacity: 6 })
        );
        assert_eq!(
            Cache::new(0, stats.clone(), accept_all).err(),
            Some(CacheError::ZeroSize)
        );
        assert_eq!(
            Cache::new(usize::MAX, stats, accept_all).err(),
            Some(CacheError::TooLarge { size_mb: usize::MAX })
        );
    }

    #[test]
    fn test_set_capacity_rejects_without_touching() {
        let mut cache = single_bucket();
        cache.set_generation(3);
        cache.insert(entry(7, 1));

        assert_eq!(
            cache.set_capacity(10),
            Err(CacheError::MisalignedCapacity { capacity: 10 })
        );
        assert_eq!(cache.capacity(), BUCKET_SIZE);
        assert_eq!(cache.entry_count(), 1);
        assert_eq!(cache.generation(), 3);
        assert_eq!(cache.probe(7).key, 7);
    }

    #[test]
    fn test_set_capacity_discards_entries() {
        let mut cache = single_bucket();
        cache.set_generation(9);
        cache.insert(entry(1, 10));
        cache.insert(entry(2, 20));

        cache.set_capacity(64).unwrap();
        assert_eq!(cache.capacity(), 64);
        assert_eq!(cache.bucket_count(), 16);
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(cache.generation(), 0);
        assert!(cache.probe(1).is_sentinel());
        assert!(cache.probe(2).is_sentinel());
    }

    #[test]
    fn test_probe_miss_returns_sentinel() {
        let cache = single_bucket();
        for key in [0, 1, 42, 1 << 63, u64::MAX] {
            assert_eq!(cache.probe(key), CachedPosition::SENTINEL);
        }
        let stats = cache.stats().snapshot();
        assert_eq!(stats.probes, 5);
        assert_eq!(stats.hits, 0);
    }

    #[test]
    fn test_probe_hit_stamps_generation() {
        let cache = single_bucket();
        cache.set_generation(4);
        let stored = entry(0xDEAD_BEEF, 75);
        cache.insert(stored);

        cache.set_generation(11);
        let hit = cache.probe(0xDEAD_BEEF);
        assert_eq!(hit.key, stored.key);
        assert_eq!(hit.payload, stored.payload.with_last_accessed(11));

        // The stamp is written back to the slot.
        let slot = (0..BUCKET_SIZE)
            .filter_map(|i| cache.slot(i))
            .find(|e| e.key == 0xDEAD_BEEF)
            .unwrap();
        assert_eq!(slot.payload.last_accessed(), 11);
        assert_eq!(cache.stats().snapshot().hits, 1);
    }

    #[test]
    fn test_overwrite_same_key() {
        let cache = single_bucket();
        cache.insert(entry(5, 10));
        cache.insert(entry(5, -10));

        assert_eq!(cache.entry_count(), 1);
        assert_eq!(cache.probe(5).payload.score(), -10);
        let occupied = (0..BUCKET_SIZE)
            .filter(|&i| !cache.slot(i).unwrap().is_sentinel())
            .count();
        assert_eq!(occupied, 1);
    }

    #[test]
    fn test_eviction_prefers_oldest_then_lowest_index() {
        let cache = single_bucket();
        // Leaves slot generations at [5, 2, 7, 2].
        for (key, generation) in [(100, 5), (101, 2), (102, 7), (103, 2)] {
            cache.set_generation(generation);
            cache.insert(entry(key, 0));
        }
        let generations: Vec<u8> = (0..BUCKET_SIZE)
            .map(|i| cache.slot(i).unwrap().payload.last_accessed())
            .collect();
        assert_eq!(generations, [5, 2, 7, 2]);
        assert_eq!(cache.entry_count(), 4);

        cache.set_generation(9);
        cache.insert(entry(104, 0));

        assert_eq!(cache.slot(1).unwrap().key, 104);
        assert_eq!(cache.slot(3).unwrap().key, 103);
        assert_eq!(cache.entry_count(), 4);
        assert!(cache.probe(101).is_sentinel());
    }

    #[test]
    fn test_first_writes_fill_slots_in_order() {
        let cache = single_bucket();
        cache.set_generation(1);
        for key in 1..=4 {
            cache.insert(entry(key, 0));
        }
        for i in 0..BUCKET_SIZE {
            assert_eq!(cache.slot(i).unwrap().key, i as u64 + 1);
        }
    }

    #[test]
    fn test_zero_key_is_not_confused_with_empty_slot() {
        let cache = single_bucket();
        cache.set_generation(1);
        assert!(cache.probe(0).is_sentinel());
        assert!(cache.slot(0).unwrap().is_sentinel());

        cache.insert(entry(0, 33));
        assert_eq!(cache.entry_count(), 1);
        assert_eq!(cache.probe(0).payload.score(), 33);
    }

    #[test]
    fn test_sentinel_equal_insert_is_not_counted() {
        let cache = single_bucket();
        let empty = Payload::new(0, None, SCORE_NOT_CACHED, ScorePrecision::Unknown).unwrap();
        let cleared = CachedPosition::new(0, empty);
        assert!(cleared.is_sentinel());

        for _ in 0..10 {
            cache.insert(cleared);
            cache.insert(CachedPosition::SENTINEL);
        }
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(cache.hashfull(), 0);
        assert!((0..BUCKET_SIZE).all(|i| cache.slot(i).unwrap().is_sentinel()));

        // The slots are still free for real entries.
        cache.set_generation(1);
        for key in 1..=4 {
            cache.insert(entry(key, 0));
        }
        assert_eq!(cache.entry_count(), BUCKET_SIZE);
    }

    #[test]
    fn test_entry_count_saturates_at_capacity() {
        let cache = single_bucket();
        let empty = Payload::new(0, None, SCORE_NOT_CACHED, ScorePrecision::Unknown).unwrap();

        // Evicting a live entry with the empty value frees the slot again.
        for generation in 1..=50u8 {
            cache.set_generation(generation);
            cache.insert(entry(u64::from(generation) + 100, 0));
            cache.set_generation(0);
            cache.insert(CachedPosition::new(0, empty));
            assert!(cache.entry_count() <= cache.capacity());
        }
        assert!(cache.hashfull() <= 1000);
    }

    #[test]
    fn test_claim_empty_slot() {
        let slot = Slot::sentinel();
        let first = entry(1, 10);
        let second = entry(2, 20);

        assert!(slot.claim(first));
        assert_eq!(slot.load(), (1, first.payload.raw()));
        assert!(!slot.claim(second));
        assert_eq!(slot.load(), (2, second.payload.raw()));
    }

    #[test]
    fn test_reset() {
        let cache = single_bucket();
        cache.set_generation(7);
        cache.insert(entry(1, 1));
        cache.insert(entry(2, 2));

        cache.reset();
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(cache.generation(), 0);
        for i in 0..BUCKET_SIZE {
            assert!(cache.slot(i).unwrap().is_sentinel());
        }
    }

    #[test]
    fn test_generation_wraps() {
        let cache = single_bucket();
        cache.set_generation(u8::MAX);
        cache.advance_generation();
        assert_eq!(cache.generation(), 0);
        cache.advance_generation();
        assert_eq!(cache.generation(), 1);
    }

    #[test]
    fn test_hashfull() {
        let cache = Cache::with_capacity(40, Arc::new(CacheStats::new()), accept_all).unwrap();
        assert_eq!(cache.hashfull(), 0);
        cache.set_generation(1);
        let mut key = 0;
        while cache.entry_count() < 10 {
            key += 1;
            cache.insert(entry(key, 0));
        }
        assert_eq!(cache.hashfull(), 250);
    }

    #[test]
    fn test_bucket_index_in_range() {
        let cache = Cache::with_capacity(4 * 1000, Arc::new(CacheStats::new()), accept_all).unwrap();
        let keys = [0, 1, 1 << 63, u64::MAX, 0x1234_5678_9ABC_DEF0, 0x8000_0000_0000_0001];
        for key in keys {
            let index = cache.bucket_index(key);
            assert_eq!(index % BUCKET_SIZE, 0);
            assert!(index < cache.capacity());
            assert_eq!(index, cache.bucket_index(key));
        }
    }

    #[test]
    fn test_bucket_index_spreads_sequential_keys() {
        let cache = Cache::with_capacity(4 * 64, Arc::new(CacheStats::new()), accept_all).unwrap();
        let mut used = [false; 64];
        for key in 0..1024u64 {
            used[cache.bucket_index(key << 32) / BUCKET_SIZE] = true;
        }
        assert!(used.iter().filter(|&&u| u).count() > 48);
    }

    #[test]
    fn test_best_move_accepted() {
        let cache = single_bucket();
        let mv = Move::new(Square::A7, Square::A8, Piece::WhiteQueen);
        let payload = Payload::new(3, Some(mv), 900, ScorePrecision::LowerBound).unwrap();

        let best = cache.best_move(payload).unwrap();
        assert_eq!(best.from, Square::A7);
        assert_eq!(best.to, Square::A8);
        assert_eq!(best.promoted_piece, Piece::WhiteQueen);
        assert!(best.is_best);

        let stats = cache.stats().snapshot();
        assert_eq!(stats.best_move_probes, 1);
        assert_eq!(stats.valid_best_moves, 1);
        assert_eq!(stats.invalid_best_moves, 0);
    }

    #[test]
    fn test_best_move_rejected() {
        let cache =
            Cache::with_capacity(BUCKET_SIZE, Arc::new(CacheStats::new()), reject_all).unwrap();
        let mv = Move::new(Square::B1, Square::C3, Piece::None);
        let payload = Payload::new(3, Some(mv), 0, ScorePrecision::Exact).unwrap();

        for _ in 0..3 {
            assert_eq!(cache.best_move(payload), None);
        }
        let stats = cache.stats().snapshot();
        assert_eq!(stats.valid_best_moves, 0);
        assert_eq!(stats.invalid_best_moves, 3);
    }

    #[test]
    fn test_best_move_absent() {
        let cache = single_bucket();
        assert_eq!(cache.best_move(Payload::SENTINEL), None);

        // Any other field values are ignored when the origin is illegal.
        let payload = Payload::encode(
            20,
            Square::Illegal,
            Square::D4,
            Piece::BlackRook,
            -50,
            ScorePrecision::UpperBound,
            99,
        )
        .unwrap();
        assert_eq!(cache.best_move(payload), None);

        let stats = cache.stats().snapshot();
        assert_eq!(stats.best_move_probes, 2);
        assert_eq!(stats.valid_best_moves, 0);
        assert_eq!(stats.invalid_best_moves, 0);
    }

    #[test]
    fn test_validator_may_complete_move() {
        let validator = |mv: &mut Move| {
            if mv.to.rank() == 7 && mv.promoted_piece == Piece::None {
                mv.promoted_piece = Piece::WhiteQueen;
            }
            true
        };
        let cache = Cache::with_capacity(BUCKET_SIZE, Arc::new(CacheStats::new()), validator).unwrap();
        let mv = Move::new(Square::H7, Square::H8, Piece::None);
        let payload = Payload::new(1, Some(mv), 0, ScorePrecision::Exact).unwrap();

        assert_eq!(
            cache.best_move(payload).map(|m| m.promoted_piece),
            Some(Piece::WhiteQueen)
        );
    }
}
