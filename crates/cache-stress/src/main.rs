//! Position cache stress tool.
//!
//! Drives the cache with a synthetic search workload: every simulated search
//! advances the generation, probes fingerprints drawn from a bounded key space,
//! stores a result on a miss and reconstructs the best move on a hit. Prints
//! hit rates, move validation outcomes and how the slots are aged.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result, ensure};
use cache_core::cache::Cache;
use cache_core::entry::{CachedPosition, Payload, ScorePrecision};
use cache_core::moves::Move;
use cache_core::options::CacheOptions;
use cache_core::piece::Piece;
use cache_core::square::Square;
use cache_core::stats::{CacheStats, StatsSnapshot};
use cache_core::types::{MAX_HORIZON, SCORE_MAX};
use clap::Parser;
use colored::*;
use log::{debug, info};
use num_format::{Locale, ToFormattedString};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Percentage thresholds for color coding
const RATE_GOOD: f64 = 60.0;
const RATE_FAIR: f64 = 30.0;

/// Position cache stress tool.
#[derive(Parser)]
#[command(author, version, about = "Stress the position cache with a synthetic search workload")]
struct Args {
    /// Cache size in MB
    #[arg(long, default_value_t = 16, value_parser = clap::value_parser!(u32).range(1..))]
    hash_size: u32,

    /// Number of simulated searches (one generation each)
    #[arg(short, long, default_value_t = 200)]
    searches: u32,

    /// Probes per search, split across threads
    #[arg(short, long, default_value_t = 100_000)]
    probes: u64,

    /// Number of distinct positions the workload draws from
    #[arg(short, long, default_value_t = 2_000_000)]
    key_space: u64,

    /// Number of worker threads sharing the cache
    #[arg(short, long, default_value_t = 1)]
    threads: usize,

    /// Fraction of cached best moves the validator rejects (0.0-1.0)
    #[arg(long, default_value_t = 0.05)]
    reject_rate: f64,

    /// Random seed
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Print hashfull after each search
    #[arg(short, long)]
    verbose: bool,
}

/// Fingerprint of the `index`-th position in the key space (splitmix64).
fn fingerprint(seed: u64, index: u64) -> u64 {
    let mut z = seed
        .wrapping_mul(0xD6E8_FEB8_6659_FD93)
        .wrapping_add(index.wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Stand-in for a search result at an unknown position.
fn random_entry(rng: &mut StdRng, key: u64) -> Result<CachedPosition> {
    let best_move = rng.random_bool(0.8).then(|| {
        let from = Square::from_u8(rng.random_range(0..64)).unwrap_or_default();
        let to = Square::from_u8(rng.random_range(0..64)).unwrap_or_default();
        Move::new(from, to, Piece::None)
    });
    let precision = match rng.random_range(0..3) {
        0 => ScorePrecision::LowerBound,
        1 => ScorePrecision::UpperBound,
        _ => ScorePrecision::Exact,
    };
    let payload = Payload::new(
        rng.random_range(0..=MAX_HORIZON),
        best_move,
        rng.random_range(-SCORE_MAX..=SCORE_MAX),
        precision,
    )?;
    Ok(CachedPosition::new(key, payload))
}

/// Per-thread share of one simulated search.
fn run_search(cache: &Cache, args: &Args, rng: &mut StdRng, probes: u64) -> Result<()> {
    for _ in 0..probes {
        let key = fingerprint(args.seed, rng.random_range(0..args.key_space));
        cache.prefetch(key);
        let hit = cache.probe(key);
        if hit.is_sentinel() {
            cache.insert(random_entry(rng, key)?);
        } else if hit.payload.has_best_move() {
            cache.best_move(hit.payload);
        }
    }
    Ok(())
}

/// Slot counts grouped by how many generations ago they were touched.
#[derive(Default)]
struct AgeHistogram {
    empty: usize,
    current: usize,
    recent: usize,
    older: usize,
    stale: usize,
}

impl AgeHistogram {
    fn collect(cache: &Cache) -> Self {
        let generation = cache.generation();
        let mut histogram = AgeHistogram::default();
        for entry in (0..cache.capacity()).filter_map(|i| cache.slot(i)) {
            if entry.is_sentinel() {
                histogram.empty += 1;
                continue;
            }
            match generation.wrapping_sub(entry.payload.last_accessed()) {
                0 => histogram.current += 1,
                1..=3 => histogram.recent += 1,
                4..=15 => histogram.older += 1,
                _ => histogram.stale += 1,
            }
        }
        histogram
    }
}

fn colorize_rate(rate: f64) -> ColoredString {
    let text = format!("{rate:.1}%");
    if rate >= RATE_GOOD {
        text.green()
    } else if rate >= RATE_FAIR {
        text.yellow()
    } else {
        text.red()
    }
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

fn print_summary(cache: &Cache, stats: &StatsSnapshot, elapsed: f64) {
    let histogram = AgeHistogram::collect(cache);
    let capacity = cache.capacity() as u64;
    let probes_per_sec = if elapsed > 0.0 {
        (stats.probes as f64 / elapsed).round() as u64
    } else {
        0
    };
    let reconstructed = stats.valid_best_moves + stats.invalid_best_moves;

    let rows = [
        ("Time", format!("{elapsed:.3}s").normal()),
        ("Probes", stats.probes.to_formatted_string(&Locale::en).normal()),
        ("Probes/s", probes_per_sec.to_formatted_string(&Locale::en).normal()),
        ("Hits", stats.hits.to_formatted_string(&Locale::en).normal()),
        ("Hit rate", colorize_rate(stats.hit_rate())),
        (
            "Best move probes",
            stats.best_move_probes.to_formatted_string(&Locale::en).normal(),
        ),
        (
            "Valid moves",
            colorize_rate(percent(stats.valid_best_moves, reconstructed)),
        ),
        (
            "Invalid moves",
            stats.invalid_best_moves.to_formatted_string(&Locale::en).normal(),
        ),
        (
            "Entries",
            format!(
                "{} / {}",
                cache.entry_count().to_formatted_string(&Locale::en),
                capacity.to_formatted_string(&Locale::en)
            )
            .normal(),
        ),
        ("Hashfull", format!("{}‰", cache.hashfull()).normal()),
        ("Generation", cache.generation().to_string().normal()),
    ];
    let ages = [
        ("current", histogram.current),
        ("1-3 ago", histogram.recent),
        ("4-15 ago", histogram.older),
        ("16+ ago", histogram.stale),
        ("empty", histogram.empty),
    ];

    let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    println!("\n### {}", "Statistics".bold());
    for (label, value) in rows {
        println!("- {label:<width$}: {value}");
    }

    println!("\n### {}", "Slot age".bold());
    for (label, count) in ages {
        println!(
            "- {label:<width$}: {:>6.2}% ({})",
            percent(count as u64, capacity),
            count.to_formatted_string(&Locale::en)
        );
    }
}

fn run(args: &Args) -> Result<()> {
    ensure!(args.key_space > 0, "--key-space must be positive");
    ensure!(args.threads > 0, "--threads must be positive");
    ensure!(
        (0.0..=1.0).contains(&args.reject_rate),
        "--reject-rate must be between 0.0 and 1.0"
    );

    let options = CacheOptions::default().with_size_mb(args.hash_size as usize);
    let stats = Arc::new(CacheStats::new());
    let reject_below = (args.reject_rate * 4096.0) as usize;
    let validator = move |mv: &mut Move| (mv.from.index() * 64 + mv.to.index()) >= reject_below;
    let cache = Cache::from_options(&options, stats.clone(), validator)
        .with_context(|| format!("failed to allocate a {} MB cache", options.size_mb))?;

    info!(
        "cache: {} MB, {} slots, {} buckets",
        options.size_mb,
        cache.capacity(),
        cache.bucket_count()
    );

    let probes_per_thread = args.probes / args.threads as u64;
    let mut rngs: Vec<StdRng> = (0..args.threads as u64)
        .map(|i| StdRng::seed_from_u64(args.seed.wrapping_add(i)))
        .collect();

    let start = Instant::now();
    for search in 0..args.searches {
        cache.advance_generation();
        thread::scope(|scope| -> Result<()> {
            let handles: Vec<_> = rngs
                .iter_mut()
                .map(|rng| {
                    let cache = &cache;
                    scope.spawn(move || run_search(cache, args, rng, probes_per_thread))
                })
                .collect();
            for handle in handles {
                handle
                    .join()
                    .map_err(|_| anyhow::anyhow!("worker thread panicked"))??;
            }
            Ok(())
        })?;

        debug!("search {search} done, hashfull {}", cache.hashfull());
        if args.verbose {
            println!(
                "search {:>5}  generation {:>3}  hashfull {:>4}",
                search + 1,
                cache.generation(),
                cache.hashfull()
            );
        }
    }
    let elapsed = start.elapsed().as_secs_f64();

    print_summary(&cache, &stats.snapshot(), elapsed);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    run(&args)
}
