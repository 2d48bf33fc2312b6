// CrashSleuth - util/constants.rs
//
// Single source of truth for named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

pub const APP_NAME: &str = "CrashSleuth";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Parsing limits
// =============================================================================

/// Maximum number of non-fatal parse warnings tracked per log before
/// suppression (keeps a pathological file from growing the warnings Vec
/// without bound).
pub const MAX_PARSE_WARNINGS: usize = 1_000;

/// Maximum number of call-stack frames parsed from a single log. Crash logs
/// with runaway or corrupted stacks are truncated rather than exhausting
/// memory.
pub const MAX_STACK_FRAMES: usize = 10_000;

// =============================================================================
// Signal matcher
// =============================================================================

/// Weight given to required (`ME-REQ`) signals in the confidence blend.
pub const SIGNAL_WEIGHT_REQUIRED: f64 = 0.5;
/// Weight given to optional (`ME-OPT`) signals in the confidence blend.
pub const SIGNAL_WEIGHT_OPTIONAL: f64 = 0.3;
/// Weight given to stack-occurrence signals in the confidence blend.
pub const SIGNAL_WEIGHT_STACK: f64 = 0.2;

// =============================================================================
// Call-stack analysis
// =============================================================================

/// Minimum contiguous run length counted as a pattern cluster.
pub const MIN_CLUSTER_SIZE: usize = 2;
/// Direct-recursion threshold: same function in >= this many adjacent frames.
pub const DIRECT_RECURSION_MIN_FRAMES: usize = 3;
/// Indirect-recursion threshold: a repeating adjacent pair seen >= this many times.
pub const INDIRECT_RECURSION_MIN_REPEATS: usize = 2;
/// A module occupying at least this many frames is flagged as a problem indicator.
pub const PROBLEM_MODULE_MIN_FRAMES: usize = 3;
/// A module holding more than this fraction of all frames is "dominated by".
pub const DOMINANT_MODULE_FRACTION: f64 = 0.60;
/// Total frame count above which the stack is flagged "deep call stack".
pub const DEEP_STACK_THRESHOLD: usize = 100;
/// `critical_depth` is this fraction of `max_depth`.
pub const CRITICAL_DEPTH_FRACTION: f64 = 0.75;

// =============================================================================
// Severity calculator
// =============================================================================

/// Divisor mapping a raw base-severity integer onto the `[0,1]` weight band.
pub const BASE_SEVERITY_DIVISOR: f64 = 6.0;
/// Confidence contribution when the suspect's signal match succeeded.
pub const MATCH_CONFIDENCE_WEIGHT: f64 = 0.25;
/// Per-factor additive boost (each escalation factor contributes up to this).
pub const FACTOR_BOOST_MAX: f64 = 0.15;
/// Weight per matched signal (capped at `MATCHED_SIGNALS_CAP`).
pub const MATCHED_SIGNAL_WEIGHT: f64 = 0.05;
/// Cap on the number of matched signals counted toward the weight term.
pub const MATCHED_SIGNALS_CAP: u32 = 10;
/// Weight per occurrence of the best-matched signal (capped at `OCCURRENCES_CAP`).
pub const OCCURRENCE_WEIGHT: f64 = 0.02;
/// Cap on occurrences counted toward the occurrence weight term.
pub const OCCURRENCES_CAP: u32 = 20;

/// Severity level thresholds (score >= threshold maps to that level).
pub const THRESHOLD_CRITICAL: f64 = 0.8;
pub const THRESHOLD_ERROR: f64 = 0.6;
pub const THRESHOLD_WARNING: f64 = 0.3;
pub const THRESHOLD_INFO: f64 = 0.1;

/// Confidence at/above which "all-required-matched" escalates severity.
pub const ESCALATION_CONFIDENCE: f64 = 0.9;

/// `calculate_combined`: additive boost per extra assessment beyond the first.
pub const COMBINED_BOOST_PER_EXTRA: f64 = 0.05;
/// `calculate_combined`: cap on how many "extra" assessments count toward the boost.
pub const COMBINED_BOOST_CAP: usize = 5;
/// `calculate_combined`: escalates to Critical when at least this many
/// individual assessments are already Critical.
pub const COMBINED_CRITICAL_COUNT: usize = 2;
/// `calculate_combined`: escalates to Error when at least this many
/// individual assessments are already Error.
pub const COMBINED_ERROR_COUNT: usize = 3;

// =============================================================================
// Resilient executor
// =============================================================================

/// Default number of retries after the initial attempt fails.
pub const DEFAULT_MAX_RETRIES: u32 = 2;
/// Linear backoff unit between retries.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 50;

// =============================================================================
// Scan pipeline
// =============================================================================

/// Default worker concurrency floor, used when available parallelism cannot
/// be determined.
pub const MIN_CONCURRENCY: usize = 1;

// =============================================================================
// FCX / file integrity
// =============================================================================

/// BA2 archive magic bytes.
pub const BA2_MAGIC: &[u8; 4] = b"BTDX";
/// Recognised BA2 format tags.
pub const BA2_FORMAT_TAGS: &[&[u8; 4]] = &[b"DX10", b"GNRL"];
/// DDS file magic.
pub const DDS_MAGIC: &[u8; 4] = b"DDS ";

// =============================================================================
// Logging
// =============================================================================

pub const DEFAULT_LOG_LEVEL: &str = "info";
