// CrashSleuth - util/error.rs
//
// Typed error hierarchy. A top-level enum wraps one error enum per
// subsystem; each subsystem enum implements `std::error::Error` with a
// `source()` chain and a `From` impl into the top enum. No string-typed
// errors cross a module boundary.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all CrashSleuth operations.
#[derive(Debug)]
pub enum CrashSleuthError {
    Parse(ParseError),
    Analyzer(AnalyzerError),
    Cache(CacheError),
    Executor(ExecutorError),
    Report(ReportError),
}

impl fmt::Display for CrashSleuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "parse error: {e}"),
            Self::Analyzer(e) => write!(f, "analyzer error: {e}"),
            Self::Cache(e) => write!(f, "cache error: {e}"),
            Self::Executor(e) => write!(f, "executor error: {e}"),
            Self::Report(e) => write!(f, "report error: {e}"),
        }
    }
}

impl std::error::Error for CrashSleuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(e) => Some(e),
            Self::Analyzer(e) => Some(e),
            Self::Cache(e) => Some(e),
            Self::Executor(e) => Some(e),
            Self::Report(e) => Some(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

/// Errors raised while parsing a crash log into a `CrashLog`.
#[derive(Debug)]
pub enum ParseError {
    /// The log file is empty.
    EmptyFile { path: PathBuf },

    /// The required top header / main-error block could not be found.
    MissingMainError { path: PathBuf },

    /// The file is structurally unrecognizable as a crash log.
    Unrecognized { path: PathBuf, reason: String },

    /// I/O error while reading the log file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyFile { path } => write!(f, "'{}' is empty", path.display()),
            Self::MissingMainError { path } => write!(
                f,
                "'{}': no main-error block found (missing top header)",
                path.display()
            ),
            Self::Unrecognized { path, reason } => {
                write!(f, "'{}': unrecognizable format: {reason}", path.display())
            }
            Self::Io { path, source } => write!(f, "'{}': {source}", path.display()),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ParseError> for CrashSleuthError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

// ---------------------------------------------------------------------------
// Analyzer errors
// ---------------------------------------------------------------------------

/// Errors surfaced by a single analyzer invocation. Local to that analyzer;
/// never aborts the rest of a scan.
#[derive(Debug)]
pub enum AnalyzerError {
    Failed { analyzer: String, reason: String },
    TimedOut { analyzer: String },
    RetriesExhausted { analyzer: String, attempts: u32 },
}

impl fmt::Display for AnalyzerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { analyzer, reason } => {
                write!(f, "'{analyzer}' failed: {reason}")
            }
            Self::TimedOut { analyzer } => write!(f, "'{analyzer}' timed out"),
            Self::RetriesExhausted { analyzer, attempts } => {
                write!(f, "'{analyzer}' failed after {attempts} attempt(s)")
            }
        }
    }
}

impl std::error::Error for AnalyzerError {}

impl From<AnalyzerError> for CrashSleuthError {
    fn from(e: AnalyzerError) -> Self {
        Self::Analyzer(e)
    }
}

// ---------------------------------------------------------------------------
// Cache errors
// ---------------------------------------------------------------------------

/// Errors related to the analysis-result cache. Never fails a scan on their
/// own; the caller logs and treats the lookup as a miss.
#[derive(Debug)]
pub enum CacheError {
    MtimeUnavailable { path: PathBuf, source: io::Error },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MtimeUnavailable { path, source } => {
                write!(f, "could not read mtime for '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MtimeUnavailable { source, .. } => Some(source),
        }
    }
}

impl From<CacheError> for CrashSleuthError {
    fn from(e: CacheError) -> Self {
        Self::Cache(e)
    }
}

// ---------------------------------------------------------------------------
// Executor errors
// ---------------------------------------------------------------------------

/// Errors from the resilient-executor wrapper itself, distinct from the
/// wrapped operation's own error (carried separately as `ExecutorOutcome::Failed`).
#[derive(Debug)]
pub enum ExecutorError {
    Cancelled { key: String },
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled { key } => write!(f, "'{key}' cancelled"),
        }
    }
}

impl std::error::Error for ExecutorError {}

impl From<ExecutorError> for CrashSleuthError {
    fn from(e: ExecutorError) -> Self {
        Self::Executor(e)
    }
}

// ---------------------------------------------------------------------------
// Report errors
// ---------------------------------------------------------------------------

/// Errors from `ReportComposer`'s atomic write-to-temp-then-rename.
#[derive(Debug)]
pub enum ReportError {
    Io {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {operation} on '{}': {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
        }
    }
}

impl From<ReportError> for CrashSleuthError {
    fn from(e: ReportError) -> Self {
        Self::Report(e)
    }
}

/// Convenience alias for CrashSleuth results.
pub type Result<T> = std::result::Result<T, CrashSleuthError>;
