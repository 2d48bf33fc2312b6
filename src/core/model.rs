// CrashSleuth - core/model.rs
//
// Core data model types. Pure data definitions with no I/O dependencies
// (core depends on std + serde/chrono/regex only).
//
// These types are the shared vocabulary across the parser, the analyzers,
// the cache, and the report composer.

use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::SystemTime;

// =============================================================================
// CrashLog
// =============================================================================

/// A single stack frame from a crash log's call-stack section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackFrame {
    pub index: usize,
    pub address: String,
    pub module: String,
    pub function: Option<String>,
}

/// The parsed representation of one crash log.
///
/// Created by `CrashLogParser`; read-only to analyzers. `release_raw_lines`
/// drops the raw-lines buffer after analysis completes to bound memory —
/// everything analyzers need has already been extracted into `sections`.
#[derive(Debug, Clone)]
pub struct CrashLog {
    pub file_path: PathBuf,
    pub mtime: SystemTime,

    pub main_error: String,
    pub call_stack: Vec<StackFrame>,
    pub sections: HashMap<String, Vec<String>>,

    pub game_version: Option<String>,
    pub game_root_path: Option<PathBuf>,
    pub crashgen_name: Option<String>,
    pub buffout_version: Option<String>,

    raw_lines: Option<Vec<String>>,
}

impl CrashLog {
    pub fn new(file_path: PathBuf, mtime: SystemTime, raw_lines: Vec<String>) -> Self {
        Self {
            file_path,
            mtime,
            main_error: String::new(),
            call_stack: Vec::new(),
            sections: HashMap::new(),
            game_version: None,
            game_root_path: None,
            crashgen_name: None,
            buffout_version: None,
            raw_lines: Some(raw_lines),
        }
    }

    /// A synthetic log carrying only a game path, used by `FcxDecorator` to
    /// run `FileIntegrityAnalyzer` ahead of (or instead of) a real scan.
    pub fn synthetic_for_game_path(game_root_path: PathBuf) -> Self {
        Self {
            file_path: PathBuf::from("FCX_CHECK"),
            mtime: SystemTime::UNIX_EPOCH,
            main_error: String::new(),
            call_stack: Vec::new(),
            sections: HashMap::new(),
            game_version: None,
            game_root_path: Some(game_root_path),
            crashgen_name: None,
            buffout_version: None,
            raw_lines: None,
        }
    }

    pub fn section(&self, name: &str) -> Option<&[String]> {
        self.sections.get(name).map(|v| v.as_slice())
    }

    /// Drops the raw-lines buffer. Called once a scan's analyzers have all run.
    pub fn release_raw_lines(&mut self) {
        self.raw_lines = None;
    }

    pub fn raw_lines(&self) -> Option<&[String]> {
        self.raw_lines.as_deref()
    }
}

// =============================================================================
// Analyzer result types
// =============================================================================

/// Outcome from one analyzer run against one `CrashLog`.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub analyzer_name: String,
    pub success: bool,
    pub has_findings: bool,

    /// Ordered text fragments merged into the final report by `ReportComposer`.
    pub report_lines: Vec<String>,

    /// Open mapping used by downstream composers, e.g. FCX summary reads
    /// `modified_files_count` / `is_downgrade`.
    pub data: HashMap<String, AnalysisValue>,

    pub errors: Vec<String>,
}

impl AnalysisResult {
    pub fn empty(analyzer_name: impl Into<String>) -> Self {
        Self {
            analyzer_name: analyzer_name.into(),
            success: true,
            has_findings: false,
            report_lines: Vec::new(),
            data: HashMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn failed(analyzer_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            analyzer_name: analyzer_name.into(),
            success: false,
            has_findings: false,
            report_lines: Vec::new(),
            data: HashMap::new(),
            errors: vec![error.into()],
        }
    }
}

/// An open-mapping value carried in `AnalysisResult::data`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AnalysisValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

/// Game-file integrity status produced by `FileIntegrityAnalyzer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GameStatus {
    Good,
    Warning,
    Critical,
}

/// One file-level finding from the FCX pre-pass.
#[derive(Debug, Clone, Serialize)]
pub struct FileCheck {
    pub path: PathBuf,
    pub description: String,
}

/// One hash-comparison result from the FCX pre-pass.
#[derive(Debug, Clone, Serialize)]
pub struct HashValidation {
    pub path: PathBuf,
    pub expected: String,
    pub actual: String,
    pub matched: bool,
}

/// Specialization of `AnalysisResult` produced by `FileIntegrityAnalyzer`.
#[derive(Debug, Clone, Serialize)]
pub struct FcxScanResult {
    pub result: AnalysisResult,
    pub game_status: GameStatus,
    pub file_checks: Vec<FileCheck>,
    pub hash_validations: Vec<HashValidation>,
}

// =============================================================================
// ScanResult
// =============================================================================

/// Lifecycle status of one log's scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScanStatus {
    Pending,
    InProgress,
    Completed,
    CompletedWithErrors,
    Failed,
    Cancelled,
}

/// Outcome for one scanned log.
///
/// Invariant: `status == Completed` iff `error_messages` is empty and every
/// `analysis_results[i].success` is true.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub log_path: PathBuf,
    #[serde(skip)]
    pub crash_log: Option<CrashLog>,
    pub analysis_results: Vec<AnalysisResult>,
    pub error_messages: Vec<String>,
    pub status: ScanStatus,
    pub processing_time: std::time::Duration,
    pub report_text: String,
}

impl ScanResult {
    pub fn pending(log_path: PathBuf) -> Self {
        Self {
            log_path,
            crash_log: None,
            analysis_results: Vec::new(),
            error_messages: Vec::new(),
            status: ScanStatus::Pending,
            processing_time: std::time::Duration::ZERO,
            report_text: String::new(),
        }
    }

    pub fn failed(log_path: PathBuf, error: impl Into<String>) -> Self {
        Self {
            log_path,
            crash_log: None,
            analysis_results: Vec::new(),
            error_messages: vec![error.into()],
            status: ScanStatus::Failed,
            processing_time: std::time::Duration::ZERO,
            report_text: String::new(),
        }
    }

    pub fn cancelled(log_path: PathBuf) -> Self {
        Self {
            log_path,
            crash_log: None,
            analysis_results: Vec::new(),
            error_messages: Vec::new(),
            status: ScanStatus::Cancelled,
            processing_time: std::time::Duration::ZERO,
            report_text: String::new(),
        }
    }

    /// Derives the final status from accumulated analyzer results, per §3's
    /// `status == Completed` invariant.
    pub fn finalize_status(&mut self) {
        if self.status == ScanStatus::Cancelled || self.status == ScanStatus::Failed {
            return;
        }
        let any_errors =
            !self.error_messages.is_empty() || self.analysis_results.iter().any(|r| !r.success);
        self.status = if any_errors {
            ScanStatus::CompletedWithErrors
        } else {
            ScanStatus::Completed
        };
    }
}

// =============================================================================
// Severity
// =============================================================================

/// Severity level produced by `SeverityCalculator`, ordered least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum AnalysisSeverity {
    None,
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for AnalysisSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::None => "None",
            Self::Info => "Info",
            Self::Warning => "Warning",
            Self::Error => "Error",
            Self::Critical => "Critical",
        };
        f.write_str(s)
    }
}

/// Result of one `SeverityCalculator::calculate` invocation.
#[derive(Debug, Clone, Serialize)]
pub struct SeverityAssessment {
    pub level: AnalysisSeverity,
    pub score: f64,
    pub was_escalated: bool,
    pub escalation_reason: Option<String>,
}

/// Additive escalation/boost factors consulted by `SeverityCalculator`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeverityFactors {
    pub is_dll_crash: bool,
    pub is_recurring: bool,
    pub has_multiple_indicators: bool,
    pub affects_game_stability: bool,
    pub is_known_critical_pattern: bool,
}

// =============================================================================
// Signal matching
// =============================================================================

/// The location a signal is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignalLocation {
    MainError,
    CallStack,
}

/// The class of signal, per the grammar in `core::signal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignalKind {
    Required,
    Optional,
    Negative,
    Stack,
}

/// One signal's evaluation outcome.
#[derive(Debug, Clone, Serialize)]
pub struct SignalMatch {
    pub signal: String,
    pub pattern: String,
    pub kind: SignalKind,
    pub location: SignalLocation,
    pub occurrences: usize,
    pub min_occurrences: usize,
    pub max_occurrences: Option<usize>,
}

/// Outcome of evaluating a full signal list (one suspect) against a `CrashLog`.
#[derive(Debug, Clone, Serialize)]
pub struct SignalMatchResult {
    pub is_match: bool,
    pub confidence: f64,
    pub required_matches: usize,
    pub required_total: usize,
    pub optional_matches: usize,
    pub optional_total: usize,
    pub stack_matches: usize,
    pub skip_reason: Option<String>,
    pub matched_signals: Vec<SignalMatch>,
}

// =============================================================================
// Call-stack analysis
// =============================================================================

/// A maximal contiguous run of frames sharing the same module.
#[derive(Debug, Clone, Serialize)]
pub struct PatternCluster {
    pub module: String,
    pub start_index: usize,
    pub len: usize,
}

/// Depth statistics over a parsed call stack.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DepthStatistics {
    pub max_depth: usize,
    pub critical_depth: usize,
    pub average_module_depth: f64,
}

/// Per-pattern positional statistics from `analyze_pattern_statistics`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PatternStatistics {
    pub total_occurrences: usize,
    pub first_depth: Option<usize>,
    pub last_depth: Option<usize>,
    pub average_depth: f64,
    pub clustering_coefficient: f64,
}

/// Structural report produced by `CallStackAnalyzer::analyze`.
#[derive(Debug, Clone, Serialize)]
pub struct CallStackAnalysis {
    pub module_counts: HashMap<String, usize>,
    pub pattern_clusters: Vec<PatternCluster>,
    pub pattern_matches: HashMap<String, Vec<usize>>,
    pub recursion_detected: bool,
    pub problem_indicators: Vec<String>,
    pub depth_statistics: DepthStatistics,
}
