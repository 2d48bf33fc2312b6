// CrashSleuth - app/pipeline.rs
//
// Orchestrates single-log and batch-log scanning: parse under the resilient
// executor, run sequential analyzers in priority order, then parallel
// analyzers, consulting the cache at each step, and compose the report.
//
// Batch concurrency realization: a bounded `rayon::ThreadPool` (size =
// `max_concurrency`/`max_degree_of_parallelism`) stands in for the
// semaphore-bounded worker pool. Job submission runs on a detached
// background thread holding an `Arc<ScanPipeline>`; each submitted job sends
// its finished `ScanResult` over one shared `mpsc::Sender` (cloned per job).
// `process_batch` returns immediately with a `BatchScan` wrapping the
// `Receiver` as an iterator, so the caller pulls results (and drives
// progress delivery) at its own pace instead of blocking until the whole
// batch completes.

use crate::app::executor::{ExecutorConfig, ExecutorOutcome, ResilientExecutor};
use crate::core::analyzer::Analyzer;
use crate::core::cache::AnalysisResultCache;
use crate::core::model::{AnalysisResult, CrashLog, ScanResult, ScanStatus};
use crate::core::parser::{CrashLogParser, ParseConfig};
use crate::core::report::ReportComposer;
use crate::util::constants;
use crate::util::error::AnalyzerError;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

/// Recognized scan options (§6).
#[derive(Clone)]
pub struct ScanOptions {
    pub max_concurrency: usize,
    /// Optional override of `max_concurrency` for the batch worker pool.
    pub max_degree_of_parallelism: Option<usize>,
    pub preserve_order: bool,
    pub enable_caching: bool,
    /// Optional per-log deadline. An analyzer invocation that does not
    /// finish within this duration is reported as a failed `AnalysisResult`
    /// whose error contains "timed out".
    pub timeout: Option<Duration>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(constants::MIN_CONCURRENCY),
            max_degree_of_parallelism: None,
            preserve_order: false,
            enable_caching: true,
            timeout: None,
        }
    }
}

impl ScanOptions {
    fn worker_count(&self) -> usize {
        self.max_degree_of_parallelism
            .unwrap_or(self.max_concurrency)
            .max(constants::MIN_CONCURRENCY)
    }
}

/// A snapshot of batch progress, delivered to the caller's progress sink
/// after every yielded result.
#[derive(Debug, Clone)]
pub struct BatchProgress {
    pub total_files: usize,
    pub processed_files: usize,
    pub successful_scans: usize,
    pub failed_scans: usize,
    pub incomplete_scans: usize,
    pub current_file: PathBuf,
    pub elapsed: Duration,
    pub estimated_remaining: Option<Duration>,
}

#[derive(Default)]
struct BatchCounters {
    processed: usize,
    successful: usize,
    failed: usize,
    incomplete: usize,
}

/// Orchestrates single-log and batch-log processing.
pub struct ScanPipeline {
    sequential_analyzers: Vec<Box<dyn Analyzer>>,
    parallel_analyzers: Vec<Box<dyn Analyzer>>,
    cache: AnalysisResultCache,
    executor: ResilientExecutor,
    parse_config: ParseConfig,
}

impl ScanPipeline {
    /// Builds a pipeline from an unordered analyzer set, partitioning by
    /// `can_run_in_parallel` and sorting each partition by priority (ties
    /// broken by insertion order, per §3).
    pub fn new(analyzers: Vec<Box<dyn Analyzer>>) -> Self {
        let mut sequential = Vec::new();
        let mut parallel = Vec::new();
        for (insertion_order, analyzer) in analyzers.into_iter().enumerate() {
            if analyzer.can_run_in_parallel() {
                parallel.push((insertion_order, analyzer));
            } else {
                sequential.push((insertion_order, analyzer));
            }
        }
        sequential.sort_by_key(|(order, a)| (a.priority(), *order));
        parallel.sort_by_key(|(order, a)| (a.priority(), *order));

        Self {
            sequential_analyzers: sequential.into_iter().map(|(_, a)| a).collect(),
            parallel_analyzers: parallel.into_iter().map(|(_, a)| a).collect(),
            cache: AnalysisResultCache::new(),
            executor: ResilientExecutor::new(ExecutorConfig::default()),
            parse_config: ParseConfig::default(),
        }
    }

    pub fn cache(&self) -> &AnalysisResultCache {
        &self.cache
    }

    /// Runs one log through parse -> sequential analyzers -> parallel
    /// analyzers -> report composition, per §4.8's single-log algorithm.
    pub fn process_single(
        &self,
        log_path: &Path,
        options: &ScanOptions,
        cancel: &Arc<AtomicBool>,
    ) -> ScanResult {
        if cancel.load(Ordering::SeqCst) {
            return ScanResult::cancelled(log_path.to_path_buf());
        }

        let parser = CrashLogParser::new(self.parse_config.clone());
        let parse_outcome = self.executor.run(
            &format!("parse:{}", log_path.display()),
            cancel,
            || parser.parse_file(log_path),
        );

        let (mut log, _warnings) = match parse_outcome {
            ExecutorOutcome::Succeeded(parsed) => parsed,
            ExecutorOutcome::Cancelled => return ScanResult::cancelled(log_path.to_path_buf()),
            ExecutorOutcome::Failed(err) => {
                return ScanResult::failed(log_path.to_path_buf(), err.to_string());
            }
        };

        let mut result = ScanResult::pending(log_path.to_path_buf());
        result.status = ScanStatus::InProgress;

        for analyzer in &self.sequential_analyzers {
            if cancel.load(Ordering::SeqCst) {
                return ScanResult::cancelled(log_path.to_path_buf());
            }
            let analysis = self.run_analyzer(analyzer.as_ref(), &log, options, cancel);
            result.analysis_results.push(analysis);
        }

        let parallel_results: Vec<AnalysisResult> = if self.parallel_analyzers.is_empty() {
            Vec::new()
        } else {
            use rayon::prelude::*;
            self.parallel_analyzers
                .par_iter()
                .map(|analyzer| self.run_analyzer(analyzer.as_ref(), &log, options, cancel))
                .collect()
        };
        result.analysis_results.extend(parallel_results);

        log.release_raw_lines();

        for analysis in &result.analysis_results {
            result.error_messages.extend(analysis.errors.iter().cloned());
        }

        result.report_text = ReportComposer::compose(&result.analysis_results);
        result.crash_log = Some(log);
        result.finalize_status();
        result
    }

    fn run_analyzer(
        &self,
        analyzer: &dyn Analyzer,
        log: &CrashLog,
        options: &ScanOptions,
        cancel: &Arc<AtomicBool>,
    ) -> AnalysisResult {
        if options.enable_caching {
            if let Some(cached) = self.cache.get(&log.file_path, analyzer.name(), log.mtime) {
                return cached;
            }
        }

        let timeout = options.timeout;
        let outcome: ExecutorOutcome<AnalysisResult, String> = self.executor.run(
            &format!("analyze:{}", analyzer.name()),
            cancel,
            || Self::invoke_analyzer(analyzer, log, timeout),
        );

        let result = match outcome {
            ExecutorOutcome::Succeeded(result) => result,
            ExecutorOutcome::Cancelled => AnalysisResult::failed(analyzer.name(), "cancelled"),
            ExecutorOutcome::Failed(err) => AnalysisResult::failed(analyzer.name(), err),
        };

        if options.enable_caching {
            self.cache
                .put(&log.file_path, analyzer.name(), log.mtime, result.clone());
        }
        result
    }

    /// Runs one analyzer invocation, enforcing `timeout` if set (§5/§6/§7(3)).
    /// The invocation runs on a scoped thread so a slow analyzer can be
    /// detected via `recv_timeout` without blocking the caller past the
    /// deadline to learn the outcome; Rust has no safe way to preempt the
    /// background thread itself, so a true runaway analyzer still holds its
    /// worker until it returns, but the reported result and error are
    /// produced at the deadline.
    fn invoke_analyzer(
        analyzer: &dyn Analyzer,
        log: &CrashLog,
        timeout: Option<Duration>,
    ) -> Result<AnalysisResult, String> {
        let Some(timeout) = timeout else {
            return Ok(analyzer.analyze(log));
        };

        let (tx, rx) = mpsc::channel();
        std::thread::scope(|scope| {
            scope.spawn(|| {
                let _ = tx.send(analyzer.analyze(log));
            });
            match rx.recv_timeout(timeout) {
                Ok(result) => Ok(result),
                Err(_) => Err(AnalyzerError::TimedOut {
                    analyzer: analyzer.name().to_string(),
                }
                .to_string()),
            }
        })
    }

    /// Deduplicates `log_paths` by case-insensitive normalized path, then
    /// dispatches each unique path to a bounded worker pool running on a
    /// detached background thread. Returns a `BatchScan` wrapping the result
    /// channel as a lazy iterator (§4.8, §6: `process_batch(...) → stream`).
    pub fn process_batch(
        self: &Arc<Self>,
        log_paths: &[PathBuf],
        options: ScanOptions,
        cancel: Arc<AtomicBool>,
        on_progress: impl FnMut(BatchProgress) + Send + 'static,
    ) -> BatchScan {
        let unique_paths = Self::dedup_paths(log_paths);
        let total_files = unique_paths.len();
        let order = if options.preserve_order {
            Some(unique_paths.clone())
        } else {
            None
        };

        let worker_count = options.worker_count();
        let (tx, rx) = mpsc::channel::<ScanResult>();

        let pipeline = Arc::clone(self);
        std::thread::spawn(move || {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(worker_count)
                .build()
                .expect("failed to build scan worker pool");
            pool.scope(|pool_scope| {
                for path in unique_paths {
                    let tx = tx.clone();
                    let options = options.clone();
                    let cancel = Arc::clone(&cancel);
                    let pipeline = Arc::clone(&pipeline);
                    pool_scope.spawn(move |_| {
                        let result = pipeline.process_single(&path, &options, &cancel);
                        let _ = tx.send(result);
                    });
                }
            });
        });

        BatchScan {
            rx,
            on_progress: Box::new(on_progress),
            counters: BatchCounters::default(),
            total_files,
            started: Instant::now(),
            order,
            buffered: None,
        }
    }

    fn dedup_paths(log_paths: &[PathBuf]) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        for path in log_paths {
            let normalized = path.to_string_lossy().to_lowercase();
            if seen.insert(normalized) {
                unique.push(path.clone());
            }
        }
        unique
    }
}

/// Lazy stream of batch-scan results, yielded as they complete in the
/// background worker pool. Calling `next()` both retrieves the next result
/// and delivers the corresponding progress snapshot to the sink passed to
/// `process_batch`.
///
/// When `ScanOptions.preserve_order` was set, the first `next()` call drains
/// the whole stream and sorts it by input order before yielding - true
/// ordering requires seeing every result, so laziness degrades to a single
/// buffering step in that mode; the unordered default stays fully lazy.
pub struct BatchScan {
    rx: mpsc::Receiver<ScanResult>,
    on_progress: Box<dyn FnMut(BatchProgress) + Send>,
    counters: BatchCounters,
    total_files: usize,
    started: Instant,
    order: Option<Vec<PathBuf>>,
    buffered: Option<std::vec::IntoIter<ScanResult>>,
}

impl BatchScan {
    fn record(&mut self, result: &ScanResult) {
        self.counters.processed += 1;
        match result.status {
            ScanStatus::Completed => self.counters.successful += 1,
            ScanStatus::Cancelled => self.counters.incomplete += 1,
            _ => self.counters.failed += 1,
        }

        let elapsed = self.started.elapsed();
        let files_per_second = if elapsed.as_secs_f64() > 0.0 {
            self.counters.processed as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };
        let estimated_remaining = if files_per_second > 0.0 {
            let remaining_files = self.total_files.saturating_sub(self.counters.processed) as f64;
            Some(Duration::from_secs_f64(remaining_files / files_per_second))
        } else {
            None
        };

        (self.on_progress)(BatchProgress {
            total_files: self.total_files,
            processed_files: self.counters.processed,
            successful_scans: self.counters.successful,
            failed_scans: self.counters.failed,
            incomplete_scans: self.counters.incomplete,
            current_file: result.log_path.clone(),
            elapsed,
            estimated_remaining,
        });
    }
}

impl Iterator for BatchScan {
    type Item = ScanResult;

    fn next(&mut self) -> Option<ScanResult> {
        if let Some(order) = self.order.take() {
            let mut collected = Vec::with_capacity(self.total_files);
            while let Ok(result) = self.rx.recv() {
                self.record(&result);
                collected.push(result);
            }
            let index: HashMap<&PathBuf, usize> =
                order.iter().enumerate().map(|(i, p)| (p, i)).collect();
            collected.sort_by_key(|r| index.get(&r.log_path).copied().unwrap_or(usize::MAX));
            let mut iter = collected.into_iter();
            let first = iter.next();
            self.buffered = Some(iter);
            return first;
        }

        if let Some(buffered) = &mut self.buffered {
            return buffered.next();
        }

        match self.rx.recv() {
            Ok(result) => {
                self.record(&result);
                Some(result)
            }
            Err(_) => None,
        }
    }
}
