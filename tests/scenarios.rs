// Full-pipeline scenario tests: parse -> analyze -> report, spanning the
// public API a caller actually drives (`ScanPipeline`, `FcxDecorator`),
// as opposed to the per-module unit tests colocated with each source file.

use crashsleuth::app::pipeline::{ScanOptions, ScanPipeline};
use crashsleuth::core::analyzer::{Analyzer, FormIdAnalyzer, PluginAnalyzer, Suspect, SuspectAnalyzer};
use crashsleuth::core::model::{AnalysisResult, CrashLog, ScanStatus};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

fn write_log(dir: &std::path::Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("write sample log");
    path
}

fn sample_body(extra_plugin_lines: &str) -> String {
    [
        "Fallout 4 v1.10.984",
        "Buffout 4 v1.26.2",
        "",
        "Unhandled Exception",
        "EXCEPTION_ACCESS_VIOLATION at 0x7FF6ABCDEF12",
        "",
        "PROBABLE CALL STACK:",
        "====================",
        "[0] 0x7FF6ABCDEF12 Fallout4.exe+0x1234 -> SomeFunction",
        "[1] 0x7FF6ABCDEF00 MyMod.dll",
        "[2] 0x7FF6ABCDEF01 MyMod.dll",
        "====================",
        "",
        "PLUGINS ====================",
        "Fallout4.esm",
        "DLCRobot.esm",
        extra_plugin_lines,
        "====================",
    ]
    .join("\n")
}

fn dll_crash_suspect() -> Suspect {
    Suspect {
        name: "BadMemoryPatch".to_string(),
        signals: vec![
            "ME-REQ|EXCEPTION_ACCESS_VIOLATION".to_string(),
            "MyMod.dll".to_string(),
        ],
        base_severity: 4,
    }
}

fn default_pipeline() -> Arc<ScanPipeline> {
    Arc::new(ScanPipeline::new(vec![
        Box::new(PluginAnalyzer) as Box<dyn Analyzer>,
        Box::new(SuspectAnalyzer {
            suspects: vec![dll_crash_suspect()],
        }),
    ]))
}

/// An analyzer that sleeps past any per-log timeout, for S7.
struct SlowAnalyzer {
    delay: Duration,
}

impl Analyzer for SlowAnalyzer {
    fn name(&self) -> &str {
        "Slow"
    }

    fn priority(&self) -> i32 {
        100
    }

    fn can_run_in_parallel(&self) -> bool {
        false
    }

    fn analyze(&self, _log: &CrashLog) -> AnalysisResult {
        std::thread::sleep(self.delay);
        AnalysisResult::empty("Slow")
    }
}

// S1: happy path - a well-formed log parses, every analyzer runs, and the
// composed report carries each analyzer's section header in priority order.
#[test]
fn s1_happy_path_produces_completed_scan_with_composed_report() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_log(dir.path(), "crash-1.log", &sample_body(""));
    let pipeline = default_pipeline();
    let cancel = Arc::new(AtomicBool::new(false));

    let result = pipeline.process_single(&path, &ScanOptions::default(), &cancel);

    assert_eq!(result.status, ScanStatus::Completed);
    assert_eq!(result.analysis_results.len(), 2);
    assert!(result.analysis_results.iter().any(|r| r.analyzer_name == "Plugin" && r.has_findings));
    assert!(result
        .analysis_results
        .iter()
        .any(|r| r.analyzer_name == "Suspect" && r.has_findings));
    assert!(result.report_text.contains("==== Plugin ===="));
    assert!(result.report_text.contains("==== Suspect ===="));
}

// S2: a suspect whose required signal is absent from the main error never
// matches, regardless of how strongly its other (stack) signals match -
// the NOT/REQ short-circuit in the signal grammar.
#[test]
fn s2_missing_required_signal_short_circuits_suspect_match() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_log(dir.path(), "crash-2.log", &sample_body(""));

    let unmatched_suspect = Suspect {
        name: "WrongException".to_string(),
        signals: vec![
            "ME-REQ|STACK_OVERFLOW".to_string(),
            "MyMod.dll".to_string(),
        ],
        base_severity: 5,
    };
    let pipeline = ScanPipeline::new(vec![Box::new(SuspectAnalyzer {
        suspects: vec![unmatched_suspect],
    })]);
    let cancel = Arc::new(AtomicBool::new(false));

    let result = pipeline.process_single(&path, &ScanOptions::default(), &cancel);

    let suspect_result = result
        .analysis_results
        .iter()
        .find(|r| r.analyzer_name == "Suspect")
        .expect("suspect analyzer ran");
    assert!(!suspect_result.has_findings);
}

// S3: a suspect whose stack signal's occurrence threshold is met gets a
// strictly higher confidence than an otherwise-identical suspect whose
// threshold the same call stack falls short of - the stack contribution
// term scales with `stack_matches / stack_total`, it does not gate
// `is_match` on its own (only a `ME-REQ` signal can do that).
#[test]
fn s3_stack_occurrence_threshold_drives_suspect_confidence() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_log(dir.path(), "crash-3.log", &sample_body(""));

    let threshold_met = Suspect {
        name: "RepeatedModuleCrash".to_string(),
        signals: vec!["2|MyMod.dll".to_string()],
        base_severity: 3,
    };
    let threshold_unmet = Suspect {
        name: "RareModuleCrash".to_string(),
        signals: vec!["5|MyMod.dll".to_string()],
        base_severity: 3,
    };
    let pipeline = ScanPipeline::new(vec![Box::new(SuspectAnalyzer {
        suspects: vec![threshold_met, threshold_unmet],
    })]);
    let cancel = Arc::new(AtomicBool::new(false));

    let result = pipeline.process_single(&path, &ScanOptions::default(), &cancel);
    let suspect_result = result
        .analysis_results
        .iter()
        .find(|r| r.analyzer_name == "Suspect")
        .expect("suspect analyzer ran");

    let met_confidence = match suspect_result.data.get("RepeatedModuleCrash.confidence") {
        Some(crashsleuth::core::model::AnalysisValue::Float(v)) => *v,
        other => panic!("expected a confidence float, got {other:?}"),
    };
    let unmet_confidence = match suspect_result.data.get("RareModuleCrash.confidence") {
        Some(crashsleuth::core::model::AnalysisValue::Float(v)) => *v,
        other => panic!("expected a confidence float, got {other:?}"),
    };
    assert!(met_confidence > unmet_confidence);
}

// S4: the second scan of an unchanged file reuses cached analyzer output
// instead of re-running, visible via the cache's hit/miss statistics.
#[test]
fn s4_second_scan_of_unchanged_file_hits_cache() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_log(dir.path(), "crash-4.log", &sample_body(""));
    let pipeline = default_pipeline();
    let cancel = Arc::new(AtomicBool::new(false));
    let options = ScanOptions::default();

    let first = pipeline.process_single(&path, &options, &cancel);
    assert_eq!(first.status, ScanStatus::Completed);

    let stats_after_first = pipeline.cache().statistics();
    assert!(stats_after_first.misses >= 2);

    let second = pipeline.process_single(&path, &options, &cancel);
    assert_eq!(second.status, ScanStatus::Completed);

    let stats_after_second = pipeline.cache().statistics();
    assert!(stats_after_second.hits >= stats_after_first.hits + 2);
}

// S5: a batch scan deduplicates case-differing paths to the same file and
// reports accurate per-status totals via the progress callback's last call.
#[test]
fn s5_batch_dedups_paths_and_reports_accurate_totals() {
    let dir = tempfile::tempdir().unwrap();
    let path_a = write_log(dir.path(), "crash-5a.log", &sample_body(""));
    let path_b = write_log(dir.path(), "crash-5b.log", &sample_body(""));
    let path_a_upper = PathBuf::from(path_a.to_string_lossy().to_uppercase());

    let pipeline = default_pipeline();
    let cancel = Arc::new(AtomicBool::new(false));
    let last_progress = Arc::new(std::sync::Mutex::new(None));
    let last_progress_sink = Arc::clone(&last_progress);

    let results: Vec<_> = pipeline
        .process_batch(
            &[path_a.clone(), path_a_upper, path_b.clone()],
            ScanOptions::default(),
            cancel,
            move |progress| *last_progress_sink.lock().unwrap() = Some(progress),
        )
        .collect();

    assert_eq!(results.len(), 2);
    let progress = last_progress
        .lock()
        .unwrap()
        .clone()
        .expect("progress callback invoked at least once");
    assert_eq!(progress.total_files, 2);
    assert_eq!(progress.processed_files, 2);
    assert_eq!(progress.successful_scans, 2);
}

// S6: a cancellation flag set before a batch starts yields a cancelled
// result for every file, with zero analyzer attempts made.
#[test]
fn s6_cancellation_before_start_yields_all_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_log(dir.path(), "crash-6.log", &sample_body(""));
    let pipeline = default_pipeline();
    let cancel = Arc::new(AtomicBool::new(true));

    let results: Vec<_> = pipeline
        .process_batch(&[path], ScanOptions::default(), cancel, |_progress| {})
        .collect();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, ScanStatus::Cancelled);
    assert!(results[0].analysis_results.is_empty());
}

// S7: a per-log timeout marks the offending analyzer's result failed with a
// "timed out" error, while leaving the rest of the report intact.
#[test]
fn s7_per_log_timeout_marks_slow_analyzer_failed() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_log(dir.path(), "crash-8.log", &sample_body(""));
    let pipeline = ScanPipeline::new(vec![
        Box::new(PluginAnalyzer) as Box<dyn Analyzer>,
        Box::new(SlowAnalyzer {
            delay: Duration::from_millis(200),
        }),
    ]);
    let cancel = Arc::new(AtomicBool::new(false));
    let options = ScanOptions {
        timeout: Some(Duration::from_millis(10)),
        ..ScanOptions::default()
    };

    let result = pipeline.process_single(&path, &options, &cancel);

    let slow_result = result
        .analysis_results
        .iter()
        .find(|r| r.analyzer_name == "Slow")
        .expect("slow analyzer ran");
    assert!(!slow_result.success);
    assert!(slow_result.errors.iter().any(|e| e.contains("timed out")));
    assert_eq!(result.status, ScanStatus::CompletedWithErrors);
    assert!(result
        .analysis_results
        .iter()
        .any(|r| r.analyzer_name == "Plugin" && r.success));
}

// S8: `max_degree_of_parallelism` overrides `max_concurrency` for sizing the
// batch worker pool, without affecting single-file correctness.
#[test]
fn s8_max_degree_of_parallelism_overrides_max_concurrency() {
    let dir = tempfile::tempdir().unwrap();
    let path_a = write_log(dir.path(), "crash-9a.log", &sample_body(""));
    let path_b = write_log(dir.path(), "crash-9b.log", &sample_body(""));
    let pipeline = default_pipeline();
    let cancel = Arc::new(AtomicBool::new(false));
    let options = ScanOptions {
        max_concurrency: 8,
        max_degree_of_parallelism: Some(1),
        ..ScanOptions::default()
    };

    let results: Vec<_> = pipeline
        .process_batch(&[path_a, path_b], options, cancel, |_| {})
        .collect();

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.status == ScanStatus::Completed));
}

// A pipeline built from a single sequential analyzer (no parallel stage)
// still completes cleanly - the parallel/sequential split degrades to a
// no-op when one side is empty.
#[test]
fn pipeline_with_only_sequential_analyzers_completes() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_log(dir.path(), "crash-7.log", &sample_body(""));
    let pipeline = ScanPipeline::new(vec![Box::new(FormIdAnalyzer) as Box<dyn Analyzer>]);
    let cancel = Arc::new(AtomicBool::new(false));

    let result = pipeline.process_single(&path, &ScanOptions::default(), &cancel);
    assert_eq!(result.status, ScanStatus::Completed);
    assert_eq!(result.analysis_results.len(), 1);
}
