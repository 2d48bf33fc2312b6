// CrashSleuth - app/fcx.rs
//
// FcxDecorator: wraps a `ScanPipeline`, layering the file-integrity (FCX)
// pre-pass onto scan results. Purely one-directional composition — the
// inner pipeline never references its decorators, so no cyclic dependency
// exists between the two.

use crate::app::pipeline::{BatchProgress, ScanOptions, ScanPipeline};
use crate::core::analyzer::FileIntegrityAnalyzer;
use crate::core::model::{CrashLog, GameStatus, ScanResult, ScanStatus};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Wraps a `ScanPipeline`. Transparent when `fcx_enabled` is false.
pub struct FcxDecorator {
    inner: Arc<ScanPipeline>,
    game_root_path: Option<PathBuf>,
    fcx_enabled: bool,
}

impl FcxDecorator {
    pub fn new(inner: Arc<ScanPipeline>, game_root_path: Option<PathBuf>, fcx_enabled: bool) -> Self {
        Self {
            inner,
            game_root_path,
            fcx_enabled,
        }
    }

    /// Runs the FCX pre-pass once, then delegates to the inner pipeline,
    /// merging the FCX result as the first entry of `analysis_results`. A
    /// `Critical` game status prepends a warning to `error_messages`.
    pub fn process_single(
        &self,
        log_path: &Path,
        options: &ScanOptions,
        cancel: &Arc<AtomicBool>,
    ) -> ScanResult {
        if !self.fcx_enabled {
            return self.inner.process_single(log_path, options, cancel);
        }

        let fcx = self.run_fcx();
        let mut result = self.inner.process_single(log_path, options, cancel);

        if fcx.result.has_findings || fcx.game_status != GameStatus::Good {
            result.analysis_results.insert(0, fcx.result);
        }
        if fcx.game_status == GameStatus::Critical {
            result
                .error_messages
                .insert(0, "FCX: game file integrity is Critical".to_string());
            result.status = ScanStatus::CompletedWithErrors;
        }

        result
    }

    /// Runs the FCX pre-pass once for the whole batch. A `Critical` result
    /// is yielded first as a synthetic `ScanResult{log_path="FCX_CHECK"}`;
    /// every inner result is then merged with the FCX result lazily, as the
    /// inner `BatchScan` yields them.
    pub fn process_batch(
        &self,
        log_paths: &[PathBuf],
        options: ScanOptions,
        cancel: Arc<AtomicBool>,
        on_progress: impl FnMut(BatchProgress) + Send + 'static,
    ) -> Box<dyn Iterator<Item = ScanResult> + '_> {
        if !self.fcx_enabled {
            return Box::new(self.inner.process_batch(log_paths, options, cancel, on_progress));
        }

        let fcx = self.run_fcx();
        let synthetic = if fcx.game_status == GameStatus::Critical {
            let mut synthetic = ScanResult::pending(PathBuf::from("FCX_CHECK"));
            synthetic.status = ScanStatus::CompletedWithErrors;
            synthetic
                .error_messages
                .push("FCX: game file integrity is Critical".to_string());
            Some(synthetic)
        } else {
            None
        };

        let fcx_has_findings = fcx.result.has_findings;
        let fcx_result = fcx.result;
        let merged = self
            .inner
            .process_batch(log_paths, options, cancel, on_progress)
            .map(move |mut result| {
                if fcx_has_findings {
                    result.analysis_results.insert(0, fcx_result.clone());
                }
                result
            });

        Box::new(synthetic.into_iter().chain(merged))
    }

    fn run_fcx(&self) -> crate::core::model::FcxScanResult {
        let Some(root) = &self.game_root_path else {
            return crate::core::model::FcxScanResult {
                result: crate::core::model::AnalysisResult::empty("FileIntegrity"),
                game_status: GameStatus::Good,
                file_checks: Vec::new(),
                hash_validations: Vec::new(),
            };
        };
        let synthetic_log = CrashLog::synthetic_for_game_path(root.clone());
        FileIntegrityAnalyzer::analyze(&synthetic_log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::analyzer::PluginAnalyzer;

    #[test]
    fn transparent_when_fcx_disabled() {
        let pipeline = Arc::new(ScanPipeline::new(vec![Box::new(PluginAnalyzer)]));
        let decorator = FcxDecorator::new(pipeline, None, false);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.log");
        let cancel = Arc::new(AtomicBool::new(false));
        let result = decorator.process_single(&path, &ScanOptions::default(), &cancel);
        assert!(result
            .analysis_results
            .iter()
            .all(|r| r.analyzer_name != "FileIntegrity"));
    }

    #[test]
    fn no_game_root_produces_good_status() {
        let pipeline = Arc::new(ScanPipeline::new(vec![Box::new(PluginAnalyzer)]));
        let decorator = FcxDecorator::new(pipeline, None, true);
        let fcx = decorator.run_fcx();
        assert_eq!(fcx.game_status, GameStatus::Good);
    }

    #[test]
    fn batch_merges_fcx_result_into_each_scan() {
        let pipeline = Arc::new(ScanPipeline::new(vec![Box::new(PluginAnalyzer)]));
        let decorator = FcxDecorator::new(pipeline, None, true);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.log");
        let cancel = Arc::new(AtomicBool::new(false));

        let results: Vec<ScanResult> = decorator
            .process_batch(&[path], ScanOptions::default(), cancel, |_| {})
            .collect();
        assert_eq!(results.len(), 1);
    }
}
