// CrashSleuth - core/stack.rs
//
// Call-stack structural analysis: module/pattern/cluster statistics,
// recursion detection, and depth metrics over a parsed call stack.

use crate::core::model::{
    CallStackAnalysis, DepthStatistics, PatternCluster, PatternStatistics, StackFrame,
};
use crate::util::constants;
use std::collections::HashMap;

pub struct CallStackAnalyzer;

impl CallStackAnalyzer {
    /// Computes the full structural report for a parsed call stack.
    pub fn analyze(frames: &[StackFrame], known_problem_modules: &[&str]) -> CallStackAnalysis {
        let module_counts = Self::module_counts(frames);
        let pattern_clusters = Self::pattern_clusters(frames);
        let recursion_detected = Self::recursion_detected(frames);
        let problem_indicators =
            Self::problem_indicators(frames, &module_counts, known_problem_modules);
        let depth_statistics = Self::depth_statistics(frames, &module_counts);

        CallStackAnalysis {
            module_counts,
            pattern_clusters,
            pattern_matches: HashMap::new(),
            recursion_detected,
            problem_indicators,
            depth_statistics,
        }
    }

    pub fn module_counts(frames: &[StackFrame]) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for frame in frames {
            *counts.entry(frame.module.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Maximal contiguous runs of frames sharing the same module, size >= `MIN_CLUSTER_SIZE`.
    pub fn pattern_clusters(frames: &[StackFrame]) -> Vec<PatternCluster> {
        let mut clusters = Vec::new();
        let mut i = 0;
        while i < frames.len() {
            let mut j = i + 1;
            while j < frames.len() && frames[j].module == frames[i].module {
                j += 1;
            }
            let len = j - i;
            if len >= constants::MIN_CLUSTER_SIZE {
                clusters.push(PatternCluster {
                    module: frames[i].module.clone(),
                    start_index: i,
                    len,
                });
            }
            i = j;
        }
        clusters
    }

    /// For every pattern in `patterns`, records every frame index at which
    /// `function` (falling back to `module`) contains the pattern substring.
    pub fn pattern_matches(
        frames: &[StackFrame],
        patterns: &[&str],
    ) -> HashMap<String, Vec<usize>> {
        let mut matches: HashMap<String, Vec<usize>> = HashMap::new();
        for pattern in patterns {
            let hits: Vec<usize> = frames
                .iter()
                .enumerate()
                .filter(|(_, f)| Self::frame_text(f).contains(pattern))
                .map(|(idx, _)| idx)
                .collect();
            matches.insert((*pattern).to_string(), hits);
        }
        matches
    }

    fn frame_text(frame: &StackFrame) -> String {
        format!("{} {}", frame.module, frame.function.as_deref().unwrap_or(""))
    }

    /// Direct recursion: same function in >= 3 adjacent frames. Indirect
    /// recursion: a repeating adjacent `(f_i, f_{i+1})` pair seen >= 2 times.
    pub fn recursion_detected(frames: &[StackFrame]) -> bool {
        Self::direct_recursion(frames) || Self::indirect_recursion(frames)
    }

    fn direct_recursion(frames: &[StackFrame]) -> bool {
        let funcs: Vec<&str> = frames
            .iter()
            .map(|f| f.function.as_deref().unwrap_or(f.module.as_str()))
            .collect();
        funcs
            .windows(constants::DIRECT_RECURSION_MIN_FRAMES)
            .any(|w| w.iter().all(|f| *f == w[0]))
    }

    fn indirect_recursion(frames: &[StackFrame]) -> bool {
        if frames.len() < 2 {
            return false;
        }
        let funcs: Vec<&str> = frames
            .iter()
            .map(|f| f.function.as_deref().unwrap_or(f.module.as_str()))
            .collect();
        let mut pair_counts: HashMap<(&str, &str), usize> = HashMap::new();
        for w in funcs.windows(2) {
            if w[0] == w[1] {
                continue;
            }
            *pair_counts.entry((w[0], w[1])).or_insert(0) += 1;
        }
        pair_counts
            .values()
            .any(|&count| count >= constants::INDIRECT_RECURSION_MIN_REPEATS)
    }

    fn problem_indicators(
        frames: &[StackFrame],
        module_counts: &HashMap<String, usize>,
        known_problem_modules: &[&str],
    ) -> Vec<String> {
        let mut indicators = Vec::new();
        let total = frames.len();

        for module in known_problem_modules {
            if let Some(&count) = module_counts.get(*module) {
                if count >= constants::PROBLEM_MODULE_MIN_FRAMES {
                    indicators.push(format!(
                        "known-problematic module '{module}' occupies {count} frames"
                    ));
                }
            }
        }

        if total > 0 {
            if let Some((dominant, &count)) = module_counts.iter().max_by_key(|(_, &c)| c) {
                if (count as f64 / total as f64) > constants::DOMINANT_MODULE_FRACTION {
                    indicators.push(format!("dominated by '{dominant}'"));
                }
            }
        }

        if total > constants::DEEP_STACK_THRESHOLD {
            indicators.push("deep call stack".to_string());
        }

        indicators
    }

    fn depth_statistics(
        frames: &[StackFrame],
        module_counts: &HashMap<String, usize>,
    ) -> DepthStatistics {
        let max_depth = frames.len();
        let critical_depth = (max_depth as f64 * constants::CRITICAL_DEPTH_FRACTION) as usize;
        let average_module_depth = if module_counts.is_empty() {
            0.0
        } else {
            max_depth as f64 / module_counts.len() as f64
        };
        DepthStatistics {
            max_depth,
            critical_depth,
            average_module_depth,
        }
    }

    /// Positional statistics for a single pattern's occurrences across the stack.
    pub fn analyze_pattern_statistics(frames: &[StackFrame], pattern: &str) -> PatternStatistics {
        let depths: Vec<usize> = frames
            .iter()
            .enumerate()
            .filter(|(_, f)| Self::frame_text(f).contains(pattern))
            .map(|(idx, _)| idx)
            .collect();

        if depths.is_empty() {
            return PatternStatistics {
                total_occurrences: 0,
                first_depth: None,
                last_depth: None,
                average_depth: 0.0,
                clustering_coefficient: 0.0,
            };
        }

        let total_occurrences = depths.len();
        let first_depth = depths.first().copied();
        let last_depth = depths.last().copied();
        let average_depth = depths.iter().sum::<usize>() as f64 / total_occurrences as f64;

        let clustering_coefficient = if total_occurrences < 2 || frames.len() < 2 {
            0.0
        } else {
            let gaps: Vec<f64> = depths.windows(2).map(|w| (w[1] - w[0]) as f64).collect();
            let mean_gap = gaps.iter().sum::<f64>() / gaps.len() as f64;
            let normalizer =
                (frames.len() - 1) as f64 / (total_occurrences - 1) as f64;
            let normalized_mean_gap = if normalizer == 0.0 {
                0.0
            } else {
                (mean_gap / normalizer).clamp(0.0, 1.0)
            };
            1.0 - normalized_mean_gap
        };

        PatternStatistics {
            total_occurrences,
            first_depth,
            last_depth,
            average_depth,
            clustering_coefficient,
        }
    }

    /// True iff each pattern in `patterns` appears (as a substring of frame
    /// text) at a strictly increasing frame index.
    pub fn find_ordered_sequence(frames: &[StackFrame], patterns: &[&str]) -> bool {
        let mut cursor = 0usize;
        for pattern in patterns {
            match frames[cursor..]
                .iter()
                .position(|f| Self::frame_text(f).contains(pattern))
            {
                Some(rel_idx) => cursor += rel_idx + 1,
                None => return false,
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(index: usize, module: &str, function: Option<&str>) -> StackFrame {
        StackFrame {
            index,
            address: "0x0".to_string(),
            module: module.to_string(),
            function: function.map(str::to_string),
        }
    }

    #[test]
    fn detects_direct_recursion() {
        let frames = vec![
            frame(0, "Mod.dll", Some("Foo")),
            frame(1, "Mod.dll", Some("Foo")),
            frame(2, "Mod.dll", Some("Foo")),
        ];
        assert!(CallStackAnalyzer::recursion_detected(&frames));
    }

    #[test]
    fn detects_indirect_recursion() {
        let frames = vec![
            frame(0, "A.dll", Some("Foo")),
            frame(1, "B.dll", Some("Bar")),
            frame(2, "A.dll", Some("Foo")),
            frame(3, "B.dll", Some("Bar")),
        ];
        assert!(CallStackAnalyzer::recursion_detected(&frames));
    }

    #[test]
    fn no_recursion_in_distinct_frames() {
        let frames = vec![
            frame(0, "A.dll", Some("Foo")),
            frame(1, "B.dll", Some("Bar")),
            frame(2, "C.dll", Some("Baz")),
        ];
        assert!(!CallStackAnalyzer::recursion_detected(&frames));
    }

    #[test]
    fn pattern_clusters_finds_contiguous_runs() {
        let frames = vec![
            frame(0, "A.dll", None),
            frame(1, "A.dll", None),
            frame(2, "B.dll", None),
        ];
        let clusters = CallStackAnalyzer::pattern_clusters(&frames);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].module, "A.dll");
        assert_eq!(clusters[0].len, 2);
    }

    #[test]
    fn deep_stack_indicator_fires_above_threshold() {
        let frames: Vec<StackFrame> = (0..=constants::DEEP_STACK_THRESHOLD + 1)
            .map(|i| frame(i, "Spread.dll", None))
            .collect();
        // force non-dominant by varying module name per frame wouldn't matter
        // here; just assert deep-stack indicator.
        let analysis = CallStackAnalyzer::analyze(&frames, &[]);
        assert!(analysis
            .problem_indicators
            .iter()
            .any(|i| i == "deep call stack"));
    }

    #[test]
    fn find_ordered_sequence_requires_increasing_indices() {
        let frames = vec![
            frame(0, "A.dll", Some("Init")),
            frame(1, "B.dll", Some("Run")),
            frame(2, "C.dll", Some("Crash")),
        ];
        assert!(CallStackAnalyzer::find_ordered_sequence(
            &frames,
            &["Init", "Run", "Crash"]
        ));
        assert!(!CallStackAnalyzer::find_ordered_sequence(
            &frames,
            &["Crash", "Init"]
        ));
    }

    #[test]
    fn single_occurrence_has_zero_clustering_coefficient() {
        let frames = vec![frame(0, "A.dll", Some("Foo")), frame(1, "B.dll", Some("Bar"))];
        let stats = CallStackAnalyzer::analyze_pattern_statistics(&frames, "Foo");
        assert_eq!(stats.total_occurrences, 1);
        assert_eq!(stats.clustering_coefficient, 0.0);
    }
}
