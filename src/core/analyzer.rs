// CrashSleuth - core/analyzer.rs
//
// Analyzer capability set and the concrete plug-ins. Each analyzer
// declares a stable name, a scheduling priority, and whether it may run
// in the parallel batch; plug-ins must not mutate the `CrashLog`.

use crate::core::model::{
    AnalysisResult, AnalysisValue, CrashLog, FcxScanResult, FileCheck, GameStatus,
};
use crate::core::severity::SeverityCalculator;
use crate::core::signal::SignalMatcher;
use crate::util::constants;
use std::collections::HashMap;

/// Capability set every concrete analyzer implements.
pub trait Analyzer: Send + Sync {
    fn name(&self) -> &str;
    fn priority(&self) -> i32;
    fn can_run_in_parallel(&self) -> bool;
    fn analyze(&self, log: &CrashLog) -> AnalysisResult;
}

fn call_stack_text(log: &CrashLog) -> String {
    log.call_stack
        .iter()
        .map(|f| format!("{} {}", f.module, f.function.as_deref().unwrap_or("")))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// FormIdAnalyzer
// ---------------------------------------------------------------------------

/// Scans the main error and call-stack text for `FormID:` style hex tokens
/// and cross-references the `plugins` section for the owning load-order byte.
/// Sequential: cheap, and its findings inform later analyzers' context.
pub struct FormIdAnalyzer;

impl Analyzer for FormIdAnalyzer {
    fn name(&self) -> &str {
        "FormId"
    }
    fn priority(&self) -> i32 {
        10
    }
    fn can_run_in_parallel(&self) -> bool {
        false
    }

    fn analyze(&self, log: &CrashLog) -> AnalysisResult {
        let mut result = AnalysisResult::empty(self.name());
        let haystack = format!("{}\n{}", log.main_error, call_stack_text(log));
        let mut form_ids = Vec::new();

        for token in haystack.split_whitespace() {
            if let Some(hex) = token.strip_prefix("FormID:") {
                let hex = hex.trim_matches(|c: char| !c.is_ascii_hexdigit());
                if hex.len() >= 2 {
                    form_ids.push(hex.to_string());
                }
            }
        }

        if form_ids.is_empty() {
            return result;
        }

        let plugins = log.section("plugins").unwrap_or(&[]);
        result.has_findings = true;
        result
            .report_lines
            .push(format!("Found {} FormID reference(s) in crash text", form_ids.len()));

        for form_id in &form_ids {
            if form_id.len() < 2 {
                continue;
            }
            let load_order_byte = &form_id[..2];
            if let Ok(index) = u8::from_str_radix(load_order_byte, 16) {
                if let Some(plugin) = plugins.get(index as usize) {
                    result
                        .report_lines
                        .push(format!("  FormID {form_id} -> load order byte {load_order_byte} -> {plugin}"));
                }
            }
        }

        result
            .data
            .insert("form_id_count".to_string(), AnalysisValue::Int(form_ids.len() as i64));
        result
    }
}

// ---------------------------------------------------------------------------
// PluginAnalyzer
// ---------------------------------------------------------------------------

/// Parses the `plugins` section into an ordered list. When `game_root_path`
/// is unavailable the cross-check degrades to a no-findings pass rather than
/// failing, since plugin-presence validation is filesystem-bound.
pub struct PluginAnalyzer;

impl Analyzer for PluginAnalyzer {
    fn name(&self) -> &str {
        "Plugin"
    }
    fn priority(&self) -> i32 {
        20
    }
    fn can_run_in_parallel(&self) -> bool {
        true
    }

    fn analyze(&self, log: &CrashLog) -> AnalysisResult {
        let mut result = AnalysisResult::empty(self.name());
        let Some(plugins) = log.section("plugins") else {
            return result;
        };
        if plugins.is_empty() {
            return result;
        }

        result.has_findings = true;
        result
            .report_lines
            .push(format!("{} plugin(s) loaded", plugins.len()));
        result.data.insert(
            "plugin_count".to_string(),
            AnalysisValue::Int(plugins.len() as i64),
        );
        result.data.insert(
            "plugins".to_string(),
            AnalysisValue::List(plugins.to_vec()),
        );

        if log.game_root_path.is_none() {
            result
                .report_lines
                .push("game root path unavailable; skipping on-disk presence check".to_string());
        }

        result
    }
}

// ---------------------------------------------------------------------------
// SuspectAnalyzer
// ---------------------------------------------------------------------------

/// A named known-crash signature defined by a list of signals, per the
/// glossary's "Suspect" definition.
#[derive(Debug, Clone)]
pub struct Suspect {
    pub name: String,
    pub signals: Vec<String>,
    pub base_severity: u32,
}

/// Wraps `SignalMatcher` over a table of named suspects.
pub struct SuspectAnalyzer {
    pub suspects: Vec<Suspect>,
}

impl Analyzer for SuspectAnalyzer {
    fn name(&self) -> &str {
        "Suspect"
    }
    fn priority(&self) -> i32 {
        30
    }
    fn can_run_in_parallel(&self) -> bool {
        true
    }

    fn analyze(&self, log: &CrashLog) -> AnalysisResult {
        let mut result = AnalysisResult::empty(self.name());
        let stack_text = call_stack_text(log);

        for suspect in &self.suspects {
            let match_result = SignalMatcher::evaluate(&suspect.signals, &log.main_error, &stack_text);
            if !match_result.is_match {
                continue;
            }

            result.has_findings = true;
            let assessment = SeverityCalculator::calculate(
                suspect.base_severity,
                &match_result,
                Default::default(),
            );
            result.report_lines.push(format!(
                "{} (severity: {}, confidence: {:.2})",
                suspect.name, assessment.level, match_result.confidence
            ));
            result.data.insert(
                format!("{}.confidence", suspect.name),
                AnalysisValue::Float(match_result.confidence),
            );
            result.data.insert(
                format!("{}.severity", suspect.name),
                AnalysisValue::Text(assessment.level.to_string()),
            );
        }

        result
    }
}

// ---------------------------------------------------------------------------
// SettingsAnalyzer
// ---------------------------------------------------------------------------

/// Known settings misconfigurations: key substrings mapped to the value that
/// indicates a problem and the message to report.
const KNOWN_BAD_SETTINGS: &[(&str, &str, &str)] = &[
    (
        "bEnableFileSelection",
        "0",
        "achievements-incompatible mods detected with file selection disabled",
    ),
    (
        "bInvalidateOlderFiles",
        "0",
        "archive invalidation is disabled",
    ),
];

/// Inspects the `settings` section for known misconfiguration key/value pairs.
pub struct SettingsAnalyzer;

impl Analyzer for SettingsAnalyzer {
    fn name(&self) -> &str {
        "Settings"
    }
    fn priority(&self) -> i32 {
        40
    }
    fn can_run_in_parallel(&self) -> bool {
        true
    }

    fn analyze(&self, log: &CrashLog) -> AnalysisResult {
        let mut result = AnalysisResult::empty(self.name());
        let Some(settings) = log.section("settings") else {
            return result;
        };

        for line in settings {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            for (bad_key, bad_value, message) in KNOWN_BAD_SETTINGS {
                if key.eq_ignore_ascii_case(bad_key) && value == *bad_value {
                    result.has_findings = true;
                    result.report_lines.push(message.to_string());
                }
            }
        }

        result
    }
}

// ---------------------------------------------------------------------------
// RecordAnalyzer
// ---------------------------------------------------------------------------

/// Known record-editor tool names that, embedded in a crash stack, indicate a
/// modified record produced the crash.
const KNOWN_RECORD_EDITORS: &[&str] = &["xEdit", "FO4Edit", "SSEEdit", "CreationKit"];

/// Scans main error / call stack text for known modified-record signatures.
pub struct RecordAnalyzer;

impl Analyzer for RecordAnalyzer {
    fn name(&self) -> &str {
        "Record"
    }
    fn priority(&self) -> i32 {
        50
    }
    fn can_run_in_parallel(&self) -> bool {
        true
    }

    fn analyze(&self, log: &CrashLog) -> AnalysisResult {
        let mut result = AnalysisResult::empty(self.name());
        let haystack = format!("{}\n{}", log.main_error, call_stack_text(log));

        for editor in KNOWN_RECORD_EDITORS {
            if haystack.contains(editor) {
                result.has_findings = true;
                result
                    .report_lines
                    .push(format!("modified-record signature from '{editor}' found in crash text"));
            }
        }

        result
    }
}

// ---------------------------------------------------------------------------
// FileIntegrityAnalyzer (FCX)
// ---------------------------------------------------------------------------

/// BA2/DDS archive-format probes, invoked explicitly by `FcxDecorator`.
/// Sequential by construction: it does its own I/O against `game_root_path`.
pub struct FileIntegrityAnalyzer;

impl FileIntegrityAnalyzer {
    /// Probes a BA2 archive's header. Returns `Some(finding)` describing a
    /// mismatch, `None` if the archive looks well-formed.
    pub fn probe_ba2(bytes: &[u8]) -> Option<String> {
        if bytes.len() < 12 {
            return Some("file too small to contain a BA2 header".to_string());
        }
        if &bytes[0..4] != constants::BA2_MAGIC.as_slice() {
            return Some("incorrect format (magic mismatch)".to_string());
        }
        let tag = &bytes[8..12];
        if !constants::BA2_FORMAT_TAGS.iter().any(|t| t.as_slice() == tag) {
            return Some("incorrect format (unrecognized format tag)".to_string());
        }
        None
    }

    /// Probes a DDS texture header for non-power-friendly dimensions.
    pub fn probe_dds(bytes: &[u8]) -> Option<String> {
        if bytes.len() < 20 || &bytes[0..4] != constants::DDS_MAGIC.as_slice() {
            return Some("not a valid DDS file".to_string());
        }
        let height = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
        let width = u32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
        if width % 2 != 0 || height % 2 != 0 {
            Some(format!("dimensions {width}x{height} not divisible by 2"))
        } else {
            None
        }
    }

    /// Runs the FCX pre-pass against `game_root_path`, probing BA2/DDS files
    /// directly under it. Produces a `FcxScanResult` whose `game_status`
    /// reflects the worst finding encountered.
    pub fn analyze(log: &CrashLog) -> FcxScanResult {
        let mut result = AnalysisResult::empty("FileIntegrity");
        let mut file_checks = Vec::new();
        let hash_validations = Vec::new();
        let mut game_status = GameStatus::Good;

        let Some(root) = &log.game_root_path else {
            result
                .report_lines
                .push("no game root path supplied; FCX check skipped".to_string());
            return FcxScanResult {
                result,
                game_status,
                file_checks,
                hash_validations,
            };
        };

        let Ok(entries) = std::fs::read_dir(root) else {
            result.success = false;
            result
                .errors
                .push(format!("could not read game root '{}'", root.display()));
            return FcxScanResult {
                result,
                game_status: GameStatus::Warning,
                file_checks,
                hash_validations,
            };
        };

        let mut modified_files_count = 0i64;
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };

            let finding = match ext.to_lowercase().as_str() {
                "ba2" => Self::probe_ba2(&bytes),
                "dds" => Self::probe_dds(&bytes),
                _ => None,
            };

            if let Some(description) = finding {
                modified_files_count += 1;
                file_checks.push(FileCheck {
                    path: path.clone(),
                    description: description.clone(),
                });
                result.has_findings = true;
                result
                    .report_lines
                    .push(format!("{}: {description}", path.display()));
                game_status = GameStatus::Critical;
            }
        }

        if modified_files_count > 0 && game_status != GameStatus::Critical {
            game_status = GameStatus::Warning;
        }

        result.data.insert(
            "modified_files_count".to_string(),
            AnalysisValue::Int(modified_files_count),
        );
        result.data.insert(
            "is_downgrade".to_string(),
            AnalysisValue::Bool(false),
        );

        FcxScanResult {
            result,
            game_status,
            file_checks,
            hash_validations,
        }
    }
}

// ---------------------------------------------------------------------------
// BuffoutVersionAnalyzer
// ---------------------------------------------------------------------------

/// Known-bad Buffout4/Address-Library version combinations. Mapping is
/// crash-generator name -> set of versions flagged incompatible.
fn known_bad_versions() -> HashMap<&'static str, &'static [&'static str]> {
    let mut map = HashMap::new();
    map.insert("Buffout 4", &["1.0.0", "1.1.0"] as &[&str]);
    map
}

/// Reads `crashgen_name`/`buffout_version` and flags known-bad combinations.
/// Sequential: cheap, and informs later severity factors like
/// `IsKnownCriticalPattern`.
pub struct BuffoutVersionAnalyzer;

impl Analyzer for BuffoutVersionAnalyzer {
    fn name(&self) -> &str {
        "BuffoutVersion"
    }
    fn priority(&self) -> i32 {
        5
    }
    fn can_run_in_parallel(&self) -> bool {
        false
    }

    fn analyze(&self, log: &CrashLog) -> AnalysisResult {
        let mut result = AnalysisResult::empty(self.name());
        let (Some(name), Some(version)) = (&log.crashgen_name, &log.buffout_version) else {
            return result;
        };

        let bad = known_bad_versions();
        if let Some(bad_versions) = bad.get(name.as_str()) {
            if bad_versions.contains(&version.as_str()) {
                result.has_findings = true;
                result
                    .report_lines
                    .push(format!("{name} {version} is a known-incompatible version"));
                result
                    .data
                    .insert("is_known_bad_version".to_string(), AnalysisValue::Bool(true));
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::SystemTime;

    fn sample_log() -> CrashLog {
        let mut log = CrashLog::new(PathBuf::from("test.log"), SystemTime::now(), Vec::new());
        log.main_error = "EXCEPTION_ACCESS_VIOLATION".to_string();
        log
    }

    #[test]
    fn suspect_analyzer_reports_findings_for_matching_signal() {
        let mut log = sample_log();
        log.main_error = "ACCESS_VIOLATION".to_string();
        let analyzer = SuspectAnalyzer {
            suspects: vec![Suspect {
                name: "NullDerefCrash".to_string(),
                signals: vec!["ME-REQ|ACCESS_VIOLATION".to_string()],
                base_severity: 4,
            }],
        };
        let result = analyzer.analyze(&log);
        assert!(result.has_findings);
        assert!(result.report_lines[0].contains("NullDerefCrash"));
    }

    #[test]
    fn plugin_analyzer_no_findings_without_section() {
        let log = sample_log();
        let result = PluginAnalyzer.analyze(&log);
        assert!(!result.has_findings);
    }

    #[test]
    fn ba2_probe_flags_magic_mismatch() {
        let bytes = vec![0u8; 16];
        assert!(FileIntegrityAnalyzer::probe_ba2(&bytes).is_some());
    }

    #[test]
    fn ba2_probe_accepts_well_formed_header() {
        let mut bytes = vec![0u8; 16];
        bytes[0..4].copy_from_slice(b"BTDX");
        bytes[8..12].copy_from_slice(b"GNRL");
        assert!(FileIntegrityAnalyzer::probe_ba2(&bytes).is_none());
    }

    #[test]
    fn dds_probe_flags_odd_dimensions() {
        let mut bytes = vec![0u8; 20];
        bytes[0..4].copy_from_slice(b"DDS ");
        bytes[12..16].copy_from_slice(&101u32.to_le_bytes());
        bytes[16..20].copy_from_slice(&64u32.to_le_bytes());
        assert!(FileIntegrityAnalyzer::probe_dds(&bytes).is_some());
    }
}
