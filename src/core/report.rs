// CrashSleuth - core/report.rs
//
// Assembles analyzer report fragments into a single text block, filters
// out OPC (third-party patcher) subsections, and writes the result
// atomically (write temp -> rename), mirroring the session-save idiom.

use crate::core::model::AnalysisResult;
use crate::util::error::ReportError;
use std::path::Path;

const OPC_MARKERS: &[&str] = &[
    "CHECKING FOR MODS THAT ARE PATCHED THROUGH OPC INSTALLER",
    "MODS PATCHED THROUGH OPC INSTALLER",
];

pub struct ReportComposer;

impl ReportComposer {
    /// Assembles report fragments from `results` in priority order (the
    /// caller is expected to have already sorted `results` by analyzer
    /// priority), inserting a section header between each analyzer's
    /// fragment, then applies the OPC post-filter.
    pub fn compose(results: &[AnalysisResult]) -> String {
        let mut sections = Vec::new();
        for result in results {
            if result.report_lines.is_empty() {
                continue;
            }
            let mut section = format!("==== {} ====\n", result.analyzer_name);
            section.push_str(&result.report_lines.join("\n"));
            sections.push(section);
        }
        let raw = sections.join("\n\n");
        Self::filter_opc(&raw)
    }

    /// Drops any OPC subsection: when a line matching one of `OPC_MARKERS` is
    /// found, the preceding `====`-rule line is dropped and lines are skipped
    /// until the next `====`-rule belonging to a different section.
    /// Idempotent: filtering an already-filtered report is a no-op.
    pub fn filter_opc(text: &str) -> String {
        let lines: Vec<&str> = text.lines().collect();
        let mut output: Vec<&str> = Vec::new();
        let mut skipping = false;
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];
            if !skipping && OPC_MARKERS.iter().any(|m| line.contains(m)) {
                if matches!(output.last(), Some(prev) if is_rule_line(prev)) {
                    output.pop();
                }
                skipping = true;
                i += 1;
                continue;
            }
            if skipping {
                if is_rule_line(line) {
                    skipping = false;
                }
                i += 1;
                continue;
            }
            output.push(line);
            i += 1;
        }

        output.join("\n")
    }

    /// Writes `text` to `path` atomically (write temp -> rename).
    pub fn write_atomic(text: &str, path: &Path) -> Result<(), ReportError> {
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, text.as_bytes()).map_err(|source| ReportError::Io {
            path: tmp.clone(),
            operation: "write temp report",
            source,
        })?;
        std::fs::rename(&tmp, path).map_err(|source| {
            let _ = std::fs::remove_file(&tmp);
            ReportError::Io {
                path: path.to_path_buf(),
                operation: "rename temp report into place",
                source,
            }
        })?;
        tracing::debug!(path = %path.display(), "report written");
        Ok(())
    }
}

fn is_rule_line(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c == '=')
}
