// CrashSleuth - core/parser.rs
//
// Crash-log parsing. Core layer: accepts raw text, never touches the
// filesystem directly — the app layer reads the file and its mtime.

use crate::core::model::{CrashLog, StackFrame};
use crate::util::error::ParseError;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;

/// Configuration for parsing operations.
#[derive(Debug, Clone)]
pub struct ParseConfig {
    pub max_parse_warnings: usize,
    pub max_stack_frames: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        use crate::util::constants;
        Self {
            max_parse_warnings: constants::MAX_PARSE_WARNINGS,
            max_stack_frames: constants::MAX_STACK_FRAMES,
        }
    }
}

/// Non-fatal parse warnings recorded while walking recognized sections.
#[derive(Debug, Clone)]
pub struct ParseWarning {
    pub line_number: usize,
    pub message: String,
}

fn stack_frame_canonical_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\[(\d+)\]\s+(0x[0-9A-Fa-f]+)\s+([^\s]+\.(?:exe|dll))(?:\+0x[0-9A-Fa-f]+)?(?:\s+->\s+(.+))?$",
        )
        .expect("stack frame canonical regex is valid")
    })
}

fn stack_frame_fallback_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^Frame\s+(\d+):\s+(0x[0-9A-Fa-f]+)\s+in\s+(.+)$")
            .expect("stack frame fallback regex is valid")
    })
}

fn section_rule_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^=+$").expect("section rule regex is valid"))
}

fn section_title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Z0-9 _\-/]+ *=+$").expect("section title regex is valid")
    })
}

fn game_version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)game\s*version\s*:\s*(.+)").expect("game version regex is valid")
    })
}

fn crashgen_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(Buffout\s*4|Crash\s*Logger\s*SSE)\s*v?([0-9.]+)")
            .expect("crashgen regex is valid")
    })
}

const KNOWN_SECTION_HEADERS: &[&str] = &["PLUGINS", "MODULES", "SETTINGS", "XSE PLUGINS"];

/// Normalizes a section header title line into its canonical key, e.g.
/// `"PLUGINS ===="` -> `"plugins"`, `"XSE PLUGINS ===="` -> `"xse-plugins"`.
fn normalize_section_key(title: &str) -> String {
    let stripped = title.trim_end_matches(['=', ' ']).trim();
    stripped.to_lowercase().replace(' ', "-")
}

/// Parses crash-log text into a `CrashLog`.
///
/// `content` must already be UTF-8 (BOM stripping and lossy-decoding fallback
/// are the caller's responsibility — see `CrashLogParser::parse_file`).
pub struct CrashLogParser {
    config: ParseConfig,
}

impl CrashLogParser {
    pub fn new(config: ParseConfig) -> Self {
        Self { config }
    }

    /// Reads and parses the crash log at `path`. BOM is stripped if present;
    /// invalid UTF-8 falls back to lossy conversion.
    pub fn parse_file(&self, path: &Path) -> Result<(CrashLog, Vec<ParseWarning>), ParseError> {
        let bytes = std::fs::read(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mtime = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::now());

        let content = match String::from_utf8(bytes.clone()) {
            Ok(s) => s,
            Err(_) => String::from_utf8_lossy(&bytes).into_owned(),
        };
        let content = content.strip_prefix('\u{FEFF}').unwrap_or(&content);

        self.parse_str(content, path.to_path_buf(), mtime)
    }

    pub fn parse_str(
        &self,
        content: &str,
        file_path: PathBuf,
        mtime: SystemTime,
    ) -> Result<(CrashLog, Vec<ParseWarning>), ParseError> {
        if content.trim().is_empty() {
            return Err(ParseError::EmptyFile { path: file_path });
        }

        let lines: Vec<String> = content.lines().map(str::to_string).collect();
        let mut warnings = Vec::new();

        tracing::debug!(file = %file_path.display(), lines = lines.len(), "parsing crash log");

        let main_error = Self::extract_main_error(&lines)
            .ok_or_else(|| ParseError::MissingMainError {
                path: file_path.clone(),
            })?;

        let mut log = CrashLog::new(file_path.clone(), mtime, lines.clone());
        log.main_error = main_error;
        log.game_version = Self::extract_game_version(&lines);
        log.game_root_path = Self::extract_game_root_path(&lines);
        let (crashgen_name, buffout_version) = Self::extract_crashgen(&lines);
        log.crashgen_name = crashgen_name;
        log.buffout_version = buffout_version;

        log.call_stack = self.extract_call_stack(&lines, &mut warnings);
        log.sections = self.extract_named_sections(&lines, &mut warnings);

        Ok((log, warnings))
    }

    fn extract_main_error(lines: &[String]) -> Option<String> {
        let start = lines
            .iter()
            .position(|l| l.contains("Unhandled Exception") || l.to_uppercase().contains("EXCEPTION"))?;

        let mut block = Vec::new();
        for line in &lines[start..] {
            if section_rule_re().is_match(line.trim()) || section_title_re().is_match(line.trim()) {
                break;
            }
            if line.trim().is_empty() && !block.is_empty() {
                break;
            }
            block.push(line.clone());
        }
        let text = block.join("\n").trim().to_string();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    fn extract_game_version(lines: &[String]) -> Option<String> {
        lines.iter().find_map(|l| {
            game_version_re()
                .captures(l)
                .map(|c| c[1].trim().to_string())
        })
    }

    fn extract_game_root_path(lines: &[String]) -> Option<PathBuf> {
        lines.iter().find_map(|l| {
            let trimmed = l.trim();
            let lower = trimmed.to_lowercase();
            if lower.contains("game root") || lower.contains("game path") {
                trimmed.split(':').nth(1).map(|p| PathBuf::from(p.trim()))
            } else {
                None
            }
        })
    }

    fn extract_crashgen(lines: &[String]) -> (Option<String>, Option<String>) {
        for line in lines.iter().take(20) {
            if let Some(caps) = crashgen_re().captures(line.trim()) {
                return (Some(caps[1].to_string()), Some(caps[2].to_string()));
            }
        }
        (None, None)
    }

    fn extract_call_stack(&self, lines: &[String], warnings: &mut Vec<ParseWarning>) -> Vec<StackFrame> {
        let Some(start) = lines.iter().position(|l| {
            let up = l.to_uppercase();
            up.contains("CALL STACK") || up.contains("PROBABLE CALL STACK")
        }) else {
            return Vec::new();
        };

        let mut frames = Vec::new();
        let mut seen_rule_line = false;
        for (offset, line) in lines[start + 1..].iter().enumerate() {
            if frames.len() >= self.config.max_stack_frames {
                break;
            }
            let trimmed = line.trim();
            if section_rule_re().is_match(trimmed) {
                // The header is conventionally followed by one `====` rule
                // line that opens the section; only a second one closes it.
                if seen_rule_line {
                    break;
                }
                seen_rule_line = true;
                continue;
            }
            if section_title_re().is_match(trimmed) {
                break;
            }
            if trimmed.is_empty() {
                continue;
            }

            if let Some(caps) = stack_frame_canonical_re().captures(trimmed) {
                let index = caps[1].parse().unwrap_or(frames.len());
                frames.push(StackFrame {
                    index,
                    address: caps[2].to_string(),
                    module: caps[3].to_string(),
                    function: caps.get(4).map(|m| m.as_str().to_string()),
                });
            } else if let Some(caps) = stack_frame_fallback_re().captures(trimmed) {
                let index = caps[1].parse().unwrap_or(frames.len());
                frames.push(StackFrame {
                    index,
                    address: caps[2].to_string(),
                    module: caps[3].to_string(),
                    function: None,
                });
            } else if warnings.len() < self.config.max_parse_warnings {
                warnings.push(ParseWarning {
                    line_number: start + offset + 2,
                    message: format!("unrecognized call-stack line: {trimmed}"),
                });
            }
        }
        frames
    }

    fn extract_named_sections(
        &self,
        lines: &[String],
        warnings: &mut Vec<ParseWarning>,
    ) -> std::collections::HashMap<String, Vec<String>> {
        let mut sections = std::collections::HashMap::new();
        let mut current_key: Option<String> = None;
        let mut current_lines: Vec<String> = Vec::new();

        for line in lines {
            let trimmed = line.trim();
            if section_title_re().is_match(trimmed) {
                if let Some(key) = current_key.take() {
                    sections.insert(key, std::mem::take(&mut current_lines));
                }
                let key = normalize_section_key(trimmed);
                if KNOWN_SECTION_HEADERS
                    .iter()
                    .any(|h| h.to_lowercase().replace(' ', "-") == key)
                {
                    current_key = Some(key);
                }
                continue;
            }
            if section_rule_re().is_match(trimmed) {
                if let Some(key) = current_key.take() {
                    sections.insert(key, std::mem::take(&mut current_lines));
                }
                continue;
            }
            if let Some(_key) = &current_key {
                if trimmed.is_empty() {
                    continue;
                }
                if current_lines.len() >= self.config.max_parse_warnings {
                    warnings.push(ParseWarning {
                        line_number: 0,
                        message: "section line count truncated".to_string(),
                    });
                    continue;
                }
                current_lines.push(trimmed.to_string());
            }
        }
        if let Some(key) = current_key.take() {
            sections.insert(key, current_lines);
        }
        sections
    }
}

/// Maps a raw game-type string from the log to its canonical identifier.
/// `"fallout4vr"` is folded into `"fallout4"` — retained as-is from the
/// original implementation's `DetermineGameType`.
pub fn normalize_game_type(raw: &str) -> String {
    let lower = raw.to_lowercase();
    if lower == "fallout4vr" {
        "fallout4".to_string()
    } else {
        lower
    }
}
