// CrashSleuth - core/signal.rs
//
// Signal-processing primitives backing the suspect-matching analyzer:
// parses the signal grammar, counts occurrences, and blends a confidence
// score across required/optional/stack signal classes.

use crate::core::model::{SignalKind, SignalLocation, SignalMatch, SignalMatchResult};
use crate::util::constants;

/// A single parsed signal, before evaluation.
#[derive(Debug, Clone)]
struct ParsedSignal {
    raw: String,
    pattern: String,
    kind: SignalKind,
    min_occurrences: usize,
    max_occurrences: Option<usize>,
}

/// Parses one signal string per the grammar:
///
/// | Form | Meaning |
/// |---|---|
/// | `ME-REQ\|<pattern>` | Required, matched in `main_error`. |
/// | `ME-OPT\|<pattern>` | Optional, matched in `main_error`. |
/// | `NOT\|<pattern>` | Negative, matched in `main_error` OR `call_stack`. |
/// | `<N>\|<pattern>` | Stack signal, minimum occurrence threshold N. |
/// | `<N>-<M>\|<pattern>` | Stack signal, occurrence count in `[N, M]`. |
/// | `<pattern>` | Stack signal, threshold >= 1. |
///
/// Returns `None` if the pattern portion is empty after stripping the prefix
/// — an empty pattern is ignored, not fatal (per spec §4.2).
fn parse_signal(raw: &str) -> Option<ParsedSignal> {
    if let Some(pattern) = raw.strip_prefix("ME-REQ|") {
        return non_empty(pattern).map(|pattern| ParsedSignal {
            raw: raw.to_string(),
            pattern,
            kind: SignalKind::Required,
            min_occurrences: 1,
            max_occurrences: None,
        });
    }
    if let Some(pattern) = raw.strip_prefix("ME-OPT|") {
        return non_empty(pattern).map(|pattern| ParsedSignal {
            raw: raw.to_string(),
            pattern,
            kind: SignalKind::Optional,
            min_occurrences: 1,
            max_occurrences: None,
        });
    }
    if let Some(pattern) = raw.strip_prefix("NOT|") {
        return non_empty(pattern).map(|pattern| ParsedSignal {
            raw: raw.to_string(),
            pattern,
            kind: SignalKind::Negative,
            min_occurrences: 1,
            max_occurrences: None,
        });
    }

    if let Some((prefix, pattern)) = raw.split_once('|') {
        if let Some((min, max)) = parse_occurrence_range(prefix) {
            return non_empty(pattern).map(|pattern| ParsedSignal {
                raw: raw.to_string(),
                pattern,
                kind: SignalKind::Stack,
                min_occurrences: min,
                max_occurrences: max,
            });
        }
    }

    non_empty(raw).map(|pattern| ParsedSignal {
        raw: raw.to_string(),
        pattern,
        kind: SignalKind::Stack,
        min_occurrences: 1,
        max_occurrences: None,
    })
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Parses an `N` or `N-M` occurrence-range prefix. Returns `None` if `prefix`
/// is not purely numeric (so it falls through to bare-pattern handling).
fn parse_occurrence_range(prefix: &str) -> Option<(usize, Option<usize>)> {
    if let Some((lo, hi)) = prefix.split_once('-') {
        let lo: usize = lo.parse().ok()?;
        let hi: usize = hi.parse().ok()?;
        Some((lo, Some(hi)))
    } else {
        let n: usize = prefix.parse().ok()?;
        Some((n, None))
    }
}

/// Counts non-overlapping, case-insensitive substring occurrences of
/// `pattern` within `haystack`.
fn count_occurrences(haystack: &str, pattern: &str) -> usize {
    if pattern.is_empty() {
        return 0;
    }
    let haystack_lower = haystack.to_lowercase();
    let pattern_lower = pattern.to_lowercase();
    let mut count = 0;
    let mut start = 0;
    while let Some(pos) = haystack_lower[start..].find(&pattern_lower) {
        count += 1;
        start += pos + pattern_lower.len();
    }
    count
}

/// Evaluates an ordered list of signal strings against `main_error` and
/// `call_stack` text, per spec §4.2.
pub struct SignalMatcher;

impl SignalMatcher {
    /// Evaluates `signals` against the given texts. `call_stack_text` is the
    /// flattened call-stack as searchable text (module/function names joined).
    pub fn evaluate(
        signals: &[String],
        main_error: &str,
        call_stack_text: &str,
    ) -> SignalMatchResult {
        let parsed: Vec<ParsedSignal> = signals.iter().filter_map(|s| parse_signal(s)).collect();

        let mut matched_signals = Vec::new();
        let mut required_total = 0;
        let mut required_matches = 0;
        let mut optional_total = 0;
        let mut optional_matches = 0;
        let mut stack_total = 0;
        let mut stack_matches = 0;

        for sig in &parsed {
            match sig.kind {
                SignalKind::Negative => {
                    let occ_main = count_occurrences(main_error, &sig.pattern);
                    let occ_stack = count_occurrences(call_stack_text, &sig.pattern);
                    if occ_main > 0 || occ_stack > 0 {
                        return SignalMatchResult {
                            is_match: false,
                            confidence: 0.0,
                            required_matches: 0,
                            required_total: 0,
                            optional_matches: 0,
                            optional_total: 0,
                            stack_matches: 0,
                            skip_reason: Some("Negative condition met".to_string()),
                            matched_signals: vec![SignalMatch {
                                signal: sig.raw.clone(),
                                pattern: sig.pattern.clone(),
                                kind: SignalKind::Negative,
                                location: if occ_main > 0 {
                                    SignalLocation::MainError
                                } else {
                                    SignalLocation::CallStack
                                },
                                occurrences: occ_main + occ_stack,
                                min_occurrences: 0,
                                max_occurrences: None,
                            }],
                        };
                    }
                }
                SignalKind::Required => {
                    required_total += 1;
                    let occ = count_occurrences(main_error, &sig.pattern);
                    if occ > 0 {
                        required_matches += 1;
                        matched_signals.push(SignalMatch {
                            signal: sig.raw.clone(),
                            pattern: sig.pattern.clone(),
                            kind: SignalKind::Required,
                            location: SignalLocation::MainError,
                            occurrences: occ,
                            min_occurrences: sig.min_occurrences,
                            max_occurrences: sig.max_occurrences,
                        });
                    }
                }
                SignalKind::Optional => {
                    optional_total += 1;
                    let occ = count_occurrences(main_error, &sig.pattern);
                    if occ > 0 {
                        optional_matches += 1;
                        matched_signals.push(SignalMatch {
                            signal: sig.raw.clone(),
                            pattern: sig.pattern.clone(),
                            kind: SignalKind::Optional,
                            location: SignalLocation::MainError,
                            occurrences: occ,
                            min_occurrences: sig.min_occurrences,
                            max_occurrences: sig.max_occurrences,
                        });
                    }
                }
                SignalKind::Stack => {
                    stack_total += 1;
                    let occ = count_occurrences(call_stack_text, &sig.pattern);
                    let satisfies_min = occ >= sig.min_occurrences;
                    let satisfies_max = sig.max_occurrences.map_or(true, |max| occ <= max);
                    if satisfies_min && satisfies_max {
                        stack_matches += 1;
                        matched_signals.push(SignalMatch {
                            signal: sig.raw.clone(),
                            pattern: sig.pattern.clone(),
                            kind: SignalKind::Stack,
                            location: SignalLocation::CallStack,
                            occurrences: occ,
                            min_occurrences: sig.min_occurrences,
                            max_occurrences: sig.max_occurrences,
                        });
                    }
                }
            }
        }

        if required_total > 0 && required_matches < required_total {
            return SignalMatchResult {
                is_match: false,
                confidence: 0.0,
                required_matches,
                required_total,
                optional_matches,
                optional_total,
                stack_matches,
                skip_reason: Some("Required signals not met".to_string()),
                matched_signals,
            };
        }

        let req_contribution = if required_total == 0 {
            0.0
        } else {
            constants::SIGNAL_WEIGHT_REQUIRED * (required_matches as f64 / required_total as f64)
        };
        let opt_contribution = if optional_total == 0 {
            0.0
        } else {
            constants::SIGNAL_WEIGHT_OPTIONAL * (optional_matches as f64 / optional_total as f64)
        };
        let stack_contribution = if stack_total == 0 {
            0.0
        } else {
            constants::SIGNAL_WEIGHT_STACK * (stack_matches as f64 / stack_total as f64)
        };

        let confidence = (req_contribution + opt_contribution + stack_contribution).clamp(0.0, 1.0);

        SignalMatchResult {
            is_match: true,
            confidence,
            required_matches,
            required_total,
            optional_matches,
            optional_total,
            stack_matches,
            skip_reason: None,
            matched_signals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_circuits_on_negative_signal() {
        let signals = vec![
            "ME-REQ|ACCESS_VIOLATION".to_string(),
            "NOT|HANDLED".to_string(),
        ];
        let result = SignalMatcher::evaluate(&signals, "ACCESS_VIOLATION - HANDLED", "");
        assert!(!result.is_match);
        assert_eq!(result.skip_reason.as_deref(), Some("Negative condition met"));
    }

    #[test]
    fn required_signal_must_match() {
        let signals = vec!["ME-REQ|ACCESS_VIOLATION".to_string()];
        let result = SignalMatcher::evaluate(&signals, "SOMETHING_ELSE", "");
        assert!(!result.is_match);
        assert_eq!(result.skip_reason.as_deref(), Some("Required signals not met"));
    }

    #[test]
    fn stack_threshold_counts_occurrences() {
        let signals = vec!["3|RecursiveCall".to_string()];
        let stack_text = "RecursiveCall RecursiveCall RecursiveCall";
        let result = SignalMatcher::evaluate(&signals, "", stack_text);
        assert!(result.is_match);
        assert_eq!(result.stack_matches, 1);
        let m = &result.matched_signals[0];
        assert_eq!(m.occurrences, 3);
        assert_eq!(m.min_occurrences, 3);
    }

    #[test]
    fn confidence_is_bounded() {
        let signals = vec![
            "ME-REQ|A".to_string(),
            "ME-OPT|B".to_string(),
            "C".to_string(),
        ];
        let result = SignalMatcher::evaluate(&signals, "A B", "C C C");
        assert!((0.0..=1.0).contains(&result.confidence));
    }

    #[test]
    fn bare_pattern_defaults_to_stack_threshold_one() {
        let signals = vec!["SomeModule".to_string()];
        let result = SignalMatcher::evaluate(&signals, "", "SomeModule");
        assert!(result.is_match);
        assert_eq!(result.stack_matches, 1);
    }

    #[test]
    fn empty_pattern_after_prefix_is_ignored() {
        let signals = vec!["ME-REQ|".to_string(), "ME-OPT|x".to_string()];
        let result = SignalMatcher::evaluate(&signals, "x", "");
        // the empty ME-REQ is dropped entirely, so required_total stays 0
        assert_eq!(result.required_total, 0);
        assert!(result.is_match);
    }
}
