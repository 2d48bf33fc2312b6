// CrashSleuth - core/severity.rs
//
// Combines a suspect's base severity, signal-match outcome, and escalation
// factors into a bounded [0,1] score and an `AnalysisSeverity` level.

use crate::core::model::{AnalysisSeverity, SeverityAssessment, SeverityFactors, SignalMatchResult};
use crate::util::constants;

pub struct SeverityCalculator;

impl SeverityCalculator {
    /// Maps a raw base-severity integer to its `AnalysisSeverity` level.
    pub fn base_level(base: u32) -> AnalysisSeverity {
        match base {
            0 => AnalysisSeverity::None,
            1 | 2 => AnalysisSeverity::Info,
            3 => AnalysisSeverity::Warning,
            4 => AnalysisSeverity::Error,
            _ => AnalysisSeverity::Critical,
        }
    }

    /// Computes a bounded severity score and level from a base severity,
    /// the suspect's signal-match outcome, and escalation factors.
    pub fn calculate(
        base: u32,
        match_result: &SignalMatchResult,
        factors: SeverityFactors,
    ) -> SeverityAssessment {
        let mut score = (base as f64 / constants::BASE_SEVERITY_DIVISOR).clamp(0.0, 1.0);

        if match_result.is_match {
            score += constants::MATCH_CONFIDENCE_WEIGHT * match_result.confidence;
        }

        if factors.is_dll_crash {
            score += constants::FACTOR_BOOST_MAX;
        }
        if factors.is_recurring {
            score += constants::FACTOR_BOOST_MAX;
        }
        if factors.has_multiple_indicators {
            score += constants::FACTOR_BOOST_MAX;
        }
        if factors.affects_game_stability {
            score += constants::FACTOR_BOOST_MAX;
        }
        if factors.is_known_critical_pattern {
            score += constants::FACTOR_BOOST_MAX;
        }

        let matched_signals = match_result.matched_signals.len() as u32;
        score += constants::MATCHED_SIGNAL_WEIGHT * matched_signals.min(constants::MATCHED_SIGNALS_CAP) as f64;

        if let Some(best) = match_result
            .matched_signals
            .iter()
            .map(|m| m.occurrences as u32)
            .max()
        {
            score += constants::OCCURRENCE_WEIGHT * best.min(constants::OCCURRENCES_CAP) as f64;
        }

        let score = score.clamp(0.0, 1.0);

        let mut level = Self::level_from_score(score);

        let escalation_reason = Self::escalation_reason(match_result, &factors);
        let was_escalated = escalation_reason.is_some();
        if was_escalated {
            level = Self::escalate(level);
        }

        SeverityAssessment {
            level,
            score,
            was_escalated,
            escalation_reason,
        }
    }

    fn level_from_score(score: f64) -> AnalysisSeverity {
        if score >= constants::THRESHOLD_CRITICAL {
            AnalysisSeverity::Critical
        } else if score >= constants::THRESHOLD_ERROR {
            AnalysisSeverity::Error
        } else if score >= constants::THRESHOLD_WARNING {
            AnalysisSeverity::Warning
        } else if score >= constants::THRESHOLD_INFO {
            AnalysisSeverity::Info
        } else {
            AnalysisSeverity::None
        }
    }

    fn escalate(level: AnalysisSeverity) -> AnalysisSeverity {
        match level {
            AnalysisSeverity::None => AnalysisSeverity::Info,
            AnalysisSeverity::Info => AnalysisSeverity::Warning,
            AnalysisSeverity::Warning => AnalysisSeverity::Error,
            AnalysisSeverity::Error | AnalysisSeverity::Critical => AnalysisSeverity::Critical,
        }
    }

    fn escalation_reason(
        match_result: &SignalMatchResult,
        factors: &SeverityFactors,
    ) -> Option<String> {
        if factors.is_known_critical_pattern {
            return Some("known critical pattern".to_string());
        }
        let all_required_matched = match_result.required_total > 0
            && match_result.required_matches == match_result.required_total;
        if all_required_matched && match_result.confidence >= constants::ESCALATION_CONFIDENCE {
            return Some("all required signals matched with high confidence".to_string());
        }
        if factors.is_recurring && factors.affects_game_stability {
            return Some("recurring and affects game stability".to_string());
        }
        None
    }

    /// Aggregates multiple severity assessments (e.g. one per suspect) into a
    /// single combined score/level.
    pub fn calculate_combined(assessments: &[SeverityAssessment]) -> SeverityAssessment {
        if assessments.is_empty() {
            return SeverityAssessment {
                level: AnalysisSeverity::None,
                score: 0.0,
                was_escalated: false,
                escalation_reason: None,
            };
        }

        let max_score = assessments
            .iter()
            .map(|a| a.score)
            .fold(0.0_f64, f64::max);

        let extra = assessments.len().saturating_sub(1).min(constants::COMBINED_BOOST_CAP);
        let score = (max_score + constants::COMBINED_BOOST_PER_EXTRA * extra as f64).clamp(0.0, 1.0);

        let critical_count = assessments
            .iter()
            .filter(|a| a.level == AnalysisSeverity::Critical)
            .count();
        let error_count = assessments
            .iter()
            .filter(|a| a.level == AnalysisSeverity::Error)
            .count();

        let mut level = Self::level_from_score(score);
        let mut was_escalated = false;
        let mut escalation_reason = None;

        if critical_count >= constants::COMBINED_CRITICAL_COUNT {
            level = AnalysisSeverity::Critical;
            was_escalated = true;
            escalation_reason = Some(format!("{critical_count} assessments already Critical"));
        } else if error_count >= constants::COMBINED_ERROR_COUNT {
            level = AnalysisSeverity::Error.max(level);
            was_escalated = true;
            escalation_reason = Some(format!("{error_count} assessments already Error"));
        }

        SeverityAssessment {
            level,
            score,
            was_escalated,
            escalation_reason,
        }
    }
}
