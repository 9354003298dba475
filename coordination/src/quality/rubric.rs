//! 100-point response quality rubric.
//!
//! ```text
//! Component              Max  Signals
//! ---------------------  ---  -----------------------------------------------
//! task_completion         40  fully resolved 25 (else partially 12), validated 8, requirements 7
//! tool_calling            20  used correctly 12 (else used with errors 6), no hallucinated tools 8
//! problem_decomposition   20  planning 8, systematic 7, edge cases 5
//! response_quality        15  clear 5, actionable 5, appropriate detail 5
//! persistence              5  continued until resolved 3, proactive 2
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

pub const TASK_COMPLETION_MAX: u8 = 40;
pub const TOOL_CALLING_MAX: u8 = 20;
pub const PROBLEM_DECOMPOSITION_MAX: u8 = 20;
pub const RESPONSE_QUALITY_MAX: u8 = 15;
pub const PERSISTENCE_MAX: u8 = 5;

/// Observed properties of one agent response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseSignals {
    pub fully_resolved: bool,
    pub partially_resolved: bool,
    pub validated: bool,
    pub requirements_met: bool,
    pub tools_used_correctly: bool,
    pub tools_used_with_errors: bool,
    pub no_hallucinated_tools: bool,
    pub planned: bool,
    pub systematic: bool,
    pub edge_cases: bool,
    pub clear: bool,
    pub actionable: bool,
    pub appropriate_detail: bool,
    pub persisted_until_resolved: bool,
    pub proactive: bool,
}

impl ResponseSignals {
    /// Every signal set.
    pub fn perfect() -> Self {
        Self {
            fully_resolved: true,
            partially_resolved: false,
            validated: true,
            requirements_met: true,
            tools_used_correctly: true,
            tools_used_with_errors: false,
            no_hallucinated_tools: true,
            planned: true,
            systematic: true,
            edge_cases: true,
            clear: true,
            actionable: true,
            appropriate_detail: true,
            persisted_until_resolved: true,
            proactive: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_total(total: u8) -> Self {
        match total {
            90..=u8::MAX => Self::A,
            80..=89 => Self::B,
            70..=79 => Self::C,
            60..=69 => Self::D,
            _ => Self::F,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
            Self::C => write!(f, "C"),
            Self::D => write!(f, "D"),
            Self::F => write!(f, "F"),
        }
    }
}

/// Rubric score. `total` is always the sum of the components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityScore {
    pub task_completion: u8,
    pub tool_calling: u8,
    pub problem_decomposition: u8,
    pub response_quality: u8,
    pub persistence: u8,
    pub total: u8,
    pub grade: Grade,
}

impl QualityScore {
    /// Build from component points, capping each at its maximum.
    pub fn from_components(
        task_completion: u8,
        tool_calling: u8,
        problem_decomposition: u8,
        response_quality: u8,
        persistence: u8,
    ) -> Self {
        let task_completion = task_completion.min(TASK_COMPLETION_MAX);
        let tool_calling = tool_calling.min(TOOL_CALLING_MAX);
        let problem_decomposition = problem_decomposition.min(PROBLEM_DECOMPOSITION_MAX);
        let response_quality = response_quality.min(RESPONSE_QUALITY_MAX);
        let persistence = persistence.min(PERSISTENCE_MAX);
        let total =
            task_completion + tool_calling + problem_decomposition + response_quality + persistence;
        Self {
            task_completion,
            tool_calling,
            problem_decomposition,
            response_quality,
            persistence,
            total,
            grade: Grade::from_total(total),
        }
    }

    /// Score a response from its signals.
    pub fn from_signals(s: &ResponseSignals) -> Self {
        let pts = |flag: bool, points: u8| if flag { points } else { 0 };

        let resolution = if s.fully_resolved {
            25
        } else {
            pts(s.partially_resolved, 12)
        };
        let tool_use = if s.tools_used_correctly {
            12
        } else {
            pts(s.tools_used_with_errors, 6)
        };

        Self::from_components(
            resolution + pts(s.validated, 8) + pts(s.requirements_met, 7),
            tool_use + pts(s.no_hallucinated_tools, 8),
            pts(s.planned, 8) + pts(s.systematic, 7) + pts(s.edge_cases, 5),
            pts(s.clear, 5) + pts(s.actionable, 5) + pts(s.appropriate_detail, 5),
            pts(s.persisted_until_resolved, 3) + pts(s.proactive, 2),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_response_scores_100() {
        let score = QualityScore::from_signals(&ResponseSignals::perfect());
        assert_eq!(score.total, 100);
        assert_eq!(score.task_completion, 40);
        assert_eq!(score.tool_calling, 20);
        assert_eq!(score.grade, Grade::A);
    }

    #[test]
    fn test_empty_signals_score_zero() {
        let score = QualityScore::from_signals(&ResponseSignals::default());
        assert_eq!(score.total, 0);
        assert_eq!(score.grade, Grade::F);
    }

    #[test]
    fn test_partial_credit() {
        let score = QualityScore::from_signals(&ResponseSignals {
            partially_resolved: true,
            tools_used_with_errors: true,
            no_hallucinated_tools: true,
            clear: true,
            ..ResponseSignals::default()
        });
        assert_eq!(score.task_completion, 12);
        assert_eq!(score.tool_calling, 14);
        assert_eq!(score.response_quality, 5);
        assert_eq!(score.total, 31);
    }

    #[test]
    fn test_full_resolution_outranks_partial() {
        let score = QualityScore::from_signals(&ResponseSignals {
            fully_resolved: true,
            partially_resolved: true,
            ..ResponseSignals::default()
        });
        assert_eq!(score.task_completion, 25);
    }

    #[test]
    fn test_components_capped() {
        let score = QualityScore::from_components(99, 99, 99, 99, 99);
        assert_eq!(score.total, 100);
    }

    #[test]
    fn test_grade_boundaries() {
        assert_eq!(Grade::from_total(100), Grade::A);
        assert_eq!(Grade::from_total(90), Grade::A);
        assert_eq!(Grade::from_total(89), Grade::B);
        assert_eq!(Grade::from_total(80), Grade::B);
        assert_eq!(Grade::from_total(79), Grade::C);
        assert_eq!(Grade::from_total(70), Grade::C);
        assert_eq!(Grade::from_total(69), Grade::D);
        assert_eq!(Grade::from_total(60), Grade::D);
        assert_eq!(Grade::from_total(59), Grade::F);
        assert_eq!(Grade::from_total(0), Grade::F);
    }

    #[test]
    fn test_total_is_sum_over_signal_grid() {
        for mask in 0u32..(1 << 15) {
            let bit = |i: u32| mask & (1 << i) != 0;
            let s = ResponseSignals {
                fully_resolved: bit(0),
                partially_resolved: bit(1),
                validated: bit(2),
                requirements_met: bit(3),
                tools_used_correctly: bit(4),
                tools_used_with_errors: bit(5),
                no_hallucinated_tools: bit(6),
                planned: bit(7),
                systematic: bit(8),
                edge_cases: bit(9),
                clear: bit(10),
                actionable: bit(11),
                appropriate_detail: bit(12),
                persisted_until_resolved: bit(13),
                proactive: bit(14),
            };
            let q = QualityScore::from_signals(&s);
            let sum = q.task_completion
                + q.tool_calling
                + q.problem_decomposition
                + q.response_quality
                + q.persistence;
            assert_eq!(q.total, sum);
            assert!(q.total <= 100);
            assert_eq!(q.grade, Grade::from_total(q.total));
        }
    }
}
