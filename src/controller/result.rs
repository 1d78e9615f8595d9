//! Terminal output of a retrieval

use super::adaptive::{AdaptiveParameters, ComplexitySource};
use crate::elements::CodeElement;
use serde::Serialize;
use std::fmt;

/// Why the retrieval loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    ConfidenceThresholdReached,
    BudgetExhausted,
    NoMoreActions,
    MaxRounds,
    Error,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::ConfidenceThresholdReached => "confidence_threshold_reached",
            StopReason::BudgetExhausted => "budget_exhausted",
            StopReason::NoMoreActions => "no_more_actions",
            StopReason::MaxRounds => "max_rounds",
            StopReason::Error => "error",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log entry for one completed round
#[derive(Debug, Clone, Serialize)]
pub struct IterationRecord {
    pub round: usize,
    pub confidence: u8,
    pub reasoning: String,
    /// Display labels of the tool actions issued this round
    pub tool_calls: Vec<String>,
    pub elements_after: usize,
    pub lines_after: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalMetadata {
    pub session_id: String,
    pub query_complexity: u8,
    pub complexity_source: ComplexitySource,
    /// Absent when retrieval failed before round 1 completed
    pub adaptive: Option<AdaptiveParameters>,
    pub total_lines: usize,
    pub tokens_used: u64,
    pub oracle_calls: usize,
    pub pruned_elements: usize,
    pub duration_ms: u64,
    /// Oracle failure message when `stop_reason` is `error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub iterations: Vec<IterationRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub elements: Vec<CodeElement>,
    /// Completed rounds
    pub rounds: usize,
    /// Confidence of the last completed round, 0 if none completed
    pub confidence: u8,
    pub stop_reason: StopReason,
    pub metadata: RetrievalMetadata,
}

impl RetrievalResult {
    pub fn total_lines(&self) -> usize {
        self.elements.iter().map(CodeElement::line_span).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_reason_serialization() {
        let json = serde_json::to_string(&StopReason::ConfidenceThresholdReached).unwrap();
        assert_eq!(json, "\"confidence_threshold_reached\"");
        assert_eq!(StopReason::NoMoreActions.to_string(), "no_more_actions");
        assert_eq!(
            serde_json::to_string(&StopReason::MaxRounds).unwrap(),
            format!("\"{}\"", StopReason::MaxRounds)
        );
    }
}
