//! Per-query adaptive limits derived from estimated complexity

use serde::{Deserialize, Serialize};

/// Where the complexity estimate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexitySource {
    Oracle,
    Heuristic,
}

/// Limits fixed after round 1 for the rest of one retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptiveParameters {
    pub max_iterations: usize,
    pub confidence_threshold: u8,
    pub line_budget: usize,
}

/// Simple queries stop early
const LOW_COMPLEXITY: u8 = 30;
const MEDIUM_COMPLEXITY: u8 = 60;
const HIGH_COMPLEXITY: u8 = 80;
const LOW_COMPLEXITY_MAX_ITERATIONS: usize = 2;

impl AdaptiveParameters {
    /// Derive limits from a complexity score (0-100)
    ///
    /// # Arguments
    /// * `complexity` - Estimated query complexity
    /// * `base_iterations` - Configured maximum rounds
    /// * `base_threshold` - Configured confidence threshold
    /// * `max_line_budget` - Configured maximum accumulated lines
    pub fn compute(
        complexity: u8,
        base_iterations: usize,
        base_threshold: u8,
        max_line_budget: usize,
    ) -> Self {
        let max_iterations = if complexity < LOW_COMPLEXITY {
            base_iterations.min(LOW_COMPLEXITY_MAX_ITERATIONS)
        } else {
            base_iterations
        };

        // Broad questions rarely reach the top of the scale; accept slightly
        // less certainty, but never drop below the floor
        let confidence_threshold = if complexity > HIGH_COMPLEXITY {
            lower_threshold(base_threshold, 5, 90)
        } else if complexity > MEDIUM_COMPLEXITY {
            lower_threshold(base_threshold, 3, 92)
        } else {
            base_threshold
        };

        let budget_percent = if complexity <= LOW_COMPLEXITY {
            60
        } else if complexity <= MEDIUM_COMPLEXITY {
            80
        } else {
            100
        };

        Self {
            max_iterations: max_iterations.max(1),
            confidence_threshold,
            line_budget: max_line_budget * budget_percent / 100,
        }
    }
}

fn lower_threshold(base: u8, by: u8, floor: u8) -> u8 {
    if base <= floor {
        base
    } else {
        base.saturating_sub(by).max(floor)
    }
}
