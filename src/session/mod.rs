//! Retrieval session
//!
//! Explicit per-retrieval state: the evidence accumulator, tool-call history,
//! iteration log, and oracle accounting. One session per `retrieve` call, so
//! concurrent retrievals never share counters.
use crate::controller::{
    AdaptiveParameters, ComplexitySource, IterationRecord, RetrievalMetadata, RetrievalResult,
    StopReason,
};
use crate::elements::CodeElement;
use crate::error::{HoundError, Result};
use crate::oracle::TokenUsage;
use crate::retrieval::deduplicate_elements;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use uuid::Uuid;

/// One executed (or rejected) tool call
#[derive(Debug, Clone, Serialize)]
pub struct ToolLogEntry {
    pub round: usize,
    /// Action label, e.g. `search(main)`
    pub action: String,
    /// Short outcome summary shown to the oracle in later rounds
    pub outcome: String,
}

/// Serialized form written by [`RetrievalSession::save_trace`]
#[derive(Serialize)]
struct SessionTrace<'a> {
    id: String,
    query: &'a str,
    started_at: DateTime<Utc>,
    tool_history: &'a [ToolLogEntry],
    iterations: &'a [IterationRecord],
    tokens_used: u64,
    oracle_calls: usize,
    accumulated: Vec<&'a str>,
}

/// State of a single retrieval
#[derive(Debug, Clone)]
pub struct RetrievalSession {
    /// Unique session identifier
    pub id: Uuid,

    pub query: String,

    pub started_at: DateTime<Utc>,

    accumulator: Vec<CodeElement>,
    tool_history: Vec<ToolLogEntry>,
    iterations: Vec<IterationRecord>,
    tokens_used: u64,
    oracle_calls: usize,
    pruned_elements: usize,
    complexity: Option<(u8, ComplexitySource)>,
    adaptive: Option<AdaptiveParameters>,
}

impl RetrievalSession {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.into(),
            started_at: Utc::now(),
            accumulator: Vec::new(),
            tool_history: Vec::new(),
            iterations: Vec::new(),
            tokens_used: 0,
            oracle_calls: 0,
            pruned_elements: 0,
            complexity: None,
            adaptive: None,
        }
    }

    pub fn elements(&self) -> &[CodeElement] {
        &self.accumulator
    }

    pub fn tool_history(&self) -> &[ToolLogEntry] {
        &self.tool_history
    }

    pub fn iterations(&self) -> &[IterationRecord] {
        &self.iterations
    }

    pub fn tokens_used(&self) -> u64 {
        self.tokens_used
    }

    pub fn oracle_calls(&self) -> usize {
        self.oracle_calls
    }

    pub fn adaptive(&self) -> Option<AdaptiveParameters> {
        self.adaptive
    }

    /// Sum of line spans over the accumulator
    pub fn total_lines(&self) -> usize {
        self.accumulator.iter().map(CodeElement::line_span).sum()
    }

    /// Count one oracle call and its token usage
    pub fn record_oracle_call(&mut self, usage: TokenUsage) {
        self.oracle_calls += 1;
        self.tokens_used += usage.total();
    }

    /// Fix the complexity estimate and adaptive limits for this retrieval
    pub fn set_adaptive(
        &mut self,
        complexity: u8,
        source: ComplexitySource,
        params: AdaptiveParameters,
    ) {
        self.complexity = Some((complexity, source));
        self.adaptive = Some(params);
    }

    pub fn log_tool(&mut self, round: usize, action: impl Into<String>, outcome: impl Into<String>) {
        self.tool_history.push(ToolLogEntry {
            round,
            action: action.into(),
            outcome: outcome.into(),
        });
    }

    /// Append elements and deduplicate the accumulator
    ///
    /// # Returns
    /// Number of elements the accumulator grew by
    pub fn merge(&mut self, elements: Vec<CodeElement>) -> usize {
        let before = self.accumulator.len();
        self.accumulator.extend(elements);
        let merged = std::mem::take(&mut self.accumulator);
        self.accumulator = deduplicate_elements(merged);
        self.accumulator.len().saturating_sub(before)
    }

    /// Keep only elements matching one of `keep`
    ///
    /// A filter that would empty a non-empty accumulator is not applied.
    ///
    /// # Returns
    /// Whether the filter was applied
    pub fn retain_matching(&mut self, keep: &[String]) -> bool {
        let filtered: Vec<CodeElement> = self
            .accumulator
            .iter()
            .filter(|element| keep.iter().any(|id| matches_keep_identifier(element, id)))
            .cloned()
            .collect();

        if filtered.is_empty() && !self.accumulator.is_empty() {
            return false;
        }

        self.accumulator = filtered;
        true
    }

    /// Drop elements from the tail until the line total fits `line_budget`,
    /// never removing the last remaining element
    ///
    /// # Returns
    /// Number of elements removed
    pub fn prune_to_budget(&mut self, line_budget: usize) -> usize {
        let mut total = self.total_lines();
        let mut removed = 0;

        while total > line_budget && self.accumulator.len() > 1 {
            if let Some(element) = self.accumulator.pop() {
                total -= element.line_span();
                removed += 1;
            }
        }

        self.pruned_elements += removed;
        removed
    }

    pub fn record_iteration(&mut self, record: IterationRecord) {
        self.iterations.push(record);
    }

    /// Close the session and build the terminal result
    pub fn finish(self, stop_reason: StopReason, error: Option<String>) -> RetrievalResult {
        let duration_ms = (Utc::now() - self.started_at).num_milliseconds().max(0) as u64;
        let (query_complexity, complexity_source) = self
            .complexity
            .unwrap_or((0, ComplexitySource::Heuristic));
        let confidence = self.iterations.last().map(|r| r.confidence).unwrap_or(0);
        let total_lines = self.total_lines();

        RetrievalResult {
            rounds: self.iterations.len(),
            confidence,
            stop_reason,
            metadata: RetrievalMetadata {
                session_id: self.id.to_string(),
                query_complexity,
                complexity_source,
                adaptive: self.adaptive,
                total_lines,
                tokens_used: self.tokens_used,
                oracle_calls: self.oracle_calls,
                pruned_elements: self.pruned_elements,
                duration_ms,
                error,
                iterations: self.iterations,
            },
            elements: self.accumulator,
        }
    }

    /// Write the session trace as pretty JSON
    pub fn save_trace(&self, path: &Path) -> Result<()> {
        let trace = SessionTrace {
            id: self.id.to_string(),
            query: &self.query,
            started_at: self.started_at,
            tool_history: &self.tool_history,
            iterations: &self.iterations,
            tokens_used: self.tokens_used,
            oracle_calls: self.oracle_calls,
            accumulated: self.accumulator.iter().map(|e| e.id.as_str()).collect(),
        };

        let content = serde_json::to_string_pretty(&trace).map_err(|e| HoundError::Json {
            source: e,
            context: "Failed to serialize session trace".to_string(),
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| HoundError::Io {
                source: e,
                context: format!("Failed to create trace directory: {}", parent.display()),
            })?;
        }
        std::fs::write(path, content).map_err(|e| HoundError::Io {
            source: e,
            context: format!("Failed to write session trace: {}", path.display()),
        })?;

        Ok(())
    }
}

/// Whether a keep identifier names this element: its path (bare or
/// repo-prefixed, suffix-tolerant) or a `path:name` form
pub fn matches_keep_identifier(element: &CodeElement, identifier: &str) -> bool {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return false;
    }
    if element.matches_path(identifier) {
        return true;
    }

    let with_name = format!("{}:{}", element.path, element.name);
    let qualified_with_name = format!("{}:{}", element.qualified_path(), element.name);
    ends_at_boundary(&with_name, identifier) || ends_at_boundary(&qualified_with_name, identifier)
}

/// `full` equals `suffix`, or ends with it right after a `/` or `:`
fn ends_at_boundary(full: &str, suffix: &str) -> bool {
    if full == suffix {
        return true;
    }
    full.len() > suffix.len()
        && full.ends_with(suffix)
        && matches!(full.as_bytes()[full.len() - suffix.len() - 1], b'/' | b':')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::ElementKind;

    fn function(id: &str, path: &str, start: usize, end: usize) -> CodeElement {
        CodeElement::new(id, ElementKind::Function, id, path).with_lines(start, end)
    }

    #[test]
    fn test_merge_deduplicates() {
        let mut session = RetrievalSession::new("q");
        assert_eq!(session.merge(vec![function("a", "x.go", 1, 10)]), 1);
        assert_eq!(
            session.merge(vec![function("a", "x.go", 1, 10), function("b", "y.go", 1, 5)]),
            1
        );
        assert_eq!(session.elements().len(), 2);
        assert_eq!(session.total_lines(), 15);
    }

    #[test]
    fn test_keep_filter_and_safety() {
        let mut session = RetrievalSession::new("q");
        session.merge(vec![
            function("main", "cmd/main.go", 1, 3),
            function("helper", "pkg/util.go", 1, 3),
        ]);

        assert!(session.retain_matching(&["main.go".to_string()]));
        assert_eq!(session.elements().len(), 1);
        assert_eq!(session.elements()[0].id, "main");

        // Would empty the accumulator: ignored
        assert!(!session.retain_matching(&["missing.go".to_string()]));
        assert_eq!(session.elements().len(), 1);
    }

    #[test]
    fn test_keep_identifier_forms() {
        let element = function("run", "src/app.rs", 1, 3).with_repo("demo");
        assert!(matches_keep_identifier(&element, "src/app.rs"));
        assert!(matches_keep_identifier(&element, "demo/src/app.rs"));
        assert!(matches_keep_identifier(&element, "app.rs:run"));
        assert!(!matches_keep_identifier(&element, "app.rs:stop"));
        assert!(!matches_keep_identifier(&element, "other.rs"));
    }

    #[test]
    fn test_keep_identifier_needs_boundary() {
        let element = CodeElement::new("d1", ElementKind::Function, "domain", "a/model.go");
        assert!(matches_keep_identifier(&element, "a/model.go:domain"));
        assert!(matches_keep_identifier(&element, "model.go:domain"));
        assert!(matches_keep_identifier(&element, "domain"));
        assert!(!matches_keep_identifier(&element, "main"));
        assert!(!matches_keep_identifier(&element, "n"));
        assert!(!matches_keep_identifier(&element, "el.go:domain"));
    }

    #[test]
    fn test_prune_from_tail() {
        let mut session = RetrievalSession::new("q");
        session.merge(vec![
            function("a", "a.go", 1, 50),
            function("b", "b.go", 1, 30),
            function("c", "c.go", 1, 30),
        ]);

        assert_eq!(session.prune_to_budget(60), 2);
        assert_eq!(session.elements().len(), 1);
        assert_eq!(session.elements()[0].id, "a");

        // The last element is never pruned
        assert_eq!(session.prune_to_budget(10), 0);
        assert_eq!(session.elements().len(), 1);
    }

    #[test]
    fn test_finish_without_rounds() {
        let session = RetrievalSession::new("q");
        let result = session.finish(StopReason::Error, Some("boom".to_string()));
        assert_eq!(result.rounds, 0);
        assert_eq!(result.confidence, 0);
        assert_eq!(result.metadata.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_save_trace() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = RetrievalSession::new("where is main?");
        session.log_tool(1, "search(main)", "1 file");
        let path = dir.path().join("trace.json");

        session.save_trace(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("search(main)"));
        assert!(content.contains("where is main?"));
    }
}
