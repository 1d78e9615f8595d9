//! Iterative Retrieval Controller
//!
//! Multi-round, confidence-driven evidence gathering:
//! - Round 1 assesses the raw query, runs the requested tools, narrows file
//!   candidates through the oracle, and merges a baseline hybrid search
//! - Rounds 2..N show the oracle the accumulated evidence and budget, apply
//!   its keep list, and run any further tools
//! - The loop stops on confidence, token budget, inactivity, or round cap
mod adaptive;
mod prompts;
mod query;
mod result;

pub use adaptive::{AdaptiveParameters, ComplexitySource};
pub use prompts::{narrowing_messages, round_n_messages, round_one_messages, RoundContext};
pub use query::{ProcessedQuery, QueryProcessor};
pub use result::{IterationRecord, RetrievalMetadata, RetrievalResult, StopReason};

use crate::elements::{same_file, CodeElement};
use crate::oracle::{
    parse_file_selection, parse_round_result, ChatMessage, CompletionOracle, CompletionRequest,
    OracleError, RoundResult,
};
use crate::session::RetrievalSession;
use crate::tools::{FileMatch, ToolAction, ToolCall, ToolError, ToolExecutor, ToolResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Controller configuration
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Maximum rounds before adaptive adjustment
    pub max_iterations: usize,

    /// Confidence (0-100) at which retrieval stops
    pub confidence_threshold: u8,

    /// Maximum accumulated code lines before adaptive adjustment
    pub max_line_budget: usize,

    /// Cumulative oracle tokens after which retrieval stops
    pub token_budget: u64,

    pub temperature: f32,

    /// Completion length limit per oracle call
    pub max_response_tokens: u32,

    /// Bounds requested from the narrowing call
    pub narrowing_min_files: usize,
    pub narrowing_max_files: usize,

    /// Files taken by match count when narrowing is unavailable
    pub fallback_files: usize,

    /// Results merged from the baseline hybrid search
    pub baseline_top_k: usize,

    /// Run a round's tool calls on scoped threads
    pub parallel_tools: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            confidence_threshold: 95,
            max_line_budget: 2000,
            token_budget: 100_000,
            temperature: 0.0,
            max_response_tokens: 1024,
            narrowing_min_files: 5,
            narrowing_max_files: 15,
            fallback_files: 10,
            baseline_top_k: 10,
            parallel_tools: true,
        }
    }
}

/// Tool outputs of one round, split by how they feed the accumulator
#[derive(Debug, Default)]
struct ToolBatch {
    /// Elements from read, skim, and query actions
    elements: Vec<CodeElement>,
    /// Files from search and list actions
    candidates: Vec<FileMatch>,
    /// Labels of the actions that ran
    labels: Vec<String>,
}

/// Drives multi-round retrieval for one repository
pub struct IterativeController {
    executor: Arc<ToolExecutor>,
    oracle: Arc<dyn CompletionOracle>,
    config: ControllerConfig,
}

impl IterativeController {
    pub fn new(
        executor: Arc<ToolExecutor>,
        oracle: Arc<dyn CompletionOracle>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            executor,
            oracle,
            config,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    /// Run a full retrieval. Never fails: oracle errors end the loop with
    /// `StopReason::Error` and whatever was gathered so far.
    pub fn retrieve(&self, query: &str, processed: &ProcessedQuery) -> RetrievalResult {
        self.retrieve_with_session(RetrievalSession::new(query), processed)
            .into_result()
    }

    /// Run a retrieval and hand back the session alongside the result
    pub fn retrieve_traced(
        &self,
        query: &str,
        processed: &ProcessedQuery,
    ) -> (RetrievalResult, RetrievalSession) {
        let outcome = self.retrieve_with_session(RetrievalSession::new(query), processed);
        let session = outcome.session.clone();
        (outcome.into_result(), session)
    }

    fn retrieve_with_session(
        &self,
        mut session: RetrievalSession,
        processed: &ProcessedQuery,
    ) -> Outcome {
        let query = session.query.clone();
        info!("Starting retrieval {} for: {}", session.id, query);

        // Round 1
        let first = match self.assess(&mut session, round_one_messages(&query), 1) {
            Ok(result) => result,
            Err(e) => return Outcome::failed(session, e),
        };

        let (complexity, source) = match first.complexity {
            Some(c) => (c, ComplexitySource::Oracle),
            None => (processed.heuristic_complexity, ComplexitySource::Heuristic),
        };
        let params = AdaptiveParameters::compute(
            complexity,
            self.config.max_iterations,
            self.config.confidence_threshold,
            self.config.max_line_budget,
        );
        session.set_adaptive(complexity, source, params);
        info!(
            "Query complexity {} ({:?}): max {} rounds, threshold {}, {} line budget",
            complexity,
            source,
            params.max_iterations,
            params.confidence_threshold,
            params.line_budget
        );

        let batch = self.run_tool_calls(&mut session, &first.tool_calls, 1);
        let candidates = merge_candidates(batch.candidates);
        if !candidates.is_empty() {
            let selected = self.narrow_candidates(&mut session, &query, &candidates);
            let resolved = self.executor.resolve_files(&selected);
            debug!(
                "Narrowed {} candidates to {} files ({} elements)",
                candidates.len(),
                selected.len(),
                resolved.len()
            );
            session.merge(resolved);
        }
        session.merge(batch.elements);

        let baseline: Vec<CodeElement> = self
            .executor
            .hybrid_search(&query, self.config.baseline_top_k)
            .into_iter()
            .map(|hit| hit.element)
            .collect();
        session.merge(baseline);
        self.finish_round(&mut session, &first, batch.labels, params.line_budget);

        if let Some(reason) = self.stop_reason(&session, &first, 1, &params) {
            return Outcome::stopped(session, reason);
        }

        // Rounds 2..N
        let mut round = 2;
        loop {
            let messages = round_n_messages(&RoundContext {
                query: &query,
                round,
                max_iterations: params.max_iterations,
                total_lines: session.total_lines(),
                line_budget: params.line_budget,
                elements: session.elements(),
                history: session.tool_history(),
            });

            let assessment = match self.assess(&mut session, messages, round) {
                Ok(result) => result,
                Err(e) => return Outcome::failed(session, e),
            };

            if let Some(keep) = &assessment.keep_files {
                if !session.retain_matching(keep) {
                    warn!(
                        "Round {} keep list matched no gathered element; keeping all {}",
                        round,
                        session.elements().len()
                    );
                }
            }

            let batch = self.run_tool_calls(&mut session, &assessment.tool_calls, round);
            // Searched files rank ahead of listed ones (zero matches)
            let found = top_candidates(
                merge_candidates(batch.candidates),
                self.config.fallback_files,
            );
            session.merge(self.executor.resolve_files(&found));
            session.merge(batch.elements);
            self.finish_round(&mut session, &assessment, batch.labels, params.line_budget);

            if let Some(reason) = self.stop_reason(&session, &assessment, round, &params) {
                return Outcome::stopped(session, reason);
            }
            round += 1;
        }
    }

    fn call_oracle(
        &self,
        session: &mut RetrievalSession,
        messages: Vec<ChatMessage>,
    ) -> Result<String, OracleError> {
        let request = CompletionRequest {
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_response_tokens,
        };

        let completion = self.oracle.complete(&request)?;
        session.record_oracle_call(completion.usage_or_estimate(&request));
        Ok(completion.text)
    }

    fn assess(
        &self,
        session: &mut RetrievalSession,
        messages: Vec<ChatMessage>,
        round: usize,
    ) -> Result<RoundResult, OracleError> {
        let text = self.call_oracle(session, messages)?;
        let result = parse_round_result(&text, round);
        info!(
            "Round {}: confidence {}, {} tool calls",
            round,
            result.confidence,
            result.tool_calls.len()
        );
        Ok(result)
    }

    /// Ask the oracle to pick the relevant files among `candidates`
    ///
    /// A failed call or unparsable answer falls back to the top files by
    /// match count; narrowing never aborts the retrieval.
    fn narrow_candidates(
        &self,
        session: &mut RetrievalSession,
        query: &str,
        candidates: &[FileMatch],
    ) -> Vec<String> {
        let messages = narrowing_messages(
            query,
            candidates,
            self.config.narrowing_min_files,
            self.config.narrowing_max_files,
        );

        let selection = match self.call_oracle(session, messages) {
            Ok(text) => parse_file_selection(&text),
            Err(e) => {
                warn!("Narrowing call failed, selecting by match count: {}", e);
                None
            }
        };

        match selection {
            Some(files) => {
                let picked = files.len();
                let selected = within_candidates(&files, candidates, self.config.narrowing_max_files);
                if picked > 0 && selected.is_empty() {
                    warn!(
                        "Narrowing picked {} files outside the candidates, selecting by match count",
                        picked
                    );
                    top_candidates(candidates.to_vec(), self.config.fallback_files)
                } else {
                    selected
                }
            }
            None => {
                warn!("No usable narrowing selection, selecting by match count");
                top_candidates(candidates.to_vec(), self.config.fallback_files)
            }
        }
    }

    /// Validate and run tool calls, logging each outcome to the session
    fn run_tool_calls(
        &self,
        session: &mut RetrievalSession,
        calls: &[ToolCall],
        round: usize,
    ) -> ToolBatch {
        let mut actions = Vec::with_capacity(calls.len());
        for call in calls {
            let normalized = call.normalize();
            match ToolAction::from_call(&normalized) {
                Ok(action) => actions.push(action),
                Err(e) => {
                    warn!("Skipping tool call in round {}: {}", round, e);
                    session.log_tool(round, normalized.action, format!("rejected: {}", e));
                }
            }
        }

        let outcomes = self.execute_actions(&actions);

        let mut batch = ToolBatch::default();
        for (action, outcome) in actions.iter().zip(outcomes) {
            let label = action.to_string();
            match outcome {
                Ok(result) => {
                    session.log_tool(round, label.clone(), summarize(action, &result));
                    if action.yields_candidates() {
                        batch.candidates.extend(result.candidates);
                    } else {
                        batch.elements.extend(result.elements);
                    }
                }
                Err(e) => {
                    warn!("Tool {} failed: {}", label, e);
                    session.log_tool(round, label.clone(), format!("failed: {}", e));
                }
            }
            batch.labels.push(label);
        }

        batch
    }

    /// Run actions, concurrently when configured; results keep action order
    fn execute_actions(&self, actions: &[ToolAction]) -> Vec<Result<ToolResult, ToolError>> {
        if !self.config.parallel_tools || actions.len() < 2 {
            return actions.iter().map(|a| self.executor.run(a)).collect();
        }

        let executor = self.executor.as_ref();
        std::thread::scope(|scope| {
            let handles: Vec<_> = actions
                .iter()
                .map(|action| scope.spawn(move || executor.run(action)))
                .collect();

            handles
                .into_iter()
                .zip(actions)
                .map(|(handle, action)| {
                    handle
                        .join()
                        .unwrap_or_else(|_| Err(ToolError::Panicked(action.to_string())))
                })
                .collect()
        })
    }

    fn finish_round(
        &self,
        session: &mut RetrievalSession,
        assessment: &RoundResult,
        labels: Vec<String>,
        line_budget: usize,
    ) {
        let pruned = session.prune_to_budget(line_budget);
        if pruned > 0 {
            debug!(
                "Pruned {} elements to fit the {} line budget",
                pruned, line_budget
            );
        }

        session.record_iteration(IterationRecord {
            round: assessment.round,
            confidence: assessment.confidence,
            reasoning: assessment.reasoning.clone(),
            tool_calls: labels,
            elements_after: session.elements().len(),
            lines_after: session.total_lines(),
        });
    }

    /// Stop checks in priority order
    fn stop_reason(
        &self,
        session: &RetrievalSession,
        assessment: &RoundResult,
        round: usize,
        params: &AdaptiveParameters,
    ) -> Option<StopReason> {
        if assessment.confidence >= params.confidence_threshold {
            return Some(StopReason::ConfidenceThresholdReached);
        }
        if session.tokens_used() >= self.config.token_budget {
            return Some(StopReason::BudgetExhausted);
        }
        if assessment.tool_calls.is_empty() {
            return Some(StopReason::NoMoreActions);
        }
        if round >= params.max_iterations {
            return Some(StopReason::MaxRounds);
        }
        None
    }
}

/// A finished retrieval before conversion into its result
struct Outcome {
    session: RetrievalSession,
    stop_reason: StopReason,
    error: Option<String>,
}

impl Outcome {
    fn stopped(session: RetrievalSession, stop_reason: StopReason) -> Self {
        info!(
            "Retrieval {} stopped: {} after {} rounds, {} elements",
            session.id,
            stop_reason,
            session.iterations().len(),
            session.elements().len()
        );
        Self {
            session,
            stop_reason,
            error: None,
        }
    }

    fn failed(session: RetrievalSession, error: OracleError) -> Self {
        warn!(
            "Retrieval {} aborted by oracle failure: {}",
            session.id, error
        );
        Self {
            session,
            stop_reason: StopReason::Error,
            error: Some(error.to_string()),
        }
    }

    fn into_result(self) -> RetrievalResult {
        self.session.finish(self.stop_reason, self.error)
    }
}

/// Collapse repeated paths, keeping the highest count and first-seen order
fn merge_candidates(candidates: Vec<FileMatch>) -> Vec<FileMatch> {
    let mut merged: Vec<FileMatch> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match merged.iter_mut().find(|m| m.path == candidate.path) {
            Some(existing) => existing.matches = existing.matches.max(candidate.matches),
            None => merged.push(candidate),
        }
    }
    merged
}

/// Candidate paths named by a selection, in selection order, at most `max`.
/// Picks that name no candidate are dropped.
fn within_candidates(selection: &[String], candidates: &[FileMatch], max: usize) -> Vec<String> {
    let mut selected: Vec<String> = Vec::new();
    for pick in selection {
        match candidates.iter().find(|c| same_file(&c.path, pick)) {
            Some(candidate) => {
                if !selected.contains(&candidate.path) {
                    selected.push(candidate.path.clone());
                }
            }
            None => debug!("Ignoring narrowing pick outside the candidates: {}", pick),
        }
        if selected.len() >= max {
            break;
        }
    }
    selected
}

/// Paths of the `n` candidates with the most matches; ties keep input order
fn top_candidates(mut candidates: Vec<FileMatch>, n: usize) -> Vec<String> {
    candidates.sort_by(|a, b| b.matches.cmp(&a.matches));
    candidates.into_iter().take(n).map(|c| c.path).collect()
}

fn summarize(action: &ToolAction, result: &ToolResult) -> String {
    if let ToolAction::List { .. } = action {
        return format!("{} entries:\n{}", result.text.lines().count(), result.text);
    }
    if action.yields_candidates() {
        let files: Vec<&str> = result
            .candidates
            .iter()
            .take(5)
            .map(|c| c.path.as_str())
            .collect();
        let more = result.candidates.len().saturating_sub(files.len());
        if more > 0 {
            format!(
                "{} files: {} (+{} more)",
                result.candidates.len(),
                files.join(", "),
                more
            )
        } else {
            format!("{} files: {}", result.candidates.len(), files.join(", "))
        }
    } else {
        format!("{} elements", result.elements.len())
    }
}
