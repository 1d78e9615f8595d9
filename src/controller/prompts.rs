//! Oracle prompt construction

use crate::elements::CodeElement;
use crate::oracle::ChatMessage;
use crate::session::ToolLogEntry;
use crate::tools::FileMatch;

const TOOL_GUIDE: &str = "Available tools (emit as {\"name\": \"<tool>\", \"arg\": \"<argument>\"} \
or {\"tool\": \"<tool>\", \"parameters\": {...}}):\n\
- search: case-insensitive content search; parameters: pattern, optional file_pattern glob, optional regex flag\n\
- list: list a directory (repository-relative path)\n\
- read: full contents of one file\n\
- skim: signatures of the functions and classes in one file\n\
- query: ranked keyword and semantic search over indexed code";

/// Round 1: assess the raw query
pub fn round_one_messages(query: &str) -> Vec<ChatMessage> {
    let system = format!(
        "You locate the source code needed to answer questions about a repository.\n\
Assess the question before any code has been gathered.\n\n{TOOL_GUIDE}\n\n\
Respond with a JSON object:\n\
{{\"confidence\": <0-100, how sure you are that no further code is needed>,\n \
\"complexity\": <0-100, how broad the question is>,\n \
\"reasoning\": \"<short explanation>\",\n \
\"tool_calls\": [<tool calls that find relevant files>]}}"
    );

    vec![
        ChatMessage::system(system),
        ChatMessage::user(format!("Question: {query}")),
    ]
}

/// Narrow content-search and listing candidates to the files worth reading
pub fn narrowing_messages(
    query: &str,
    candidates: &[FileMatch],
    min_files: usize,
    max_files: usize,
) -> Vec<ChatMessage> {
    let listing = candidates
        .iter()
        .map(|c| format!("- {} ({} matches)", c.path, c.matches))
        .collect::<Vec<_>>()
        .join("\n");

    let system = format!(
        "Select the source files most relevant to the question, between {min_files} and \
{max_files} files. Skip coverage reports, generated files, vendored code, and lock files. \
Skip configuration, test, and documentation files unless the question asks about them.\n\
Respond with a JSON object: {{\"files\": [\"<path>\", ...]}}"
    );

    vec![
        ChatMessage::system(system),
        ChatMessage::user(format!("Question: {query}\n\nCandidate files:\n{listing}")),
    ]
}

/// Snapshot of retrieval state shown to the oracle in rounds 2 and later
pub struct RoundContext<'a> {
    pub query: &'a str,
    pub round: usize,
    pub max_iterations: usize,
    pub total_lines: usize,
    pub line_budget: usize,
    pub elements: &'a [CodeElement],
    pub history: &'a [ToolLogEntry],
}

/// Round N: reassess with the accumulated evidence
pub fn round_n_messages(context: &RoundContext<'_>) -> Vec<ChatMessage> {
    let system = format!(
        "You locate the source code needed to answer questions about a repository.\n\
Review the code gathered so far and decide whether it is sufficient.\n\n{TOOL_GUIDE}\n\n\
Respond with a JSON object:\n\
{{\"confidence\": <0-100, how sure you are that the kept code answers the question>,\n \
\"reasoning\": \"<short explanation>\",\n \
\"keep_files\": [<paths, or path:name, of gathered elements to keep>],\n \
\"tool_calls\": [<further tool calls, empty when done>]}}"
    );

    let gathered = if context.elements.is_empty() {
        "(nothing yet)".to_string()
    } else {
        context
            .elements
            .iter()
            .map(|e| {
                format!(
                    "- {} {}:{} (lines {}-{})",
                    e.kind, e.path, e.name, e.start_line, e.end_line
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let history = if context.history.is_empty() {
        "(none)".to_string()
    } else {
        context
            .history
            .iter()
            .map(|h| format!("- round {}: {} -> {}", h.round, h.action, h.outcome))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let remaining = context.max_iterations.saturating_sub(context.round);
    let user = format!(
        "Question: {}\n\nRound {} of {} ({} remaining after this one).\n\
Lines gathered: {} of {} budget.\n\nGathered code:\n{}\n\nPrevious tool calls:\n{}",
        context.query,
        context.round,
        context.max_iterations,
        remaining,
        context.total_lines,
        context.line_budget,
        gathered,
        history
    );

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::ElementKind;
    use crate::oracle::Role;

    #[test]
    fn test_round_n_includes_state() {
        let elements = vec![CodeElement::new("e1", ElementKind::Function, "main", "main.go")
            .with_lines(3, 9)];
        let history = vec![ToolLogEntry {
            round: 1,
            action: "search(main)".to_string(),
            outcome: "1 file".to_string(),
        }];
        let context = RoundContext {
            query: "where is main?",
            round: 2,
            max_iterations: 4,
            total_lines: 7,
            line_budget: 600,
            elements: &elements,
            history: &history,
        };

        let messages = round_n_messages(&context);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::User);
        let user = &messages[1].content;
        assert!(user.contains("function main.go:main (lines 3-9)"));
        assert!(user.contains("Lines gathered: 7 of 600"));
        assert!(user.contains("round 1: search(main) -> 1 file"));
        assert!(user.contains("2 remaining"));
    }

    #[test]
    fn test_narrowing_lists_candidates() {
        let candidates = vec![FileMatch {
            path: "src/lib.rs".to_string(),
            matches: 4,
        }];
        let messages = narrowing_messages("q", &candidates, 5, 15);
        assert!(messages[1].content.contains("- src/lib.rs (4 matches)"));
        assert!(messages[0].content.contains("between 5 and 15"));
    }
}
