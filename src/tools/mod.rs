//! Retrieval tools
//!
//! Discrete actions the controller (or a caller) can run against the
//! repository and the hybrid index: content search, directory listing,
//! full-file read, signature skim, and free-text hybrid query.

mod filesystem;
mod search;

pub use filesystem::{DirEntryInfo, RepoFs, DEFAULT_EXCLUDED_DIRS, DEFAULT_MAX_FILE_BYTES};
pub use search::{search_content, ContentSearch, FileMatch};

use crate::elements::{language_for_path, normalize_path, CodeElement, ElementKind};
use crate::embedding::EmbeddingProvider;
use ahash::AHashSet;
use crate::retrieval::{HybridRetriever, ScoredElement};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Missing argument: {0}")]
    MissingArgument(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Path escapes repository: {0}")]
    PathOutsideRepository(String),

    #[error("Path is hidden or excluded: {0}")]
    ExcludedPath(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("File too large: {path} ({size} bytes)")]
    FileTooLarge { path: String, size: u64 },

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Tool execution panicked: {0}")]
    Panicked(String),
}

/// A tool call as emitted by the oracle.
///
/// Two shapes are accepted: `{"tool": "search", "parameters": {...}}` and
/// `{"name": "search", "arg": "term"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolCall {
    Structured {
        tool: String,
        #[serde(default)]
        parameters: Map<String, Value>,
    },
    Simple {
        name: String,
        #[serde(default, alias = "argument", alias = "args", alias = "parameters")]
        arg: Value,
    },
}

/// Canonical form of a tool call
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct NormalizedCall {
    pub action: String,
    pub argument: String,
    pub file_pattern: Option<String>,
    pub regex: bool,
}

const ARGUMENT_KEYS: &[&str] = &[
    "pattern",
    "query",
    "path",
    "file",
    "directory",
    "dir",
    "arg",
    "argument",
    "text",
    "term",
];
const FILE_PATTERN_KEYS: &[&str] = &["file_pattern", "glob", "include", "file_glob"];
const REGEX_KEYS: &[&str] = &["regex", "is_regex", "use_regex"];

impl ToolCall {
    pub fn simple(name: impl Into<String>, arg: impl Into<String>) -> Self {
        ToolCall::Simple {
            name: name.into(),
            arg: Value::String(arg.into()),
        }
    }

    /// Reduce either call shape to an action name plus argument
    pub fn normalize(&self) -> NormalizedCall {
        match self {
            ToolCall::Structured { tool, parameters } => {
                normalize_parameters(tool, parameters)
            }
            ToolCall::Simple { name, arg } => match arg {
                Value::Object(parameters) => normalize_parameters(name, parameters),
                Value::String(s) => NormalizedCall {
                    action: name.trim().to_lowercase(),
                    argument: s.trim().to_string(),
                    ..Default::default()
                },
                Value::Null => NormalizedCall {
                    action: name.trim().to_lowercase(),
                    ..Default::default()
                },
                other => NormalizedCall {
                    action: name.trim().to_lowercase(),
                    argument: other.to_string(),
                    ..Default::default()
                },
            },
        }
    }
}

fn normalize_parameters(action: &str, parameters: &Map<String, Value>) -> NormalizedCall {
    let string_param = |keys: &[&str]| {
        keys.iter()
            .filter_map(|k| parameters.get(*k))
            .find_map(|v| v.as_str().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
    };

    NormalizedCall {
        action: action.trim().to_lowercase(),
        argument: string_param(ARGUMENT_KEYS).unwrap_or_default(),
        file_pattern: string_param(FILE_PATTERN_KEYS),
        regex: REGEX_KEYS
            .iter()
            .filter_map(|k| parameters.get(*k))
            .any(|v| v.as_bool().unwrap_or(false)),
    }
}

/// A validated retrieval action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolAction {
    Search {
        pattern: String,
        file_pattern: Option<String>,
        regex: bool,
    },
    List {
        path: String,
    },
    Read {
        path: String,
    },
    Skim {
        path: String,
    },
    Query {
        text: String,
    },
}

impl ToolAction {
    pub fn from_call(call: &NormalizedCall) -> Result<Self, ToolError> {
        let require = |what: &str| {
            if call.argument.is_empty() {
                Err(ToolError::MissingArgument(format!(
                    "{} requires {}",
                    call.action, what
                )))
            } else {
                Ok(call.argument.clone())
            }
        };

        match call.action.as_str() {
            "search" | "grep" | "content_search" | "search_code" | "find" => {
                Ok(ToolAction::Search {
                    pattern: require("a pattern")?,
                    file_pattern: call.file_pattern.clone(),
                    regex: call.regex,
                })
            }
            "list" | "ls" | "list_dir" | "list_directory" => Ok(ToolAction::List {
                path: if call.argument.is_empty() {
                    ".".to_string()
                } else {
                    call.argument.clone()
                },
            }),
            "read" | "read_file" | "cat" | "open" => Ok(ToolAction::Read {
                path: require("a file path")?,
            }),
            "skim" | "skim_file" | "signatures" | "outline" => Ok(ToolAction::Skim {
                path: require("a file path")?,
            }),
            "query" | "hybrid_search" | "semantic_search" | "retrieve" => Ok(ToolAction::Query {
                text: require("query text")?,
            }),
            other => Err(ToolError::UnknownAction(other.to_string())),
        }
    }

    /// Whether this action yields file candidates rather than elements
    pub fn yields_candidates(&self) -> bool {
        matches!(self, ToolAction::Search { .. } | ToolAction::List { .. })
    }
}

impl fmt::Display for ToolAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolAction::Search {
                pattern,
                file_pattern: Some(glob),
                ..
            } => write!(f, "search({pattern}, {glob})"),
            ToolAction::Search { pattern, .. } => write!(f, "search({pattern})"),
            ToolAction::List { path } => write!(f, "list({path})"),
            ToolAction::Read { path } => write!(f, "read({path})"),
            ToolAction::Skim { path } => write!(f, "skim({path})"),
            ToolAction::Query { text } => write!(f, "query({text})"),
        }
    }
}

/// Output of one tool action
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolResult {
    /// Resolved code elements
    pub elements: Vec<CodeElement>,
    /// Human/oracle readable summary
    pub text: String,
    /// Candidate files (search and list actions)
    pub candidates: Vec<FileMatch>,
}

/// Tool executor configuration
#[derive(Debug, Clone)]
pub struct ToolConfig {
    /// Maximum files returned by one content search
    pub max_search_results: usize,
    /// Results returned by a free-text query
    pub query_top_k: usize,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            max_search_results: 50,
            query_top_k: 10,
        }
    }
}

/// Runs retrieval actions against the repository and the hybrid index
pub struct ToolExecutor {
    retriever: Arc<HybridRetriever>,
    fs: RepoFs,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    config: ToolConfig,
}

impl ToolExecutor {
    pub fn new(retriever: Arc<HybridRetriever>, fs: RepoFs, config: ToolConfig) -> Self {
        Self {
            retriever,
            fs,
            embedder: None,
            config,
        }
    }

    /// Use an embedder for query vectors in free-text queries
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn retriever(&self) -> &HybridRetriever {
        &self.retriever
    }

    pub fn fs(&self) -> &RepoFs {
        &self.fs
    }

    /// Ad hoc single-action entry point
    pub fn execute(&self, action_name: &str, argument: &str) -> Result<ToolResult, ToolError> {
        let call = ToolCall::simple(action_name, argument).normalize();
        let action = ToolAction::from_call(&call)?;
        self.run(&action)
    }

    /// Run a validated action
    pub fn run(&self, action: &ToolAction) -> Result<ToolResult, ToolError> {
        tracing::debug!("Running tool action {}", action);

        match action {
            ToolAction::Search {
                pattern,
                file_pattern,
                regex,
            } => {
                let candidates =
                    self.content_search(pattern, file_pattern.as_deref(), *regex)?;
                let text = candidates
                    .iter()
                    .map(|c| format!("{} ({} matches)", c.path, c.matches))
                    .collect::<Vec<_>>()
                    .join("\n");
                let paths: Vec<String> = candidates.iter().map(|c| c.path.clone()).collect();
                let elements = self.indexed_elements_for_files(&paths);

                Ok(ToolResult {
                    elements,
                    text,
                    candidates,
                })
            }
            ToolAction::List { path } => {
                let entries = self.fs.list_dir(path)?;
                let text = entries
                    .iter()
                    .map(|e| {
                        if e.is_dir {
                            format!("{}/", e.path)
                        } else {
                            e.path.clone()
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                let candidates = entries
                    .into_iter()
                    .filter(|e| !e.is_dir)
                    .map(|e| FileMatch {
                        path: e.path,
                        matches: 0,
                    })
                    .collect();

                Ok(ToolResult {
                    elements: Vec::new(),
                    text,
                    candidates,
                })
            }
            ToolAction::Read { path } => {
                let elements = self.read_file(path)?;
                let text = elements
                    .iter()
                    .map(|e| e.code.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n");

                Ok(ToolResult {
                    elements,
                    text,
                    candidates: Vec::new(),
                })
            }
            ToolAction::Skim { path } => {
                let elements = self.skim_file(path)?;
                let text = elements
                    .iter()
                    .map(|e| {
                        format!(
                            "{} {} (lines {}-{}): {}",
                            e.kind,
                            e.name,
                            e.start_line,
                            e.end_line,
                            e.signature.as_deref().unwrap_or("")
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n");

                Ok(ToolResult {
                    elements,
                    text,
                    candidates: Vec::new(),
                })
            }
            ToolAction::Query { text } => {
                let hits = self.hybrid_search(text, self.config.query_top_k);
                let summary = hits
                    .iter()
                    .map(|h| {
                        format!(
                            "{:.3} {} {} ({})",
                            h.score, h.element.kind, h.element.name, h.element.path
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n");

                Ok(ToolResult {
                    elements: hits.into_iter().map(|h| h.element).collect(),
                    text: summary,
                    candidates: Vec::new(),
                })
            }
        }
    }

    /// Content search over the repository tree
    pub fn content_search(
        &self,
        pattern: &str,
        file_pattern: Option<&str>,
        regex: bool,
    ) -> Result<Vec<FileMatch>, ToolError> {
        let request = ContentSearch {
            pattern: pattern.to_string(),
            file_pattern: file_pattern.map(str::to_string),
            regex,
            max_results: self.config.max_search_results,
        };
        search_content(&self.fs, &request)
    }

    /// Full element for a file: the indexed file element, else every indexed
    /// element of that file, else a file element read from disk
    pub fn read_file(&self, path: &str) -> Result<Vec<CodeElement>, ToolError> {
        let indexed = self.find_elements_for_file(path);

        let files: Vec<CodeElement> = indexed
            .iter()
            .filter(|e| e.kind == ElementKind::File)
            .cloned()
            .collect();
        if !files.is_empty() {
            return Ok(files);
        }
        if !indexed.is_empty() {
            return Ok(indexed);
        }

        self.element_from_disk(path).map(|e| vec![e])
    }

    /// Function and class elements of a file with code stripped
    pub fn skim_file(&self, path: &str) -> Result<Vec<CodeElement>, ToolError> {
        let indexed = self.find_elements_for_file(path);
        if indexed.is_empty() {
            return Err(ToolError::FileNotFound(path.to_string()));
        }

        Ok(indexed
            .iter()
            .filter(|e| matches!(e.kind, ElementKind::Function | ElementKind::Class))
            .map(CodeElement::skimmed)
            .collect())
    }

    /// Keyword+vector search for free text
    pub fn hybrid_search(&self, query: &str, top_k: usize) -> Vec<ScoredElement> {
        let query_vector = match &self.embedder {
            Some(embedder) if self.retriever.has_vectors() => match embedder.embed(query) {
                Ok(vector) => Some(vector),
                Err(e) => {
                    tracing::warn!("Query embedding failed, using keyword ranking only: {}", e);
                    None
                }
            },
            _ => None,
        };

        self.retriever.search(query, query_vector.as_deref(), top_k)
    }

    /// Indexed elements whose path matches `path` exactly or by suffix in
    /// either direction
    pub fn find_elements_for_file(&self, path: &str) -> Vec<CodeElement> {
        self.retriever
            .elements()
            .iter()
            .filter(|e| e.matches_path(path))
            .cloned()
            .collect()
    }

    /// Resolve selected files to elements, reading unindexed files from disk
    pub fn resolve_files(&self, paths: &[String]) -> Vec<CodeElement> {
        let mut resolved = Vec::new();

        for path in paths {
            let indexed = self.find_elements_for_file(path);
            if !indexed.is_empty() {
                resolved.extend(indexed);
                continue;
            }

            match self.element_from_disk(path) {
                Ok(element) => resolved.push(element),
                Err(e) => tracing::warn!("Could not resolve selected file {}: {}", path, e),
            }
        }

        resolved
    }

    fn indexed_elements_for_files(&self, paths: &[String]) -> Vec<CodeElement> {
        let mut seen = AHashSet::new();
        paths
            .iter()
            .flat_map(|p| self.find_elements_for_file(p))
            .filter(|e| seen.insert(e.id.clone()))
            .collect()
    }

    fn element_from_disk(&self, path: &str) -> Result<CodeElement, ToolError> {
        let rel_path = normalize_path(path);
        if !self.fs.is_file(&rel_path)? {
            return Err(ToolError::FileNotFound(path.to_string()));
        }

        let content = self.fs.read_to_string(&rel_path)?;
        let name = rel_path.rsplit('/').next().unwrap_or(&rel_path).to_string();

        Ok(
            CodeElement::new(format!("file:{}", rel_path), ElementKind::File, name, &rel_path)
                .with_lines(1, content.lines().count().max(1))
                .with_language(language_for_path(&rel_path))
                .with_code(content),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_simple_shape() {
        let call: ToolCall = serde_json::from_value(json!({"name": "Search", "arg": " main "})).unwrap();
        let normalized = call.normalize();
        assert_eq!(normalized.action, "search");
        assert_eq!(normalized.argument, "main");
        assert!(!normalized.regex);
    }

    #[test]
    fn test_normalize_structured_shape() {
        let call: ToolCall = serde_json::from_value(json!({
            "tool": "search",
            "parameters": {"pattern": "handle_request", "file_pattern": "*.rs", "regex": true}
        }))
        .unwrap();

        let normalized = call.normalize();
        assert_eq!(normalized.action, "search");
        assert_eq!(normalized.argument, "handle_request");
        assert_eq!(normalized.file_pattern.as_deref(), Some("*.rs"));
        assert!(normalized.regex);
    }

    #[test]
    fn test_normalize_simple_with_object_arg() {
        let call: ToolCall =
            serde_json::from_value(json!({"name": "list", "arg": {"path": "src"}})).unwrap();
        assert_eq!(call.normalize().argument, "src");
    }

    #[test]
    fn test_action_parsing() {
        let action = ToolAction::from_call(&ToolCall::simple("grep", "foo").normalize()).unwrap();
        assert!(matches!(action, ToolAction::Search { .. }));
        assert!(action.yields_candidates());

        let action = ToolAction::from_call(&ToolCall::simple("ls", "").normalize()).unwrap();
        assert_eq!(
            action,
            ToolAction::List {
                path: ".".to_string()
            }
        );

        let err = ToolAction::from_call(&ToolCall::simple("delete", "x").normalize());
        assert!(matches!(err, Err(ToolError::UnknownAction(name)) if name == "delete"));

        let err = ToolAction::from_call(&ToolCall::simple("read", "").normalize());
        assert!(matches!(err, Err(ToolError::MissingArgument(_))));
    }

    #[test]
    fn test_action_display() {
        let action = ToolAction::Search {
            pattern: "main".to_string(),
            file_pattern: Some("*.go".to_string()),
            regex: false,
        };
        assert_eq!(action.to_string(), "search(main, *.go)");
    }
}
