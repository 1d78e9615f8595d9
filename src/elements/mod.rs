//! Code element model
//!
//! A code element is one indexed unit of source (a whole file, a class, a
//! function, or a documentation block). Elements are produced by an external
//! indexer and are read-only here: retrieval only decides which of them to
//! select.

use crate::error::{HoundError, Result};
use crate::tools::RepoFs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Kind of code element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    File,
    #[serde(alias = "struct", alias = "interface", alias = "trait")]
    Class,
    #[serde(alias = "method", alias = "func")]
    Function,
    #[serde(alias = "doc", alias = "docstring", alias = "comment")]
    Documentation,
    #[serde(other)]
    Other,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::File => "file",
            ElementKind::Class => "class",
            ElementKind::Function => "function",
            ElementKind::Documentation => "documentation",
            ElementKind::Other => "other",
        }
    }

    /// Ordering used when resolving overlapping spans within one file.
    /// Higher values are considered first.
    pub fn containment_priority(&self) -> u8 {
        match self {
            ElementKind::File => 3,
            ElementKind::Class => 2,
            ElementKind::Function => 1,
            ElementKind::Documentation | ElementKind::Other => 0,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An indexed unit of source code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeElement {
    /// Unique element ID
    pub id: String,

    /// Element kind (serialized as `type`)
    #[serde(rename = "type")]
    pub kind: ElementKind,

    /// Symbol name, or file name for file elements
    pub name: String,

    /// Repository-relative file path
    #[serde(alias = "file_path")]
    pub path: String,

    #[serde(default)]
    pub language: String,

    #[serde(default = "default_line")]
    pub start_line: usize,

    #[serde(default = "default_line")]
    pub end_line: usize,

    #[serde(default)]
    pub code: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Owning repository name
    #[serde(default, alias = "repo_name")]
    pub repo: String,
}

fn default_line() -> usize {
    1
}

impl CodeElement {
    pub fn new(
        id: impl Into<String>,
        kind: ElementKind,
        name: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            path: path.into(),
            language: String::new(),
            start_line: 1,
            end_line: 1,
            code: String::new(),
            signature: None,
            docstring: None,
            summary: None,
            repo: String::new(),
        }
    }

    pub fn with_lines(mut self, start_line: usize, end_line: usize) -> Self {
        self.start_line = start_line;
        self.end_line = end_line;
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn with_docstring(mut self, docstring: impl Into<String>) -> Self {
        self.docstring = Some(docstring.into());
        self
    }

    pub fn with_repo(mut self, repo: impl Into<String>) -> Self {
        self.repo = repo.into();
        self
    }

    /// Number of source lines covered (inclusive span, at least 1)
    pub fn line_span(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    /// Path prefixed by the repository name, or the bare path when the
    /// element has no repository
    pub fn qualified_path(&self) -> String {
        if self.repo.is_empty() {
            self.path.clone()
        } else {
            format!("{}/{}", self.repo, normalize_path(&self.path))
        }
    }

    /// Copy with code stripped, keeping signature and docs
    pub fn skimmed(&self) -> Self {
        let mut skim = self.clone();
        skim.code = String::new();
        skim
    }

    /// Whether `path` names this element's file, by exact match, repo-prefixed
    /// match, or suffix match in either direction
    pub fn matches_path(&self, path: &str) -> bool {
        let target = normalize_path(path);
        let own = normalize_path(&self.path);
        if target.is_empty() || own.is_empty() {
            return false;
        }

        self.qualified_path() == target || same_file(&own, &target)
    }
}

/// Whether two repository paths name the same file: equal after
/// normalization, or one a segment-aligned suffix of the other
pub fn same_file(a: &str, b: &str) -> bool {
    let (a, b) = (normalize_path(a), normalize_path(b));
    if a.is_empty() || b.is_empty() {
        return false;
    }

    a == b || ends_with_segment(&a, &b) || ends_with_segment(&b, &a)
}

/// Normalize a path for comparison: forward slashes, no leading `./` or `/`
pub fn normalize_path(path: &str) -> String {
    let mut normalized = path.trim().replace('\\', "/");
    while let Some(stripped) = normalized.strip_prefix("./") {
        normalized = stripped.to_string();
    }
    normalized.trim_start_matches('/').to_string()
}

/// `long` ends with `short` at a path-segment boundary
fn ends_with_segment(long: &str, short: &str) -> bool {
    !short.is_empty()
        && long.len() > short.len()
        && long.ends_with(short)
        && long.as_bytes()[long.len() - short.len() - 1] == b'/'
}

/// Guess a language tag from a file extension
pub fn language_for_path(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "rs" => "rust",
        "go" => "go",
        "py" => "python",
        "js" | "mjs" | "cjs" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "c" | "h" => "c",
        "cc" | "cpp" | "cxx" | "hpp" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "scala" => "scala",
        "sh" | "bash" => "bash",
        "md" => "markdown",
        "toml" => "toml",
        "yaml" | "yml" => "yaml",
        "json" => "json",
        _ => "text",
    }
}

/// Load indexer output: a JSON array of code elements
pub fn load_json(path: &Path) -> Result<Vec<CodeElement>> {
    let content = std::fs::read_to_string(path).map_err(|e| HoundError::Io {
        source: e,
        context: format!("Failed to read elements file: {:?}", path),
    })?;

    serde_json::from_str(&content).map_err(|e| HoundError::Json {
        source: e,
        context: format!("Failed to parse elements file: {:?}", path),
    })
}

/// Build one file-level element per readable text file in the repository
pub fn load_repository(fs: &RepoFs, repo_name: &str) -> Vec<CodeElement> {
    let mut elements = Vec::new();

    for rel_path in fs.walk_files() {
        let content = match fs.read_to_string(&rel_path) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!("Skipping {}: {}", rel_path, e);
                continue;
            }
        };

        let name = rel_path
            .rsplit('/')
            .next()
            .unwrap_or(rel_path.as_str())
            .to_string();
        let line_count = content.lines().count().max(1);

        elements.push(
            CodeElement::new(format!("file:{}", rel_path), ElementKind::File, name, &rel_path)
                .with_lines(1, line_count)
                .with_language(language_for_path(&rel_path))
                .with_code(content)
                .with_repo(repo_name),
        );
    }

    tracing::info!("Loaded {} file elements from {}", elements.len(), fs.root().display());
    elements
}
