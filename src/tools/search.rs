//! Content search over repository files
use super::{RepoFs, ToolError};
use globset::{Glob, GlobMatcher};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// A candidate file with its match count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMatch {
    pub path: String,
    pub matches: usize,
}

/// Content search request
#[derive(Debug, Clone)]
pub struct ContentSearch {
    /// Search term (literal unless `regex` is set)
    pub pattern: String,
    /// Optional glob restricting which files are searched
    pub file_pattern: Option<String>,
    pub regex: bool,
    pub max_results: usize,
}

impl ContentSearch {
    pub fn literal(pattern: impl Into<String>, max_results: usize) -> Self {
        Self {
            pattern: pattern.into(),
            file_pattern: None,
            regex: false,
            max_results,
        }
    }

    fn matcher(&self) -> Result<Regex, ToolError> {
        let source = if self.regex {
            self.pattern.clone()
        } else {
            regex::escape(&self.pattern)
        };

        RegexBuilder::new(&source)
            .case_insensitive(true)
            .build()
            .map_err(|e| ToolError::InvalidPattern(format!("{}: {}", self.pattern, e)))
    }

    fn file_filter(&self) -> Result<Option<GlobMatcher>, ToolError> {
        match self.file_pattern.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(pattern) => Glob::new(pattern)
                .map(|g| Some(g.compile_matcher()))
                .map_err(|e| ToolError::InvalidPattern(format!("{}: {}", pattern, e))),
        }
    }
}

/// Count case-insensitive matches per file, stopping once `max_results`
/// files have matched
pub fn search_content(fs: &RepoFs, request: &ContentSearch) -> Result<Vec<FileMatch>, ToolError> {
    if request.pattern.trim().is_empty() {
        return Err(ToolError::MissingArgument("search pattern".to_string()));
    }

    let matcher = request.matcher()?;
    let file_filter = request.file_filter()?;
    let mut results = Vec::new();

    if request.max_results == 0 {
        return Ok(results);
    }

    for rel_path in fs.walk_files() {
        if let Some(filter) = &file_filter {
            let file_name = rel_path.rsplit('/').next().unwrap_or(&rel_path);
            if !filter.is_match(&rel_path) && !filter.is_match(file_name) {
                continue;
            }
        }

        // Binary and oversized files are not searchable
        let content = match fs.read_to_string(&rel_path) {
            Ok(content) => content,
            Err(_) => continue,
        };

        let matches = matcher.find_iter(&content).count();
        if matches > 0 {
            results.push(FileMatch {
                path: rel_path,
                matches,
            });
            if results.len() >= request.max_results {
                tracing::debug!("Content search hit result cap of {}", request.max_results);
                break;
            }
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn sample_repo() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("pkg")).unwrap();
        fs::create_dir_all(root.join("vendor")).unwrap();
        fs::write(root.join("main.go"), "func main() {\n\tMain()\n}\n").unwrap();
        fs::write(root.join("pkg/server.go"), "func Serve() {}\n").unwrap();
        fs::write(root.join("pkg/notes.txt"), "main main main\n").unwrap();
        fs::write(root.join("vendor/lib.go"), "func main() {}\n").unwrap();
        temp
    }

    #[test]
    fn test_case_insensitive_counts() {
        let temp = sample_repo();
        let fs = RepoFs::new(temp.path());

        let results = search_content(&fs, &ContentSearch::literal("main", 10)).unwrap();
        assert_eq!(
            results,
            vec![
                FileMatch {
                    path: "main.go".to_string(),
                    matches: 2
                },
                FileMatch {
                    path: "pkg/notes.txt".to_string(),
                    matches: 3
                },
            ]
        );
    }

    #[test]
    fn test_file_pattern_filter() {
        let temp = sample_repo();
        let fs = RepoFs::new(temp.path());

        let mut request = ContentSearch::literal("main", 10);
        request.file_pattern = Some("*.go".to_string());

        let results = search_content(&fs, &request).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, "main.go");
    }

    #[test]
    fn test_regex_search() {
        let temp = sample_repo();
        let fs = RepoFs::new(temp.path());

        let mut request = ContentSearch::literal(r"func\s+serve", 10);
        request.regex = true;

        let results = search_content(&fs, &request).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, "pkg/server.go");
    }

    #[test]
    fn test_literal_escapes_metacharacters() {
        let temp = sample_repo();
        let fs = RepoFs::new(temp.path());

        let results = search_content(&fs, &ContentSearch::literal("main()", 10)).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].matches, 2);
    }

    #[test]
    fn test_result_cap_short_circuits() {
        let temp = sample_repo();
        let fs = RepoFs::new(temp.path());

        let results = search_content(&fs, &ContentSearch::literal("main", 1)).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_invalid_regex() {
        let temp = sample_repo();
        let fs = RepoFs::new(temp.path());

        let mut request = ContentSearch::literal("(unclosed", 10);
        request.regex = true;
        assert!(matches!(
            search_content(&fs, &request),
            Err(ToolError::InvalidPattern(_))
        ));
    }
}
