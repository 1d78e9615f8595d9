//! Integration tests for the retrieval tool executor
//!
//! Runs every action against a temporary repository indexed with a mix of
//! function, class, and file elements.

use codehound::elements::{self, CodeElement, ElementKind};
use codehound::retrieval::{HybridConfig, HybridRetriever};
use codehound::tools::{RepoFs, ToolConfig, ToolError, ToolExecutor};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn write(root: &std::path::Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn setup() -> (TempDir, ToolExecutor) {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    write(
        root,
        "pkg/auth/login.go",
        "package auth\n\ntype Session struct {\n\tUser string\n}\n\nfunc Login(user string) Session {\n\treturn Session{User: user}\n}\n",
    );
    write(root, "pkg/auth/token.go", "package auth\n\nfunc Token() string { return \"login\" }\n");
    write(root, "cmd/app/main.go", "package main\n\nfunc main() {}\n");
    write(root, "notes.txt", "remember to fix login\n");
    write(root, "node_modules/lib/index.js", "login()\n");

    let elements = vec![
        CodeElement::new("s1", ElementKind::Class, "Session", "pkg/auth/login.go")
            .with_lines(3, 5)
            .with_language("go")
            .with_signature("type Session struct")
            .with_code("type Session struct {\n\tUser string\n}"),
        CodeElement::new("f1", ElementKind::Function, "Login", "pkg/auth/login.go")
            .with_lines(7, 9)
            .with_language("go")
            .with_signature("func Login(user string) Session")
            .with_code("func Login(user string) Session {\n\treturn Session{User: user}\n}"),
        CodeElement::new("d1", ElementKind::Documentation, "Login docs", "pkg/auth/login.go")
            .with_lines(6, 6)
            .with_code("// Login starts a session"),
        CodeElement::new("file:cmd/app/main.go", ElementKind::File, "main.go", "cmd/app/main.go")
            .with_lines(1, 3)
            .with_language("go")
            .with_code("package main\n\nfunc main() {}\n"),
        CodeElement::new("m1", ElementKind::Function, "main", "cmd/app/main.go")
            .with_lines(3, 3)
            .with_language("go")
            .with_code("func main() {}"),
    ];

    let mut retriever = HybridRetriever::new(HybridConfig::default());
    retriever.index_elements(&elements, None).unwrap();

    let executor = ToolExecutor::new(Arc::new(retriever), RepoFs::new(root), ToolConfig::default());
    (temp, executor)
}

#[test]
fn test_search_reports_match_counts_and_indexed_elements() {
    let (_temp, executor) = setup();

    let result = executor.execute("search", "login").unwrap();
    let paths: Vec<&str> = result.candidates.iter().map(|c| c.path.as_str()).collect();
    assert_eq!(paths, vec!["notes.txt", "pkg/auth/login.go", "pkg/auth/token.go"]);

    let login = &result.candidates[1];
    assert_eq!(login.matches, 1);
    assert!(result.text.contains("pkg/auth/login.go (1 matches)"));

    // Elements of the indexed matching file
    let ids: Vec<&str> = result.elements.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["s1", "f1", "d1"]);
}

#[test]
fn test_search_with_file_pattern_and_regex() {
    let (_temp, executor) = setup();

    let go_only = executor.content_search("login", Some("*.go"), false).unwrap();
    assert!(go_only.iter().all(|c| c.path.ends_with(".go")));
    assert_eq!(go_only.len(), 2);

    let regex = executor.content_search(r"func \w+\(\)", None, true).unwrap();
    let paths: Vec<&str> = regex.iter().map(|c| c.path.as_str()).collect();
    assert_eq!(paths, vec!["cmd/app/main.go", "pkg/auth/token.go"]);

    assert!(matches!(
        executor.content_search("(unclosed", None, true),
        Err(ToolError::InvalidPattern(_))
    ));
}

#[test]
fn test_list_root_and_subdirectory() {
    let (_temp, executor) = setup();

    let root = executor.execute("list", "").unwrap();
    assert!(root.text.contains("cmd/"));
    assert!(root.text.contains("pkg/"));
    assert!(root.elements.is_empty());
    let files: Vec<&str> = root.candidates.iter().map(|c| c.path.as_str()).collect();
    assert_eq!(files, vec!["notes.txt"]);

    let auth = executor.execute("ls", "pkg/auth").unwrap();
    assert_eq!(auth.candidates.len(), 2);
    assert!(auth.candidates.iter().all(|c| c.matches == 0));
}

#[test]
fn test_read_prefers_file_element() {
    let (_temp, executor) = setup();

    let result = executor.execute("read", "cmd/app/main.go").unwrap();
    assert_eq!(result.elements.len(), 1);
    assert_eq!(result.elements[0].id, "file:cmd/app/main.go");

    // No file element: every indexed element of the file
    let result = executor.execute("read", "pkg/auth/login.go").unwrap();
    assert_eq!(result.elements.len(), 3);

    // Suffix form resolves too
    let result = executor.execute("read", "auth/login.go").unwrap();
    assert_eq!(result.elements.len(), 3);
}

#[test]
fn test_read_unindexed_file_from_disk() {
    let (_temp, executor) = setup();

    let result = executor.execute("read_file", "pkg/auth/token.go").unwrap();
    let element = &result.elements[0];
    assert_eq!(element.id, "file:pkg/auth/token.go");
    assert_eq!(element.kind, ElementKind::File);
    assert_eq!(element.language, "go");
    assert_eq!(element.end_line, 3);
    assert!(element.code.contains("func Token()"));

    assert!(matches!(
        executor.execute("read", "pkg/missing.go"),
        Err(ToolError::FileNotFound(_))
    ));
    assert!(matches!(
        executor.execute("read", "../outside.go"),
        Err(ToolError::PathOutsideRepository(_))
    ));
    assert!(matches!(
        executor.execute("read", "node_modules/lib/index.js"),
        Err(ToolError::ExcludedPath(_))
    ));
    assert!(executor
        .resolve_files(&["node_modules/lib/index.js".to_string()])
        .is_empty());
}

#[test]
fn test_skim_strips_code() {
    let (_temp, executor) = setup();

    let result = executor.execute("skim", "pkg/auth/login.go").unwrap();
    let names: Vec<&str> = result.elements.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Session", "Login"]);
    assert!(result.elements.iter().all(|e| e.code.is_empty()));
    assert!(result.text.contains("func Login(user string) Session"));

    assert!(matches!(
        executor.execute("skim", "notes.txt"),
        Err(ToolError::FileNotFound(_))
    ));
}

#[test]
fn test_query_returns_ranked_elements() {
    let (_temp, executor) = setup();

    let result = executor.execute("query", "login session").unwrap();
    assert!(!result.elements.is_empty());
    assert!(result.elements.iter().any(|e| e.id == "f1"));
    assert!(result.candidates.is_empty());
}

#[test]
fn test_rejects_unknown_and_incomplete_actions() {
    let (_temp, executor) = setup();

    assert!(matches!(
        executor.execute("teleport", "x"),
        Err(ToolError::UnknownAction(_))
    ));
    assert!(matches!(
        executor.execute("search", "  "),
        Err(ToolError::MissingArgument(_))
    ));
    assert!(matches!(
        executor.execute("read", ""),
        Err(ToolError::MissingArgument(_))
    ));
}

#[test]
fn test_repository_loader_feeds_executor() {
    let (temp, _executor) = setup();
    let fs = RepoFs::new(temp.path());

    let loaded = elements::load_repository(&fs, "demo");
    let paths: Vec<&str> = loaded.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "cmd/app/main.go",
            "notes.txt",
            "pkg/auth/login.go",
            "pkg/auth/token.go"
        ]
    );
    assert!(loaded.iter().all(|e| e.repo == "demo" && e.kind == ElementKind::File));

    let mut retriever = HybridRetriever::new(HybridConfig::default());
    retriever.index_elements(&loaded, None).unwrap();
    let executor = ToolExecutor::new(
        Arc::new(retriever),
        RepoFs::new(temp.path()),
        ToolConfig::default(),
    );

    let result = executor.execute("read", "notes.txt").unwrap();
    assert_eq!(result.elements[0].id, "file:notes.txt");
}
