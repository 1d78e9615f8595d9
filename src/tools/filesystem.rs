//! Repository filesystem access: walking, reading, and listing
use super::ToolError;
use ahash::AHashSet;
use std::path::{Component, Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Directory names never descended into
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "vendor",
    "target",
    "build",
    "dist",
    "out",
    "bin",
    "obj",
    "__pycache__",
    ".venv",
    "venv",
    ".tox",
    ".idea",
    ".vscode",
    ".next",
    "coverage",
];

/// Default cap on file size for reads and content search (1MB)
pub const DEFAULT_MAX_FILE_BYTES: u64 = 1024 * 1024;

/// Immediate entry of a listed directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub name: String,
    /// Repository-relative path
    pub path: String,
    pub is_dir: bool,
}

/// Read-only view of a repository checkout
#[derive(Debug, Clone)]
pub struct RepoFs {
    root: PathBuf,
    excluded_dirs: AHashSet<String>,
    max_file_bytes: u64,
}

impl RepoFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            excluded_dirs: DEFAULT_EXCLUDED_DIRS.iter().map(|d| d.to_string()).collect(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }

    /// Replace the excluded directory names
    pub fn with_excluded_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_file_bytes(mut self, max_file_bytes: u64) -> Self {
        self.max_file_bytes = max_file_bytes;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk all non-excluded, non-hidden files, yielding repository-relative
    /// paths with forward slashes
    pub fn walk_files(&self) -> impl Iterator<Item = String> + '_ {
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| !self.is_skipped(entry))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::debug!("Walk error: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter_map(move |entry| {
                entry
                    .path()
                    .strip_prefix(&self.root)
                    .ok()
                    .map(to_rel_string)
            })
    }

    /// Read a repository-relative file as UTF-8 text
    pub fn read_to_string(&self, rel_path: &str) -> Result<String, ToolError> {
        let path = self.resolve(rel_path)?;

        let metadata = std::fs::metadata(&path).map_err(|e| ToolError::Io {
            path: rel_path.to_string(),
            source: e,
        })?;
        if metadata.len() > self.max_file_bytes {
            return Err(ToolError::FileTooLarge {
                path: rel_path.to_string(),
                size: metadata.len(),
            });
        }

        std::fs::read_to_string(&path).map_err(|e| ToolError::Io {
            path: rel_path.to_string(),
            source: e,
        })
    }

    /// List non-hidden immediate entries of a directory, sorted by name
    pub fn list_dir(&self, rel_path: &str) -> Result<Vec<DirEntryInfo>, ToolError> {
        let dir = self.resolve(rel_path)?;
        let read_dir = std::fs::read_dir(&dir).map_err(|e| ToolError::Io {
            path: rel_path.to_string(),
            source: e,
        })?;

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| ToolError::Io {
                path: rel_path.to_string(),
                source: e,
            })?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }

            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let path = entry
                .path()
                .strip_prefix(&self.root)
                .map(to_rel_string)
                .unwrap_or_else(|_| name.clone());

            entries.push(DirEntryInfo { name, path, is_dir });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Whether a repository-relative path exists as a file
    pub fn is_file(&self, rel_path: &str) -> Result<bool, ToolError> {
        self.resolve(rel_path).map(|p| p.is_file())
    }

    /// Join a relative path onto the root, rejecting escapes
    fn resolve(&self, rel_path: &str) -> Result<PathBuf, ToolError> {
        let trimmed = rel_path.trim().trim_start_matches('/');
        let relative = Path::new(if trimmed.is_empty() { "." } else { trimmed });

        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(ToolError::PathOutsideRepository(rel_path.to_string()));
        }
        if self.is_excluded(trimmed) {
            return Err(ToolError::ExcludedPath(rel_path.to_string()));
        }

        Ok(self.root.join(relative))
    }

    /// Whether a relative path runs through a hidden entry or an excluded
    /// directory, the entries the walker never visits
    pub fn is_excluded(&self, rel_path: &str) -> bool {
        Path::new(rel_path.trim()).components().any(|c| match c {
            Component::Normal(part) => {
                let part = part.to_string_lossy();
                part.starts_with('.') || self.excluded_dirs.contains(part.as_ref())
            }
            _ => false,
        })
    }

    fn is_skipped(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return false;
        }

        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') {
            return true;
        }

        entry.file_type().is_dir() && self.excluded_dirs.contains(name.as_ref())
    }
}

fn to_rel_string(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn sample_repo() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("src/main.go"), "package main\n").unwrap();
        fs::write(root.join("src/nested/util.go"), "package nested\n").unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "x").unwrap();
        fs::write(root.join(".git/config"), "x").unwrap();
        fs::write(root.join(".env"), "SECRET=1").unwrap();
        fs::write(root.join("README.md"), "# demo").unwrap();
        temp
    }

    #[test]
    fn test_walk_skips_excluded_and_hidden() {
        let temp = sample_repo();
        let fs = RepoFs::new(temp.path());

        let files: Vec<String> = fs.walk_files().collect();
        assert_eq!(
            files,
            vec!["README.md", "src/main.go", "src/nested/util.go"]
        );
    }

    #[test]
    fn test_list_dir_hides_dotfiles() {
        let temp = sample_repo();
        let fs = RepoFs::new(temp.path());

        let entries = fs.list_dir(".").unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["README.md", "node_modules", "src"]);

        let src = fs.list_dir("src").unwrap();
        assert!(src.iter().any(|e| e.path == "src/nested" && e.is_dir));
        assert!(src.iter().any(|e| e.path == "src/main.go" && !e.is_dir));
    }

    #[test]
    fn test_rejects_parent_escape() {
        let temp = sample_repo();
        let fs = RepoFs::new(temp.path());

        assert!(matches!(
            fs.read_to_string("../etc/passwd"),
            Err(ToolError::PathOutsideRepository(_))
        ));
    }

    #[test]
    fn test_hidden_and_excluded_paths_unreadable() {
        let temp = sample_repo();
        let fs = RepoFs::new(temp.path());

        assert!(fs.is_excluded(".env"));
        assert!(fs.is_excluded("node_modules/pkg/index.js"));
        assert!(fs.is_excluded("src/.cache/x"));
        assert!(!fs.is_excluded("src/main.go"));
        assert!(!fs.is_excluded("./src/main.go"));

        assert!(matches!(
            fs.read_to_string(".env"),
            Err(ToolError::ExcludedPath(_))
        ));
        assert!(matches!(
            fs.is_file("node_modules/pkg/index.js"),
            Err(ToolError::ExcludedPath(_))
        ));
        assert!(fs.list_dir("node_modules").is_err());
        assert!(fs.is_file("src/main.go").unwrap());
    }

    #[test]
    fn test_file_size_cap() {
        let temp = sample_repo();
        let fs = RepoFs::new(temp.path()).with_max_file_bytes(4);

        assert!(matches!(
            fs.read_to_string("src/main.go"),
            Err(ToolError::FileTooLarge { .. })
        ));
    }
}
