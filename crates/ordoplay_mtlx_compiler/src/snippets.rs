// SPDX-License-Identifier: MIT OR Apache-2.0
//! Lookup of snippet text by resource id.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

/// Error loading snippet text
#[derive(Debug, thiserror::Error)]
pub enum SnippetError {
    /// No search path holds the resource
    #[error("snippet '{0}' not found")]
    NotFound(String),

    /// The id tries to leave the search paths
    #[error("invalid snippet id '{0}'")]
    InvalidId(String),

    /// Filesystem failure
    #[error("failed to read snippet '{id}': {source}")]
    Io {
        /// Resource id
        id: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Source of snippet text
pub trait SnippetLoader: Send + Sync {
    /// Load the text for `id`
    fn load(&self, id: &str) -> Result<String, SnippetError>;
}

/// Resolves ids as relative paths under a list of directories, first match wins.
#[derive(Debug, Clone, Default)]
pub struct FsSnippetLoader {
    search_paths: Vec<PathBuf>,
}

impl FsSnippetLoader {
    /// Create a loader over `search_paths`
    pub fn new(search_paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self { search_paths: search_paths.into_iter().collect() }
    }

    /// Directories searched, in order
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

impl SnippetLoader for FsSnippetLoader {
    fn load(&self, id: &str) -> Result<String, SnippetError> {
        let relative = Path::new(id);
        if relative.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(SnippetError::InvalidId(id.to_string()));
        }
        for dir in &self.search_paths {
            let path = dir.join(relative);
            if path.is_file() {
                tracing::debug!("Loading snippet {} from {:?}", id, path);
                return std::fs::read_to_string(&path)
                    .map_err(|source| SnippetError::Io { id: id.to_string(), source });
            }
        }
        Err(SnippetError::NotFound(id.to_string()))
    }
}

/// In-memory snippets, for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct MemorySnippetLoader {
    snippets: HashMap<String, String>,
}

impl MemorySnippetLoader {
    /// Empty loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Register snippet text under `id`
    pub fn with(mut self, id: impl Into<String>, text: impl Into<String>) -> Self {
        self.snippets.insert(id.into(), text.into());
        self
    }
}

impl SnippetLoader for MemorySnippetLoader {
    fn load(&self, id: &str) -> Result<String, SnippetError> {
        self.snippets
            .get(id)
            .cloned()
            .ok_or_else(|| SnippetError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_loader_searches_in_order() {
        let root = std::env::temp_dir().join(format!("ordoplay_snippets_{}", std::process::id()));
        let first = root.join("a");
        let second = root.join("b");
        std::fs::create_dir_all(&first).unwrap();
        std::fs::create_dir_all(&second).unwrap();
        std::fs::write(second.join("wave.glsl"), "Out = sin(In);").unwrap();

        let loader = FsSnippetLoader::new([first, second]);
        assert_eq!(loader.load("wave.glsl").unwrap(), "Out = sin(In);");
        assert!(matches!(loader.load("missing.glsl"), Err(SnippetError::NotFound(_))));
        assert!(matches!(loader.load("../wave.glsl"), Err(SnippetError::InvalidId(_))));
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_memory_loader() {
        let loader = MemorySnippetLoader::new().with("x", "Out = 1.0;");
        assert_eq!(loader.load("x").unwrap(), "Out = 1.0;");
        assert!(loader.load("y").is_err());
    }
}
