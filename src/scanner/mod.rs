//! Scanner module for lore directory traversal.
//!
//! This module provides:
//! - Sequential, deterministic directory walking using walkdir
//! - Extension filtering (by default `.md` and `.txt`)
//! - Gitignore-style pattern matching and hidden-file skipping
//!
//! # Example
//!
//! ```no_run
//! use lorekeeper::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("data"), WalkerConfig::default());
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}", file.source),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod walker;

use std::path::PathBuf;

pub use walker::Walker;

/// Extensions ingested when none are configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &["md", "txt"];

/// A qualifying file discovered during a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path as produced by the walk (root joined with the relative path)
    pub path: PathBuf,
    /// The same path as a string; this is the cache key and document source
    pub source: String,
}

/// Configuration for directory walking.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// File extensions to include, without the leading dot.
    /// Matching is case-insensitive.
    pub extensions: Vec<String>,

    /// Follow symbolic links during traversal.
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,

    /// Glob patterns to ignore (gitignore-style).
    /// These are applied in addition to any .gitignore file at the root.
    pub ignore_patterns: Vec<String>,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| (*s).to_string()).collect(),
            follow_symlinks: false,
            skip_hidden: false,
            ignore_patterns: Vec::new(),
        }
    }
}

impl WalkerConfig {
    /// Replace the extension filter.
    ///
    /// Leading dots are stripped and extensions are lowercased, so `".MD"`,
    /// `"md"` and `".md"` are equivalent.
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| normalize_extension(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    /// Whether a file name passes the extension filter.
    #[must_use]
    pub fn matches_extension(&self, file_name: &str) -> bool {
        let Some((_, ext)) = file_name.rsplit_once('.') else {
            return false;
        };
        let ext = ext.to_lowercase();
        self.extensions.iter().any(|e| *e == ext)
    }
}

/// Canonical form of an extension: no leading dot, lowercase.
#[must_use]
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The path cannot be used as a cache key because it is not valid UTF-8.
    #[error("Path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
