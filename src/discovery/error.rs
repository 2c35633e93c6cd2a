//! Error types for candidate discovery.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while gathering candidate URLs.
///
/// Failures to fetch an individual listing page are not errors: they are
/// logged and the page contributes no candidates.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The seed file could not be read.
    #[error(
        "cannot read seed file {path}: {source}\n  Suggestion: create it with one URL per line, or pass URLs as arguments"
    )]
    SeedFile {
        /// Path of the seed file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The link pattern is not a valid regular expression.
    #[error("invalid link pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The rejected pattern.
        pattern: String,
        /// The regex compile error.
        #[source]
        source: regex::Error,
    },

    /// The HTML archive could not be appended to or read back.
    #[error("HTML archive error at {path}: {source}")]
    Archive {
        /// Path of the archive file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl DiscoveryError {
    /// Creates a seed-file error.
    pub fn seed_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SeedFile {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid-pattern error.
    pub fn invalid_pattern(pattern: impl Into<String>, source: regex::Error) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            source,
        }
    }

    /// Creates an archive error.
    pub fn archive(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Archive {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_file_error_has_suggestion() {
        let error = DiscoveryError::seed_file(
            "urls.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        );
        let msg = error.to_string();
        assert!(msg.contains("urls.txt"));
        assert!(msg.contains("Suggestion"));
    }

    #[test]
    fn test_invalid_pattern_error_names_pattern() {
        let source = regex::Regex::new("(").unwrap_err();
        let msg = DiscoveryError::invalid_pattern("(", source).to_string();
        assert!(msg.contains("invalid link pattern '('"));
    }
}
