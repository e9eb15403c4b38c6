use std::path::PathBuf;
use thiserror::Error;

/// Skelmap error types
///
/// Only conditions that abort a whole command live here. Problems with a
/// single file are recorded on its `SourceUnit` and never surface as an `Error`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config validation error: {0}")]
    ConfigValidation(String),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Directory walk error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("No Python files found under {0}")]
    NoSourceFiles(PathBuf),

    #[error("All {0} files failed to parse")]
    AllFilesFailed(usize),

    #[error("No module matches focus '{0}'")]
    EmptyFocus(String),

    #[error("Parser error: {0}")]
    Parser(String),
}

/// Result type alias for Skelmap operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a config validation error
    pub fn config_validation(msg: impl Into<String>) -> Self {
        Error::ConfigValidation(msg.into())
    }

    /// Create a parser error
    pub fn parser(msg: impl Into<String>) -> Self {
        Error::Parser(msg.into())
    }

    /// Create an empty focus error
    pub fn empty_focus(keyword: impl Into<String>) -> Self {
        Error::EmptyFocus(keyword.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_path_not_found_display() {
        let err = Error::PathNotFound(PathBuf::from("/some/path"));
        assert_eq!(err.to_string(), "Path not found: /some/path");
    }

    #[test]
    fn test_not_a_directory_display() {
        let err = Error::NotADirectory(PathBuf::from("/some/file.py"));
        assert_eq!(err.to_string(), "Not a directory: /some/file.py");
    }

    #[test]
    fn test_config_validation_display() {
        let err = Error::config_validation("max_value_len must be positive");
        assert_eq!(
            err.to_string(),
            "Config validation error: max_value_len must be positive"
        );
    }

    #[test]
    fn test_empty_focus_display() {
        let err = Error::empty_focus("billing");
        assert_eq!(err.to_string(), "No module matches focus 'billing'");
    }

    #[test]
    fn test_parser_error() {
        let err = Error::parser("grammar version mismatch");
        assert_eq!(err.to_string(), "Parser error: grammar version mismatch");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
