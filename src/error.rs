use thiserror::Error;

/// Unified error type for git-tagver operations
#[derive(Error, Debug)]
pub enum TagverError {
    #[error("Invalid version '{input}': {reason}")]
    Format { input: String, reason: String },

    #[error("Object reader protocol error ({reader}): {message}")]
    Protocol { reader: String, message: String },

    #[error("Repository is too shallow: {0}")]
    RepoTooShallow(String),

    #[error("Failed to deepen the repository: {0}")]
    AutoDeepenFailed(String),

    #[error("Could not resolve revision '{0}' to a single commit")]
    AmbiguousRevision(String),

    #[error("Version calculation error: {0}")]
    VersionCalculation(String),

    #[error("Command `{program}` failed with exit code {code}: {stderr}")]
    Command {
        program: String,
        code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("Not a git repository or git is not installed: {0}")]
    NotARepository(String),

    #[error("Tag filter error: {0}")]
    Filter(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results in git-tagver
pub type Result<T> = std::result::Result<T, TagverError>;

impl TagverError {
    /// Create a version format error for the given input
    pub fn format(input: impl Into<String>, reason: impl Into<String>) -> Self {
        TagverError::Format {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a protocol error raised by the named object reader
    pub fn protocol(reader: impl Into<String>, message: impl Into<String>) -> Self {
        TagverError::Protocol {
            reader: reader.into(),
            message: message.into(),
        }
    }

    pub fn too_shallow(msg: impl Into<String>) -> Self {
        TagverError::RepoTooShallow(msg.into())
    }

    pub fn deepen_failed(msg: impl Into<String>) -> Self {
        TagverError::AutoDeepenFailed(msg.into())
    }

    pub fn calculation(msg: impl Into<String>) -> Self {
        TagverError::VersionCalculation(msg.into())
    }

    pub fn filter(msg: impl Into<String>) -> Self {
        TagverError::Filter(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        TagverError::InvalidArgument(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        TagverError::Config(msg.into())
    }

    /// Standard error of a failed command, if this is a command failure
    pub fn command_stderr(&self) -> Option<&str> {
        match self {
            TagverError::Command { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TagverError::config("missing key");
        assert_eq!(err.to_string(), "Configuration error: missing key");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: TagverError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_format_error_names_input() {
        let err = TagverError::format("01.0.0", "leading zero");
        let msg = err.to_string();
        assert!(msg.contains("01.0.0"));
        assert!(msg.contains("leading zero"));
    }

    #[test]
    fn test_command_error_carries_streams() {
        let err = TagverError::Command {
            program: "git".to_string(),
            code: 128,
            stdout: String::new(),
            stderr: "fatal: not a git repository".to_string(),
        };

        assert_eq!(err.command_stderr(), Some("fatal: not a git repository"));
        assert!(err.to_string().contains("128"));
        assert!(TagverError::too_shallow("x").command_stderr().is_none());
    }

    #[test]
    fn test_error_messages_are_descriptive() {
        let error_pairs = vec![
            (TagverError::protocol("primary", "x"), "Object reader protocol error"),
            (TagverError::too_shallow("x"), "Repository is too shallow"),
            (TagverError::deepen_failed("x"), "Failed to deepen"),
            (TagverError::calculation("x"), "Version calculation error"),
            (TagverError::filter("x"), "Tag filter error"),
        ];

        for (err, expected_prefix) in error_pairs {
            let msg = err.to_string();
            assert!(
                msg.starts_with(expected_prefix),
                "Error message should start with '{}', but got '{}'",
                expected_prefix,
                msg
            );
        }
    }
}
