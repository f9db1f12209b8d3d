//! Error types for the logger system

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// A named output manager could not be created
    #[error("Unable to create manager '{name}': {message}")]
    ManagerCreation { name: String, message: String },

    /// Write attempted on a manager whose sink has been closed
    #[error("Manager '{name}' is closed")]
    ManagerClosed { name: String },

    /// Formatter error with format type
    #[error("Formatter error ({format_type}): {message}")]
    FormatterError {
        format_type: String,
        message: String,
    },

    /// Writer error (generic)
    #[error("Writer error: {0}")]
    WriterError(String),

    /// Logger already stopped
    #[error("Logger already stopped")]
    LoggerStopped,

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl LoggerError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a manager creation error
    pub fn manager_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::ManagerCreation {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn manager_closed(name: impl Into<String>) -> Self {
        LoggerError::ManagerClosed { name: name.into() }
    }

    /// Create a formatter error
    pub fn formatter(format_type: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FormatterError {
            format_type: format_type.into(),
            message: message.into(),
        }
    }

    /// Create a writer error (generic)
    pub fn writer<S: Into<String>>(msg: S) -> Self {
        LoggerError::WriterError(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LoggerError::Other(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = LoggerError::config("ThresholdFilter", "Invalid level 'LOUD'");
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));

        let err = LoggerError::manager_creation("/var/log/app.log", "Permission denied");
        assert!(matches!(err, LoggerError::ManagerCreation { .. }));

        let err = LoggerError::manager_closed("app");
        assert!(matches!(err, LoggerError::ManagerClosed { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = LoggerError::config("ThresholdFilter", "Invalid level 'LOUD'");
        assert_eq!(
            err.to_string(),
            "Invalid configuration for ThresholdFilter: Invalid level 'LOUD'"
        );

        let err = LoggerError::manager_creation("/var/log/app.log", "Disk full");
        assert_eq!(
            err.to_string(),
            "Unable to create manager '/var/log/app.log': Disk full"
        );

        let err = LoggerError::formatter("JSON", "Invalid field type");
        assert_eq!(err.to_string(), "Formatter error (JSON): Invalid field type");
    }

    #[test]
    fn test_io_operation_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = LoggerError::io_operation("flushing buffer", "cannot write to sink", io_err);

        assert!(matches!(err, LoggerError::IoOperation { .. }));
        assert!(err.to_string().contains("flushing buffer"));
        assert!(err.to_string().contains("cannot write to sink"));
    }
}
