use thiserror::Error;

/// Main error type for profilescan
#[derive(Error, Debug)]
pub enum ScanError {
    /// Misconfigured scan: bad dimension, index out of range, bad job count.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Arithmetic overflow: {0}")]
    ArithmeticOverflow(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    #[error("Fit error: {0}")]
    Fit(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while parsing scan log records
#[derive(Error, Debug, PartialEq)]
pub enum RecordError {
    #[error("Missing '=' in field: {field}")]
    MissingSeparator { field: String },

    #[error("Invalid number for {name}: {value}")]
    InvalidNumber { name: String, value: String },

    #[error("Record does not start with nll: {line}")]
    MissingNll { line: String },

    #[error("Malformed POI header: {line}")]
    MalformedHeader { line: String },

    #[error("Unrecognised record: {line}")]
    Unrecognised { line: String },
}

/// Result type alias for profilescan operations
pub type ScanResult<T> = Result<T, ScanError>;

/// Macro for creating invalid-argument errors
#[macro_export]
macro_rules! invalid_argument {
    ($($arg:tt)*) => {
        $crate::ScanError::InvalidArgument(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::ScanError::Config(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = RecordError::InvalidNumber {
            name: "mu".to_string(),
            value: "abc".to_string(),
        };

        assert!(error.to_string().contains("Invalid number"));
        assert!(error.to_string().contains("mu"));
        assert!(error.to_string().contains("abc"));
    }

    #[test]
    fn test_error_conversion() {
        let record_error = RecordError::MissingNll {
            line: "mu=1".to_string(),
        };
        let scan_error: ScanError = record_error.into();

        match scan_error {
            ScanError::Record(_) => (),
            _ => panic!("Expected Record error"),
        }
    }

    #[test]
    fn test_macros() {
        let err = invalid_argument!("bin count must be positive, got {}", 0);
        assert!(matches!(err, ScanError::InvalidArgument(_)));
        let err = config_error!("unknown parameter: {}", "mH");
        assert_eq!(err.to_string(), "Configuration error: unknown parameter: mH");
    }
}
