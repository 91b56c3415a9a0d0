//! Input Handling Error Types
//!
//! Error taxonomy for the raw-input filter. Most conditions here are expected
//! steady-state occurrences: the interceptor drops the offending report and
//! counts it, it does not propagate them to the host.

use thiserror::Error;

/// Result type for input operations
pub type Result<T> = std::result::Result<T, InputError>;

/// Input module error types
#[derive(Error, Debug)]
pub enum InputError {
    /// The host refused the raw-input device subscription
    #[error("Raw input registration rejected by host: {0}")]
    RegistrationRejected(String),

    /// Second fetch delivered a different byte count than the first call advertised
    #[error("Raw input size mismatch: requested {requested} bytes, delivered {delivered}")]
    ReportSizeMismatch {
        /// Size reported by the sizing call
        requested: u32,
        /// Size returned by the fetch call
        delivered: u32,
    },

    /// Report buffer is truncated or internally inconsistent
    #[error("Malformed raw input report: {0}")]
    MalformedReport(String),

    /// Report header carries a device type we do not know
    #[error("Unknown raw input report type: {0}")]
    UnknownReportType(u32),

    /// Scan code resolved to the sentinel
    #[error("Untranslatable scan code: 0x{0:04X}")]
    Untranslatable(u16),

    /// No window qualified to receive the event
    #[error("No focused target for input")]
    Unrouted,

    /// Scan code remap table could not be built
    #[error("Invalid scan code map: {0}")]
    InvalidScanCodeMap(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error classification for recovery strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// Subscription rejected, fatal to filter construction
    Registration,
    /// Report bytes could not be used
    MalformedReport,
    /// Keyboard input with no emulated equivalent
    Untranslatable,
    /// Focus gate refused the event
    Unrouted,
    /// Remap table or config problems
    Configuration,
    /// Filesystem errors
    Io,
}

/// Classify error for recovery strategy selection
pub fn classify_error(error: &InputError) -> ErrorType {
    match error {
        InputError::RegistrationRejected(_) => ErrorType::Registration,

        InputError::ReportSizeMismatch { .. }
        | InputError::MalformedReport(_)
        | InputError::UnknownReportType(_) => ErrorType::MalformedReport,

        InputError::Untranslatable(_) => ErrorType::Untranslatable,

        InputError::Unrouted => ErrorType::Unrouted,

        InputError::InvalidScanCodeMap(_) => ErrorType::Configuration,

        InputError::Io(_) => ErrorType::Io,
    }
}

/// Recovery action to take after error
///
/// No variant retries; every report is decided exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Discard the report silently
    Drop,

    /// Do not construct the filter; the hosting process keeps running
    AbortConstruction,

    /// Fail and propagate error
    Fail,
}

/// Determine recovery action for error
pub fn recovery_action(error: &InputError) -> RecoveryAction {
    match classify_error(error) {
        ErrorType::Registration => RecoveryAction::AbortConstruction,

        ErrorType::MalformedReport | ErrorType::Untranslatable | ErrorType::Unrouted => {
            RecoveryAction::Drop
        }

        ErrorType::Configuration | ErrorType::Io => RecoveryAction::Fail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let error = InputError::RegistrationRejected("denied".to_string());
        assert_eq!(classify_error(&error), ErrorType::Registration);

        let error = InputError::ReportSizeMismatch {
            requested: 48,
            delivered: 40,
        };
        assert_eq!(classify_error(&error), ErrorType::MalformedReport);

        let error = InputError::UnknownReportType(7);
        assert_eq!(classify_error(&error), ErrorType::MalformedReport);

        let error = InputError::Untranslatable(0xFFFF);
        assert_eq!(classify_error(&error), ErrorType::Untranslatable);

        assert_eq!(classify_error(&InputError::Unrouted), ErrorType::Unrouted);

        let error = InputError::InvalidScanCodeMap("too long".to_string());
        assert_eq!(classify_error(&error), ErrorType::Configuration);
    }

    #[test]
    fn test_steady_state_errors_are_dropped() {
        let errors = [
            InputError::ReportSizeMismatch {
                requested: 48,
                delivered: 0,
            },
            InputError::MalformedReport("short".to_string()),
            InputError::Untranslatable(0xFFFF),
            InputError::Unrouted,
        ];

        for error in &errors {
            assert_eq!(recovery_action(error), RecoveryAction::Drop);
        }
    }

    #[test]
    fn test_registration_failure_aborts_construction() {
        let error = InputError::RegistrationRejected("denied".to_string());
        assert_eq!(recovery_action(&error), RecoveryAction::AbortConstruction);
    }

    #[test]
    fn test_error_display() {
        let error = InputError::ReportSizeMismatch {
            requested: 48,
            delivered: 40,
        };
        assert_eq!(
            error.to_string(),
            "Raw input size mismatch: requested 48 bytes, delivered 40"
        );
        assert_eq!(
            InputError::Untranslatable(0xFFFF).to_string(),
            "Untranslatable scan code: 0xFFFF"
        );
    }
}
