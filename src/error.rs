//! # Structured Error Handling
//!
//! Every validation call surfaces failures in one shape: a non-empty list of
//! [`ValidationIssue`]s, each carrying a machine-readable [`ErrorCode`], the path
//! of the offending value, and a human message.
//!
//! Internal control flow (supersession, cancellation, timeouts, predicate
//! failures) travels as [`RefinementError`] and is converted into the public
//! shape only at the refinement boundary, so callers never observe raw
//! cancellation or timer state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Structural codes reported by base validators
    InvalidType,
    InvalidValue,
    TooSmall,
    TooBig,
    InvalidFormat,
    MissingProperty,
    UnrecognizedKeys,

    // Refinement engine codes
    Custom,
    AsyncRequired,
    DebounceCancelled,
    Aborted,
    Unknown,
}

impl ErrorCode {
    /// Get human-readable description of the code
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::InvalidType => "Value has the wrong type",
            ErrorCode::InvalidValue => "Value is not one of the accepted values",
            ErrorCode::TooSmall => "Value is below the allowed minimum",
            ErrorCode::TooBig => "Value is above the allowed maximum",
            ErrorCode::InvalidFormat => "Value does not match the expected format",
            ErrorCode::MissingProperty => "Required property is missing",
            ErrorCode::UnrecognizedKeys => "Object contains unrecognized keys",
            ErrorCode::Custom => "Refinement predicate rejected the value",
            ErrorCode::AsyncRequired => "Schema must be validated asynchronously",
            ErrorCode::DebounceCancelled => "Call was superseded by a newer call",
            ErrorCode::Aborted => "Validation was aborted before completion",
            ErrorCode::Unknown => "Unexpected error during validation",
        }
    }

    /// Codes produced by the refinement engine rather than a base validator
    pub fn is_engine_code(&self) -> bool {
        matches!(
            self,
            ErrorCode::Custom
                | ErrorCode::AsyncRequired
                | ErrorCode::DebounceCancelled
                | ErrorCode::Aborted
                | ErrorCode::Unknown
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::InvalidType => "invalid_type",
            ErrorCode::InvalidValue => "invalid_value",
            ErrorCode::TooSmall => "too_small",
            ErrorCode::TooBig => "too_big",
            ErrorCode::InvalidFormat => "invalid_format",
            ErrorCode::MissingProperty => "missing_property",
            ErrorCode::UnrecognizedKeys => "unrecognized_keys",
            ErrorCode::Custom => "custom",
            ErrorCode::AsyncRequired => "async_required",
            ErrorCode::DebounceCancelled => "debounce_cancelled",
            ErrorCode::Aborted => "aborted",
            ErrorCode::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Individual validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: ErrorCode,
    pub path: Vec<String>,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            path: Vec::new(),
            message: message.into(),
        }
    }

    /// Prefix the issue path with the given segments
    pub fn with_path(mut self, prefix: &[String]) -> Self {
        if !prefix.is_empty() {
            let mut path = prefix.to_vec();
            path.append(&mut self.path);
            self.path = path;
        }
        self
    }

    /// Dotted rendering of the path, empty for the root value
    pub fn path_string(&self) -> String {
        self.path.join(".")
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "[{}] {}", self.code, self.message)
        } else {
            write!(f, "[{}] {}: {}", self.code, self.path_string(), self.message)
        }
    }
}

/// Non-empty list of validation failures returned by every validation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "Vec<ValidationIssue>",
    into = "Vec<ValidationIssue>"
)]
pub struct ValidationErrors {
    issues: Vec<ValidationIssue>,
}

impl ValidationErrors {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        debug_assert!(!issues.is_empty(), "ValidationErrors must not be empty");
        Self { issues }
    }

    /// Single-issue failure at the root path
    pub fn single(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(vec![ValidationIssue::new(code, message)])
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn into_issues(self) -> Vec<ValidationIssue> {
        self.issues
    }

    /// Get first issue (most common case)
    pub fn first(&self) -> Option<&ValidationIssue> {
        self.issues.first()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Issues reported for an exact path
    pub fn for_path(&self, path: &[&str]) -> Vec<&ValidationIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.path.iter().map(String::as_str).eq(path.iter().copied()))
            .collect()
    }

    pub fn has_code(&self, code: ErrorCode) -> bool {
        self.issues.iter().any(|issue| issue.code == code)
    }

    /// Prefix every issue path with the given segments
    pub fn with_path(self, prefix: &[String]) -> Self {
        Self {
            issues: self
                .issues
                .into_iter()
                .map(|issue| issue.with_path(prefix))
                .collect(),
        }
    }

    /// Merge several failures into one list, keeping issue order.
    /// Returns `None` when every input was empty.
    pub fn merge(errors: impl IntoIterator<Item = ValidationErrors>) -> Option<Self> {
        let issues: Vec<ValidationIssue> = errors.into_iter().flat_map(|e| e.issues).collect();
        if issues.is_empty() {
            None
        } else {
            Some(Self { issues })
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.issues.as_slice() {
            [] => write!(f, "Validation failed"),
            [only] => write!(f, "Validation failed: {only}"),
            [first, rest @ ..] => write!(
                f,
                "Validation failed: {first} (and {} more issues)",
                rest.len()
            ),
        }
    }
}

impl std::error::Error for ValidationErrors {}

impl From<ValidationIssue> for ValidationErrors {
    fn from(issue: ValidationIssue) -> Self {
        Self::new(vec![issue])
    }
}

/// An issue list was empty where at least one issue is required
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("validation errors must contain at least one issue")]
pub struct EmptyIssueList;

impl TryFrom<Vec<ValidationIssue>> for ValidationErrors {
    type Error = EmptyIssueList;

    fn try_from(issues: Vec<ValidationIssue>) -> std::result::Result<Self, Self::Error> {
        if issues.is_empty() {
            return Err(EmptyIssueList);
        }
        Ok(Self { issues })
    }
}

impl From<ValidationErrors> for Vec<ValidationIssue> {
    fn from(errors: ValidationErrors) -> Self {
        errors.issues
    }
}

/// Why an execution token was cancelled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// The automatic-cancel timer fired
    Timeout(Duration),
    /// A caller-supplied cancellation token fired
    External,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Timeout(after) => {
                write!(f, "timed out after {}ms", after.as_millis())
            }
            AbortReason::External => write!(f, "cancelled by caller"),
        }
    }
}

/// Internal refinement control-flow errors.
///
/// `Clone` so one in-flight outcome can be shared by de-duplicated waiters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefinementError {
    /// A newer debounced call for the same key replaced this one
    #[error("Debounced call superseded by newer call (key: {key})")]
    Superseded { key: String },

    /// The debounce slot was cancelled explicitly
    #[error("Debounced call cancelled (key: {key})")]
    Cancelled { key: String },

    /// The execution token was cancelled before the predicate settled
    #[error("Refinement aborted: {reason}")]
    Aborted { reason: AbortReason },

    /// The predicate itself failed
    #[error("{message}")]
    Predicate { message: String },
}

impl RefinementError {
    pub fn predicate(error: &anyhow::Error) -> Self {
        RefinementError::Predicate {
            message: format!("{error:#}"),
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, RefinementError::Superseded { .. })
    }
}

impl From<RefinementError> for ValidationErrors {
    fn from(error: RefinementError) -> Self {
        let code = match &error {
            RefinementError::Superseded { .. } => ErrorCode::DebounceCancelled,
            RefinementError::Cancelled { .. } | RefinementError::Aborted { .. } => {
                ErrorCode::Aborted
            }
            RefinementError::Predicate { .. } => ErrorCode::Unknown,
        };
        ValidationErrors::single(code, error.to_string())
    }
}

/// Failures of a whole batch run
#[derive(Debug, Clone, thiserror::Error)]
pub enum BatchError {
    #[error("Batch {batch_id} timed out after {}ms", .after.as_millis())]
    TimedOut { batch_id: String, after: Duration },

    #[error("Batch {batch_id} was cancelled")]
    Cancelled { batch_id: String },

    #[error("Batch item {index} failed: {errors}")]
    ItemFailed {
        index: usize,
        id: Option<String>,
        errors: ValidationErrors,
    },
}

/// Invalid engine or run configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, ValidationErrors>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_superseded_maps_to_debounce_cancelled() {
        let errors: ValidationErrors = RefinementError::Superseded {
            key: "k".to_string(),
        }
        .into();
        assert_eq!(errors.first().unwrap().code, ErrorCode::DebounceCancelled);
    }

    #[test]
    fn test_cancel_and_supersede_are_distinguishable() {
        let superseded: ValidationErrors = RefinementError::Superseded {
            key: "k".to_string(),
        }
        .into();
        let cancelled: ValidationErrors = RefinementError::Cancelled {
            key: "k".to_string(),
        }
        .into();
        assert_ne!(superseded.first().unwrap().code, cancelled.first().unwrap().code);
        assert!(cancelled.first().unwrap().message.contains("cancelled"));
    }

    #[test]
    fn test_predicate_message_preserved() {
        let err = anyhow::anyhow!("remote lookup failed");
        let errors: ValidationErrors = RefinementError::predicate(&err).into();
        let issue = errors.first().unwrap();
        assert_eq!(issue.code, ErrorCode::Unknown);
        assert_eq!(issue.message, "remote lookup failed");
    }

    #[test]
    fn test_merge_and_path_helpers() {
        let a = ValidationErrors::single(ErrorCode::TooSmall, "too short");
        let b = ValidationErrors::single(ErrorCode::Custom, "taken").with_path(&["email".to_string()]);
        let merged = ValidationErrors::merge(vec![a, b]).unwrap();

        assert_eq!(merged.len(), 2);
        assert_eq!(merged.for_path(&["email"]).len(), 1);
        assert_eq!(merged.for_path(&[]).len(), 1);
        assert!(merged.has_code(ErrorCode::Custom));
        assert!(ValidationErrors::merge(Vec::new()).is_none());
    }

    #[test]
    fn test_codes_serialize_snake_case() {
        let json = serde_json::to_string(&ErrorCode::DebounceCancelled).unwrap();
        assert_eq!(json, "\"debounce_cancelled\"");
        assert_eq!(ErrorCode::AsyncRequired.to_string(), "async_required");
        assert!(ErrorCode::Aborted.is_engine_code());
        assert!(!ErrorCode::InvalidType.is_engine_code());
    }

    #[test]
    fn test_deserialize_rejects_empty_issue_list() {
        let result = serde_json::from_str::<ValidationErrors>("[]");
        assert!(result.unwrap_err().to_string().contains("at least one issue"));

        let errors: ValidationErrors = serde_json::from_value(serde_json::json!([
            {"code": "custom", "path": ["email"], "message": "taken"}
        ]))
        .unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.first().unwrap().code, ErrorCode::Custom);
        assert_eq!(serde_json::to_value(&errors).unwrap()[0]["message"], "taken");
    }
}
