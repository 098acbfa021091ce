use std::fmt;

use crate::model::{Ntiid, PrincipalId};

/// Machine-readable error codes for operators and calling services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    InvalidPolicy,
    ContextNotFound,
    PolicyNotFound,
    ItemNotFound,
    PrincipalMismatch,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::InvalidPolicy => "E1002",
            Self::ContextNotFound => "E2001",
            Self::PolicyNotFound => "E2002",
            Self::ItemNotFound => "E2003",
            Self::PrincipalMismatch => "E3001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidPolicy => "Invalid completion policy",
            Self::ContextNotFound => "Completion context not found",
            Self::PolicyNotFound => "No completion policy registered",
            Self::ItemNotFound => "Completable item not found",
            Self::PrincipalMismatch => "Completed item stored for the wrong principal",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix the TOML syntax in the completion config and retry."),
            Self::InvalidPolicy => {
                Some("Use a percentage between 0.0 and 1.0 and a non-negative count.")
            }
            Self::ContextNotFound => Some("Register the completion context before mutating it."),
            Self::PolicyNotFound => {
                Some("Register a policy for the item's mime type or a default policy at startup.")
            }
            Self::ItemNotFound => Some("Check the item NTIID; retired items cannot be awarded."),
            Self::PrincipalMismatch => None,
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors surfaced by completion operations.
///
/// Soft conditions (missing containers, missing denominators, absent
/// progress) are reported through outcomes and logs, not here.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompletionError {
    /// A completed item was offered to another principal's container.
    #[error("completed item '{item}' belongs to '{actual}', not '{expected}'")]
    PrincipalMismatch {
        expected: PrincipalId,
        actual: PrincipalId,
        item: Ntiid,
    },

    #[error("no completion policy for item '{item}' in context '{context}'")]
    PolicyNotFound { item: Ntiid, context: Ntiid },

    #[error("invalid policy {field}: {value}")]
    InvalidPolicy { field: &'static str, value: f64 },

    #[error("completion context not found: {0}")]
    ContextNotFound(Ntiid),

    #[error("completable item not found: {0}")]
    ItemNotFound(Ntiid),
}

impl CompletionError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::PrincipalMismatch { .. } => ErrorCode::PrincipalMismatch,
            Self::PolicyNotFound { .. } => ErrorCode::PolicyNotFound,
            Self::InvalidPolicy { .. } => ErrorCode::InvalidPolicy,
            Self::ContextNotFound(_) => ErrorCode::ContextNotFound,
            Self::ItemNotFound(_) => ErrorCode::ItemNotFound,
        }
    }

    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::ConfigParseError,
            ErrorCode::InvalidPolicy,
            ErrorCode::ContextNotFound,
            ErrorCode::PolicyNotFound,
            ErrorCode::ItemNotFound,
            ErrorCode::PrincipalMismatch,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::PrincipalMismatch.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn errors_map_to_codes() {
        let err = CompletionError::PrincipalMismatch {
            expected: PrincipalId::new("a"),
            actual: PrincipalId::new("b"),
            item: Ntiid::new("tag:x"),
        };
        assert_eq!(err.code(), ErrorCode::PrincipalMismatch);
        assert!(err.to_string().contains("belongs to 'b'"));
        assert!(err.hint().is_none());

        let err = CompletionError::InvalidPolicy {
            field: "percentage",
            value: 2.0,
        };
        assert_eq!(err.code().code(), "E1002");
        assert!(err.hint().is_some());
    }
}
