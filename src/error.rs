//! Error taxonomy for reconciliation.
//!
//! Every remote-call failure is caught where the call is made and turned
//! into one of these variants, either as the terminal error of a run or as
//! a soft-success warning.

use std::fmt;

/// Why a remote server refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// 403: the access token lacks the `push` scope.
    Scope,
    /// 404: the resource or the whole push API is missing.
    NotFound,
    /// Any other status.
    Other,
}

impl RejectionKind {
    /// Classify an HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            403 => Self::Scope,
            404 => Self::NotFound,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scope => write!(f, "missing push scope"),
            Self::NotFound => write!(f, "missing push API"),
            Self::Other => write!(f, "request rejected"),
        }
    }
}

/// A value the engine needs before it can address the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// Push-delivery device id.
    DeviceId,
    /// Account access token.
    AccessToken,
    /// Relay installation id.
    InstallId,
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceId => write!(f, "missing device id"),
            Self::AccessToken => write!(f, "missing access token"),
            Self::InstallId => write!(f, "missing install id"),
        }
    }
}

/// Terminal (or warning) condition of a reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    /// The account or server cannot support push subscriptions.
    #[error("push subscription is not supported: {detail}")]
    Unsupported {
        /// What is unsupported, e.g. the detected server version.
        detail: String,
    },

    /// A remote call got no response (network failure, timeout, cancellation).
    #[error("server unreachable: {detail}")]
    Unreachable {
        /// Transport-level description.
        detail: String,
    },

    /// A locally provisioned value is missing.
    #[error("{0}")]
    MissingPrecondition(Precondition),

    /// Another installation holds write priority for this access token.
    #[error("access token is in use by another installation")]
    TokenSuperseded,

    /// A remote server answered with a non-success status.
    #[error("{kind} (HTTP {status})")]
    RemoteRejected {
        /// HTTP status code.
        status: u16,
        /// Classification of the status.
        kind: RejectionKind,
    },

    /// A response could not be interpreted.
    #[error("internal error: {detail}")]
    Internal {
        /// Description of the problem.
        detail: String,
    },
}

impl ReconcileError {
    /// Server-version or account-type incompatibility.
    pub fn unsupported(detail: impl Into<String>) -> Self {
        Self::Unsupported {
            detail: detail.into(),
        }
    }

    /// No response from a remote call.
    pub fn unreachable(detail: impl Into<String>) -> Self {
        Self::Unreachable {
            detail: detail.into(),
        }
    }

    /// Unexpected or malformed response.
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            detail: detail.into(),
        }
    }

    /// Non-success status from a remote server.
    pub fn rejected(status: u16) -> Self {
        Self::RemoteRejected {
            status,
            kind: RejectionKind::from_status(status),
        }
    }

    /// Whether running the reconciliation again may succeed without
    /// changing the server.
    ///
    /// Missing preconditions count as retryable: the caller fixes them
    /// externally and runs again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Unsupported { .. })
    }
}

/// Failure reported by a [`Transport`](crate::transport::Transport).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connection failure or timeout.
    #[error("{0}")]
    Unreachable(String),
    /// The caller cancelled the call.
    #[error("request cancelled")]
    Cancelled,
}

impl From<TransportError> for ReconcileError {
    fn from(err: TransportError) -> Self {
        Self::unreachable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_kind_from_status() {
        assert_eq!(RejectionKind::from_status(403), RejectionKind::Scope);
        assert_eq!(RejectionKind::from_status(404), RejectionKind::NotFound);
        assert_eq!(RejectionKind::from_status(500), RejectionKind::Other);
    }

    #[test]
    fn test_messages_are_human_readable() {
        assert_eq!(
            ReconcileError::unsupported("server version 2.3.3").to_string(),
            "push subscription is not supported: server version 2.3.3"
        );
        assert_eq!(
            ReconcileError::MissingPrecondition(Precondition::InstallId).to_string(),
            "missing install id"
        );
        assert_eq!(
            ReconcileError::rejected(403).to_string(),
            "missing push scope (HTTP 403)"
        );
    }

    #[test]
    fn test_only_unsupported_is_terminal() {
        assert!(!ReconcileError::unsupported("pseudo account").is_retryable());
        assert!(ReconcileError::TokenSuperseded.is_retryable());
        assert!(ReconcileError::MissingPrecondition(Precondition::DeviceId).is_retryable());
        assert!(ReconcileError::from(TransportError::Cancelled).is_retryable());
    }
}
