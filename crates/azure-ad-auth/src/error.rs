//! Error types for key discovery, token verification and request authentication
//!
//! Two layers:
//!
//! - [`Error`] carries the detailed failure kind. It is what the key source,
//!   resolver, verifier and claim extractor return, and what ends up in logs.
//! - [`AuthenticationError`] is what the request hook hands back to the web
//!   framework. Every verification failure collapses into
//!   [`AuthenticationError::Failed`] so callers cannot tell which check failed.

use thiserror::Error;

/// Detailed failure kinds for the verification core
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Signing keys could not be fetched or parsed from the identity provider
    #[error("signing keys unavailable from {url}: {reason}")]
    KeySourceUnavailable {
        /// Endpoint that failed
        url: String,
        /// Underlying cause
        reason: String,
    },

    /// Raw key material is neither a usable certificate nor a usable JWK
    #[error("malformed key material: {0}")]
    KeyFormat(String),

    /// No candidate key produced a valid signature
    #[error("token signature could not be verified with any candidate key")]
    SignatureInvalid,

    /// A claim was present but did not carry the expected value
    #[error("claim `{claim}` does not match the expected value")]
    ClaimMismatch {
        /// Claim name
        claim: &'static str,
    },

    /// The token's `exp` lies in the past
    #[error("token has expired")]
    TokenExpired,

    /// A required claim is absent or empty
    #[error("claim `{claim}` is missing or empty")]
    ClaimMissing {
        /// Claim name
        claim: String,
    },

    /// The token is not a structurally valid RS256 JWT
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// Configuration is incomplete or contains an unusable value
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn key_source(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::KeySourceUnavailable {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn claim_missing(claim: impl Into<String>) -> Self {
        Self::ClaimMissing {
            claim: claim.into(),
        }
    }

    /// Short stable label for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::KeySourceUnavailable { .. } => "key_source_unavailable",
            Self::KeyFormat(_) => "key_format",
            Self::SignatureInvalid => "signature_invalid",
            Self::ClaimMismatch { .. } => "claim_mismatch",
            Self::TokenExpired => "token_expired",
            Self::ClaimMissing { .. } => "claim_missing",
            Self::MalformedToken(_) => "malformed_token",
            Self::Config(_) => "config",
        }
    }

    /// Whether fresh signing keys could change the outcome
    pub fn is_key_related(&self) -> bool {
        matches!(self, Self::SignatureInvalid | Self::KeySourceUnavailable { .. })
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported to the request-authentication hook
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthenticationError {
    /// The credentials were rejected; the cause is only logged
    #[error("authentication failed")]
    Failed,

    /// The token was valid but no local account matches its identity
    #[error("no such user")]
    NoSuchUser,

    /// The user directory itself failed
    #[error("user directory error: {0}")]
    Directory(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels_are_distinct() {
        let errors = [
            Error::key_source("https://login.example", "timeout"),
            Error::KeyFormat("bad".into()),
            Error::SignatureInvalid,
            Error::ClaimMismatch { claim: "aud" },
            Error::TokenExpired,
            Error::claim_missing("emails"),
            Error::MalformedToken("bad".into()),
            Error::Config("bad".into()),
        ];
        let mut kinds: Vec<_> = errors.iter().map(Error::kind).collect();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn test_key_related() {
        assert!(Error::SignatureInvalid.is_key_related());
        assert!(Error::key_source("u", "r").is_key_related());
        assert!(!Error::TokenExpired.is_key_related());
        assert!(!Error::ClaimMismatch { claim: "aud" }.is_key_related());
    }

    #[test]
    fn test_authentication_error_is_generic() {
        assert_eq!(AuthenticationError::Failed.to_string(), "authentication failed");
    }
}
