//! Verified token payloads and identity extraction
//!
//! A [`TokenPayload`] only comes out of
//! [`TokenVerifier::verify`](crate::verify::TokenVerifier::verify), so every
//! value read here has passed the signature and claim checks. Which claim
//! names the principal depends on the tenant type:
//!
//! | Tenant          | Claim            | [`IdentityClaim`]  |
//! |-----------------|------------------|--------------------|
//! | Azure AD        | `upn`            | `Upn`              |
//! | Azure AD (v2.0) | `email`          | `Email`            |
//! | Azure AD B2C    | `emails[0]`      | `FirstEmail`       |

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Claim set of a verified token
#[derive(Debug, Clone, PartialEq)]
pub struct TokenPayload(Map<String, Value>);

impl TokenPayload {
    pub(crate) fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    /// Raw claim value
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Claim names present in the payload
    pub fn claim_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Whether the payload carries no claims
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Underlying claim map
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Read a claim, falling back to `default`
///
/// The default applies when there is no payload, the payload is empty, or the
/// claim is absent.
pub fn extract(payload: Option<&TokenPayload>, name: &str, default: Option<Value>) -> Option<Value> {
    payload
        .filter(|p| !p.is_empty())
        .and_then(|p| p.field(name))
        .cloned()
        .or(default)
}

/// Read a string claim; `None` when absent or not a string
pub fn extract_str<'a>(payload: &'a TokenPayload, name: &str) -> Option<&'a str> {
    payload.field(name).and_then(Value::as_str)
}

/// First entry of the B2C `emails` array
///
/// # Errors
///
/// Returns [`Error::ClaimMissing`] when `emails` is absent, not an array,
/// empty, or does not start with a non-empty string.
pub fn first_email(payload: &TokenPayload) -> Result<Identity> {
    payload
        .field("emails")
        .and_then(Value::as_array)
        .and_then(|emails| emails.first())
        .and_then(Value::as_str)
        .and_then(Identity::new)
        .ok_or_else(|| Error::claim_missing("emails"))
}

/// Application-level principal name taken from a verified token
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    /// Wrap a non-blank value; surrounding whitespace is trimmed
    pub fn new(value: impl AsRef<str>) -> Option<Self> {
        let value = value.as_ref().trim();
        (!value.is_empty()).then(|| Self(value.to_string()))
    }

    /// Identity as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the owned string
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Which claim identifies the principal
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityClaim {
    /// `upn`
    Upn,
    /// `email`
    Email,
    /// `emails[0]` (Azure AD B2C)
    #[default]
    FirstEmail,
    /// `sub`
    Subject,
    /// Any other string claim
    Custom(String),
}

impl IdentityClaim {
    /// Claim name as it appears in the payload
    pub fn claim_name(&self) -> &str {
        match self {
            Self::Upn => "upn",
            Self::Email => "email",
            Self::FirstEmail => "emails",
            Self::Subject => "sub",
            Self::Custom(name) => name,
        }
    }

    /// Pull the identity out of a verified payload
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClaimMissing`] when the claim is absent, not a string,
    /// or blank.
    pub fn extract(&self, payload: &TokenPayload) -> Result<Identity> {
        match self {
            Self::FirstEmail => first_email(payload),
            other => extract_str(payload, other.claim_name())
                .and_then(Identity::new)
                .ok_or_else(|| Error::claim_missing(other.claim_name())),
        }
    }
}
