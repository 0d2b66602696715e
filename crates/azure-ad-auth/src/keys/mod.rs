//! Signing keys: raw material, resolution and caching
//!
//! ```text
//!   KeySource ──fetch──▶ RawKeyMaterial ──resolve──▶ VerificationKey
//!       ▲                                                │
//!       └────────────── KeyCache (TTL, single-flight) ◀──┘
//! ```
//!
//! - [`source`] fetches certificates (federation metadata) or JWKs
//! - [`resolver`] turns them into RSA verification keys
//! - [`cache`] keeps resolved keys per source with a TTL

pub mod cache;
pub mod resolver;
pub mod source;

pub use cache::KeyCache;
pub use resolver::{resolve, resolve_all};
pub use source::KeySource;

use jsonwebtoken::DecodingKey;
use serde::{Deserialize, Serialize};

/// Which provider document the signing keys come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySourceKind {
    /// WS-Federation metadata XML carrying X.509 certificates
    FederationMetadata,
    /// JSON Web Key Set discovered through the OpenID configuration document
    #[default]
    Jwks,
}

impl std::fmt::Display for KeySourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FederationMetadata => f.write_str("federation_metadata"),
            Self::Jwks => f.write_str("jwks"),
        }
    }
}

/// A JSON Web Key as published in a provider's key set
///
/// Only the members needed for RSA verification are typed; everything else
/// is preserved in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type (`RSA` for Azure AD)
    pub kty: String,
    /// Key identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Intended use (`sig`)
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    /// Algorithm hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// RSA modulus, base64url
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA public exponent, base64url
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    /// Certificate chain, standard base64 DER
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x5c: Option<Vec<String>>,
    /// Other members
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Key material exactly as fetched from the provider
#[derive(Debug, Clone, PartialEq)]
pub enum RawKeyMaterial {
    /// DER-encoded X.509 certificate
    Certificate(Vec<u8>),
    /// JWK record
    Jwk(Jwk),
}

impl RawKeyMaterial {
    /// Key id, when the material carries one
    pub fn key_id(&self) -> Option<&str> {
        match self {
            Self::Certificate(_) => None,
            Self::Jwk(jwk) => jwk.kid.as_deref(),
        }
    }
}

/// Where a verification key was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrigin {
    /// X.509 certificate
    Certificate,
    /// JWK modulus/exponent (or its embedded `x5c` certificate)
    Jwk,
}

/// RSA public key ready for RS256 signature verification
#[derive(Clone)]
pub struct VerificationKey {
    key: DecodingKey,
    key_id: Option<String>,
    origin: KeyOrigin,
}

impl VerificationKey {
    pub(crate) fn new(key: DecodingKey, key_id: Option<String>, origin: KeyOrigin) -> Self {
        Self {
            key,
            key_id,
            origin,
        }
    }

    /// Key id (`kid`), if known
    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    /// Source the key was derived from
    pub fn origin(&self) -> KeyOrigin {
        self.origin
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }
}

// Key bytes stay out of Debug output (and therefore out of logs)
impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationKey")
            .field("key_id", &self.key_id)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}
