//! RS256 ID-token verification against a set of candidate keys
//!
//! [`TokenVerifier::verify`] performs:
//!
//! 1. A structural pre-check: three segments, a decodable header and
//!    signature, and `alg == RS256`. Nothing else is accepted, so algorithm-confusion tokens
//!    (`none`, `HS256` signed with a public key) never reach a key.
//! 2. For each candidate key in order: RS256 signature check, then `exp`
//!    (and `nbf`) with leeway, `aud`, the optional `iss`, and the nonce.
//! 3. The first key passing every check yields the [`TokenPayload`].
//!
//! Claim failures do not stop the loop; when several keys are active the
//! token is still given a chance against the remaining ones. If nothing
//! succeeds, the last claim failure is returned when any signature verified,
//! otherwise [`Error::SignatureInvalid`].
//!
//! Only key ids, claim names and failure kinds are logged.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation, decode, decode_header};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::claims::TokenPayload;
use crate::config::AadConfig;
use crate::error::{Error, Result};
use crate::keys::VerificationKey;

/// Whether the `nonce` claim is checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoncePolicy {
    /// The payload `nonce` must equal the expected nonce
    #[default]
    Enforce,
    /// No nonce check (tokens not obtained through the implicit flow)
    Skip,
}

/// Expected values for the claim checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierSettings {
    /// Expected `aud` (the application's client id)
    pub audience: String,
    /// Expected `iss`; unchecked when `None`
    pub issuer: Option<String>,
    /// Nonce policy
    pub nonce_policy: NoncePolicy,
    /// Tolerated clock skew for `exp` / `nbf`
    pub leeway: Duration,
}

impl VerifierSettings {
    /// Settings for an audience with nonce enforcement and 60 s leeway
    pub fn new(audience: impl Into<String>) -> Self {
        Self {
            audience: audience.into(),
            issuer: None,
            nonce_policy: NoncePolicy::default(),
            leeway: Duration::from_secs(60),
        }
    }

    /// Settings derived from the relying-party configuration
    pub fn from_config(config: &AadConfig) -> Self {
        Self {
            audience: config.client_id.clone(),
            issuer: config.expected_issuer.clone(),
            nonce_policy: config.nonce_policy,
            leeway: config.clock_skew(),
        }
    }

    /// Require an issuer
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Set the nonce policy
    pub fn with_nonce_policy(mut self, policy: NoncePolicy) -> Self {
        self.nonce_policy = policy;
        self
    }

    /// Set the clock-skew leeway
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }
}

/// What a single key attempt concluded
enum Attempt {
    /// Signature does not verify under this key
    WrongKey,
    /// Signature verified but a check failed
    Rejected(Error),
}

/// Verifies ID tokens against candidate keys
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    settings: VerifierSettings,
    validation: Validation,
}

impl TokenVerifier {
    /// Create a verifier
    pub fn new(settings: VerifierSettings) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = settings.leeway.as_secs();
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "aud"]);
        validation.set_audience(&[&settings.audience]);
        if let Some(issuer) = &settings.issuer {
            validation.set_issuer(&[issuer]);
        }

        Self {
            settings,
            validation,
        }
    }

    /// Create a verifier from the relying-party configuration
    pub fn from_config(config: &AadConfig) -> Self {
        Self::new(VerifierSettings::from_config(config))
    }

    /// Settings in use
    pub fn settings(&self) -> &VerifierSettings {
        &self.settings
    }

    /// Verify `token` against `keys` (in order)
    ///
    /// `expected_nonce` is compared with the payload `nonce` under
    /// [`NoncePolicy::Enforce`]; a missing expected nonce then fails.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedToken`] when the token is not an RS256 JWT
    /// - [`Error::SignatureInvalid`] when no key verifies the signature
    ///   (including an empty key set)
    /// - [`Error::TokenExpired`] when `exp` has passed
    /// - [`Error::ClaimMismatch`] for `aud`, `iss`, `nbf` or `nonce`
    /// - [`Error::ClaimMissing`] when `exp` or `aud` is absent
    pub fn verify(
        &self,
        token: &str,
        keys: &[VerificationKey],
        expected_nonce: Option<&str>,
    ) -> Result<TokenPayload> {
        let token = token.trim();
        let header_kid = precheck(token)?;

        let mut rejection: Option<Error> = None;

        for key in keys {
            match self.attempt(token, key, expected_nonce) {
                Ok(payload) => {
                    debug!(
                        key_id = ?key.key_id(),
                        header_kid = ?header_kid,
                        "Token verified"
                    );
                    return Ok(payload);
                }
                Err(Attempt::WrongKey) => {
                    trace!(key_id = ?key.key_id(), "Signature does not match key");
                }
                Err(Attempt::Rejected(e)) => {
                    debug!(
                        key_id = ?key.key_id(),
                        kind = e.kind(),
                        error = %e,
                        "Signature verified but token rejected"
                    );
                    rejection = Some(e);
                }
            }
        }

        let error = rejection.unwrap_or(Error::SignatureInvalid);
        debug!(
            candidate_keys = keys.len(),
            kind = error.kind(),
            "Token verification failed"
        );
        Err(error)
    }

    fn attempt(
        &self,
        token: &str,
        key: &VerificationKey,
        expected_nonce: Option<&str>,
    ) -> std::result::Result<TokenPayload, Attempt> {
        let data = decode::<Map<String, Value>>(token, key.decoding_key(), &self.validation)
            .map_err(|e| classify(e.into_kind()))?;

        self.check_nonce(&data.claims, expected_nonce)
            .map_err(Attempt::Rejected)?;

        Ok(TokenPayload::new(data.claims))
    }

    fn check_nonce(&self, claims: &Map<String, Value>, expected: Option<&str>) -> Result<()> {
        match self.settings.nonce_policy {
            NoncePolicy::Skip => {
                debug!("Nonce check skipped by policy");
                Ok(())
            }
            NoncePolicy::Enforce => {
                let actual = claims.get("nonce").and_then(Value::as_str);
                match (expected, actual) {
                    (Some(expected), Some(actual)) if expected == actual => Ok(()),
                    (None, _) => {
                        debug!("Nonce enforced but no expected nonce supplied");
                        Err(Error::ClaimMismatch { claim: "nonce" })
                    }
                    _ => Err(Error::ClaimMismatch { claim: "nonce" }),
                }
            }
        }
    }
}

fn classify(kind: ErrorKind) -> Attempt {
    match kind {
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidRsaKey(_)
        | ErrorKind::InvalidKeyFormat
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::Provider(_) => Attempt::WrongKey,
        ErrorKind::ExpiredSignature => Attempt::Rejected(Error::TokenExpired),
        ErrorKind::InvalidAudience => Attempt::Rejected(Error::ClaimMismatch { claim: "aud" }),
        ErrorKind::InvalidIssuer => Attempt::Rejected(Error::ClaimMismatch { claim: "iss" }),
        ErrorKind::ImmatureSignature => Attempt::Rejected(Error::ClaimMismatch { claim: "nbf" }),
        ErrorKind::MissingRequiredClaim(claim) => Attempt::Rejected(Error::claim_missing(claim)),
        other => Attempt::Rejected(Error::MalformedToken(format!("{other:?}"))),
    }
}

/// Reject anything that is not a compact RS256 JWS; returns the header `kid`
fn precheck(token: &str) -> Result<Option<String>> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(Error::MalformedToken(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }
    if segments.iter().any(|s| s.is_empty()) {
        return Err(Error::MalformedToken("empty segment".to_string()));
    }

    let header = decode_header(token)
        .map_err(|e| Error::MalformedToken(format!("undecodable header: {e}")))?;

    // Past this point a base64 failure inside `decode` can only be the payload
    URL_SAFE_NO_PAD
        .decode(segments[2])
        .map_err(|e| Error::MalformedToken(format!("undecodable signature: {e}")))?;

    if header.alg != Algorithm::RS256 {
        debug!(algorithm = ?header.alg, "Rejecting token with unsupported algorithm");
        return Err(Error::MalformedToken(format!(
            "algorithm {:?} is not RS256",
            header.alg
        )));
    }

    Ok(header.kid)
}
