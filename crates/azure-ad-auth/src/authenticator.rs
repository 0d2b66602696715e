//! Request-authentication hook
//!
//! [`IdTokenAuthenticator`] ties the pieces together for one incoming request:
//!
//! ```text
//! Authorization header ─▶ extract_bearer ─▶ KeyCache::get ─▶ TokenVerifier::verify
//!                                              │ SignatureInvalid
//!                                              ▼
//!                                     KeyCache::refresh (rate limited) ─▶ verify again
//!                                                                         │
//!                       UserDirectory::find_user ◀─ IdentityClaim::extract ◀┘
//! ```
//!
//! Callers only see [`AuthenticationError`]; the detailed [`Error`] is logged.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::claims::{Identity, IdentityClaim, TokenPayload};
use crate::config::AadConfig;
use crate::error::{AuthenticationError, Error, Result};
use crate::keys::KeyCache;
use crate::verify::TokenVerifier;

/// Split `"<scheme> <token>"`, matching the scheme case-insensitively
///
/// Returns `None` when the scheme differs or no token follows it.
///
/// ```rust
/// use azure_ad_auth::authenticator::extract_bearer;
///
/// assert_eq!(extract_bearer("Bearer eyJ0eXAi", "Bearer"), Some("eyJ0eXAi"));
/// assert_eq!(extract_bearer("Basic dXNlcjpwYXNz", "Bearer"), None);
/// ```
pub fn extract_bearer<'a>(header_value: &'a str, scheme: &str) -> Option<&'a str> {
    let (found, rest) = header_value.trim_start().split_once(char::is_whitespace)?;
    if !found.eq_ignore_ascii_case(scheme) {
        return None;
    }
    let token = rest.trim();
    (!token.is_empty()).then_some(token)
}

/// Local account store consulted after a token is verified
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Account record handed back to the application
    type User: Send;
    /// Store failure
    type Error: std::error::Error + Send + Sync + 'static;

    /// Look up the account for a verified identity
    async fn find_user(&self, identity: &Identity) -> std::result::Result<Option<Self::User>, Self::Error>;
}

/// Authenticates requests carrying an Azure AD ID token
#[derive(Debug)]
pub struct IdTokenAuthenticator<D> {
    verifier: TokenVerifier,
    keys: Arc<KeyCache>,
    identity_claim: IdentityClaim,
    scheme: String,
    expected_nonce: Option<String>,
    directory: D,
}

impl<D: UserDirectory> IdTokenAuthenticator<D> {
    /// Assemble from parts; the scheme defaults to `Bearer`
    pub fn new(
        verifier: TokenVerifier,
        keys: Arc<KeyCache>,
        identity_claim: IdentityClaim,
        directory: D,
    ) -> Self {
        Self {
            verifier,
            keys,
            identity_claim,
            scheme: "Bearer".to_string(),
            expected_nonce: None,
            directory,
        }
    }

    /// Build verifier, key cache and settings from the configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration does not validate.
    pub fn from_config(config: &AadConfig, directory: D) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            TokenVerifier::from_config(config),
            Arc::new(KeyCache::from_config(config)?),
            config.identity_claim.clone(),
            directory,
        )
        .with_scheme(config.auth_scheme.clone()))
    }

    /// Authorization scheme that carries the token
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Nonce expected by [`authenticate`](Self::authenticate)
    pub fn with_expected_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.expected_nonce = Some(nonce.into());
        self
    }

    /// Shared key cache
    pub fn key_cache(&self) -> &Arc<KeyCache> {
        &self.keys
    }

    /// User directory
    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Verify a token, refreshing the keys once if no key matched
    ///
    /// # Errors
    ///
    /// Any verification error from [`TokenVerifier::verify`].
    pub async fn verify(&self, token: &str, nonce: Option<&str>) -> Result<TokenPayload> {
        let keys = self.keys.get().await;
        match self.verifier.verify(token, &keys, nonce) {
            Err(e) if e.is_key_related() => {
                debug!(
                    cached_keys = keys.len(),
                    "No cached key verified the token, refreshing signing keys"
                );
                let keys = self.keys.refresh().await;
                self.verifier.verify(token, &keys, nonce)
            }
            result => result,
        }
    }

    /// Verify a token and extract the configured identity claim
    ///
    /// # Errors
    ///
    /// Verification errors, or [`Error::ClaimMissing`] when the identity claim
    /// is absent.
    pub async fn identify(&self, token: &str, nonce: Option<&str>) -> Result<Identity> {
        let payload = self.verify(token, nonce).await?;
        self.identity_claim.extract(&payload)
    }

    /// Authenticate a request from its `Authorization` header
    ///
    /// Uses the nonce set with [`with_expected_nonce`](Self::with_expected_nonce).
    ///
    /// - `Ok(None)`: no credentials for this scheme; let other backends try
    /// - `Ok(Some((user, identity)))`: verified and found in the directory
    ///
    /// # Errors
    ///
    /// See [`authenticate_with_nonce`](Self::authenticate_with_nonce).
    pub async fn authenticate(
        &self,
        authorization: Option<&str>,
    ) -> std::result::Result<Option<(D::User, Identity)>, AuthenticationError> {
        self.authenticate_with_nonce(authorization, self.expected_nonce.as_deref())
            .await
    }

    /// Authenticate a request with an explicit expected nonce
    ///
    /// # Errors
    ///
    /// - [`AuthenticationError::Failed`] for any verification failure
    /// - [`AuthenticationError::NoSuchUser`] when the directory has no match
    /// - [`AuthenticationError::Directory`] when the directory fails
    pub async fn authenticate_with_nonce(
        &self,
        authorization: Option<&str>,
        nonce: Option<&str>,
    ) -> std::result::Result<Option<(D::User, Identity)>, AuthenticationError> {
        let Some(token) = authorization.and_then(|value| extract_bearer(value, &self.scheme))
        else {
            debug!(scheme = %self.scheme, "No credentials for scheme");
            return Ok(None);
        };

        let identity = self.identify(token, nonce).await.map_err(|e: Error| {
            info!(kind = e.kind(), error = %e, "ID token rejected");
            AuthenticationError::Failed
        })?;

        match self.directory.find_user(&identity).await {
            Ok(Some(user)) => {
                debug!(claim = self.identity_claim.claim_name(), "Request authenticated");
                Ok(Some((user, identity)))
            }
            Ok(None) => {
                info!(
                    claim = self.identity_claim.claim_name(),
                    "Verified token has no matching user"
                );
                Err(AuthenticationError::NoSuchUser)
            }
            Err(e) => {
                warn!(error = %e, "User directory lookup failed");
                Err(AuthenticationError::Directory(Box::new(e)))
            }
        }
    }
}
