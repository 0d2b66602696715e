//! Configuration for the Azure AD verification core
//!
//! [`AadConfig`] is an explicit record handed to every component at
//! construction. Nothing in the crate reads ambient settings; loading the
//! record from files or the environment is left to the embedding application
//! (the `aad-auth` CLI does it with the `config` crate).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::claims::IdentityClaim;
use crate::error::{Error, Result};
use crate::keys::KeySourceKind;
use crate::verify::NoncePolicy;

/// Public Azure AD authority
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Azure AD / Azure AD B2C relying-party configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AadConfig {
    /// Authority base URL (e.g. `https://login.microsoftonline.com`)
    pub authority: String,
    /// Directory (tenant) identifier or domain
    pub tenant_id: String,
    /// Application (client) identifier; also the expected `aud`
    pub client_id: String,
    /// Requested scope
    pub scope: String,
    /// OIDC `response_type` for the login redirect
    pub response_type: String,
    /// OIDC `response_mode` for the login redirect
    pub response_mode: String,
    /// Append `prompt=login` to force credential entry
    pub always_authenticate: bool,
    /// Where signing keys come from
    pub key_source: KeySourceKind,
    /// Explicit OpenID configuration document URL (JWKS mode)
    pub openid_config_url: Option<String>,
    /// B2C user flow / policy, sent as the `p` query parameter
    pub b2c_policy: Option<String>,
    /// Expected `iss`, checked only when set
    pub expected_issuer: Option<String>,
    /// Whether the `nonce` claim is checked
    pub nonce_policy: NoncePolicy,
    /// Claim that identifies the principal
    pub identity_claim: IdentityClaim,
    /// Authorization header scheme carrying the ID token
    pub auth_scheme: String,
    /// Timeout for each outbound HTTP request, in seconds
    pub http_timeout_secs: u64,
    /// How long resolved signing keys stay cached, in seconds
    pub key_cache_ttl_secs: u64,
    /// Minimum spacing between forced key refreshes, in seconds
    pub min_refresh_interval_secs: u64,
    /// Tolerated clock skew for `exp`/`nbf`, in seconds
    pub clock_skew_secs: u64,
    /// Upper bound for metadata / JWKS response bodies
    pub max_response_bytes: usize,
}

impl Default for AadConfig {
    fn default() -> Self {
        Self {
            authority: DEFAULT_AUTHORITY.to_string(),
            tenant_id: String::new(),
            client_id: String::new(),
            scope: "openid".to_string(),
            response_type: "id_token".to_string(),
            response_mode: "form_post".to_string(),
            always_authenticate: true,
            key_source: KeySourceKind::default(),
            openid_config_url: None,
            b2c_policy: None,
            expected_issuer: None,
            nonce_policy: NoncePolicy::default(),
            identity_claim: IdentityClaim::default(),
            auth_scheme: "Bearer".to_string(),
            http_timeout_secs: 10,
            key_cache_ttl_secs: 600, // 10 minutes
            min_refresh_interval_secs: 5,
            clock_skew_secs: 60,
            max_response_bytes: 1024 * 1024,
        }
    }
}

impl AadConfig {
    /// Create a configuration for a tenant and application with defaults elsewhere
    pub fn new(tenant_id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    /// Override the authority base URL
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into();
        self
    }

    /// Select the signing-key source
    pub fn with_key_source(mut self, kind: KeySourceKind) -> Self {
        self.key_source = kind;
        self
    }

    /// Use an explicit OpenID configuration document
    pub fn with_openid_config_url(mut self, url: impl Into<String>) -> Self {
        self.openid_config_url = Some(url.into());
        self
    }

    /// Target an Azure AD B2C user flow
    pub fn with_b2c_policy(mut self, policy: impl Into<String>) -> Self {
        self.b2c_policy = Some(policy.into());
        self
    }

    /// Require a specific issuer
    pub fn with_expected_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.expected_issuer = Some(issuer.into());
        self
    }

    /// Set the nonce policy
    pub fn with_nonce_policy(mut self, policy: NoncePolicy) -> Self {
        self.nonce_policy = policy;
        self
    }

    /// Set the identity claim
    pub fn with_identity_claim(mut self, claim: IdentityClaim) -> Self {
        self.identity_claim = claim;
        self
    }

    /// Toggle `prompt=login`
    pub fn with_always_authenticate(mut self, always: bool) -> Self {
        self.always_authenticate = always;
        self
    }

    /// HTTP request timeout
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Key cache time-to-live
    pub fn key_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.key_cache_ttl_secs)
    }

    /// Minimum interval between forced key refreshes
    pub fn min_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.min_refresh_interval_secs)
    }

    /// Clock skew leeway
    pub fn clock_skew(&self) -> Duration {
        Duration::from_secs(self.clock_skew_secs)
    }

    /// Authority without a trailing slash
    pub(crate) fn authority_base(&self) -> &str {
        self.authority.trim_end_matches('/')
    }

    /// Check that the record is usable
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the authority or an explicit OpenID
    /// configuration URL is not an absolute http(s) URL, when `client_id` is
    /// empty, or when `tenant_id` is empty but needed to derive an endpoint.
    pub fn validate(&self) -> Result<()> {
        parse_http_url("authority", &self.authority)?;

        if self.client_id.trim().is_empty() {
            return Err(Error::Config("client_id must be set".to_string()));
        }

        if let Some(url) = &self.openid_config_url {
            parse_http_url("openid_config_url", url)?;
        }

        let needs_tenant = match self.key_source {
            KeySourceKind::FederationMetadata => true,
            KeySourceKind::Jwks => self.openid_config_url.is_none(),
        };
        if needs_tenant && self.tenant_id.trim().is_empty() {
            return Err(Error::Config(
                "tenant_id must be set to derive the signing-key endpoint".to_string(),
            ));
        }

        if self.auth_scheme.trim().is_empty() || self.auth_scheme.contains(char::is_whitespace) {
            return Err(Error::Config(
                "auth_scheme must be a single non-empty token".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_http_url(field: &str, value: &str) -> Result<url::Url> {
    let url = url::Url::parse(value)
        .map_err(|e| Error::Config(format!("{field} is not a valid URL: {e}")))?;
    match url.scheme() {
        "https" | "http" => Ok(url),
        other => Err(Error::Config(format!(
            "{field} must use http(s), got `{other}`"
        ))),
    }
}
