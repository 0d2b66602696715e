//! Redirect and metadata URL construction
//!
//! Pure string building from an [`AadConfig`]. Query parameters are
//! form-urlencoded and optional parameters that were not supplied are left out
//! entirely rather than sent empty.

use url::Url;

use crate::config::AadConfig;
use crate::error::{Error, Result};

/// Per-login parameters that vary between redirects
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginRequest {
    /// Where the provider posts the ID token back
    pub redirect_uri: Option<String>,
    /// Replay-protection value echoed in the token's `nonce` claim
    pub nonce: Option<String>,
    /// Opaque CSRF value echoed back with the response
    pub state: Option<String>,
}

impl LoginRequest {
    /// Empty request (no optional parameters)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the redirect URI
    pub fn redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    /// Set the nonce
    pub fn nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Set the state
    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }
}

/// Build the provider's authorization (login) redirect URL
///
/// Produces `{authority}/common/oauth2/authorize?{query}`.
///
/// # Errors
///
/// Returns [`Error::Config`] if the authority does not form a valid URL.
///
/// # Example
///
/// ```rust
/// use azure_ad_auth::{AadConfig, LoginRequest, urls::login_url};
///
/// let config = AadConfig::new("contoso.onmicrosoft.com", "my-client-id");
/// let url = login_url(&config, &LoginRequest::new().nonce("n-0S6_WzA2Mj"))?;
/// assert!(url.starts_with("https://login.microsoftonline.com/common/oauth2/authorize?"));
/// assert!(url.contains("prompt=login"));
/// # Ok::<(), azure_ad_auth::Error>(())
/// ```
pub fn login_url(config: &AadConfig, request: &LoginRequest) -> Result<String> {
    let mut params: Vec<(&str, &str)> = vec![
        ("response_type", config.response_type.as_str()),
        ("response_mode", config.response_mode.as_str()),
        ("scope", config.scope.as_str()),
        ("client_id", config.client_id.as_str()),
    ];

    if let Some(redirect_uri) = &request.redirect_uri {
        params.push(("redirect_uri", redirect_uri));
    }
    if let Some(nonce) = &request.nonce {
        params.push(("nonce", nonce));
    }
    if let Some(state) = &request.state {
        params.push(("state", state));
    }
    if config.always_authenticate {
        params.push(("prompt", "login"));
    }

    with_query(
        &format!("{}/common/oauth2/authorize", config.authority_base()),
        &params,
    )
}

/// Build the provider's logout redirect URL
///
/// Produces `{authority}/common/oauth2/logout?post_logout_redirect_uri=...`.
///
/// # Errors
///
/// Returns [`Error::Config`] if the authority does not form a valid URL.
pub fn logout_url(config: &AadConfig, redirect_uri: &str) -> Result<String> {
    with_query(
        &format!("{}/common/oauth2/logout", config.authority_base()),
        &[("post_logout_redirect_uri", redirect_uri)],
    )
}

/// WS-Federation metadata document for the configured tenant
///
/// # Errors
///
/// Returns [`Error::Config`] if the authority does not form a valid URL.
pub fn federation_metadata_url(config: &AadConfig) -> Result<String> {
    with_query(
        &format!(
            "{}/{}/federationmetadata/2007-06/federationmetadata.xml",
            config.authority_base(),
            config.tenant_id
        ),
        &[],
    )
}

/// OpenID Connect discovery document for the configured tenant
///
/// An explicit `openid_config_url` wins. Otherwise the v2.0 document under the
/// tenant is used, with the B2C policy appended as `p` when configured.
///
/// # Errors
///
/// Returns [`Error::Config`] if the resulting URL is invalid.
pub fn openid_configuration_url(config: &AadConfig) -> Result<String> {
    let policy: Vec<(&str, &str)> = config
        .b2c_policy
        .as_deref()
        .map(|p| vec![("p", p)])
        .unwrap_or_default();

    match &config.openid_config_url {
        Some(explicit) => with_query(explicit, &policy),
        None => with_query(
            &format!(
                "{}/{}/v2.0/.well-known/openid-configuration",
                config.authority_base(),
                config.tenant_id
            ),
            &policy,
        ),
    }
}

/// Append `params`, leaving keys the base URL already carries untouched
fn with_query(base: &str, params: &[(&str, &str)]) -> Result<String> {
    let mut url =
        Url::parse(base).map_err(|e| Error::Config(format!("invalid URL `{base}`: {e}")))?;
    let missing: Vec<(&str, &str)> = params
        .iter()
        .filter(|(key, _)| !url.query_pairs().any(|(existing, _)| existing == *key))
        .copied()
        .collect();
    if !missing.is_empty() {
        url.query_pairs_mut().extend_pairs(missing);
    }
    Ok(url.into())
}
