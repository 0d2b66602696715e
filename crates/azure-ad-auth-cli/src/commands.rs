//! Subcommand implementations
//!
//! Each command returns the text to print so it can be exercised without a
//! terminal.

use anyhow::Context;
use azure_ad_auth::keys::{KeyOrigin, resolve_all};
use azure_ad_auth::urls::{self, LoginRequest};
use azure_ad_auth::{AadConfig, KeySource, TokenVerifier};
use tracing::info;

/// Authorization redirect URL
///
/// # Errors
///
/// Fails when the authority does not form a valid URL.
pub fn login_url(
    config: &AadConfig,
    redirect_uri: Option<String>,
    nonce: Option<String>,
    state: Option<String>,
) -> anyhow::Result<String> {
    let request = LoginRequest {
        redirect_uri,
        nonce,
        state,
    };
    Ok(urls::login_url(config, &request)?)
}

/// Logout redirect URL
///
/// # Errors
///
/// Fails when the authority does not form a valid URL.
pub fn logout_url(config: &AadConfig, redirect_uri: &str) -> anyhow::Result<String> {
    Ok(urls::logout_url(config, redirect_uri)?)
}

/// One line per usable signing key: `<kid>\t<origin>`
///
/// # Errors
///
/// Fails when the provider cannot be reached or publishes no usable key.
pub async fn keys(config: &AadConfig) -> anyhow::Result<String> {
    let source = KeySource::from_config(config)?;
    let raw = source.try_fetch().await?;
    let keys = resolve_all(&raw);
    if keys.is_empty() {
        anyhow::bail!(
            "{} published {} key(s), none usable for RS256",
            source.endpoint(),
            raw.len()
        );
    }

    info!(source = %source.kind(), usable = keys.len(), "Resolved signing keys");

    Ok(keys
        .iter()
        .map(|key| {
            let origin = match key.origin() {
                KeyOrigin::Certificate => "certificate",
                KeyOrigin::Jwk => "jwk",
            };
            format!("{}\t{origin}", key.key_id().unwrap_or("-"))
        })
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Identity and claim names of a verified token
///
/// # Errors
///
/// Fails when the keys cannot be fetched, the token does not verify, or the
/// identity claim is missing.
pub async fn verify(config: &AadConfig, token: &str, nonce: Option<&str>) -> anyhow::Result<String> {
    let source = KeySource::from_config(config)?;
    let keys = resolve_all(&source.try_fetch().await?);

    let payload = TokenVerifier::from_config(config)
        .verify(token, &keys, nonce)
        .context("token rejected")?;
    let identity = config.identity_claim.extract(&payload)?;

    let claims: Vec<&str> = payload.claim_names().collect();
    Ok(format!(
        "identity: {identity}\nclaims: {}",
        claims.join(", ")
    ))
}
