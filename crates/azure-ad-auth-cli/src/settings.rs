//! Loading [`AadConfig`] from a file and `AAD_*` environment variables

use std::path::Path;

use anyhow::Context;
use azure_ad_auth::AadConfig;
use tracing::debug;

/// Environment variable prefix (`AAD_TENANT_ID`, `AAD_CLIENT_ID`, ...)
pub const ENV_PREFIX: &str = "AAD";

/// Build the configuration: defaults, then the file, then the environment
///
/// # Errors
///
/// Fails when the file cannot be read or parsed, a value has the wrong type,
/// or the resulting configuration does not validate.
pub fn load(file: Option<&Path>) -> anyhow::Result<AadConfig> {
    let mut builder = config::Config::builder();

    if let Some(path) = file {
        debug!(path = %path.display(), "Loading settings file");
        builder = builder.add_source(config::File::from(path).required(true));
    }

    let settings = builder
        .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .build()
        .context("failed to load settings")?;

    let aad: AadConfig = settings
        .try_deserialize()
        .context("invalid settings")?;
    aad.validate()?;
    Ok(aad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use azure_ad_auth::{IdentityClaim, KeySourceKind, NoncePolicy};
    use std::io::Write;

    fn settings_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_toml_file() {
        let file = settings_file(
            r#"
            authority = "https://contoso.b2clogin.com"
            tenant_id = "contoso.onmicrosoft.com"
            client_id = "6731de76-14a6-49ae-97bc-6eba6914391e"
            key_source = "federation_metadata"
            nonce_policy = "skip"
            identity_claim = "upn"
            key_cache_ttl_secs = 120
            "#,
        );

        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.authority, "https://contoso.b2clogin.com");
        assert_eq!(config.key_source, KeySourceKind::FederationMetadata);
        assert_eq!(config.nonce_policy, NoncePolicy::Skip);
        assert_eq!(config.identity_claim, IdentityClaim::Upn);
        assert_eq!(config.key_cache_ttl_secs, 120);
        assert_eq!(config.scope, "openid");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load(Some(Path::new("/nonexistent/aad.toml"))).is_err());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let file = settings_file(
            r#"
            tenant_id = "contoso.onmicrosoft.com"
            client_id = ""
            "#,
        );
        assert!(load(Some(file.path())).is_err());
    }
}
