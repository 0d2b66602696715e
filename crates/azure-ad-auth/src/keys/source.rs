//! Fetching raw signing-key material from the identity provider
//!
//! Two document types are supported:
//!
//! - **Federation metadata** (`federationmetadata.xml`): every
//!   `ds:X509Certificate` element is collected, deduplicated and
//!   base64-decoded into DER.
//! - **JWKS**: the OpenID configuration document names a `jwks_uri`; its
//!   `keys` array is returned as structured [`Jwk`] records.
//!
//! [`KeySource::try_fetch`] reports failures as
//! [`Error::KeySourceUnavailable`]. [`KeySource::fetch`] is the fail-open
//! variant used on the request path: it logs the cause and returns an empty
//! set so a provider outage degrades into "cannot verify" instead of a fault.
//!
//! # Security Considerations
//!
//! - HTTPS required (plain HTTP only for loopback hosts)
//! - Redirects are not followed; a 3xx answer is a fetch failure
//! - Bounded request timeout and response size
//! - XML parsed without DTD support

use std::collections::HashSet;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{Jwk, KeySourceKind, RawKeyMaterial};
use crate::config::AadConfig;
use crate::error::{Error, Result};
use crate::urls;

/// XML Signature namespace holding `X509Certificate`
const XMLDSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

/// Minimal OpenID Connect discovery document
#[derive(Debug, Deserialize)]
struct OpenIdConfiguration {
    jwks_uri: String,
}

/// JWKS document; entries stay untyped until parsed one by one
#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<serde_json::Value>,
}

/// Fetches signing-key material from one provider endpoint
#[derive(Debug, Clone)]
pub struct KeySource {
    kind: KeySourceKind,
    /// Federation metadata URL or OpenID configuration URL
    endpoint: String,
    http_client: reqwest::Client,
    max_response_bytes: usize,
}

impl KeySource {
    /// Build the source selected by `config.key_source`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the endpoint cannot be derived, is not
    /// HTTPS (outside loopback), or the HTTP client cannot be created.
    pub fn from_config(config: &AadConfig) -> Result<Self> {
        let endpoint = match config.key_source {
            KeySourceKind::FederationMetadata => urls::federation_metadata_url(config)?,
            KeySourceKind::Jwks => urls::openid_configuration_url(config)?,
        };
        Self::with_endpoint(
            config.key_source,
            endpoint,
            config.http_timeout(),
            config.max_response_bytes,
        )
    }

    /// Build a source for an explicit endpoint
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the endpoint is not an acceptable URL or
    /// the HTTP client cannot be created.
    pub fn with_endpoint(
        kind: KeySourceKind,
        endpoint: impl Into<String>,
        timeout: Duration,
        max_response_bytes: usize,
    ) -> Result<Self> {
        let endpoint = endpoint.into();
        check_endpoint(&endpoint).map_err(Error::Config)?;

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(format!("azure-ad-auth/{}", env!("CARGO_PKG_VERSION")))
            // A redirect target would bypass the endpoint check
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            kind,
            endpoint,
            http_client,
            max_response_bytes,
        })
    }

    /// Document type this source reads
    pub fn kind(&self) -> KeySourceKind {
        self.kind
    }

    /// Endpoint fetched first (metadata or OpenID configuration)
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch keys, degrading every failure into an empty set
    pub async fn fetch(&self) -> Vec<RawKeyMaterial> {
        match self.try_fetch().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(
                    source = %self.kind,
                    endpoint = %self.endpoint,
                    error = %e,
                    "Signing key fetch failed, continuing with no keys"
                );
                Vec::new()
            }
        }
    }

    /// Fetch keys, reporting the cause of any failure
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeySourceUnavailable`] on network failures, non-success
    /// statuses, oversized or malformed documents, missing fields, or when the
    /// document yields no keys at all.
    pub async fn try_fetch(&self) -> Result<Vec<RawKeyMaterial>> {
        info!(source = %self.kind, endpoint = %self.endpoint, "Fetching signing keys");

        let keys = match self.kind {
            KeySourceKind::FederationMetadata => self.fetch_certificates().await?,
            KeySourceKind::Jwks => self.fetch_jwks().await?,
        };

        info!(
            source = %self.kind,
            key_count = keys.len(),
            "Successfully fetched signing keys"
        );
        Ok(keys)
    }

    async fn fetch_certificates(&self) -> Result<Vec<RawKeyMaterial>> {
        let body = self.get(&self.endpoint).await?;
        let text = String::from_utf8(body)
            .map_err(|e| Error::key_source(&self.endpoint, format!("metadata is not UTF-8: {e}")))?;

        let certificates = parse_federation_metadata(&text)
            .map_err(|reason| Error::key_source(&self.endpoint, reason))?;

        Ok(certificates
            .into_iter()
            .map(RawKeyMaterial::Certificate)
            .collect())
    }

    async fn fetch_jwks(&self) -> Result<Vec<RawKeyMaterial>> {
        let body = self.get(&self.endpoint).await?;
        let discovery: OpenIdConfiguration = serde_json::from_slice(&body).map_err(|e| {
            Error::key_source(&self.endpoint, format!("invalid OpenID configuration: {e}"))
        })?;

        debug!(jwks_uri = %discovery.jwks_uri, "Discovered JWKS URI");
        check_endpoint(&discovery.jwks_uri)
            .map_err(|reason| Error::key_source(&discovery.jwks_uri, reason))?;

        let body = self.get(&discovery.jwks_uri).await?;
        let document: JwksDocument = serde_json::from_slice(&body).map_err(|e| {
            Error::key_source(&discovery.jwks_uri, format!("invalid JWKS document: {e}"))
        })?;

        let keys: Vec<RawKeyMaterial> = document
            .keys
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| match serde_json::from_value::<Jwk>(value) {
                Ok(jwk) => Some(RawKeyMaterial::Jwk(jwk)),
                Err(e) => {
                    warn!(index, error = %e, "Ignoring malformed JWKS entry");
                    None
                }
            })
            .collect();

        if keys.is_empty() {
            return Err(Error::key_source(&discovery.jwks_uri, "key set is empty"));
        }
        Ok(keys)
    }

    /// GET with status and size checks
    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::key_source(url, format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::key_source(
                url,
                format!("HTTP {}", response.status()),
            ));
        }

        if let Some(content_length) = response.content_length()
            && content_length > self.max_response_bytes as u64
        {
            return Err(Error::key_source(url, "response size limit exceeded"));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::key_source(url, format!("failed to read response: {e}")))?;

        if body.len() > self.max_response_bytes {
            return Err(Error::key_source(url, "response size limit exceeded"));
        }

        Ok(body.to_vec())
    }
}

/// Extract DER certificates from a federation metadata document
///
/// Certificate text is whitespace-stripped and deduplicated; first-seen order
/// is kept. Entries that are not valid base64 are skipped.
///
/// # Errors
///
/// Returns a description when the XML cannot be parsed or holds no usable
/// certificate.
pub fn parse_federation_metadata(xml: &str) -> std::result::Result<Vec<Vec<u8>>, String> {
    let document =
        roxmltree::Document::parse(xml).map_err(|e| format!("invalid metadata XML: {e}"))?;

    let mut seen = HashSet::new();
    let mut certificates = Vec::new();

    for node in document
        .descendants()
        .filter(|n| n.has_tag_name((XMLDSIG_NS, "X509Certificate")))
    {
        let Some(text) = node.text() else { continue };
        let compact: String = text.split_whitespace().collect();
        if compact.is_empty() || !seen.insert(compact.clone()) {
            continue;
        }

        match STANDARD.decode(&compact) {
            Ok(der) => certificates.push(der),
            Err(e) => warn!(error = %e, "Ignoring undecodable X509Certificate element"),
        }
    }

    if certificates.is_empty() {
        return Err("metadata holds no X509Certificate elements".to_string());
    }
    Ok(certificates)
}

/// HTTPS, or plain HTTP towards a loopback host
fn check_endpoint(endpoint: &str) -> std::result::Result<(), String> {
    let url = url::Url::parse(endpoint).map_err(|e| format!("invalid URL `{endpoint}`: {e}"))?;

    let is_loopback = match url.host() {
        Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    };

    match url.scheme() {
        "https" => Ok(()),
        "http" if is_loopback => Ok(()),
        _ => Err(format!(
            "signing keys must be fetched over HTTPS (HTTP only allowed for loopback): `{endpoint}`"
        )),
    }
}
