//! Common test utilities for integration tests
//!
//! Signing keys with matching self-signed certificates, ID-token minting and a
//! wiremock stand-in for the Azure AD endpoints (federation metadata, OpenID
//! configuration, JWKS).

#![allow(dead_code)]

use std::time::{SystemTime, UNIX_EPOCH};

use azure_ad_auth::{AadConfig, KeySourceKind, NoncePolicy};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use once_cell::sync::Lazy;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TENANT: &str = "contoso.onmicrosoft.com";
pub const CLIENT_ID: &str = "6731de76-14a6-49ae-97bc-6eba6914391e";
pub const NONCE: &str = "DefaultNonce";
pub const ISSUER: &str = "https://login.microsoftonline.com/contoso.onmicrosoft.com/v2.0";
pub const JWKS_PATH: &str = "/discovery/v2.0/keys";

/// RSA signing key with its public half and a self-signed certificate
pub struct TestKey {
    pub kid: String,
    pub private_pem: String,
    pub public: RsaPublicKey,
    pub cert_der: Vec<u8>,
}

impl TestKey {
    pub fn generate(kid: &str) -> Self {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, 2048).expect("Failed to generate RSA key");
        let private_pem = private
            .to_pkcs8_pem(LineEnding::LF)
            .expect("Failed to encode private key")
            .to_string();

        let key_pair = rcgen::KeyPair::from_pem_and_sign_algo(&private_pem, &rcgen::PKCS_RSA_SHA256)
            .expect("rcgen rejected RSA key");
        let cert = rcgen::CertificateParams::new(vec!["login.microsoftonline.com".to_string()])
            .expect("Invalid certificate params")
            .self_signed(&key_pair)
            .expect("Failed to self-sign certificate");

        Self {
            kid: kid.to_string(),
            private_pem,
            public: private.to_public_key(),
            cert_der: cert.der().to_vec(),
        }
    }

    /// JWKS entry carrying `n`/`e` (and the certificate, as Azure does)
    pub fn jwk(&self) -> Value {
        json!({
            "kty": "RSA",
            "use": "sig",
            "alg": "RS256",
            "kid": self.kid,
            "n": URL_SAFE_NO_PAD.encode(self.public.n().to_bytes_be()),
            "e": URL_SAFE_NO_PAD.encode(self.public.e().to_bytes_be()),
            "x5c": [self.cert_b64()],
        })
    }

    /// JWKS entry with only the certificate chain
    pub fn jwk_x5c_only(&self) -> Value {
        json!({
            "kty": "RSA",
            "use": "sig",
            "kid": self.kid,
            "x5c": [self.cert_b64()],
        })
    }

    pub fn cert_b64(&self) -> String {
        STANDARD.encode(&self.cert_der)
    }

    /// Sign claims as an RS256 JWT with this key's `kid`
    pub fn sign(&self, claims: &Value) -> String {
        sign_with_header(claims, &self.private_pem, Some(&self.kid))
    }
}

pub fn sign_with_header(claims: &Value, private_pem: &str, kid: Option<&str>) -> String {
    use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};

    let key = EncodingKey::from_rsa_pem(private_pem.as_bytes()).expect("Invalid RSA key");
    let mut header = Header::new(Algorithm::RS256);
    header.typ = Some("JWT".to_string());
    header.kid = kid.map(str::to_string);

    encode(&header, claims, &key).expect("Failed to encode test JWT")
}

// Key generation dominates test time; share a few keys per test binary
pub static KEY_A: Lazy<TestKey> = Lazy::new(|| TestKey::generate("key-a"));
pub static KEY_B: Lazy<TestKey> = Lazy::new(|| TestKey::generate("key-b"));
pub static KEY_C: Lazy<TestKey> = Lazy::new(|| TestKey::generate("key-c"));

pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs()
}

/// Typical B2C ID-token claims, valid for an hour
pub fn id_token_claims(nonce: Option<&str>) -> Value {
    let now = current_timestamp();
    let mut claims = json!({
        "iss": ISSUER,
        "aud": CLIENT_ID,
        "sub": "AAAAAAAAAAAAAAAAAAAAAIkzqFVrSaSaFHy782bbtaQ",
        "exp": now + 3600,
        "iat": now,
        "nbf": now - 10,
        "upn": "ada@contoso.com",
        "emails": ["ada@contoso.com"],
        "name": "Ada Lovelace",
    });
    if let Some(nonce) = nonce {
        claims["nonce"] = json!(nonce);
    }
    claims
}

/// Federation metadata document embedding the given certificates
pub fn federation_metadata_xml(keys: &[&TestKey]) -> String {
    let descriptors: String = keys
        .iter()
        .map(|key| {
            format!(
                r#"<KeyDescriptor use="signing"><KeyInfo xmlns="http://www.w3.org/2000/09/xmldsig#"><X509Data><X509Certificate>{}</X509Certificate></X509Data></KeyInfo></KeyDescriptor>"#,
                key.cert_b64()
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<EntityDescriptor ID="_metadata" entityID="https://sts.windows.net/{TENANT}/" xmlns="urn:oasis:names:tc:SAML:2.0:metadata">
  <RoleDescriptor xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" protocolSupportEnumeration="http://docs.oasis-open.org/wsfed/federation/200706">
    {descriptors}
  </RoleDescriptor>
</EntityDescriptor>"#
    )
}

/// Wiremock server answering on the Azure AD paths for [`TENANT`]
pub struct MockAzureAd {
    pub server: MockServer,
}

impl MockAzureAd {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Configuration pointing at this server, with refresh rate limiting off
    pub fn config(&self, kind: KeySourceKind) -> AadConfig {
        let mut config = AadConfig::new(TENANT, CLIENT_ID)
            .with_authority(self.uri())
            .with_key_source(kind)
            .with_nonce_policy(NoncePolicy::Enforce);
        config.min_refresh_interval_secs = 0;
        config.http_timeout_secs = 5;
        config
    }

    pub fn federation_metadata_path() -> String {
        format!("/{TENANT}/federationmetadata/2007-06/federationmetadata.xml")
    }

    pub fn openid_configuration_path() -> String {
        format!("/{TENANT}/v2.0/.well-known/openid-configuration")
    }

    pub fn federation_metadata(keys: &[&TestKey]) -> Mock {
        Mock::given(method("GET"))
            .and(path(Self::federation_metadata_path()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(federation_metadata_xml(keys), "application/xml"),
            )
    }

    pub fn openid_configuration(&self) -> Mock {
        Mock::given(method("GET"))
            .and(path(Self::openid_configuration_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": ISSUER,
                "authorization_endpoint": format!("{}/{TENANT}/oauth2/v2.0/authorize", self.uri()),
                "jwks_uri": format!("{}{JWKS_PATH}", self.uri()),
                "id_token_signing_alg_values_supported": ["RS256"],
            })))
    }

    pub fn jwks(keys: &[Value]) -> Mock {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": keys })))
    }

    /// Mount metadata XML with the given certificates
    pub async fn serve_federation_metadata(&self, keys: &[&TestKey]) {
        Self::federation_metadata(keys).mount(&self.server).await;
    }

    /// Mount discovery plus a JWKS with the given keys
    pub async fn serve_jwks(&self, keys: &[&TestKey]) {
        self.openid_configuration().mount(&self.server).await;
        let jwks: Vec<Value> = keys.iter().map(|k| k.jwk()).collect();
        Self::jwks(&jwks).mount(&self.server).await;
    }
}
