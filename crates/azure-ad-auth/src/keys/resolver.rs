//! Raw key material to RSA verification keys
//!
//! Both paths end in an [`RsaPublicKey`] whose modulus and exponent are then
//! handed to `jsonwebtoken` as big-endian unsigned integers. Going through
//! `rsa` first means malformed material is rejected here with
//! [`Error::KeyFormat`] instead of surfacing later as a signature failure.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use jsonwebtoken::DecodingKey;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use tracing::{debug, warn};
use x509_cert::Certificate;
use x509_cert::der::Decode;
use x509_cert::der::asn1::ObjectIdentifier;

use super::{Jwk, KeyOrigin, RawKeyMaterial, VerificationKey};
use crate::error::{Error, Result};

/// rsaEncryption (PKCS #1)
const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");

/// Smallest modulus accepted for signature verification
const MIN_MODULUS_BITS: usize = 1024;

/// Resolve one piece of raw key material into a verification key
///
/// # Errors
///
/// Returns [`Error::KeyFormat`] when the input is neither a DER certificate
/// carrying an RSA key nor an RSA JWK with usable `n`/`e` (or `x5c`).
pub fn resolve(raw: &RawKeyMaterial) -> Result<VerificationKey> {
    match raw {
        RawKeyMaterial::Certificate(der) => {
            let key = rsa_from_certificate(der)?;
            Ok(VerificationKey::new(
                to_decoding_key(&key),
                None,
                KeyOrigin::Certificate,
            ))
        }
        RawKeyMaterial::Jwk(jwk) => {
            let key = rsa_from_jwk(jwk)?;
            Ok(VerificationKey::new(
                to_decoding_key(&key),
                jwk.kid.clone(),
                KeyOrigin::Jwk,
            ))
        }
    }
}

/// Resolve a batch, skipping (and logging) entries that fail
pub fn resolve_all(raw: &[RawKeyMaterial]) -> Vec<VerificationKey> {
    let keys: Vec<VerificationKey> = raw
        .iter()
        .filter_map(|material| match resolve(material) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(
                    key_id = material.key_id(),
                    error = %e,
                    "Skipping unusable signing key"
                );
                None
            }
        })
        .collect();

    debug!(
        fetched = raw.len(),
        usable = keys.len(),
        "Resolved signing keys"
    );
    keys
}

fn rsa_from_certificate(der: &[u8]) -> Result<RsaPublicKey> {
    let cert = Certificate::from_der(der)
        .map_err(|e| Error::KeyFormat(format!("invalid X.509 certificate: {e}")))?;

    let spki = &cert.tbs_certificate.subject_public_key_info;
    if spki.algorithm.oid != RSA_ENCRYPTION {
        return Err(Error::KeyFormat(format!(
            "certificate key algorithm {} is not rsaEncryption",
            spki.algorithm.oid
        )));
    }

    let pkcs1 = spki.subject_public_key.as_bytes().ok_or_else(|| {
        Error::KeyFormat("certificate public key is not octet aligned".to_string())
    })?;

    let key = RsaPublicKey::from_pkcs1_der(pkcs1)
        .map_err(|e| Error::KeyFormat(format!("invalid RSA key in certificate: {e}")))?;
    check_modulus(&key)?;
    Ok(key)
}

fn rsa_from_jwk(jwk: &Jwk) -> Result<RsaPublicKey> {
    if jwk.kty != "RSA" {
        return Err(Error::KeyFormat(format!(
            "unsupported key type `{}`",
            jwk.kty
        )));
    }
    if let Some(key_use) = jwk.key_use.as_deref()
        && key_use != "sig"
    {
        return Err(Error::KeyFormat(format!(
            "key use `{key_use}` is not `sig`"
        )));
    }
    if let Some(alg) = jwk.alg.as_deref()
        && alg != "RS256"
    {
        return Err(Error::KeyFormat(format!("key algorithm `{alg}` is not RS256")));
    }

    match (jwk.n.as_deref(), jwk.e.as_deref()) {
        (Some(n), Some(e)) => rsa_from_components(n, e),
        _ => {
            // Some key sets only publish the certificate chain
            let leaf = jwk
                .x5c
                .as_ref()
                .and_then(|chain| chain.first())
                .ok_or_else(|| {
                    Error::KeyFormat("RSA JWK needs `n` and `e` or an `x5c` chain".to_string())
                })?;
            let der = STANDARD
                .decode(leaf.trim())
                .map_err(|e| Error::KeyFormat(format!("invalid x5c encoding: {e}")))?;
            rsa_from_certificate(&der)
        }
    }
}

fn rsa_from_components(n: &str, e: &str) -> Result<RsaPublicKey> {
    let n = decode_unsigned("n", n)?;
    let e = decode_unsigned("e", e)?;

    let key = RsaPublicKey::new(BigUint::from_bytes_be(&n), BigUint::from_bytes_be(&e))
        .map_err(|err| Error::KeyFormat(format!("invalid RSA components: {err}")))?;
    check_modulus(&key)?;
    Ok(key)
}

/// Base64url member holding a big-endian unsigned integer
fn decode_unsigned(member: &str, value: &str) -> Result<Vec<u8>> {
    let bytes = URL_SAFE_NO_PAD
        .decode(value.trim().trim_end_matches('='))
        .map_err(|e| Error::KeyFormat(format!("JWK member `{member}` is not base64url: {e}")))?;
    if bytes.iter().all(|b| *b == 0) {
        return Err(Error::KeyFormat(format!("JWK member `{member}` is zero")));
    }
    Ok(bytes)
}

fn check_modulus(key: &RsaPublicKey) -> Result<()> {
    let bits = key.n().bits();
    if bits < MIN_MODULUS_BITS {
        return Err(Error::KeyFormat(format!(
            "RSA modulus of {bits} bits is below {MIN_MODULUS_BITS}"
        )));
    }
    Ok(())
}

fn to_decoding_key(key: &RsaPublicKey) -> DecodingKey {
    DecodingKey::from_rsa_raw_components(&key.n().to_bytes_be(), &key.e().to_bytes_be())
}
