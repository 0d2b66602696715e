//! # Azure AD Auth - ID-token verification for Azure AD and Azure AD B2C
//!
//! Validates OpenID Connect ID tokens issued through the implicit / hybrid
//! flow and hands the verified identity to the application's user store.
//!
//! ## Key Features
//!
//! - **Login / logout redirects** - authorize and logout URLs from configuration
//! - **Two key sources** - WS-Federation metadata certificates or JWKS via
//!   OpenID discovery (including B2C user flows)
//! - **RS256 only** - algorithm-confusion tokens are rejected before any key is tried
//! - **Claim checks** - `aud`, `exp`/`nbf` with leeway, optional `iss`, nonce
//! - **Key caching** - TTL, single-flight fetches, rate-limited refresh on rotation
//!
//! ## Architecture
//!
//! - [`config`] - [`AadConfig`], the explicit configuration record
//! - [`urls`] - authorization, logout and metadata URLs
//! - [`keys`] - key sources, resolution to RSA keys and the key cache
//! - [`verify`] - [`TokenVerifier`]
//! - [`claims`] - [`TokenPayload`], [`Identity`] and claim extraction
//! - [`authenticator`] - the request hook and the [`UserDirectory`] seam
//! - [`error`] - [`Error`] and [`AuthenticationError`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use azure_ad_auth::{AadConfig, Identity, IdTokenAuthenticator, UserDirectory};
//!
//! struct Accounts;
//!
//! #[async_trait::async_trait]
//! impl UserDirectory for Accounts {
//!     type User = String;
//!     type Error = std::io::Error;
//!
//!     async fn find_user(&self, identity: &Identity) -> Result<Option<String>, std::io::Error> {
//!         Ok(Some(identity.to_string()))
//!     }
//! }
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AadConfig::new("contoso.onmicrosoft.com", "6731de76-14a6-49ae-97bc-6eba6914391e")
//!     .with_b2c_policy("B2C_1_SignUpSignIn");
//! let auth = IdTokenAuthenticator::from_config(&config, Accounts)?
//!     .with_expected_nonce("DefaultNonce");
//!
//! if let Some((user, identity)) = auth.authenticate(Some("Bearer eyJ0eXAi...")).await? {
//!     println!("{user} signed in as {identity}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod authenticator;
pub mod claims;
pub mod config;
pub mod error;
pub mod keys;
pub mod urls;
pub mod verify;

#[doc(inline)]
pub use authenticator::{IdTokenAuthenticator, UserDirectory, extract_bearer};
#[doc(inline)]
pub use claims::{Identity, IdentityClaim, TokenPayload};
#[doc(inline)]
pub use config::{AadConfig, DEFAULT_AUTHORITY};
#[doc(inline)]
pub use error::{AuthenticationError, Error, Result};
#[doc(inline)]
pub use keys::{KeyCache, KeySource, KeySourceKind, RawKeyMaterial, VerificationKey};
#[doc(inline)]
pub use urls::{LoginRequest, login_url, logout_url};
#[doc(inline)]
pub use verify::{NoncePolicy, TokenVerifier, VerifierSettings};
