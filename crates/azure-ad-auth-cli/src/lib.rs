//! # `aad-auth`
//!
//! Operator tool around the `azure-ad-auth` library.
//!
//! ## Usage
//!
//! ```bash
//! export AAD_TENANT_ID=contoso.onmicrosoft.com
//! export AAD_CLIENT_ID=6731de76-14a6-49ae-97bc-6eba6914391e
//!
//! # Redirect URLs
//! aad-auth login-url --redirect-uri https://app.example/callback --nonce n-0S6_WzA2Mj
//! aad-auth logout-url https://app.example/
//!
//! # Signing keys currently published (strict fetch)
//! aad-auth keys
//!
//! # Verify a token from a settings file
//! aad-auth --config aad.toml verify eyJ0eXAi... --nonce n-0S6_WzA2Mj
//! ```

pub mod cli;
pub mod commands;
pub mod settings;

use clap::Parser;
use tracing_subscriber::EnvFilter;

pub use cli::{Cli, Commands};

/// Install the fmt subscriber; `RUST_LOG` wins over `-v`
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // Already installed (e.g. when embedded); keep the existing subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run the CLI application
///
/// # Errors
///
/// Any settings, network or verification failure of the chosen subcommand.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = settings::load(cli.config.as_deref())?;

    let output = match cli.command {
        Commands::LoginUrl {
            redirect_uri,
            nonce,
            state,
        } => commands::login_url(&config, redirect_uri, nonce, state)?,
        Commands::LogoutUrl { redirect_uri } => commands::logout_url(&config, &redirect_uri)?,
        Commands::Keys => commands::keys(&config).await?,
        Commands::Verify { token, nonce } => {
            commands::verify(&config, &token, nonce.as_deref()).await?
        }
    };

    println!("{output}");
    Ok(())
}
