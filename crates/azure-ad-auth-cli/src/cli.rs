//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Main CLI application structure
#[derive(Parser, Debug)]
#[command(
    name = "aad-auth",
    version,
    about = "Azure AD / Azure AD B2C ID-token tooling",
    long_about = "Builds login and logout redirect URLs, inspects the provider's signing keys \
                  and verifies ID tokens using the same code path as the request hook.\n\n\
                  Settings come from an optional file (--config) overlaid with AAD_* \
                  environment variables, e.g. AAD_TENANT_ID, AAD_CLIENT_ID, AAD_KEY_SOURCE."
)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (TOML, JSON or YAML by extension)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Print the authorization (login) redirect URL
    LoginUrl {
        /// Where the provider posts the ID token back
        #[arg(long)]
        redirect_uri: Option<String>,

        /// Nonce echoed in the token
        #[arg(long)]
        nonce: Option<String>,

        /// Opaque state echoed with the response
        #[arg(long)]
        state: Option<String>,
    },

    /// Print the logout redirect URL
    LogoutUrl {
        /// Where to land after logout
        redirect_uri: String,
    },

    /// Fetch and resolve the provider's signing keys
    Keys,

    /// Verify an ID token and print the identity it carries
    Verify {
        /// Compact JWT
        token: String,

        /// Expected nonce
        #[arg(long)]
        nonce: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_login_url() {
        let cli = Cli::parse_from([
            "aad-auth",
            "login-url",
            "--redirect-uri",
            "https://app.example/callback",
            "--nonce",
            "n1",
        ]);
        assert_eq!(
            cli.command,
            Commands::LoginUrl {
                redirect_uri: Some("https://app.example/callback".into()),
                nonce: Some("n1".into()),
                state: None,
            }
        );
        assert!(!cli.verbose);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["aad-auth", "keys", "-v", "--config", "aad.toml"]);
        assert_eq!(cli.command, Commands::Keys);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("aad.toml")));
    }

    #[test]
    fn test_verify_requires_token() {
        assert!(Cli::try_parse_from(["aad-auth", "verify"]).is_err());
        let cli = Cli::try_parse_from(["aad-auth", "verify", "a.b.c", "--nonce", "n"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Verify {
                token: "a.b.c".into(),
                nonce: Some("n".into()),
            }
        );
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
