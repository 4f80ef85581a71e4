// ABOUTME: authflow CLI - operator tool for exercising an OAuth 2.0 / OIDC authorization server
// ABOUTME: Generates PKCE pairs and authorization URLs, exchanges, refreshes, revokes and validates tokens
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org
//!
//! Usage:
//! ```bash
//! # Generate a PKCE pair
//! authflow-cli pkce
//!
//! # Build an authorization URL (prints state, nonce and verifier to keep)
//! authflow-cli authorize-url
//!
//! # Exchange the code from the callback
//! authflow-cli exchange --code abc123 --verifier <verifier>
//!
//! # Refresh and revoke
//! authflow-cli refresh --refresh-token <token>
//! authflow-cli revoke --token <token> --hint refresh-token
//!
//! # Validate an access token against the issuer's key set
//! authflow-cli validate --token <jwt>
//!
//! # Show the issuer's discovery document
//! authflow-cli discover
//! ```
//!
//! Configuration is read from `AUTHFLOW_*` environment variables.

mod commands;

use authflow::logging::LoggingConfig;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "authflow-cli",
    about = "OAuth 2.0 authorization code flow toolkit",
    long_about = "Command-line tool for generating PKCE pairs and authorization URLs, exchanging, refreshing, revoking and validating tokens."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a PKCE verifier and S256 challenge
    Pkce {
        /// Verifier length (43-128)
        #[arg(long, default_value = "128")]
        length: usize,
    },

    /// Build an authorization URL with fresh state, nonce and PKCE challenge
    AuthorizeUrl,

    /// Exchange an authorization code for tokens
    Exchange {
        /// Code from the callback
        #[arg(long)]
        code: String,

        /// PKCE verifier printed by `authorize-url`
        #[arg(long)]
        verifier: String,
    },

    /// Redeem a refresh token
    Refresh {
        /// Refresh token to redeem
        #[arg(long)]
        refresh_token: String,
    },

    /// Revoke a token
    Revoke {
        /// Token to revoke
        #[arg(long)]
        token: String,

        /// Kind of token
        #[arg(long, value_enum, default_value = "refresh-token")]
        hint: Hint,
    },

    /// Validate a bearer JWT against the issuer's key set
    Validate {
        /// Access token
        #[arg(long)]
        token: String,
    },

    /// Fetch the issuer's OpenID configuration
    Discover {
        /// Issuer URL (defaults to `AUTHFLOW_ISSUER`)
        #[arg(long)]
        issuer: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Hint {
    AccessToken,
    RefreshToken,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env();
    if cli.verbose {
        logging.level = "debug".into();
    }
    logging.init()?;

    match cli.command {
        Command::Pkce { length } => commands::flow::pkce(length)?,
        Command::AuthorizeUrl => commands::flow::authorize_url()?,
        Command::Exchange { code, verifier } => commands::flow::exchange(&code, verifier).await?,
        Command::Refresh { refresh_token } => commands::flow::refresh(&refresh_token).await?,
        Command::Revoke { token, hint } => {
            let hint = match hint {
                Hint::AccessToken => authflow::oauth2_client::TokenTypeHint::AccessToken,
                Hint::RefreshToken => authflow::oauth2_client::TokenTypeHint::RefreshToken,
            };
            commands::flow::revoke(&token, hint).await?;
        }
        Command::Validate { token } => commands::token::validate(&token).await?,
        Command::Discover { issuer } => commands::token::discover(issuer).await?,
    }

    Ok(())
}
