//! Credentials and tunnel identity, read from the environment.
//!
//! | variable | meaning |
//! |---|---|
//! | `CF_API_TOKEN` | API token, or `file:<path>` to read it from disk |
//! | `CF_API_KEY` / `CF_API_EMAIL` | legacy global key, used when no token is set |
//! | `CF_ACCOUNT_ID` | account owning the tunnel (required) |
//! | `CF_TUNNEL_ID` | tunnel to manage (required) |

use std::{fs, io, path::PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read CF_API_TOKEN from file {path:?}: {source}")]
    TokenFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to initialize cloudflare provider: set CF_API_TOKEN or both CF_API_KEY and CF_API_EMAIL")]
    MissingCredentials,
    #[error("failed to get cloudflare account id: please set env, CF_ACCOUNT_ID")]
    MissingAccountId,
    #[error("failed to get cloudflare tunnel id: please set env, CF_TUNNEL_ID")]
    MissingTunnelId,
}

impl From<ConfigError> for extdns_provider::ProviderError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Token(String),
    Key { key: String, email: String },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Token(_) => f.write_str("Token(***)"),
            Self::Key { email, .. } => write!(f, "Key {{ email: {email:?}, key: *** }}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CfTunnelConfig {
    pub credentials: Credentials,
    pub account_id: String,
    pub tunnel_id: String,
}

impl CfTunnelConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Same as [`CfTunnelConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials = match lookup("CF_API_TOKEN") {
            Some(token) => Credentials::Token(read_token(token)?),
            None => match (lookup("CF_API_KEY"), lookup("CF_API_EMAIL")) {
                (Some(key), Some(email)) if !key.is_empty() && !email.is_empty() => {
                    Credentials::Key { key, email }
                }
                _ => return Err(ConfigError::MissingCredentials),
            },
        };
        let account_id = lookup("CF_ACCOUNT_ID").ok_or(ConfigError::MissingAccountId)?;
        let tunnel_id = lookup("CF_TUNNEL_ID").ok_or(ConfigError::MissingTunnelId)?;

        Ok(Self {
            credentials,
            account_id,
            tunnel_id,
        })
    }
}

fn read_token(raw: String) -> Result<String, ConfigError> {
    match raw.strip_prefix("file:") {
        Some(path) => fs::read_to_string(path)
            .map(|s| s.trim_end().to_owned())
            .map_err(|source| ConfigError::TokenFile {
                path: path.into(),
                source,
            }),
        None => Ok(raw),
    }
}
