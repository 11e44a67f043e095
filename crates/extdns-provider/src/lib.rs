//! Contract between the reconciliation controller and DNS provider plugins.
//!
//! * [`Endpoint`] / [`Changes`] carry desired and actual state.
//! * [`DomainFilter`] / [`ZoneIdFilter`] restrict what a plugin may touch.
//! * [`ZoneIdName`] maps a hostname onto its owning zone.
//! * Every plugin implements [`Provider`].

mod endpoint;
mod filter;
mod zone;

pub use endpoint::{Changes, Endpoint, Ttl, record_type, supported_record_type};
pub use filter::{DomainFilter, ZoneIdFilter};
pub use zone::{ZoneIdName, ensure_trailing_dot};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api error: {0}")]
    Api(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("{context}: {source}")]
    Context {
        context: String,
        source: Box<ProviderError>,
    },
}

impl ProviderError {
    pub fn wrap(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Attach operation context to a failed call before propagating it.
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T, ProviderError>;
    fn with_context<C, F>(self, f: F) -> Result<T, ProviderError>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<ProviderError>,
{
    fn context(self, context: impl Into<String>) -> Result<T, ProviderError> {
        self.map_err(|e| e.into().wrap(context))
    }

    fn with_context<C, F>(self, f: F) -> Result<T, ProviderError>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.into().wrap(f()))
    }
}

#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Current records as seen by the vendor.
    async fn records(&self) -> Result<Vec<Endpoint>, ProviderError>;

    /// Push a planned change set to the vendor.
    async fn apply_changes(&self, changes: &Changes) -> Result<(), ProviderError>;
}
