use thiserror::Error;

/// Errors raised while loading the plugin configuration or building a provider
#[derive(Error, Debug)]
pub enum CfgError {
    #[error("loading plugin config: {0}")]
    Load(#[from] config::ConfigError),

    #[error("validation failed: {0}")]
    Validate(#[from] validator::ValidationErrors),

    #[error("provider kind `{0}` is not compiled in; enable the `{1}` feature")]
    FeatureDisabled(&'static str, &'static str),
}
