//! Parse `extdns.toml` into `PluginCfg`, with `EXTDNS_*` environment overrides

use crate::error::CfgError;
use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat, Map};
use serde::Deserialize;
use std::path::Path;
use validator::{Validate, ValidationError};

/*──────── Provider kind ────────*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    Oci,
    CloudflareTunnel,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Oci => "oci",
            ProviderKind::CloudflareTunnel => "cloudflare-tunnel",
        }
    }
}

/*──────── OCI ────────*/
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OciCfg {
    /// YAML file holding `auth` and `compartment`
    #[serde(default = "default_oci_config_file")]
    #[validate(length(min = 1))]
    pub config_file: String,
    /// `GLOBAL`, `PRIVATE`, or empty for both
    #[serde(default = "default_zone_scope")]
    #[validate(custom(function = "validate_zone_scope"))]
    pub zone_scope: String,
    /// `0` re-lists zones on every call
    #[serde(default)]
    pub zone_cache_duration_secs: u64,
}

fn default_oci_config_file() -> String {
    "/etc/kubernetes/oci.yaml".to_string()
}
fn default_zone_scope() -> String {
    "GLOBAL".to_string()
}

impl Default for OciCfg {
    fn default() -> Self {
        Self {
            config_file: default_oci_config_file(),
            zone_scope: default_zone_scope(),
            zone_cache_duration_secs: 0,
        }
    }
}

fn validate_zone_scope(scope: &str) -> Result<(), ValidationError> {
    match scope.to_ascii_uppercase().as_str() {
        "" | "GLOBAL" | "PRIVATE" => Ok(()),
        _ => Err(ValidationError::new("zone_scope")
            .with_message("expected GLOBAL, PRIVATE or empty".into())),
    }
}

/*──────── Cloudflare Tunnel ────────*/
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CfTunnelCfg {
    #[serde(default = "default_per_page")]
    #[validate(range(min = 1, max = 5000))]
    pub dns_records_per_page: u32,
}

fn default_per_page() -> u32 {
    100
}

impl Default for CfTunnelCfg {
    fn default() -> Self {
        Self {
            dns_records_per_page: default_per_page(),
        }
    }
}

/*──────── Root ────────*/
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PluginCfg {
    pub kind: ProviderKind,
    #[serde(default)]
    pub domain_filter: Vec<String>,
    #[serde(default)]
    pub exclude_domains: Vec<String>,
    #[serde(default)]
    pub zone_id_filter: Vec<String>,
    #[serde(default)]
    pub dry_run: bool,

    #[serde(default)]
    #[validate(nested)]
    pub oci: OciCfg,
    #[serde(default)]
    #[validate(nested)]
    pub cloudflare_tunnel: CfTunnelCfg,
}

const LIST_KEYS: [&str; 3] = ["domain_filter", "exclude_domains", "zone_id_filter"];

/// Load the plugin configuration from an optional TOML file **and** the
/// process environment.
///
/// Environment keys drop the `EXTDNS_` prefix and use `__` between
/// sections: `EXTDNS_DRY_RUN=true`, `EXTDNS_OCI__ZONE_SCOPE=PRIVATE`,
/// `EXTDNS_DOMAIN_FILTER=example.com,example.org`.
pub fn load_config(path: &str) -> Result<PluginCfg> {
    load_config_from(path, None)
}

/// Same as [`load_config`]; `env` replaces the process environment when set.
pub fn load_config_from(path: &str, env: Option<Map<String, String>>) -> Result<PluginCfg> {
    let mut builder = Config::builder();
    if Path::new(path).exists() {
        builder = builder.add_source(File::new(path, FileFormat::Toml).required(true));
    } else {
        tracing::info!("config file `{path}` not found; environment-only mode");
    }

    let mut env_source = Environment::with_prefix("EXTDNS")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .source(env);
    for key in LIST_KEYS {
        env_source = env_source.with_list_parse_key(key);
    }
    builder = builder.add_source(env_source);

    let cfg: PluginCfg = builder
        .build()
        .and_then(Config::try_deserialize)
        .map_err(CfgError::from)
        .with_context(|| format!("reading plugin config `{path}`"))?;
    cfg.validate().map_err(CfgError::from)?;

    tracing::debug!(kind = cfg.kind.as_str(), dry_run = cfg.dry_run, "plugin config loaded");
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn toml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    fn env(vars: &[(&str, &str)]) -> Option<Map<String, String>> {
        Some(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn path(f: &tempfile::NamedTempFile) -> String {
        f.path().display().to_string()
    }

    #[test]
    fn file_only() {
        let f = toml_file(
            r#"
kind = "oci"
domain_filter = ["example.com"]
zone_id_filter = ["ocid1.dns-zone.oc1..z1"]

[oci]
config_file = "/tmp/oci.yaml"
zone_scope = "PRIVATE"
zone_cache_duration_secs = 300
"#,
        );
        let cfg = load_config_from(&path(&f), env(&[])).unwrap();
        assert_eq!(cfg.kind, ProviderKind::Oci);
        assert_eq!(cfg.domain_filter, ["example.com"]);
        assert_eq!(cfg.zone_id_filter, ["ocid1.dns-zone.oc1..z1"]);
        assert!(!cfg.dry_run);
        assert_eq!(cfg.oci.config_file, "/tmp/oci.yaml");
        assert_eq!(cfg.oci.zone_scope, "PRIVATE");
        assert_eq!(cfg.oci.zone_cache_duration_secs, 300);
        assert_eq!(cfg.cloudflare_tunnel.dns_records_per_page, 100);
    }

    #[test]
    fn env_overrides_file() {
        let f = toml_file("kind = \"oci\"\ndry_run = false\n");
        let cfg = load_config_from(
            &path(&f),
            env(&[
                ("EXTDNS_KIND", "cloudflare-tunnel"),
                ("EXTDNS_DRY_RUN", "true"),
                ("EXTDNS_DOMAIN_FILTER", "example.com,example.org"),
                ("EXTDNS_CLOUDFLARE_TUNNEL__DNS_RECORDS_PER_PAGE", "500"),
                ("OTHER_VAR", "ignored"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.kind, ProviderKind::CloudflareTunnel);
        assert!(cfg.dry_run);
        assert_eq!(cfg.domain_filter, ["example.com", "example.org"]);
        assert_eq!(cfg.cloudflare_tunnel.dns_records_per_page, 500);
    }

    #[test]
    fn environment_only_mode() {
        let cfg = load_config_from(
            "/nonexistent/extdns.toml",
            env(&[("EXTDNS_KIND", "oci"), ("EXTDNS_OCI__ZONE_SCOPE", "private")]),
        )
        .unwrap();
        assert_eq!(cfg.kind, ProviderKind::Oci);
        assert_eq!(cfg.oci.config_file, "/etc/kubernetes/oci.yaml");
        assert_eq!(cfg.oci.zone_scope, "private");
    }

    #[test]
    fn kind_is_required_and_known() {
        assert!(load_config_from("/nonexistent/extdns.toml", env(&[])).is_err());

        let err = load_config_from(
            "/nonexistent/extdns.toml",
            env(&[("EXTDNS_KIND", "route53")]),
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("route53"));
    }

    #[test]
    fn invalid_values_rejected() {
        let f = toml_file("kind = \"oci\"\n[oci]\nzone_scope = \"PUBLIC\"\n");
        let err = load_config_from(&path(&f), env(&[])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CfgError>(),
            Some(CfgError::Validate(_))
        ));

        let f = toml_file("kind = \"cloudflare-tunnel\"\n[cloudflare_tunnel]\ndns_records_per_page = 0\n");
        assert!(load_config_from(&path(&f), env(&[])).is_err());
    }
}
