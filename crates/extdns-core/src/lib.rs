//! extdns-core – plugin configuration and provider construction

pub mod cfg;
pub mod error;

use anyhow::Result;
use cfg::{PluginCfg, ProviderKind};
use extdns_provider::{DomainFilter, Provider, ZoneIdFilter};
use std::sync::Arc;

pub use cfg::{load_config, load_config_from};
pub use error::CfgError;

fn domain_filter(cfg: &PluginCfg) -> DomainFilter {
    DomainFilter::new(&cfg.domain_filter).with_exclusions(&cfg.exclude_domains)
}

fn zone_id_filter(cfg: &PluginCfg) -> ZoneIdFilter {
    ZoneIdFilter::new(cfg.zone_id_filter.iter().cloned())
}

/// Build the provider selected by `cfg.kind`, including its HTTP client.
pub fn build_provider(cfg: &PluginCfg) -> Result<Arc<dyn Provider>> {
    let prov: Arc<dyn Provider> = match cfg.kind {
        #[cfg(feature = "extdns-provider-oci")]
        ProviderKind::Oci => {
            use extdns_provider_oci::{OciOptions, OciProvider, ZoneScope, load_oci_config};

            let mut oci = load_oci_config(&cfg.oci.config_file)?;
            oci.zone_cache_duration =
                std::time::Duration::from_secs(cfg.oci.zone_cache_duration_secs);
            let zone_scope = match cfg.oci.zone_scope.as_str() {
                "" => None,
                s => Some(s.parse::<ZoneScope>().map_err(anyhow::Error::msg)?),
            };
            Arc::new(OciProvider::from_config(
                oci,
                OciOptions {
                    domain_filter: domain_filter(cfg),
                    zone_id_filter: zone_id_filter(cfg),
                    zone_scope,
                    dry_run: cfg.dry_run,
                },
            )?)
        }
        #[cfg(feature = "extdns-provider-cftunnel")]
        ProviderKind::CloudflareTunnel => {
            use extdns_provider_cftunnel::{CfTunnelProvider, TunnelOptions};

            Arc::new(CfTunnelProvider::from_env(TunnelOptions {
                domain_filter: domain_filter(cfg),
                zone_id_filter: zone_id_filter(cfg),
                dry_run: cfg.dry_run,
                dns_records_per_page: cfg.cloudflare_tunnel.dns_records_per_page,
            })?)
        }
        #[allow(unreachable_patterns)]
        other => {
            return Err(CfgError::FeatureDisabled(other.as_str(), feature_for(other)).into());
        }
    };

    tracing::info!(
        provider = prov.name(),
        dry_run = cfg.dry_run,
        "provider initialised"
    );
    Ok(prov)
}

fn feature_for(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Oci => "extdns-provider-oci",
        ProviderKind::CloudflareTunnel => "extdns-provider-cftunnel",
    }
}
