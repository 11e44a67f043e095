//! Oracle Cloud Infrastructure DNS provider
//!
//! * Zones of one compartment are listed per scope (`GLOBAL` / `PRIVATE`),
//!   filtered and cached for `zone_cache_duration`.
//! * Every change endpoint becomes one `ADD` or `REMOVE` record operation;
//!   operations are batched into one `PatchZoneRecords` call per zone.
//! * A failed zone patch stops the remaining zones; zones already patched
//!   stay patched.

pub mod cache;
pub mod client;
pub mod config;
pub mod signer;

pub use cache::ZoneCache;
pub use client::{
    GetZoneRecordsRequest, HttpOciClient, ListZonesRequest, OciDnsClient, Operation, Page,
    PatchZoneRecordsRequest, Record, RecordOperation, ZoneScope, ZoneSummary,
};
pub use config::{ConfigError, OciAuth, OciAuthConfig, OciConfig, load_oci_config};
pub use signer::{ApiKeySigner, RequestSigner, signer_for};

use async_trait::async_trait;
use extdns_provider::{
    Changes, DomainFilter, Endpoint, Provider, ProviderError, ResultExt, Ttl, ZoneIdFilter,
    ZoneIdName, ensure_trailing_dot, record_type, supported_record_type,
};
use parking_lot::Mutex;
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, info, warn};

/// TTL used for endpoints without one.
pub const DEFAULT_TTL: i64 = 300;

#[derive(Clone, Debug, Default)]
pub struct OciOptions {
    pub domain_filter: DomainFilter,
    pub zone_id_filter: ZoneIdFilter,
    /// `None` looks at both scopes.
    pub zone_scope: Option<ZoneScope>,
    pub dry_run: bool,
}

pub struct OciProvider {
    client: Arc<dyn OciDnsClient>,
    compartment_id: String,
    opts: OciOptions,
    cache: Mutex<ZoneCache>,
}

impl OciProvider {
    pub fn new(
        client: Arc<dyn OciDnsClient>,
        compartment_id: impl Into<String>,
        zone_cache_duration: std::time::Duration,
        opts: OciOptions,
    ) -> Self {
        Self {
            client,
            compartment_id: compartment_id.into(),
            opts,
            cache: Mutex::new(ZoneCache::new(zone_cache_duration)),
        }
    }

    /// Provider with the bundled API-key signer.
    pub fn from_config(cfg: OciConfig, opts: OciOptions) -> Result<Self, ProviderError> {
        let auth = cfg.auth.resolve()?;
        let signer = signer_for(&auth)?;
        Self::with_signer(cfg, signer, opts)
    }

    /// Provider signing requests with `signer`, for principal based auth.
    pub fn with_signer(
        cfg: OciConfig,
        signer: Arc<dyn RequestSigner>,
        opts: OciOptions,
    ) -> Result<Self, ProviderError> {
        if cfg.auth.region.trim().is_empty() {
            return Err(ConfigError::MissingField("region").into());
        }
        let client = HttpOciClient::new(&cfg.auth.region, signer)?;
        info!(
            "OCI provider ready (region={}, compartment={})",
            cfg.auth.region, cfg.compartment_id
        );
        Ok(Self::new(
            Arc::new(client),
            cfg.compartment_id,
            cfg.zone_cache_duration,
            opts,
        ))
    }

    fn scopes(&self) -> Vec<ZoneScope> {
        match self.opts.zone_scope {
            Some(scope) => vec![scope],
            None => ZoneScope::ALL.to_vec(),
        }
    }

    /*──────── zones ────────*/

    /// Filtered zones keyed by id, served from the cache while it is fresh.
    pub async fn zones(&self) -> Result<BTreeMap<String, ZoneSummary>, ProviderError> {
        {
            let cache = self.cache.lock();
            if !cache.expired() {
                debug!("using cached OCI zones ({})", cache.zones().len());
                return Ok(cache.zones().clone());
            }
        }

        let mut zones = BTreeMap::new();
        for scope in self.scopes() {
            self.list_zones_in_scope(scope, &mut zones)
                .await
                .with_context(|| format!("listing zones in {}", self.compartment_id))?;
        }

        if zones.is_empty() {
            warn!(
                "no zones in compartment {:?} match domain filters {:?}",
                self.compartment_id,
                self.opts.domain_filter.filters()
            );
        }
        self.cache.lock().reset(zones.clone());
        Ok(zones)
    }

    async fn list_zones_in_scope(
        &self,
        scope: ZoneScope,
        zones: &mut BTreeMap<String, ZoneSummary>,
    ) -> Result<(), ProviderError> {
        let mut page = None;
        loop {
            let res = self
                .client
                .list_zones(&ListZonesRequest {
                    compartment_id: self.compartment_id.clone(),
                    scope,
                    page,
                })
                .await?;

            for zone in res.items {
                if !self.opts.domain_filter.matches(&zone.name) {
                    debug!("zone {} not in domain filter", zone.name);
                    continue;
                }
                if !self.opts.zone_id_filter.matches(&zone.id) {
                    debug!("zone {} ({}) not in zone id filter", zone.name, zone.id);
                    continue;
                }
                debug!(zone_name = %zone.name, zone_id = %zone.id, "matched OCI zone");
                zones.insert(zone.id.clone(), zone);
            }

            match res.next_page {
                Some(next) => page = Some(next),
                None => return Ok(()),
            }
        }
    }

    async fn zone_records(&self, zone: &ZoneSummary) -> Result<Vec<Record>, ProviderError> {
        let mut records = Vec::new();
        let mut page = None;
        loop {
            let res = self
                .client
                .get_zone_records(&GetZoneRecordsRequest {
                    zone_name_or_id: zone.id.clone(),
                    compartment_id: self.compartment_id.clone(),
                    page,
                })
                .await?;
            records.extend(res.items);
            match res.next_page {
                Some(next) => page = Some(next),
                None => return Ok(records),
            }
        }
    }

    /*──────── operations ────────*/

    fn record_operations(&self, endpoints: &[Endpoint], op: Operation) -> Vec<RecordOperation> {
        endpoints
            .iter()
            .filter(|ep| supported_record_type(&ep.record_type))
            .filter(|ep| self.opts.domain_filter.matches(&ep.dns_name))
            .map(|ep| record_operation(ep, op))
            .collect()
    }
}

fn record_operation(ep: &Endpoint, operation: Operation) -> RecordOperation {
    let mut targets = ep.targets.clone();
    if ep.record_type == record_type::CNAME {
        if let Some(first) = targets.first_mut() {
            *first = ensure_trailing_dot(first);
        }
    }
    let ttl = if ep.record_ttl.is_configured() {
        ep.record_ttl.0
    } else {
        DEFAULT_TTL
    };
    RecordOperation {
        domain: ep.dns_name.clone(),
        rdata: targets.join(" "),
        ttl,
        rtype: ep.record_type.clone(),
        operation,
    }
}

/// Group `ops` by owning zone; operations outside every zone are dropped.
fn operations_by_zone(
    zones: &BTreeMap<String, ZoneSummary>,
    ops: Vec<RecordOperation>,
) -> BTreeMap<String, Vec<RecordOperation>> {
    let mut mapper = ZoneIdName::new();
    for z in zones.values() {
        mapper.add(z.id.clone(), z.name.clone());
    }

    let mut by_zone: BTreeMap<String, Vec<RecordOperation>> = BTreeMap::new();
    for op in ops {
        match mapper.find_zone(&op.domain) {
            Some((zone_id, _)) => by_zone.entry(zone_id.to_owned()).or_default().push(op),
            None => warn!("no zone for {:?}; skipping {op}", op.domain),
        }
    }
    by_zone
}

/*──────── Provider impl ────────*/

#[async_trait]
impl Provider for OciProvider {
    fn name(&self) -> &'static str {
        "oci"
    }

    async fn records(&self) -> Result<Vec<Endpoint>, ProviderError> {
        let zones = self.zones().await.context("getting zones")?;

        let mut endpoints = Vec::new();
        for zone in zones.values() {
            let records = self
                .zone_records(zone)
                .await
                .with_context(|| format!("getting records for zone {:?}", zone.id))?;
            for r in records {
                if !supported_record_type(&r.rtype) {
                    continue;
                }
                endpoints.push(Endpoint::with_ttl(r.domain, r.rtype, Ttl(r.ttl), [r.rdata]));
            }
        }
        debug!("OCI reports {} endpoints", endpoints.len());
        Ok(endpoints)
    }

    async fn apply_changes(&self, changes: &Changes) -> Result<(), ProviderError> {
        let mut ops = self.record_operations(&changes.create, Operation::Add);
        ops.extend(self.record_operations(&changes.update_new, Operation::Add));
        ops.extend(self.record_operations(&changes.update_old, Operation::Remove));
        ops.extend(self.record_operations(&changes.delete, Operation::Remove));

        if ops.is_empty() {
            info!("All records are already up to date");
            return Ok(());
        }

        let zones = self.zones().await.context("fetching zones")?;

        for (zone_id, items) in operations_by_zone(&zones, ops) {
            info!("Change zone: {zone_id:?}");
            for op in &items {
                info!("{op}");
            }
            if self.opts.dry_run {
                continue;
            }
            self.client
                .patch_zone_records(&PatchZoneRecordsRequest {
                    zone_name_or_id: zone_id.clone(),
                    compartment_id: self.compartment_id.clone(),
                    items,
                })
                .await
                .with_context(|| format!("patching records of zone {zone_id:?}"))?;
        }
        Ok(())
    }
}
