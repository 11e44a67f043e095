//! Cloudflare Tunnel provider
//!
//! * Every `A` endpoint becomes a tunnel ingress rule (`https://<target>:443`)
//!   plus a proxied `CNAME <tunnel>.cfargotunnel.com` in the owning zone.
//! * `records` reports the tunnel's ingress rules as `A` endpoints.
//! * The tunnel configuration push is all-or-nothing; the DNS record calls
//!   that follow it are best effort (failures are logged and skipped).
//! * Credentials come from `CF_*` environment variables, see [`config`].

pub mod api;
pub mod config;
pub mod ordered_map;

pub use api::{
    DnsRecord, DnsRecordParams, HttpTunnelApi, IngressRule, OriginRequestConfig, ResultInfo,
    TunnelApi, TunnelConfiguration, TunnelConfigurationResult, Zone,
};
pub use config::{CfTunnelConfig, ConfigError, Credentials};
pub use ordered_map::OrderedMap;

use async_trait::async_trait;
use extdns_provider::{
    Changes, DomainFilter, Endpoint, Provider, ProviderError, ResultExt, ZoneIdFilter, ZoneIdName,
    record_type,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const DEFAULT_DNS_RECORDS_PER_PAGE: u32 = 100;

/// Served when no other ingress rule matches.
const CATCH_ALL_SERVICE: &str = "http_status:404";
/// Cloudflare's "automatic" TTL.
const AUTO_TTL: u32 = 1;

/*──────── options ────────*/

#[derive(Clone, Debug)]
pub struct TunnelOptions {
    pub domain_filter: DomainFilter,
    pub zone_id_filter: ZoneIdFilter,
    pub dry_run: bool,
    pub dns_records_per_page: u32,
}

impl Default for TunnelOptions {
    fn default() -> Self {
        Self {
            domain_filter: DomainFilter::default(),
            zone_id_filter: ZoneIdFilter::default(),
            dry_run: false,
            dns_records_per_page: DEFAULT_DNS_RECORDS_PER_PAGE,
        }
    }
}

/*──────── plan ────────*/

#[derive(Clone, Debug, PartialEq)]
pub struct DnsCreate {
    pub zone_id: String,
    pub params: DnsRecordParams,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DnsUpdate {
    pub zone_id: String,
    pub record_id: String,
    pub params: DnsRecordParams,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DnsDelete {
    pub zone_id: String,
    pub record_id: String,
    pub name: String,
}

/// Everything one `apply_changes` call would push.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TunnelPlan {
    /// New tunnel configuration; its ingress list ends with the catch-all.
    pub config: TunnelConfiguration,
    pub creates: Vec<DnsCreate>,
    pub updates: Vec<DnsUpdate>,
    pub deletes: Vec<DnsDelete>,
}

/*──────── provider struct ────────*/

pub struct CfTunnelProvider {
    api: Arc<dyn TunnelApi>,
    account_id: String,
    tunnel_id: String,
    opts: TunnelOptions,
}

impl CfTunnelProvider {
    pub fn new(
        api: Arc<dyn TunnelApi>,
        account_id: impl Into<String>,
        tunnel_id: impl Into<String>,
        opts: TunnelOptions,
    ) -> Self {
        Self {
            api,
            account_id: account_id.into(),
            tunnel_id: tunnel_id.into(),
            opts,
        }
    }

    /// Build a provider talking to the real API with `CF_*` credentials.
    pub fn from_env(opts: TunnelOptions) -> Result<Self, ProviderError> {
        let cfg = CfTunnelConfig::from_env()?;
        let api = HttpTunnelApi::new(&cfg)?;
        Ok(Self::new(
            Arc::new(api),
            cfg.account_id,
            cfg.tunnel_id,
            opts,
        ))
    }

    fn record_params(&self, name: &str) -> DnsRecordParams {
        DnsRecordParams {
            rtype: record_type::CNAME.to_owned(),
            name: name.to_owned(),
            content: format!("{}.cfargotunnel.com", self.tunnel_id),
            ttl: AUTO_TTL,
            proxied: true,
        }
    }

    /*──────── zone / record helpers ────────*/

    /// Zones this provider may act on.
    pub async fn zones(&self) -> Result<Vec<Zone>, ProviderError> {
        if self.opts.zone_id_filter.is_configured() {
            debug!("zone id filter configured; only looking up listed zones");
            let mut zones = Vec::with_capacity(self.opts.zone_id_filter.zone_ids().len());
            for zone_id in self.opts.zone_id_filter.zone_ids() {
                let zone = self
                    .api
                    .zone_details(zone_id)
                    .await
                    .with_context(|| format!("zone {zone_id} lookup failed"))?;
                debug!(zone_name = %zone.name, zone_id = %zone.id, "adding zone for consideration");
                zones.push(zone);
            }
            return Ok(zones);
        }

        debug!("no zone id filter configured; looking at all zones");
        let zones = self.api.list_zones().await.context("listing zones")?;
        Ok(zones
            .into_iter()
            .filter(|z| {
                let keep = self.opts.domain_filter.matches(&z.name);
                if !keep {
                    debug!("zone {} not in domain filter", z.name);
                }
                keep
            })
            .collect())
    }

    async fn zone_mapper(&self) -> Result<ZoneIdName, ProviderError> {
        let mut mapper = ZoneIdName::new();
        for z in self.zones().await? {
            mapper.add(z.id, z.name);
        }
        Ok(mapper)
    }

    /// All records of a zone, following the pagination cursor.
    async fn list_dns_records(&self, zone_id: &str) -> Result<Vec<DnsRecord>, ProviderError> {
        let mut records = Vec::new();
        let mut page = ResultInfo::first(self.opts.dns_records_per_page);
        loop {
            let (batch, info) = self
                .api
                .list_dns_records(zone_id, page)
                .await
                .with_context(|| format!("listing DNS records of zone {zone_id}"))?;
            records.extend(batch);
            let info = ResultInfo {
                page: info.page.max(page.page),
                per_page: if info.per_page == 0 {
                    page.per_page
                } else {
                    info.per_page
                },
                ..info
            };
            page = info.next();
            if page.done() {
                break;
            }
        }
        Ok(records)
    }

    async fn cname_record_id(&self, zone_id: &str, name: &str) -> Result<String, ProviderError> {
        let records = self.list_dns_records(zone_id).await?;
        let id = record_id(&records, name, record_type::CNAME);
        if id.is_empty() {
            warn!("no CNAME record named {name} in zone {zone_id}; calling the API with an empty record id");
        }
        Ok(id)
    }

    /*──────── reconciliation ────────*/

    /// Compute the new tunnel configuration and the DNS calls for `changes`
    /// without mutating anything.
    pub async fn plan(&self, changes: &Changes) -> Result<TunnelPlan, ProviderError> {
        let zones = self
            .zone_mapper()
            .await
            .context("failed to update zone id mapper")?;

        let current = self
            .api
            .get_tunnel_configuration(&self.account_id, &self.tunnel_id)
            .await
            .context("failed to get tunnel configs")?;

        let mut config = current.config;
        let existing = std::mem::take(&mut config.ingress);
        let mut rules = OrderedMap::with_capacity(existing.len());
        let mut catch_all = None;
        for rule in existing {
            if rule.is_catch_all() {
                catch_all = Some(rule);
                break;
            }
            rules.add(rule);
        }
        let catch_all = catch_all.unwrap_or_else(|| {
            warn!("tunnel {} has no catch-all rule; adding {CATCH_ALL_SERVICE}", self.tunnel_id);
            IngressRule {
                service: CATCH_ALL_SERVICE.to_owned(),
                ..Default::default()
            }
        });

        let mut plan = TunnelPlan::default();

        for ep in changes.create.iter().filter(|e| is_a(e)) {
            rules.add(tunnel_rule(ep));
            let Some((zone_id, _)) = zones.find_zone(&ep.dns_name) else {
                warn!("no zone found for {}; skipping DNS create", ep.dns_name);
                continue;
            };
            plan.creates.push(DnsCreate {
                zone_id: zone_id.to_owned(),
                params: self.record_params(&ep.dns_name),
            });
        }

        for ep in changes.update_new.iter().filter(|e| is_a(e)) {
            rules.update(tunnel_rule(ep));
            let Some((zone_id, _)) = zones.find_zone(&ep.dns_name) else {
                warn!("no zone found for {}; skipping DNS update", ep.dns_name);
                continue;
            };
            let record_id = self.cname_record_id(zone_id, &ep.dns_name).await?;
            plan.updates.push(DnsUpdate {
                zone_id: zone_id.to_owned(),
                record_id,
                params: self.record_params(&ep.dns_name),
            });
        }

        for ep in changes.delete.iter().filter(|e| is_a(e)) {
            rules.remove(&ep.dns_name);
            let Some((zone_id, _)) = zones.find_zone(&ep.dns_name) else {
                warn!("no zone found for {}; skipping DNS delete", ep.dns_name);
                continue;
            };
            let record_id = self.cname_record_id(zone_id, &ep.dns_name).await?;
            plan.deletes.push(DnsDelete {
                zone_id: zone_id.to_owned(),
                record_id,
                name: ep.dns_name.clone(),
            });
        }

        config.ingress = rules.get();
        config.ingress.push(catch_all);
        plan.config = config;
        Ok(plan)
    }

    /// Push `plan`: tunnel first, then DNS creates, updates and deletes.
    async fn execute(&self, plan: &TunnelPlan) -> Result<(), ProviderError> {
        self.api
            .update_tunnel_configuration(&self.account_id, &self.tunnel_id, &plan.config)
            .await
            .context("failed to update tunnel configs")?;
        info!(
            "Cloudflare tunnel {} updated ({} ingress rules)",
            self.tunnel_id,
            plan.config.ingress.len()
        );

        for c in &plan.creates {
            match self.api.create_dns_record(&c.zone_id, &c.params).await {
                Ok(rec) => info!("Cloudflare created record {} id={}", c.params.name, rec.id),
                Err(e) => error!("failed to create dns record {}: {e}", c.params.name),
            }
        }
        for u in &plan.updates {
            match self
                .api
                .update_dns_record(&u.zone_id, &u.record_id, &u.params)
                .await
            {
                Ok(_) => info!("Cloudflare updated record {} id={}", u.params.name, u.record_id),
                Err(e) => error!("failed to update dns record {}: {e}", u.params.name),
            }
        }
        for d in &plan.deletes {
            match self.api.delete_dns_record(&d.zone_id, &d.record_id).await {
                Ok(()) => info!("Cloudflare deleted record {} id={}", d.name, d.record_id),
                Err(e) => error!("failed to delete dns record {}: {e}", d.name),
            }
        }
        Ok(())
    }
}

fn is_a(ep: &Endpoint) -> bool {
    ep.record_type == record_type::A
}

fn tunnel_rule(ep: &Endpoint) -> IngressRule {
    IngressRule {
        hostname: ep.dns_name.clone(),
        service: https_service(ep.first_target()),
        origin_request: Some(default_origin_request()),
        ..Default::default()
    }
}

fn https_service(target: &str) -> String {
    format!("https://{target}:443")
}

fn default_origin_request() -> OriginRequestConfig {
    OriginRequestConfig {
        no_tls_verify: Some(true),
        http2_origin: Some(true),
        ..Default::default()
    }
}

/// Id of the first record matching `name` and `rtype` exactly, or `""`.
fn record_id(records: &[DnsRecord], name: &str, rtype: &str) -> String {
    records
        .iter()
        .find(|r| r.name == name && r.rtype == rtype)
        .map(|r| r.id.clone())
        .unwrap_or_default()
}

/*──────── Provider impl ────────*/

#[async_trait]
impl Provider for CfTunnelProvider {
    fn name(&self) -> &'static str {
        "cloudflare-tunnel"
    }

    async fn records(&self) -> Result<Vec<Endpoint>, ProviderError> {
        let res = self
            .api
            .get_tunnel_configuration(&self.account_id, &self.tunnel_id)
            .await
            .context("failed to get tunnel configs")?;

        let endpoints: Vec<Endpoint> = res
            .config
            .ingress
            .iter()
            .filter(|rule| !rule.is_catch_all())
            .map(|rule| Endpoint::new(&rule.hostname, record_type::A, [&rule.service]))
            .inspect(|ep| debug!("current endpoint: {ep}"))
            .collect();
        Ok(endpoints)
    }

    async fn apply_changes(&self, changes: &Changes) -> Result<(), ProviderError> {
        let plan = self.plan(changes).await?;
        debug!(
            "Cloudflare tunnel plan: {} ingress rules, {} creates, {} updates, {} deletes",
            plan.config.ingress.len(),
            plan.creates.len(),
            plan.updates.len(),
            plan.deletes.len()
        );

        if self.opts.dry_run {
            info!("dry run; tunnel {} left untouched", self.tunnel_id);
            return Ok(());
        }
        self.execute(&plan).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory Cloudflare that logs every call.
    #[derive(Default)]
    struct MockApi {
        ingress: Vec<IngressRule>,
        zones: Vec<Zone>,
        /// zone id → pages of records
        records: HashMap<String, Vec<Vec<DnsRecord>>>,
        fail_create: bool,
        fail_tunnel_update: bool,
        calls: Mutex<Vec<String>>,
        pushed: Mutex<Option<TunnelConfiguration>>,
    }

    impl MockApi {
        fn log(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn mutating_calls(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter(|c| {
                    c.starts_with("update_") || c.starts_with("create_") || c.starts_with("delete_")
                })
                .collect()
        }

        fn pushed_hosts(&self) -> Vec<String> {
            self.pushed
                .lock()
                .unwrap()
                .as_ref()
                .expect("tunnel configuration pushed")
                .ingress
                .iter()
                .map(|r| r.hostname.clone())
                .collect()
        }
    }

    #[async_trait]
    impl TunnelApi for MockApi {
        async fn get_tunnel_configuration(
            &self,
            _account_id: &str,
            tunnel_id: &str,
        ) -> Result<TunnelConfigurationResult, ProviderError> {
            self.log("get_tunnel_configuration".into());
            Ok(TunnelConfigurationResult {
                tunnel_id: tunnel_id.into(),
                version: 1,
                config: TunnelConfiguration {
                    ingress: self.ingress.clone(),
                    ..Default::default()
                },
            })
        }

        async fn update_tunnel_configuration(
            &self,
            _account_id: &str,
            tunnel_id: &str,
            config: &TunnelConfiguration,
        ) -> Result<TunnelConfigurationResult, ProviderError> {
            self.log("update_tunnel_configuration".into());
            if self.fail_tunnel_update {
                return Err(ProviderError::Api("tunnel locked".into()));
            }
            *self.pushed.lock().unwrap() = Some(config.clone());
            Ok(TunnelConfigurationResult {
                tunnel_id: tunnel_id.into(),
                version: 2,
                config: config.clone(),
            })
        }

        async fn zone_details(&self, zone_id: &str) -> Result<Zone, ProviderError> {
            self.log(format!("zone_details:{zone_id}"));
            self.zones
                .iter()
                .find(|z| z.id == zone_id)
                .cloned()
                .ok_or_else(|| ProviderError::Api(format!("zone {zone_id} not found")))
        }

        async fn list_zones(&self) -> Result<Vec<Zone>, ProviderError> {
            self.log("list_zones".into());
            Ok(self.zones.clone())
        }

        async fn list_dns_records(
            &self,
            zone_id: &str,
            page: ResultInfo,
        ) -> Result<(Vec<DnsRecord>, ResultInfo), ProviderError> {
            self.log(format!("list_dns_records:{zone_id}:{}", page.page));
            let pages = self.records.get(zone_id).cloned().unwrap_or_default();
            let batch = pages
                .get(page.page as usize - 1)
                .cloned()
                .unwrap_or_default();
            let info = ResultInfo {
                page: page.page,
                per_page: page.per_page,
                total_pages: pages.len() as u32,
                count: batch.len() as u32,
                total_count: pages.iter().map(Vec::len).sum::<usize>() as u32,
            };
            Ok((batch, info))
        }

        async fn create_dns_record(
            &self,
            zone_id: &str,
            params: &DnsRecordParams,
        ) -> Result<DnsRecord, ProviderError> {
            self.log(format!("create_dns_record:{zone_id}:{}", params.name));
            if self.fail_create {
                return Err(ProviderError::Api("record already exists".into()));
            }
            Ok(DnsRecord {
                id: "new".into(),
                name: params.name.clone(),
                rtype: params.rtype.clone(),
                content: params.content.clone(),
                ttl: params.ttl,
                proxied: params.proxied,
            })
        }

        async fn update_dns_record(
            &self,
            zone_id: &str,
            record_id: &str,
            params: &DnsRecordParams,
        ) -> Result<DnsRecord, ProviderError> {
            self.log(format!("update_dns_record:{zone_id}:{record_id}"));
            Ok(DnsRecord {
                id: record_id.into(),
                name: params.name.clone(),
                rtype: params.rtype.clone(),
                content: params.content.clone(),
                ttl: params.ttl,
                proxied: params.proxied,
            })
        }

        async fn delete_dns_record(
            &self,
            zone_id: &str,
            record_id: &str,
        ) -> Result<(), ProviderError> {
            self.log(format!("delete_dns_record:{zone_id}:{record_id}"));
            Ok(())
        }
    }

    fn rule(host: &str, service: &str) -> IngressRule {
        IngressRule {
            hostname: host.into(),
            service: service.into(),
            ..Default::default()
        }
    }

    fn zone(id: &str, name: &str) -> Zone {
        Zone {
            id: id.into(),
            name: name.into(),
        }
    }

    fn cname(id: &str, name: &str) -> DnsRecord {
        DnsRecord {
            id: id.into(),
            name: name.into(),
            rtype: "CNAME".into(),
            content: "tun.cfargotunnel.com".into(),
            ttl: 1,
            proxied: true,
        }
    }

    fn base_api() -> MockApi {
        MockApi {
            ingress: vec![
                rule("a.example.com", "https://10.0.0.1:443"),
                rule("b.example.com", "https://10.0.0.2:443"),
                rule("", "http_status:404"),
            ],
            zones: vec![zone("z1", "example.com"), zone("z2", "example.org")],
            records: HashMap::from([(
                "z1".to_string(),
                vec![vec![
                    cname("ra", "a.example.com"),
                    cname("rb", "b.example.com"),
                ]],
            )]),
            ..Default::default()
        }
    }

    fn provider(api: Arc<MockApi>, opts: TunnelOptions) -> CfTunnelProvider {
        CfTunnelProvider::new(api, "acc", "tun", opts)
    }

    #[tokio::test]
    async fn records_report_ingress_without_catch_all() {
        let api = Arc::new(base_api());
        let p = provider(api.clone(), TunnelOptions::default());

        let eps = p.records().await.unwrap();
        assert_eq!(
            eps,
            vec![
                Endpoint::new("a.example.com", "A", ["https://10.0.0.1:443"]),
                Endpoint::new("b.example.com", "A", ["https://10.0.0.2:443"]),
            ]
        );
        assert_eq!(api.calls(), ["get_tunnel_configuration"]);
    }

    #[tokio::test]
    async fn dry_run_plans_but_never_mutates() {
        let api = Arc::new(base_api());
        let p = provider(
            api.clone(),
            TunnelOptions {
                dry_run: true,
                ..Default::default()
            },
        );
        let changes = Changes {
            create: vec![Endpoint::new("c.example.com", "A", ["10.0.0.3"])],
            ..Default::default()
        };

        p.apply_changes(&changes).await.unwrap();
        assert!(api.mutating_calls().is_empty(), "{:?}", api.calls());
        assert!(api.pushed.lock().unwrap().is_none());

        let plan = p.plan(&changes).await.unwrap();
        let hosts: Vec<_> = plan.config.ingress.iter().map(|r| r.hostname.as_str()).collect();
        assert_eq!(hosts, ["a.example.com", "b.example.com", "c.example.com", ""]);
        assert_eq!(plan.creates.len(), 1);
    }

    #[tokio::test]
    async fn apply_reconciles_ingress_and_dns() {
        let api = Arc::new(base_api());
        let p = provider(api.clone(), TunnelOptions::default());
        let changes = Changes {
            create: vec![
                Endpoint::new("c.example.com", "A", ["10.0.0.3"]),
                Endpoint::new("txt.example.com", "TXT", ["ignored"]),
            ],
            update_old: vec![Endpoint::new("a.example.com", "A", ["10.0.0.1"])],
            update_new: vec![Endpoint::new("a.example.com", "A", ["10.0.0.9"])],
            delete: vec![Endpoint::new("b.example.com", "A", ["10.0.0.2"])],
        };

        p.apply_changes(&changes).await.unwrap();

        // update keeps a.example.com in place, delete drops b, create appends c
        assert_eq!(api.pushed_hosts(), ["a.example.com", "c.example.com", ""]);
        let pushed = api.pushed.lock().unwrap().clone().unwrap();
        assert_eq!(pushed.ingress[0].service, "https://10.0.0.9:443");
        assert_eq!(
            pushed.ingress[0].origin_request,
            Some(OriginRequestConfig {
                no_tls_verify: Some(true),
                http2_origin: Some(true),
                ..Default::default()
            })
        );
        assert_eq!(pushed.ingress[2].service, "http_status:404");

        assert_eq!(
            api.mutating_calls(),
            [
                "update_tunnel_configuration",
                "create_dns_record:z1:c.example.com",
                "update_dns_record:z1:ra",
                "delete_dns_record:z1:rb",
            ]
        );
    }

    #[tokio::test]
    async fn created_record_is_proxied_tunnel_cname() {
        let api = Arc::new(base_api());
        let p = provider(api, TunnelOptions::default());
        let changes = Changes {
            create: vec![Endpoint::new("c.example.com", "A", ["10.0.0.3"])],
            ..Default::default()
        };

        let plan = p.plan(&changes).await.unwrap();
        assert_eq!(
            plan.creates,
            vec![DnsCreate {
                zone_id: "z1".into(),
                params: DnsRecordParams {
                    rtype: "CNAME".into(),
                    name: "c.example.com".into(),
                    content: "tun.cfargotunnel.com".into(),
                    ttl: 1,
                    proxied: true,
                },
            }]
        );
    }

    #[tokio::test]
    async fn unknown_zone_keeps_rule_but_skips_dns() {
        let api = Arc::new(base_api());
        let p = provider(api.clone(), TunnelOptions::default());
        let changes = Changes {
            create: vec![Endpoint::new("c.example.net", "A", ["10.0.0.3"])],
            delete: vec![Endpoint::new("gone.example.net", "A", ["10.0.0.4"])],
            ..Default::default()
        };

        p.apply_changes(&changes).await.unwrap();
        assert_eq!(
            api.pushed_hosts(),
            ["a.example.com", "b.example.com", "c.example.net", ""]
        );
        assert_eq!(api.mutating_calls(), ["update_tunnel_configuration"]);
    }

    #[tokio::test]
    async fn dns_failures_are_skipped() {
        let api = Arc::new(MockApi {
            fail_create: true,
            ..base_api()
        });
        let p = provider(api.clone(), TunnelOptions::default());
        let changes = Changes {
            create: vec![Endpoint::new("c.example.com", "A", ["10.0.0.3"])],
            delete: vec![Endpoint::new("b.example.com", "A", ["10.0.0.2"])],
            ..Default::default()
        };

        p.apply_changes(&changes).await.unwrap();
        assert_eq!(
            api.mutating_calls(),
            [
                "update_tunnel_configuration",
                "create_dns_record:z1:c.example.com",
                "delete_dns_record:z1:rb",
            ]
        );
    }

    #[tokio::test]
    async fn tunnel_push_failure_aborts_before_dns() {
        let api = Arc::new(MockApi {
            fail_tunnel_update: true,
            ..base_api()
        });
        let p = provider(api.clone(), TunnelOptions::default());
        let changes = Changes {
            create: vec![Endpoint::new("c.example.com", "A", ["10.0.0.3"])],
            ..Default::default()
        };

        let err = p.apply_changes(&changes).await.unwrap_err();
        assert!(err.to_string().starts_with("failed to update tunnel configs"));
        assert_eq!(api.mutating_calls(), ["update_tunnel_configuration"]);
    }

    #[tokio::test]
    async fn record_lookup_follows_pages() {
        let mut api = base_api();
        api.records.insert(
            "z1".into(),
            vec![
                vec![cname("rx", "x.example.com")],
                vec![cname("rb", "b.example.com")],
            ],
        );
        let api = Arc::new(api);
        let p = provider(api.clone(), TunnelOptions::default());
        let changes = Changes {
            delete: vec![Endpoint::new("b.example.com", "A", ["10.0.0.2"])],
            ..Default::default()
        };

        let plan = p.plan(&changes).await.unwrap();
        assert_eq!(plan.deletes[0].record_id, "rb");
        let lists: Vec<_> = api
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("list_dns_records"))
            .collect();
        assert_eq!(lists, ["list_dns_records:z1:1", "list_dns_records:z1:2"]);
    }

    #[tokio::test]
    async fn missing_record_still_issues_call_with_empty_id() {
        let api = Arc::new(base_api());
        let p = provider(api.clone(), TunnelOptions::default());
        let changes = Changes {
            update_new: vec![Endpoint::new("new.example.com", "A", ["10.0.0.5"])],
            ..Default::default()
        };

        p.apply_changes(&changes).await.unwrap();
        assert!(api
            .mutating_calls()
            .contains(&"update_dns_record:z1:".to_string()));
        // update on an unknown hostname appends the rule
        assert_eq!(
            api.pushed_hosts(),
            ["a.example.com", "b.example.com", "new.example.com", ""]
        );
    }

    #[tokio::test]
    async fn zone_id_filter_looks_up_listed_zones_only() {
        let api = Arc::new(base_api());
        let p = provider(
            api.clone(),
            TunnelOptions {
                zone_id_filter: ZoneIdFilter::new(["z2"]),
                ..Default::default()
            },
        );

        let zones = p.zones().await.unwrap();
        assert_eq!(zones, vec![zone("z2", "example.org")]);
        assert_eq!(api.calls(), ["zone_details:z2"]);
    }

    #[tokio::test]
    async fn domain_filter_limits_listed_zones() {
        let api = Arc::new(base_api());
        let p = provider(
            api,
            TunnelOptions {
                domain_filter: DomainFilter::new(["example.org"]),
                ..Default::default()
            },
        );
        assert_eq!(p.zones().await.unwrap(), vec![zone("z2", "example.org")]);
    }

    #[tokio::test]
    async fn rules_after_catch_all_are_dropped_and_missing_catch_all_added() {
        let api = Arc::new(MockApi {
            ingress: vec![
                rule("a.example.com", "https://10.0.0.1:443"),
                rule("", "http_status:503"),
                rule("stale.example.com", "https://10.0.0.7:443"),
            ],
            ..base_api()
        });
        let p = provider(api, TunnelOptions::default());
        let plan = p.plan(&Changes::default()).await.unwrap();
        assert_eq!(
            plan.config.ingress,
            vec![
                rule("a.example.com", "https://10.0.0.1:443"),
                rule("", "http_status:503"),
            ]
        );

        let api = Arc::new(MockApi {
            ingress: vec![rule("a.example.com", "https://10.0.0.1:443")],
            ..base_api()
        });
        let p = provider(api, TunnelOptions::default());
        let plan = p.plan(&Changes::default()).await.unwrap();
        assert_eq!(plan.config.ingress.last(), Some(&rule("", "http_status:404")));
    }

    #[test]
    fn record_id_first_exact_match() {
        let records = vec![
            DnsRecord {
                rtype: "A".into(),
                ..cname("r0", "a.example.com")
            },
            cname("r1", "a.example.com"),
            cname("r2", "a.example.com"),
        ];
        assert_eq!(record_id(&records, "a.example.com", "CNAME"), "r1");
        assert_eq!(record_id(&records, "a.example.com", "A"), "r0");
        assert_eq!(record_id(&records, "b.example.com", "CNAME"), "");
    }
}
