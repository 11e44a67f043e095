//! Cloudflare API v4 – the tunnel configuration, zone and DNS record calls.

use crate::config::{CfTunnelConfig, Credentials};
use async_trait::async_trait;
use extdns_provider::ProviderError;
use reqwest::{
    Client, Response,
    header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use tracing::debug;

pub const API_ROOT: &str = "https://api.cloudflare.com/client/v4";

const ZONES_PER_PAGE: u32 = 50;

/*──────── wire types ────────*/

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginRequestConfig {
    #[serde(rename = "noTLSVerify", skip_serializing_if = "Option::is_none")]
    pub no_tls_verify: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http2_origin: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One tunnel routing entry; an empty hostname is the catch-all.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressRule {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hostname: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_request: Option<OriginRequestConfig>,
}

impl IngressRule {
    pub fn is_catch_all(&self) -> bool {
        self.hostname.is_empty()
    }
}

/// Tunnel configuration; parts other than `ingress` round-trip untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TunnelConfiguration {
    #[serde(default)]
    pub ingress: Vec<IngressRule>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct TunnelConfigurationResult {
    #[serde(default)]
    pub tunnel_id: String,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub config: TunnelConfiguration,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct DnsRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub rtype: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub ttl: u32,
    #[serde(default)]
    pub proxied: bool,
}

/// Body of a DNS record create or update.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DnsRecordParams {
    #[serde(rename = "type")]
    pub rtype: String,
    pub name: String,
    pub content: String,
    /// `1` means "automatic".
    pub ttl: u32,
    pub proxied: bool,
}

/// Pagination cursor of a list call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ResultInfo {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub per_page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub total_count: u32,
}

impl ResultInfo {
    pub fn first(per_page: u32) -> Self {
        Self {
            page: 1,
            per_page,
            ..Default::default()
        }
    }

    pub fn next(self) -> Self {
        Self {
            page: self.page + 1,
            ..self
        }
    }

    pub fn done(&self) -> bool {
        self.page > 1 && self.page > self.total_pages
    }
}

/*──────── client seam ────────*/

/// The subset of the Cloudflare API the tunnel provider drives.
#[async_trait]
pub trait TunnelApi: Send + Sync {
    async fn get_tunnel_configuration(
        &self,
        account_id: &str,
        tunnel_id: &str,
    ) -> Result<TunnelConfigurationResult, ProviderError>;

    async fn update_tunnel_configuration(
        &self,
        account_id: &str,
        tunnel_id: &str,
        config: &TunnelConfiguration,
    ) -> Result<TunnelConfigurationResult, ProviderError>;

    async fn zone_details(&self, zone_id: &str) -> Result<Zone, ProviderError>;

    /// Every zone visible to the credentials.
    async fn list_zones(&self) -> Result<Vec<Zone>, ProviderError>;

    async fn list_dns_records(
        &self,
        zone_id: &str,
        page: ResultInfo,
    ) -> Result<(Vec<DnsRecord>, ResultInfo), ProviderError>;

    async fn create_dns_record(
        &self,
        zone_id: &str,
        params: &DnsRecordParams,
    ) -> Result<DnsRecord, ProviderError>;

    async fn update_dns_record(
        &self,
        zone_id: &str,
        record_id: &str,
        params: &DnsRecordParams,
    ) -> Result<DnsRecord, ProviderError>;

    async fn delete_dns_record(&self, zone_id: &str, record_id: &str)
    -> Result<(), ProviderError>;
}

/*──────── HTTP implementation ────────*/

pub struct HttpTunnelApi {
    root: String,
    client: Client,
}

impl HttpTunnelApi {
    pub fn new(cfg: &CfTunnelConfig) -> Result<Self, ProviderError> {
        Self::with_api_root(cfg, API_ROOT)
    }

    pub fn with_api_root(cfg: &CfTunnelConfig, root: &str) -> Result<Self, ProviderError> {
        let header = |v: &str| {
            HeaderValue::from_str(v)
                .map_err(|e| ProviderError::Config(format!("invalid credential header: {e}")))
        };

        let mut hdr = HeaderMap::new();
        match &cfg.credentials {
            Credentials::Token(token) => {
                hdr.insert(AUTHORIZATION, header(&format!("Bearer {token}"))?);
            }
            Credentials::Key { key, email } => {
                hdr.insert(HeaderName::from_static("x-auth-key"), header(key)?);
                hdr.insert(HeaderName::from_static("x-auth-email"), header(email)?);
            }
        }
        hdr.insert(USER_AGENT, HeaderValue::from_static("extdns-rs (+github)"));
        hdr.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(Self {
            root: root.trim_end_matches('/').to_owned(),
            client: Client::builder().default_headers(hdr).build()?,
        })
    }

    /*──────── tiny HTTP wrapper ────────*/

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ProviderError> {
        self.check(
            self.client
                .get(format!("{}{path}", self.root))
                .query(query)
                .send()
                .await?,
        )
        .await
    }
    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> Result<Value, ProviderError> {
        self.check(
            self.client
                .request(method, format!("{}{path}", self.root))
                .json(body)
                .send()
                .await?,
        )
        .await
    }
    async fn delete(&self, path: &str) -> Result<Value, ProviderError> {
        self.check(
            self.client
                .delete(format!("{}{path}", self.root))
                .send()
                .await?,
        )
        .await
    }

    async fn check(&self, resp: Response) -> Result<Value, ProviderError> {
        let status = resp.status();
        let v: Value = resp.json().await?;
        if status.is_success() && v["success"].as_bool().unwrap_or(false) {
            Ok(v)
        } else {
            let msg = v["errors"]
                .get(0)
                .and_then(|e| e["message"].as_str())
                .unwrap_or("unknown error");
            Err(ProviderError::Api(format!("{msg} (HTTP {status})")))
        }
    }
}

fn result<T: DeserializeOwned>(v: &mut Value) -> Result<T, ProviderError> {
    serde_json::from_value(v["result"].take())
        .map_err(|e| ProviderError::Api(format!("malformed result: {e}")))
}

fn result_info(v: &Value) -> ResultInfo {
    serde_json::from_value(v["result_info"].clone()).unwrap_or_default()
}

#[async_trait]
impl TunnelApi for HttpTunnelApi {
    async fn get_tunnel_configuration(
        &self,
        account_id: &str,
        tunnel_id: &str,
    ) -> Result<TunnelConfigurationResult, ProviderError> {
        let mut v = self
            .get(
                &format!("/accounts/{account_id}/cfd_tunnel/{tunnel_id}/configurations"),
                &[],
            )
            .await?;
        result(&mut v)
    }

    async fn update_tunnel_configuration(
        &self,
        account_id: &str,
        tunnel_id: &str,
        config: &TunnelConfiguration,
    ) -> Result<TunnelConfigurationResult, ProviderError> {
        let body = serde_json::json!({ "config": config });
        let mut v = self
            .send_json(
                reqwest::Method::PUT,
                &format!("/accounts/{account_id}/cfd_tunnel/{tunnel_id}/configurations"),
                &body,
            )
            .await?;
        result(&mut v)
    }

    async fn zone_details(&self, zone_id: &str) -> Result<Zone, ProviderError> {
        let mut v = self.get(&format!("/zones/{zone_id}"), &[]).await?;
        result(&mut v)
    }

    async fn list_zones(&self) -> Result<Vec<Zone>, ProviderError> {
        let mut zones = Vec::new();
        let mut page = ResultInfo::first(ZONES_PER_PAGE);
        loop {
            let mut v = self
                .get(
                    "/zones",
                    &[
                        ("page", page.page.to_string()),
                        ("per_page", page.per_page.to_string()),
                    ],
                )
                .await?;
            let batch: Vec<Zone> = result(&mut v)?;
            debug!("Cloudflare listed {} zones on page {}", batch.len(), page.page);
            zones.extend(batch);
            page = ResultInfo {
                page: page.page,
                per_page: page.per_page,
                ..result_info(&v)
            }
            .next();
            if page.done() {
                break;
            }
        }
        Ok(zones)
    }

    async fn list_dns_records(
        &self,
        zone_id: &str,
        page: ResultInfo,
    ) -> Result<(Vec<DnsRecord>, ResultInfo), ProviderError> {
        let mut query = vec![("page", page.page.max(1).to_string())];
        if page.per_page > 0 {
            query.push(("per_page", page.per_page.to_string()));
        }
        let mut v = self
            .get(&format!("/zones/{zone_id}/dns_records"), &query)
            .await?;
        let records = result(&mut v)?;
        Ok((records, result_info(&v)))
    }

    async fn create_dns_record(
        &self,
        zone_id: &str,
        params: &DnsRecordParams,
    ) -> Result<DnsRecord, ProviderError> {
        let mut v = self
            .send_json(
                reqwest::Method::POST,
                &format!("/zones/{zone_id}/dns_records"),
                params,
            )
            .await?;
        result(&mut v)
    }

    async fn update_dns_record(
        &self,
        zone_id: &str,
        record_id: &str,
        params: &DnsRecordParams,
    ) -> Result<DnsRecord, ProviderError> {
        let mut v = self
            .send_json(
                reqwest::Method::PATCH,
                &format!("/zones/{zone_id}/dns_records/{record_id}"),
                params,
            )
            .await?;
        result(&mut v)
    }

    async fn delete_dns_record(
        &self,
        zone_id: &str,
        record_id: &str,
    ) -> Result<(), ProviderError> {
        self.delete(&format!("/zones/{zone_id}/dns_records/{record_id}"))
            .await?;
        Ok(())
    }
}
