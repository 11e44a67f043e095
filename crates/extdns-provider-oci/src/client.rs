//! OCI DNS API (`20180115`) – the three calls the provider needs.

use crate::signer::RequestSigner;
use async_trait::async_trait;
use extdns_provider::ProviderError;
use reqwest::{Client, Method, Response, Url};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::{fmt, str::FromStr, sync::Arc};
use tracing::debug;

const NEXT_PAGE: &str = "opc-next-page";

/*──────── wire types ────────*/

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ZoneScope {
    Global,
    Private,
}

impl ZoneScope {
    pub const ALL: [ZoneScope; 2] = [ZoneScope::Global, ZoneScope::Private];

    pub fn as_str(self) -> &'static str {
        match self {
            ZoneScope::Global => "GLOBAL",
            ZoneScope::Private => "PRIVATE",
        }
    }
}

impl FromStr for ZoneScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GLOBAL" => Ok(ZoneScope::Global),
            "PRIVATE" => Ok(ZoneScope::Private),
            other => Err(format!("unknown OCI zone scope `{other}`")),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub compartment_id: String,
    #[serde(default)]
    pub scope: Option<ZoneScope>,
    #[serde(default)]
    pub zone_type: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub domain: String,
    pub rtype: String,
    #[serde(default)]
    pub rdata: String,
    #[serde(default)]
    pub ttl: i64,
    #[serde(default)]
    pub record_hash: Option<String>,
    #[serde(default)]
    pub is_protected: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Add,
    Remove,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordOperation {
    pub domain: String,
    pub rdata: String,
    pub ttl: i64,
    pub rtype: String,
    pub operation: Operation,
}

impl fmt::Display for RecordOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {} {} IN {} {}",
            self.operation, self.domain, self.ttl, self.rtype, self.rdata
        )
    }
}

/// One page of a listing plus the cursor of the next one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListZonesRequest {
    pub compartment_id: String,
    pub scope: ZoneScope,
    pub page: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GetZoneRecordsRequest {
    pub zone_name_or_id: String,
    pub compartment_id: String,
    pub page: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PatchZoneRecordsRequest {
    pub zone_name_or_id: String,
    pub compartment_id: String,
    pub items: Vec<RecordOperation>,
}

/*──────── client seam ────────*/

#[async_trait]
pub trait OciDnsClient: Send + Sync {
    /// Primary zones of one scope.
    async fn list_zones(&self, req: &ListZonesRequest)
    -> Result<Page<ZoneSummary>, ProviderError>;

    async fn get_zone_records(
        &self,
        req: &GetZoneRecordsRequest,
    ) -> Result<Page<Record>, ProviderError>;

    async fn patch_zone_records(&self, req: &PatchZoneRecordsRequest)
    -> Result<(), ProviderError>;
}

/*──────── HTTP implementation ────────*/

pub struct HttpOciClient {
    endpoint: String,
    client: Client,
    signer: Arc<dyn RequestSigner>,
}

impl HttpOciClient {
    pub fn new(region: &str, signer: Arc<dyn RequestSigner>) -> Result<Self, ProviderError> {
        Self::with_endpoint(
            &format!("https://dns.{region}.oraclecloud.com/20180115"),
            signer,
        )
    }

    pub fn with_endpoint(endpoint: &str, signer: Arc<dyn RequestSigner>) -> Result<Self, ProviderError> {
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            client: Client::builder().user_agent("extdns-rs (+github)").build()?,
            signer,
        })
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&format!("{}{path}", self.endpoint))
            .map_err(|e| ProviderError::Config(format!("bad OCI endpoint: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /*──────── signed request helper ────────*/

    async fn call(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> Result<Response, ProviderError> {
        let headers = self.signer.sign(&method, &url, body.as_deref())?;
        debug!("OCI {method} {}", url.path());
        let mut req = self.client.request(method, url).headers(headers);
        if let Some(body) = body {
            req = req.body(body);
        }
        let resp = req.send().await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let v: Value = resp.json().await.unwrap_or_default();
        let code = v["code"].as_str().unwrap_or("Unknown");
        let msg = v["message"].as_str().unwrap_or("OCI error");
        Err(ProviderError::Api(format!("{code}: {msg} (HTTP {status})")))
    }

    async fn page<T: DeserializeOwned>(
        resp: Response,
        extract: impl FnOnce(Value) -> Value,
    ) -> Result<Page<T>, ProviderError> {
        let next_page = resp
            .headers()
            .get(NEXT_PAGE)
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .map(str::to_owned);
        let v: Value = resp.json().await?;
        let items = serde_json::from_value(extract(v))
            .map_err(|e| ProviderError::Api(format!("malformed OCI response: {e}")))?;
        Ok(Page { items, next_page })
    }
}

#[async_trait]
impl OciDnsClient for HttpOciClient {
    async fn list_zones(
        &self,
        req: &ListZonesRequest,
    ) -> Result<Page<ZoneSummary>, ProviderError> {
        let mut query = vec![
            ("compartmentId", req.compartment_id.as_str()),
            ("zoneType", "PRIMARY"),
            ("scope", req.scope.as_str()),
        ];
        if let Some(page) = &req.page {
            query.push(("page", page));
        }
        let resp = self
            .call(Method::GET, self.url("/zones", &query)?, None)
            .await?;
        Self::page(resp, |v| v).await
    }

    async fn get_zone_records(
        &self,
        req: &GetZoneRecordsRequest,
    ) -> Result<Page<Record>, ProviderError> {
        let mut query = vec![("compartmentId", req.compartment_id.as_str())];
        if let Some(page) = &req.page {
            query.push(("page", page));
        }
        let path = format!("/zones/{}/records", req.zone_name_or_id);
        let resp = self
            .call(Method::GET, self.url(&path, &query)?, None)
            .await?;
        Self::page(resp, |v| v.get("items").cloned().unwrap_or_default()).await
    }

    async fn patch_zone_records(
        &self,
        req: &PatchZoneRecordsRequest,
    ) -> Result<(), ProviderError> {
        let body = serde_json::to_vec(&serde_json::json!({ "items": req.items }))
            .map_err(|e| ProviderError::Api(format!("encoding patch: {e}")))?;
        let path = format!("/zones/{}/records", req.zone_name_or_id);
        let url = self.url(&path, &[("compartmentId", req.compartment_id.as_str())])?;
        self.call(Method::PATCH, url, Some(body)).await?;
        Ok(())
    }
}
