use serde::{Deserialize, Serialize};
use std::fmt;

/// Record type names as exchanged with the controller.
pub mod record_type {
    pub const A: &str = "A";
    pub const AAAA: &str = "AAAA";
    pub const CNAME: &str = "CNAME";
    pub const TXT: &str = "TXT";
    pub const SRV: &str = "SRV";
    pub const NS: &str = "NS";
    pub const MX: &str = "MX";
    pub const PTR: &str = "PTR";
}

/// Record types the controller knows how to plan for.
pub fn supported_record_type(rtype: &str) -> bool {
    use record_type::*;
    matches!(rtype, A | AAAA | CNAME | SRV | TXT | NS | MX)
}

/// Record TTL in seconds; zero or negative means "not configured".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ttl(pub i64);

impl Ttl {
    pub fn is_configured(self) -> bool {
        self.0 > 0
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub dns_name: String,
    #[serde(default)]
    pub targets: Vec<String>,
    pub record_type: String,
    #[serde(default, rename = "recordTTL")]
    pub record_ttl: Ttl,
}

impl Endpoint {
    pub fn new<S: Into<String>>(
        dns_name: impl Into<String>,
        record_type: impl Into<String>,
        targets: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::with_ttl(dns_name, record_type, Ttl::default(), targets)
    }

    pub fn with_ttl<S: Into<String>>(
        dns_name: impl Into<String>,
        record_type: impl Into<String>,
        ttl: Ttl,
        targets: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            dns_name: dns_name.into(),
            targets: targets.into_iter().map(Into::into).collect(),
            record_type: record_type.into(),
            record_ttl: ttl,
        }
    }

    /// First target, or `""` for a target-less endpoint.
    pub fn first_target(&self) -> &str {
        self.targets.first().map(String::as_str).unwrap_or_default()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} IN {} {}",
            self.dns_name,
            self.record_ttl.0,
            self.record_type,
            self.targets.join(" ")
        )
    }
}

/// A planned change set, produced by the controller per reconciliation cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Changes {
    #[serde(default)]
    pub create: Vec<Endpoint>,
    #[serde(default)]
    pub update_old: Vec<Endpoint>,
    #[serde(default)]
    pub update_new: Vec<Endpoint>,
    #[serde(default)]
    pub delete: Vec<Endpoint>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty()
            && self.update_old.is_empty()
            && self.update_new.is_empty()
            && self.delete.is_empty()
    }
}
