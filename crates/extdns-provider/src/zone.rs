use std::collections::BTreeMap;
use std::net::IpAddr;

/// Zone id → zone name lookup used to route a hostname to its zone.
#[derive(Clone, Debug, Default)]
pub struct ZoneIdName(BTreeMap<String, String>);

impl ZoneIdName {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, zone_id: impl Into<String>, zone_name: impl Into<String>) {
        self.0.insert(zone_id.into(), zone_name.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Most specific zone owning `hostname`, as `(id, name)`.
    pub fn find_zone(&self, hostname: &str) -> Option<(&str, &str)> {
        let host = hostname.trim_end_matches('.').to_ascii_lowercase();
        let mut best: Option<(&str, &str)> = None;
        for (id, name) in &self.0 {
            let zone = name.trim_end_matches('.').to_ascii_lowercase();
            let owned = host == zone
                || host
                    .strip_suffix(zone.as_str())
                    .is_some_and(|head| head.ends_with('.'));
            if owned && best.is_none_or(|(_, b)| name.len() > b.len()) {
                best = Some((id.as_str(), name.as_str()));
            }
        }
        best
    }
}

/// Append a single trailing dot unless `hostname` is an IP literal.
pub fn ensure_trailing_dot(hostname: &str) -> String {
    if hostname.parse::<IpAddr>().is_ok() {
        return hostname.to_owned();
    }
    format!("{}.", hostname.trim_end_matches('.'))
}
