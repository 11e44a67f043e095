/// Name-based restriction on which domains a provider may act on.
///
/// An entry matches the domain itself and every subdomain; an entry with a
/// leading `.` matches subdomains only. Exclusions win over filters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DomainFilter {
    filters: Vec<String>,
    exclusions: Vec<String>,
}

fn normalize(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

fn prepare<I, S>(entries: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    entries
        .into_iter()
        .map(|s| normalize(s.as_ref()))
        .filter(|s| !s.is_empty())
        .collect()
}

fn match_any(filters: &[String], domain: &str, empty: bool) -> bool {
    if filters.is_empty() {
        return empty;
    }
    let domain = normalize(domain);
    filters.iter().any(|f| {
        if f.starts_with('.') {
            domain.ends_with(f.as_str())
        } else {
            domain == *f
                || domain
                    .strip_suffix(f.as_str())
                    .is_some_and(|head| head.ends_with('.'))
        }
    })
}

impl DomainFilter {
    pub fn new<I, S>(filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            filters: prepare(filters),
            exclusions: Vec::new(),
        }
    }

    pub fn with_exclusions<I, S>(mut self, exclusions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.exclusions = prepare(exclusions);
        self
    }

    pub fn filters(&self) -> &[String] {
        &self.filters
    }

    pub fn is_configured(&self) -> bool {
        !self.filters.is_empty()
    }

    pub fn matches(&self, domain: &str) -> bool {
        match_any(&self.filters, domain, true) && !match_any(&self.exclusions, domain, false)
    }
}

/// Id-based restriction on zones; empty matches everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ZoneIdFilter {
    zone_ids: Vec<String>,
}

impl ZoneIdFilter {
    pub fn new<I, S>(zone_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            zone_ids: zone_ids
                .into_iter()
                .map(Into::into)
                .filter(|id: &String| !id.trim().is_empty())
                .collect(),
        }
    }

    pub fn zone_ids(&self) -> &[String] {
        &self.zone_ids
    }

    pub fn is_configured(&self) -> bool {
        !self.zone_ids.is_empty()
    }

    pub fn matches(&self, zone_id: &str) -> bool {
        self.zone_ids.is_empty() || self.zone_ids.iter().any(|id| id == zone_id)
    }
}
