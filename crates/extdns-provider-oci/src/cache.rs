use crate::client::ZoneSummary;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Zone listing kept for a fixed duration; replaced wholesale on refresh.
#[derive(Debug, Default)]
pub struct ZoneCache {
    age: Option<Instant>,
    duration: Duration,
    zones: BTreeMap<String, ZoneSummary>,
}

impl ZoneCache {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            ..Default::default()
        }
    }

    pub fn reset(&mut self, zones: BTreeMap<String, ZoneSummary>) {
        self.age = Some(Instant::now());
        self.zones = zones;
    }

    pub fn expired(&self) -> bool {
        self.expired_at(Instant::now())
    }

    pub fn expired_at(&self, now: Instant) -> bool {
        match self.age {
            None => true,
            Some(age) => now.saturating_duration_since(age) > self.duration,
        }
    }

    pub fn zones(&self) -> &BTreeMap<String, ZoneSummary> {
        &self.zones
    }
}
