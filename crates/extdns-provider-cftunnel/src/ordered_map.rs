//! Hostname-keyed ingress rules that remember their order.
//!
//! `add` re-appends an existing hostname at the end, `update` edits it in
//! place. The tunnel's ingress list is rebuilt from [`OrderedMap::get`].

use crate::api::IngressRule;
use std::collections::HashMap;

#[derive(Clone, Debug, Default)]
pub struct OrderedMap {
    data: HashMap<String, IngressRule>,
    keys: Vec<String>,
}

impl OrderedMap {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            data: HashMap::with_capacity(cap),
            keys: Vec::with_capacity(cap),
        }
    }

    /// Insert `rule`; an existing hostname moves to the end.
    pub fn add(&mut self, rule: IngressRule) {
        if self.data.contains_key(&rule.hostname) {
            self.unlink(&rule.hostname);
        }
        self.keys.push(rule.hostname.clone());
        self.data.insert(rule.hostname.clone(), rule);
    }

    /// Replace `rule` in place; an unknown hostname is appended.
    pub fn update(&mut self, rule: IngressRule) {
        if !self.data.contains_key(&rule.hostname) {
            self.keys.push(rule.hostname.clone());
        }
        self.data.insert(rule.hostname.clone(), rule);
    }

    pub fn remove(&mut self, hostname: &str) {
        if self.data.remove(hostname).is_some() {
            self.unlink(hostname);
        }
    }

    /// Rules in current order, detached from the map.
    pub fn get(&self) -> Vec<IngressRule> {
        self.keys
            .iter()
            .filter_map(|k| self.data.get(k).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn unlink(&mut self, hostname: &str) {
        if let Some(pos) = self.keys.iter().position(|k| k == hostname) {
            self.keys.remove(pos);
        }
    }
}
