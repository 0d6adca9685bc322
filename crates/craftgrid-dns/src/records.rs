//! In-memory record and interface tables.
//!
//! These back the daemon and the tests; a hosted DNS provider or cloud
//! network API plugs in through the same traits.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::updater::{DnsFuture, InterfaceLookup, RecordSink};

/// An address record for a world's host name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub hosted_zone_id: String,
    /// Fully-qualified name with trailing dot.
    pub name: String,
    pub record_type: String,
    pub values: Vec<String>,
    pub ttl: u32,
}

impl DnsRecord {
    pub fn a(hosted_zone_id: &str, host_name: &str, address: &str, ttl: u32) -> Self {
        Self {
            hosted_zone_id: hosted_zone_id.to_string(),
            name: fqdn(host_name),
            record_type: "A".to_string(),
            values: vec![address.to_string()],
            ttl,
        }
    }
}

/// `host` with exactly one trailing dot.
pub fn fqdn(host: &str) -> String {
    format!("{}.", host.trim_end_matches('.'))
}

/// Records keyed by zone, name, and type. Upserts replace.
#[derive(Debug, Clone, Default)]
pub struct RecordTable {
    records: Arc<RwLock<HashMap<(String, String, String), DnsRecord>>>,
}

impl RecordTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, record: DnsRecord) {
        let key = (
            record.hosted_zone_id.clone(),
            record.name.clone(),
            record.record_type.clone(),
        );
        debug!(name = %record.name, zone = %record.hosted_zone_id, "upserted DNS record");
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, record);
    }

    pub fn get(&self, hosted_zone_id: &str, name: &str, record_type: &str) -> Option<DnsRecord> {
        let key = (
            hosted_zone_id.to_string(),
            fqdn(name),
            record_type.to_string(),
        );
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    /// All records, sorted by name.
    pub fn list(&self) -> Vec<DnsRecord> {
        let mut records: Vec<DnsRecord> = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        records.sort_by(|a, b| a.name.cmp(&b.name).then(a.record_type.cmp(&b.record_type)));
        records
    }
}

impl RecordSink for RecordTable {
    fn upsert<'a>(&'a self, record: &'a DnsRecord) -> DnsFuture<'a, ()> {
        RecordTable::upsert(self, record.clone());
        Box::pin(async { Ok(()) })
    }
}

/// Public IP per network interface id. An interface may exist without one.
#[derive(Debug, Clone, Default)]
pub struct InterfaceTable {
    interfaces: Arc<RwLock<HashMap<String, Option<String>>>>,
}

impl InterfaceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn associate(&self, interface_id: &str, public_ip: Option<String>) {
        debug!(interface = %interface_id, public_ip = ?public_ip, "network interface recorded");
        self.interfaces
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(interface_id.to_string(), public_ip);
    }

    pub fn public_ip(&self, interface_id: &str) -> Option<String> {
        self.interfaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(interface_id)
            .cloned()
            .flatten()
    }
}

impl InterfaceLookup for InterfaceTable {
    fn public_ip<'a>(&'a self, interface_id: &'a str) -> DnsFuture<'a, Option<String>> {
        let ip = InterfaceTable::public_ip(self, interface_id);
        Box::pin(async move { Ok(ip) })
    }
}
