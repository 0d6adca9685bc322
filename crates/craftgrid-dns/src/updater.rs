//! Task-start handler: upsert a world's A record with its task's public IP.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, info};

use craft_core::DnsTarget;

use crate::error::DnsUpdateError;
use crate::event::TaskStateChange;
use crate::records::DnsRecord;

/// Boxed future alias for the updater's collaborators.
pub type DnsFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, DnsUpdateError>> + Send + 'a>>;

/// Resolves a network interface to its public IP.
pub trait InterfaceLookup: Send + Sync {
    /// `Ok(None)` when the interface has no public address.
    fn public_ip<'a>(&'a self, interface_id: &'a str) -> DnsFuture<'a, Option<String>>;
}

/// Writes address records.
pub trait RecordSink: Send + Sync {
    fn upsert<'a>(&'a self, record: &'a DnsRecord) -> DnsFuture<'a, ()>;
}

pub struct DnsUpdater {
    interfaces: Arc<dyn InterfaceLookup>,
    records: Arc<dyn RecordSink>,
}

impl DnsUpdater {
    pub fn new(interfaces: Arc<dyn InterfaceLookup>, records: Arc<dyn RecordSink>) -> Self {
        Self { interfaces, records }
    }

    /// Handle one task state change for the world described by `target`.
    ///
    /// Returns the upserted record, or `None` when the task is not running.
    /// Failures are returned, never retried.
    pub async fn handle(
        &self,
        event: &TaskStateChange,
        target: &DnsTarget,
    ) -> Result<Option<DnsRecord>, DnsUpdateError> {
        if !event.is_running() {
            debug!(
                task = %event.task_arn,
                last_status = %event.last_status,
                desired_status = %event.desired_status,
                "task not running, no DNS change"
            );
            return Ok(None);
        }

        let interface = event.network_interface_id().ok_or_else(|| {
            DnsUpdateError::MissingNetworkInterface {
                task: event.task_arn.clone(),
            }
        })?;

        let public_ip = self.interfaces.public_ip(interface).await?.ok_or_else(|| {
            DnsUpdateError::MissingPublicIp {
                task: event.task_arn.clone(),
                interface: interface.to_string(),
            }
        })?;

        let record = DnsRecord::a(&target.hosted_zone_id, &target.host_name, &public_ip, target.ttl);
        info!(
            host = %target.host_name,
            address = %public_ip,
            task = %event.task_arn,
            "updating address record"
        );
        self.records.upsert(&record).await?;
        Ok(Some(record))
    }
}
