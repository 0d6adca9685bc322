//! DNS updater errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DnsUpdateError {
    #[error("{task} does not have a network interface")]
    MissingNetworkInterface { task: String },

    #[error("{task} does not have a public ip address (interface {interface})")]
    MissingPublicIp { task: String, interface: String },

    #[error("network interface lookup for {interface} failed: {reason}")]
    Lookup { interface: String, reason: String },

    #[error("record upsert for {name} failed: {reason}")]
    Upsert { name: String, reason: String },
}
