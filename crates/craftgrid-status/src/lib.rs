//! craftgrid-status: live status of a running game server.
//!
//! Java servers answer the Server List Ping over TCP; Bedrock servers answer
//! a RakNet unconnected ping over UDP. Both produce a [`ServerStatus`]. Any
//! failure is a [`QueryError`]; callers treat every error the same way (no
//! sample this tick).

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use craft_core::Edition;

pub mod bedrock;
pub mod error;
pub mod host;
pub mod java;

pub use bedrock::BedrockStatusQuery;
pub use error::QueryError;
pub use host::split_host_port;
pub use java::JavaStatusQuery;

/// Player counts advertised by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Players {
    pub online: u32,
    pub max: u32,
}

/// One status reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerStatus {
    /// Round-trip latency in milliseconds.
    pub ping_ms: u64,
    /// Absent when the server does not report players.
    pub players: Option<Players>,
    pub version: Option<String>,
    pub motd: Option<String>,
}

/// Boxed future alias for status query results.
pub type QueryFuture<'a> = Pin<Box<dyn Future<Output = Result<ServerStatus, QueryError>> + Send + 'a>>;

/// Queries a server's status. Injected into the sampler for testability.
pub trait StatusQuery: Send + Sync {
    /// Query `host` (`name` or `name:port`), giving up after `timeout`.
    fn query<'a>(&'a self, host: &'a str, timeout: Duration) -> QueryFuture<'a>;
}

/// One client per edition, as used by the daemon.
pub fn default_clients() -> HashMap<Edition, Arc<dyn StatusQuery>> {
    let mut clients: HashMap<Edition, Arc<dyn StatusQuery>> = HashMap::new();
    clients.insert(Edition::Java, Arc::new(JavaStatusQuery::new()));
    clients.insert(Edition::Bedrock, Arc::new(BedrockStatusQuery::new()));
    clients
}

fn elapsed_ms(since: std::time::Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

/// Wall-clock milliseconds, echoed back by both ping protocols.
fn epoch_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(1)
}
