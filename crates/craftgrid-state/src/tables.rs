//! redb table definitions.
//!
//! Both tables use `&str` keys and JSON `&[u8]` values.

use redb::TableDefinition;

/// World records keyed by world name.
pub const WORLDS: TableDefinition<&str, &[u8]> = TableDefinition::new("worlds");

/// Metric points keyed by `{namespace}/{metric}/{cluster}/{service}/{timestamp:020}`.
///
/// Cluster and service names never contain `/`, so every series occupies one
/// contiguous, time-ordered key range.
pub const POINTS: TableDefinition<&str, &[u8]> = TableDefinition::new("points");
