//! Fleet bookkeeping shared by the daemon's subcommands.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use craft_core::{build_world_resources, FleetConfig, WorldResources};
use craftgrid_state::{epoch_secs, StateStore, WorldRecord};

const PRUNE_INTERVAL: Duration = Duration::from_secs(3600);

/// Make the store's worlds match the config.
///
/// Declared worlds are registered (keeping any capacity already set);
/// worlds no longer declared are removed.
pub fn sync_worlds(store: &StateStore, config: &FleetConfig, now: u64) -> anyhow::Result<Vec<WorldRecord>> {
    let mut records = Vec::with_capacity(config.worlds.len());
    for spec in &config.worlds {
        let record = store.register_world(spec, now)?;
        info!(
            world = %record.name,
            edition = %record.edition,
            capacity = record.desired_capacity,
            autoscaling = record.autoscaling_enabled,
            "world registered"
        );
        records.push(record);
    }

    for stale in store.list_worlds()? {
        if config.world(&stale.name).is_none() {
            warn!(world = %stale.name, "world no longer declared, removing");
            store.delete_world(&stale.name)?;
        }
    }
    Ok(records)
}

/// Resource graphs for every world, or only `world` when given.
pub fn render(config: &FleetConfig, world: Option<&str>) -> anyhow::Result<Vec<WorldResources>> {
    let defaults = config.defaults()?;
    match world {
        Some(name) => {
            let spec = config
                .world(name)
                .ok_or_else(|| anyhow::anyhow!("world {name} is not declared"))?;
            Ok(vec![build_world_resources(spec, &defaults)])
        }
        None => Ok(config
            .worlds
            .iter()
            .map(|spec| build_world_resources(spec, &defaults))
            .collect()),
    }
}

/// Drop metric points older than `retention`, hourly, until shutdown.
pub async fn run_retention(
    store: StateStore,
    retention: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(retention_secs = retention.as_secs(), "metric retention started");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(PRUNE_INTERVAL) => {
                let cutoff = epoch_secs().saturating_sub(retention.as_secs());
                match store.prune_points_before(cutoff) {
                    Ok(removed) => info!(removed, cutoff, "old metric points pruned"),
                    Err(e) => error!(error = %e, "metric pruning failed"),
                }
            }
            _ = shutdown.changed() => {
                info!("metric retention shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[sampler]
interval = "1m"

[[worlds]]
name = "survival"
host_name = "survival.example.com"
cluster = "mc"
[worlds.server]
edition = "java"
eula = true

[[worlds]]
name = "pocket"
host_name = "pocket.example.com"
cluster = "mc"
[worlds.server]
edition = "bedrock"
[worlds.resources]
enable_autoscaling = false
"#;

    fn config() -> FleetConfig {
        FleetConfig::from_toml_str(CONFIG).unwrap()
    }

    #[test]
    fn sync_registers_declared_worlds() {
        let store = StateStore::open_in_memory().unwrap();
        let records = sync_worlds(&store, &config(), 100).unwrap();

        assert_eq!(records.len(), 2);
        let survival = store.get_world("survival").unwrap().unwrap();
        assert_eq!(survival.desired_capacity, 0);
        assert!(survival.autoscaling_enabled);
        let pocket = store.get_world("pocket").unwrap().unwrap();
        assert_eq!(pocket.desired_capacity, 1);
        assert_eq!(pocket.port, 19132);
    }

    #[test]
    fn sync_removes_undeclared_worlds() {
        let store = StateStore::open_in_memory().unwrap();
        let mut config = config();
        sync_worlds(&store, &config, 100).unwrap();

        config.worlds.retain(|w| w.name == "survival");
        sync_worlds(&store, &config, 200).unwrap();
        let names: Vec<String> = store.list_worlds().unwrap().into_iter().map(|w| w.name).collect();
        assert_eq!(names, vec!["survival"]);
    }

    #[test]
    fn render_one_or_all() {
        let config = config();
        assert_eq!(render(&config, None).unwrap().len(), 2);

        let graphs = render(&config, Some("pocket")).unwrap();
        assert_eq!(graphs.len(), 1);
        assert!(graphs[0].scaling.is_none());

        assert!(render(&config, Some("creative")).is_err());
    }
}
