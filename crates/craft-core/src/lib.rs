pub mod config;
pub mod environment;
pub mod resources;
pub mod types;
pub mod world;

pub use config::{ConfigError, FleetConfig};
pub use resources::{build_world_resources, FleetDefaults, WorldResources};
pub use types::*;
pub use world::*;
