//! craftgrid.toml fleet configuration parser.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resources::FleetDefaults;
use crate::types::{parse_duration, PublishTarget};
use crate::world::WorldSpec;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid duration for {field}: {value:?}")]
    InvalidDuration { field: String, value: String },

    #[error("sampling interval must be greater than zero")]
    ZeroSamplingInterval,

    #[error("sampling interval {0:?} must be a whole number of seconds")]
    FractionalSamplingInterval(Duration),

    #[error("duplicate world name: {0}")]
    DuplicateWorld(String),

    #[error("world {0}: host_name must not be empty")]
    EmptyHostName(String),

    #[error("world {world}: {field} {value:?} must not contain '/'")]
    InvalidName {
        world: String,
        field: &'static str,
        value: String,
    },

    #[error("world {world}: autoscale delay {delay:?} is shorter than the sampling interval {period:?}")]
    DelayShorterThanPeriod {
        world: String,
        delay: Duration,
        period: Duration,
    },

    #[error("world {world}: initial capacity must be 0 or 1, got {capacity}")]
    InvalidCapacity { world: String, capacity: u32 },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetConfig {
    #[serde(default)]
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub autoscale: AutoscaleConfig,
    #[serde(default)]
    pub worlds: Vec<WorldSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Sampling period; also the alarm evaluation period.
    pub interval: String,
    pub timeout: String,
    /// Metric history kept in the store, e.g. "1d".
    pub retention: Option<String>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: "1m".to_string(),
            timeout: "1s".to_string(),
            retention: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoscaleConfig {
    pub evaluation_interval: String,
    /// Lookback window as a multiple of a world's evaluation periods.
    pub lookback_factor: u32,
}

impl Default for AutoscaleConfig {
    fn default() -> Self {
        Self {
            evaluation_interval: "1m".to_string(),
            lookback_factor: 2,
        }
    }
}

fn duration(field: &str, value: &str) -> Result<Duration, ConfigError> {
    parse_duration(value).ok_or_else(|| ConfigError::InvalidDuration {
        field: field.to_string(),
        value: value.to_string(),
    })
}

impl FleetConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a fleet config.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: FleetConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn sampling_interval(&self) -> Result<Duration, ConfigError> {
        duration("sampler.interval", &self.sampler.interval)
    }

    pub fn sampling_timeout(&self) -> Result<Duration, ConfigError> {
        duration("sampler.timeout", &self.sampler.timeout)
    }

    pub fn retention(&self) -> Result<Option<Duration>, ConfigError> {
        match &self.sampler.retention {
            Some(value) if value.ends_with('d') => value
                .trim_end_matches('d')
                .parse::<u64>()
                .map(|days| Some(Duration::from_secs(days * 86_400)))
                .map_err(|_| ConfigError::InvalidDuration {
                    field: "sampler.retention".to_string(),
                    value: value.clone(),
                }),
            Some(value) => duration("sampler.retention", value).map(Some),
            None => Ok(None),
        }
    }

    pub fn evaluation_interval(&self) -> Result<Duration, ConfigError> {
        duration("autoscale.evaluation_interval", &self.autoscale.evaluation_interval)
    }

    pub fn defaults(&self) -> Result<FleetDefaults, ConfigError> {
        Ok(FleetDefaults {
            sampling_period: self.sampling_interval()?,
        })
    }

    pub fn world(&self, name: &str) -> Option<&WorldSpec> {
        self.worlds.iter().find(|w| w.name == name)
    }

    /// One scheduled trigger payload per world.
    pub fn publish_targets(&self) -> Vec<PublishTarget> {
        self.worlds.iter().map(WorldSpec::publish_target).collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let period = self.sampling_interval()?;
        if period.is_zero() {
            return Err(ConfigError::ZeroSamplingInterval);
        }
        // Alarm periods are whole seconds.
        if period.subsec_nanos() != 0 {
            return Err(ConfigError::FractionalSamplingInterval(period));
        }
        self.sampling_timeout()?;
        self.evaluation_interval()?;
        self.retention()?;

        let mut seen = HashSet::new();
        for world in &self.worlds {
            if !seen.insert(world.name.as_str()) {
                return Err(ConfigError::DuplicateWorld(world.name.clone()));
            }
            if world.host_name.trim().is_empty() {
                return Err(ConfigError::EmptyHostName(world.name.clone()));
            }
            for (field, value) in [
                ("cluster", world.cluster_name()),
                ("service", world.service_name()),
            ] {
                if value.contains('/') {
                    return Err(ConfigError::InvalidName {
                        world: world.name.clone(),
                        field,
                        value,
                    });
                }
            }
            if let Some(delay) = &world.resources.autoscale_delay {
                let delay = duration("resources.autoscale_delay", delay)?;
                if delay < period {
                    return Err(ConfigError::DelayShorterThanPeriod {
                        world: world.name.clone(),
                        delay,
                        period,
                    });
                }
            }
            let capacity = world.initial_capacity();
            if capacity > 1 {
                return Err(ConfigError::InvalidCapacity {
                    world: world.name.clone(),
                    capacity,
                });
            }
        }
        Ok(())
    }
}
