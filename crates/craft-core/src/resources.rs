//! Declarative resource graph for one world.
//!
//! [`build_world_resources`] is pure: the same world always yields the same
//! graph. `craftd render` prints it; nothing here talks to a provider.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::environment::{world_environment, Environment};
use crate::types::*;
use crate::world::{ServerVariant, WorldSpec, BEDROCK_IMAGE};

pub const DATA_MOUNT_PATH: &str = "/data";
const SFTP_IMAGE: &str = "atmoz/sftp";
const SFTP_PORT: u16 = 22;
const BACKUP_RETENTION_DAYS: u32 = 365;

/// Fleet-wide inputs shared by every world's graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FleetDefaults {
    pub sampling_period: Duration,
}

impl Default for FleetDefaults {
    fn default() -> Self {
        Self {
            sampling_period: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldResources {
    pub world: String,
    pub cluster: ClusterRef,
    pub file_system: FileSystem,
    pub backup: Option<BackupPlan>,
    pub task: TaskDefinition,
    pub service: Service,
    pub ingress: Vec<IngressRule>,
    pub scaling: Option<ScalingPolicy>,
    pub publisher_schedule: PublisherSchedule,
    pub dns: Option<DnsResources>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRef {
    pub name: String,
    /// True when the world declared its own cluster rather than joining one.
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSystem {
    /// Existing file system, or `None` when a new one is declared.
    pub existing_id: Option<String>,
    pub encrypted: bool,
    pub root_directory: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BackupPlan {
    Existing(String),
    DailyMonthly { retention_days: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub family: String,
    pub cpu: u32,
    pub memory_limit_mib: u32,
    pub transit_encryption: bool,
    pub containers: Vec<ContainerDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerDefinition {
    pub name: String,
    pub image: String,
    pub essential: bool,
    pub environment: Environment,
    pub secrets: Vec<(String, String)>,
    pub port_mappings: Vec<PortMapping>,
    pub mount_path: String,
    pub log_stream_prefix: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub container_port: u16,
    pub host_port: u16,
    pub protocol: Protocol,
}

impl PortMapping {
    fn same(port: u16, protocol: Protocol) -> Self {
        Self {
            container_port: port,
            host_port: port,
            protocol,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub assign_public_ip: bool,
    pub desired_count: u32,
    pub max_healthy_percent: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngressRule {
    pub port: u16,
    pub protocol: Protocol,
    pub ipv6: bool,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingPolicy {
    /// `service/{cluster}/{service}`
    pub resource_id: String,
    pub min_capacity: u32,
    pub max_capacity: u32,
    pub exact_capacity: u32,
    pub aggregation: String,
    pub alarm: AlarmDefinition,
    pub evaluation_periods: u32,
    pub treat_missing_data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublisherSchedule {
    pub rate_secs: u64,
    pub detail: PublishTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsResources {
    pub srv: Option<SrvRecord>,
    /// Rule target for the task-start updater.
    pub task_start_target: DnsTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SrvRecord {
    pub name: String,
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    pub target: String,
}

/// Build the resource graph for `world`.
pub fn build_world_resources(world: &WorldSpec, defaults: &FleetDefaults) -> WorldResources {
    let cluster_name = world.cluster_name();
    let service_name = world.service_name();
    let log_prefix = world
        .logging
        .stream_prefix
        .clone()
        .unwrap_or_else(|| world.name.clone());

    let mut containers = vec![ContainerDefinition {
        name: "minecraft".to_string(),
        image: game_image(world).to_string(),
        essential: true,
        environment: world_environment(world),
        secrets: Vec::new(),
        port_mappings: game_port_mappings(world),
        mount_path: DATA_MOUNT_PATH.to_string(),
        log_stream_prefix: log_prefix.clone(),
    }];
    if let Some(sftp) = &world.sftp {
        containers.push(ContainerDefinition {
            name: "sftp".to_string(),
            image: SFTP_IMAGE.to_string(),
            essential: false,
            environment: Environment::new(),
            secrets: vec![("SFTP_USERS".to_string(), sftp.users_secret.clone())],
            port_mappings: vec![PortMapping::same(SFTP_PORT, Protocol::Tcp)],
            mount_path: format!("/home/{}/data", sftp.user()),
            log_stream_prefix: format!("{log_prefix}-sftp"),
        });
    }

    let scaling = world.autoscaling_enabled().then(|| {
        let alarm = AlarmDefinition::scale_down(
            world.dimensions(),
            world.idle_delay(),
            defaults.sampling_period,
        );
        ScalingPolicy {
            resource_id: format!("service/{cluster_name}/{service_name}"),
            min_capacity: 0,
            max_capacity: 1,
            exact_capacity: 0,
            aggregation: "Maximum".to_string(),
            evaluation_periods: alarm.datapoints_to_alarm,
            treat_missing_data: "notBreaching".to_string(),
            alarm,
        }
    });

    let dns = world.dns_target().map(|target| DnsResources {
        srv: match world.server {
            ServerVariant::Java(_) => Some(SrvRecord {
                name: format!("_minecraft._tcp.{}.", target.host_name),
                priority: 1,
                weight: 1,
                port: world.game_port(),
                target: format!("{}.", target.host_name),
            }),
            ServerVariant::Bedrock(_) => None,
        },
        task_start_target: target,
    });

    WorldResources {
        world: world.name.clone(),
        cluster: ClusterRef {
            name: cluster_name,
            created: world.cluster.is_none(),
        },
        file_system: FileSystem {
            existing_id: world.storage.file_system_id.clone(),
            encrypted: true,
            root_directory: world
                .storage
                .root_directory
                .clone()
                .unwrap_or_else(|| "/".to_string()),
        },
        backup: world.backup_enabled().then(|| match &world.storage.backup_plan {
            Some(plan) => BackupPlan::Existing(plan.clone()),
            None => BackupPlan::DailyMonthly {
                retention_days: BACKUP_RETENTION_DAYS,
            },
        }),
        task: TaskDefinition {
            family: format!("{}-task", world.name),
            cpu: world.cpu(),
            memory_limit_mib: world.memory_limit_mib(),
            transit_encryption: true,
            containers,
        },
        service: Service {
            name: service_name,
            assign_public_ip: true,
            desired_count: world.initial_capacity(),
            max_healthy_percent: 100,
        },
        ingress: ingress_rules(world),
        scaling,
        publisher_schedule: PublisherSchedule {
            rate_secs: defaults.sampling_period.as_secs(),
            detail: world.publish_target(),
        },
        dns,
    }
}

fn game_image(world: &WorldSpec) -> &'static str {
    match &world.server {
        ServerVariant::Java(java) => java.server_type.image(),
        ServerVariant::Bedrock(_) => BEDROCK_IMAGE,
    }
}

fn game_port_mappings(world: &WorldSpec) -> Vec<PortMapping> {
    match &world.server {
        ServerVariant::Java(java) => vec![PortMapping::same(java.port(), Protocol::Tcp)],
        ServerVariant::Bedrock(bedrock) => {
            let mut ports = vec![PortMapping::same(bedrock.ipv4_port(), Protocol::Udp)];
            if bedrock.ipv6_port() != bedrock.ipv4_port() {
                ports.push(PortMapping::same(bedrock.ipv6_port(), Protocol::Udp));
            }
            ports
        }
    }
}

fn ingress_rules(world: &WorldSpec) -> Vec<IngressRule> {
    let mut open: Vec<(u16, Protocol, &str)> = Vec::new();
    match &world.server {
        ServerVariant::Java(java) => {
            open.push((java.port(), Protocol::Tcp, "game"));
            if let Some(rcon) = &java.rcon {
                open.push((rcon.port(), Protocol::Tcp, "rcon"));
            }
            if let Some(query) = &java.query {
                open.push((query.port(), Protocol::Udp, "query"));
            }
        }
        ServerVariant::Bedrock(_) => {
            for mapping in game_port_mappings(world) {
                open.push((mapping.container_port, mapping.protocol, "game"));
            }
        }
    }
    if world.sftp.is_some() {
        open.push((SFTP_PORT, Protocol::Tcp, "sftp"));
    }

    open.into_iter()
        .flat_map(|(port, protocol, what)| {
            [false, true].map(|ipv6| IngressRule {
                port,
                protocol,
                ipv6,
                description: format!("{what} {}", if ipv6 { "ipv6" } else { "ipv4" }),
            })
        })
        .collect()
}
