//! Declared shape of a world: server variant, resources, storage, DNS.
//!
//! A world is described by one [`WorldSpec`]. The server family is a tagged
//! [`ServerVariant`]; everything edition-specific hangs off that variant.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::*;

const DEFAULT_CPU: u32 = 256;
const DEFAULT_MEMORY_LIMIT_MIB: u32 = 512;
const DEFAULT_AUTOSCALE_DELAY: Duration = Duration::from_secs(15 * 60);
const DEFAULT_DNS_TTL: u32 = 60;
const DEFAULT_SFTP_USER: &str = "minecraft";

/// One world as declared in the fleet config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSpec {
    pub name: String,
    /// Public host name players connect to.
    pub host_name: String,
    /// Cluster to run in. Defaults to a dedicated `{name}-cluster`.
    #[serde(default)]
    pub cluster: Option<String>,
    /// Service name. Defaults to the world name.
    #[serde(default)]
    pub service: Option<String>,
    pub server: ServerVariant,
    #[serde(default)]
    pub resources: ResourcesSpec,
    #[serde(default)]
    pub storage: StorageSpec,
    #[serde(default)]
    pub logging: LoggingSpec,
    #[serde(default)]
    pub dns: Option<DnsSpec>,
    #[serde(default)]
    pub sftp: Option<SftpSpec>,
}

/// Server family and its edition-specific settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "edition", rename_all = "snake_case")]
pub enum ServerVariant {
    Java(JavaSettings),
    Bedrock(BedrockSettings),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourcesSpec {
    /// CPU units for the task (256 = 0.25 vCPU).
    pub cpu: Option<u32>,
    pub memory_limit_mib: Option<u32>,
    /// Stop the world when nobody is online. Defaults to true.
    pub enable_autoscaling: Option<bool>,
    /// Sustained idle time before scale-down, e.g. "15m".
    pub autoscale_delay: Option<String>,
    /// Desired capacity at creation.
    pub initial_capacity: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageSpec {
    /// Existing file system to mount. A new encrypted one is declared if unset.
    pub file_system_id: Option<String>,
    pub root_directory: Option<String>,
    /// Defaults to true.
    pub enable_backup: Option<bool>,
    /// Existing backup plan. Defaults to daily + monthly with one year retention.
    pub backup_plan: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingSpec {
    /// Log stream prefix. Defaults to the world name.
    pub stream_prefix: Option<String>,
    pub log_group: Option<String>,
    pub retention_days: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsSpec {
    pub hosted_zone_id: String,
    pub ttl: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SftpSpec {
    /// Secret holding `username:password` entries.
    pub users_secret: String,
    pub user: Option<String>,
}

impl SftpSpec {
    pub fn user(&self) -> &str {
        self.user.as_deref().unwrap_or(DEFAULT_SFTP_USER)
    }
}

// ── Java ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Peaceful,
    Easy,
    Normal,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Peaceful => "peaceful",
            Difficulty::Easy => "easy",
            Difficulty::Normal => "normal",
            Difficulty::Hard => "hard",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    Creative,
    Survival,
    Adventure,
    Spectator,
}

impl GameMode {
    pub fn as_str(self) -> &'static str {
        match self {
            GameMode::Creative => "creative",
            GameMode::Survival => "survival",
            GameMode::Adventure => "adventure",
            GameMode::Spectator => "spectator",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelType {
    Default,
    Flat,
    LargeBiomes,
    Amplified,
    Customized,
    Buffet,
    Terraforged,
}

impl LevelType {
    pub fn as_str(self) -> &'static str {
        match self {
            LevelType::Default => "DEFAULT",
            LevelType::Flat => "FLAT",
            LevelType::LargeBiomes => "LARGEBIOMES",
            LevelType::Amplified => "AMPLIFIED",
            LevelType::Customized => "CUSTOMIZED",
            LevelType::Buffet => "BUFFET",
            LevelType::Terraforged => "TERRAFORGED",
        }
    }
}

/// Game rules and server options for a Java world.
///
/// Unset options are left to the server image's defaults; see
/// [`crate::environment::JAVA_SETTINGS`] for the mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JavaSettings {
    pub port: Option<u16>,
    /// `LATEST`, `SNAPSHOT`, or a pinned version.
    pub version: Option<String>,
    pub eula: Option<bool>,
    pub difficulty: Option<Difficulty>,
    pub whitelist: Option<Vec<String>>,
    pub ops: Option<Vec<String>>,
    pub max_players: Option<u32>,
    pub max_world_size: Option<u32>,
    pub allow_nether: Option<bool>,
    pub announce_player_achievements: Option<bool>,
    pub enable_command_block: Option<bool>,
    pub force_gamemode: Option<bool>,
    pub generate_structures: Option<bool>,
    pub hardcore: Option<bool>,
    pub snooper_enabled: Option<bool>,
    pub max_build_height: Option<u32>,
    /// Milliseconds a tick may take before the watchdog stops the server.
    pub max_tick_time: Option<i64>,
    pub spawn_animals: Option<bool>,
    pub spawn_monsters: Option<bool>,
    pub spawn_npcs: Option<bool>,
    pub spawn_protection: Option<u32>,
    pub view_distance: Option<u32>,
    pub seed: Option<String>,
    pub mode: Option<GameMode>,
    pub motd: Option<String>,
    pub pvp: Option<bool>,
    pub level_type: Option<LevelType>,
    #[serde(rename = "type", default)]
    pub server_type: JavaServerType,
    pub rcon: Option<RconSpec>,
    pub query: Option<QuerySpec>,
}

impl JavaSettings {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_JAVA_PORT)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RconSpec {
    pub password: Option<String>,
    pub port: Option<u16>,
}

impl RconSpec {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_RCON_PORT)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub port: Option<u16>,
}

impl QuerySpec {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_JAVA_PORT)
    }
}

/// Server software for a Java world.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JavaServerType {
    #[default]
    Vanilla,
    Forge {
        version: Option<String>,
    },
    /// Pre-downloaded installer, path relative to `/data`.
    ForgeInstaller {
        path: String,
    },
    ForgeInstallerUrl {
        url: String,
    },
    Bukkit {
        download_url: Option<String>,
    },
    Spigot {
        download_url: Option<String>,
        build_from_source: Option<bool>,
    },
    Paper {
        build: Option<u32>,
        download_url: Option<String>,
    },
    Tuinity,
    Magma,
    Mohist,
    Catserver,
    FeedTheBeast {
        modpack_id: u32,
        version_id: Option<u32>,
    },
    CurseForge {
        server_mod: String,
    },
    SpongeVanilla {
        version: Option<String>,
    },
    Fabric {
        version: Option<String>,
    },
    FabricInstaller {
        path: String,
    },
    FabricInstallerUrl {
        url: String,
    },
    Custom {
        server: String,
    },
}

impl JavaServerType {
    /// Value of the image's `TYPE` variable; vanilla leaves it unset.
    pub fn type_name(&self) -> Option<&'static str> {
        let name = match self {
            JavaServerType::Vanilla => return None,
            JavaServerType::Forge { .. }
            | JavaServerType::ForgeInstaller { .. }
            | JavaServerType::ForgeInstallerUrl { .. } => "FORGE",
            JavaServerType::Bukkit { .. } => "BUKKIT",
            JavaServerType::Spigot { .. } => "SPIGOT",
            JavaServerType::Paper { .. } => "PAPER",
            JavaServerType::Tuinity => "TUINITY",
            JavaServerType::Magma => "MAGMA",
            JavaServerType::Mohist => "MOHIST",
            JavaServerType::Catserver => "CATSERVER",
            JavaServerType::FeedTheBeast { .. } => "FTBA",
            JavaServerType::CurseForge { .. } => "CURSEFORGE",
            JavaServerType::SpongeVanilla { .. } => "SPONGEVANILLA",
            JavaServerType::Fabric { .. }
            | JavaServerType::FabricInstaller { .. }
            | JavaServerType::FabricInstallerUrl { .. } => "FABRIC",
            JavaServerType::Custom { .. } => "CUSTOM",
        };
        Some(name)
    }

    /// Extra variables for this server type. `None` values are skipped.
    pub fn extra_environment(&self) -> Vec<(&'static str, Option<String>)> {
        match self {
            JavaServerType::Forge { version } => vec![("FORGEVERSION", version.clone())],
            JavaServerType::ForgeInstaller { path } => {
                vec![("FORGE_INSTALLER", Some(path.clone()))]
            }
            JavaServerType::ForgeInstallerUrl { url } => {
                vec![("FORGE_INSTALLER_URL", Some(url.clone()))]
            }
            JavaServerType::Bukkit { download_url } => {
                vec![("BUKKIT_DOWNLOAD_URL", download_url.clone())]
            }
            JavaServerType::Spigot {
                download_url,
                build_from_source,
            } => vec![
                (
                    "BUILD_FROM_SOURCE",
                    build_from_source.filter(|b| *b).map(|b| b.to_string()),
                ),
                ("SPIGOT_DOWNLOAD_URL", download_url.clone()),
            ],
            JavaServerType::Paper {
                build,
                download_url,
            } => vec![
                ("PAPERBUILD", build.map(|b| b.to_string())),
                ("PAPER_DOWNLOAD_URL", download_url.clone()),
            ],
            JavaServerType::FeedTheBeast {
                modpack_id,
                version_id,
            } => vec![
                ("FTB_MODPACK_ID", Some(modpack_id.to_string())),
                ("FTB_MODPACK_VERSION_ID", version_id.map(|v| v.to_string())),
            ],
            JavaServerType::CurseForge { server_mod } => {
                vec![("CF_SERVER_MOD", Some(server_mod.clone()))]
            }
            JavaServerType::SpongeVanilla { version } => {
                vec![("SPONGEVERSION", version.clone())]
            }
            JavaServerType::Fabric { version } => vec![("FABRICVERSION", version.clone())],
            JavaServerType::FabricInstaller { path } => {
                vec![("FABRIC_INSTALLER", Some(path.clone()))]
            }
            JavaServerType::FabricInstallerUrl { url } => {
                vec![("FABRIC_INSTALLER_URL", Some(url.clone()))]
            }
            JavaServerType::Custom { server } => vec![("CUSTOM_SERVER", Some(server.clone()))],
            JavaServerType::Vanilla
            | JavaServerType::Tuinity
            | JavaServerType::Magma
            | JavaServerType::Mohist
            | JavaServerType::Catserver => Vec::new(),
        }
    }

    /// Container image; the FTB installer only ships in the multiarch tag.
    pub fn image(&self) -> &'static str {
        match self {
            JavaServerType::FeedTheBeast { .. } => "itzg/minecraft-server:multiarch",
            _ => "itzg/minecraft-server",
        }
    }
}

// ── Bedrock ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BedrockSettings {
    pub ipv4_port: Option<u16>,
    pub ipv6_port: Option<u16>,
    /// `LATEST`, `PREVIOUS`, or a major version such as `1.14`.
    pub version: Option<String>,
    pub eula: Option<bool>,
}

impl BedrockSettings {
    pub fn ipv4_port(&self) -> u16 {
        self.ipv4_port.unwrap_or(DEFAULT_BEDROCK_IPV4_PORT)
    }

    pub fn ipv6_port(&self) -> u16 {
        self.ipv6_port.unwrap_or(DEFAULT_BEDROCK_IPV6_PORT)
    }
}

pub const BEDROCK_IMAGE: &str = "itzg/minecraft-bedrock-server";

// ── WorldSpec accessors ────────────────────────────────────────────

impl WorldSpec {
    pub fn edition(&self) -> Edition {
        match self.server {
            ServerVariant::Java(_) => Edition::Java,
            ServerVariant::Bedrock(_) => Edition::Bedrock,
        }
    }

    pub fn cluster_name(&self) -> String {
        self.cluster
            .clone()
            .unwrap_or_else(|| format!("{}-cluster", self.name))
    }

    pub fn service_name(&self) -> String {
        self.service.clone().unwrap_or_else(|| self.name.clone())
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(&self.cluster_name(), &self.service_name())
    }

    /// Port the status sampler should query.
    pub fn game_port(&self) -> u16 {
        match &self.server {
            ServerVariant::Java(java) => java.port(),
            ServerVariant::Bedrock(bedrock) => bedrock.ipv4_port(),
        }
    }

    pub fn cpu(&self) -> u32 {
        self.resources.cpu.unwrap_or(DEFAULT_CPU)
    }

    pub fn memory_limit_mib(&self) -> u32 {
        self.resources
            .memory_limit_mib
            .unwrap_or(DEFAULT_MEMORY_LIMIT_MIB)
    }

    pub fn autoscaling_enabled(&self) -> bool {
        self.resources.enable_autoscaling.unwrap_or(true)
    }

    /// Idle delay, falling back to 15 minutes when unset or unparseable.
    pub fn idle_delay(&self) -> Duration {
        self.resources
            .autoscale_delay
            .as_deref()
            .and_then(parse_duration)
            .unwrap_or(DEFAULT_AUTOSCALE_DELAY)
    }

    /// Capacity at creation: stopped when autoscaling, running otherwise.
    pub fn initial_capacity(&self) -> u32 {
        self.resources
            .initial_capacity
            .unwrap_or(if self.autoscaling_enabled() { 0 } else { 1 })
    }

    pub fn backup_enabled(&self) -> bool {
        self.storage.enable_backup.unwrap_or(true)
    }

    pub fn publish_target(&self) -> PublishTarget {
        let host_name = if self.game_port() == self.edition().default_port() {
            self.host_name.clone()
        } else {
            format!("{}:{}", self.host_name, self.game_port())
        };
        PublishTarget {
            cluster_name: self.cluster_name(),
            host_name,
            service_name: self.service_name(),
            edition: self.edition(),
        }
    }

    pub fn dns_target(&self) -> Option<DnsTarget> {
        self.dns.as_ref().map(|dns| DnsTarget {
            host_name: self.host_name.clone(),
            hosted_zone_id: dns.hosted_zone_id.clone(),
            ttl: dns.ttl.unwrap_or(DEFAULT_DNS_TTL),
        })
    }
}
