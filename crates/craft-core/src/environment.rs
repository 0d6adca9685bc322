//! Container environment for a world's game server.
//!
//! Java settings are mapped through [`JAVA_SETTINGS`], one row per variable,
//! so the emission order is fixed and every rule lives in one place.

use std::collections::BTreeMap;

use crate::world::{BedrockSettings, JavaSettings, ServerVariant, WorldSpec};

pub type Environment = BTreeMap<String, String>;

/// One Java option and the rule deciding whether it reaches the container.
pub struct JavaSetting {
    pub env: &'static str,
    pub value: fn(&JavaSettings) -> Option<String>,
}

fn when_true(flag: Option<bool>) -> Option<String> {
    flag.filter(|b| *b).map(|b| b.to_string())
}

fn when_defined(flag: Option<bool>) -> Option<String> {
    flag.map(|b| b.to_string())
}

fn when_non_zero<N: Into<i64> + Copy>(n: Option<N>) -> Option<String> {
    n.map(Into::into).filter(|v| *v != 0).map(|v| v.to_string())
}

fn joined(list: &Option<Vec<String>>) -> Option<String> {
    list.as_ref()
        .filter(|names| !names.is_empty())
        .map(|names| names.join(","))
}

pub const JAVA_SETTINGS: &[JavaSetting] = &[
    JavaSetting {
        env: "SERVER_PORT",
        value: |s| s.port.map(|p| p.to_string()),
    },
    JavaSetting {
        env: "VERSION",
        value: |s| s.version.clone(),
    },
    JavaSetting {
        env: "EULA",
        value: |s| when_true(s.eula),
    },
    JavaSetting {
        env: "DIFFICULTY",
        value: |s| s.difficulty.map(|d| d.as_str().to_string()),
    },
    JavaSetting {
        env: "WHITELIST",
        value: |s| joined(&s.whitelist),
    },
    JavaSetting {
        env: "OPS",
        value: |s| joined(&s.ops),
    },
    JavaSetting {
        env: "MAX_PLAYERS",
        value: |s| when_non_zero(s.max_players),
    },
    JavaSetting {
        env: "MAX_WORLD_SIZE",
        value: |s| when_non_zero(s.max_world_size),
    },
    JavaSetting {
        env: "ALLOW_NETHER",
        value: |s| when_defined(s.allow_nether),
    },
    JavaSetting {
        env: "ANNOUNCE_PLAYER_ACHIEVEMENTS",
        value: |s| when_defined(s.announce_player_achievements),
    },
    JavaSetting {
        env: "ENABLE_COMMAND_BLOCK",
        value: |s| when_defined(s.enable_command_block),
    },
    JavaSetting {
        env: "FORCE_GAMEMODE",
        value: |s| when_true(s.force_gamemode),
    },
    JavaSetting {
        env: "GENERATE_STRUCTURES",
        value: |s| when_defined(s.generate_structures),
    },
    JavaSetting {
        env: "HARDCORE",
        value: |s| when_true(s.hardcore),
    },
    JavaSetting {
        env: "SNOOPER_ENABLED",
        value: |s| when_defined(s.snooper_enabled),
    },
    JavaSetting {
        env: "MAX_BUILD_HEIGHT",
        value: |s| when_non_zero(s.max_build_height),
    },
    JavaSetting {
        env: "MAX_TICK_TIME",
        value: |s| when_non_zero(s.max_tick_time),
    },
    JavaSetting {
        env: "SPAWN_ANIMALS",
        value: |s| when_defined(s.spawn_animals),
    },
    JavaSetting {
        env: "SPAWN_MONSTERS",
        value: |s| when_defined(s.spawn_monsters),
    },
    JavaSetting {
        env: "SPAWN_NPCS",
        value: |s| when_defined(s.spawn_npcs),
    },
    JavaSetting {
        env: "SPAWN_PROTECTION",
        value: |s| s.spawn_protection.map(|p| p.to_string()),
    },
    JavaSetting {
        env: "VIEW_DISTANCE",
        value: |s| when_non_zero(s.view_distance),
    },
    JavaSetting {
        env: "SEED",
        value: |s| s.seed.clone(),
    },
    JavaSetting {
        env: "MODE",
        value: |s| s.mode.map(|m| m.as_str().to_string()),
    },
    JavaSetting {
        env: "MOTD",
        value: |s| s.motd.clone(),
    },
    JavaSetting {
        env: "PVP",
        value: |s| when_defined(s.pvp),
    },
    JavaSetting {
        env: "LEVEL_TYPE",
        value: |s| s.level_type.map(|l| l.as_str().to_string()),
    },
];

/// Build the full environment for a world's game container.
pub fn world_environment(world: &WorldSpec) -> Environment {
    match &world.server {
        ServerVariant::Java(java) => java_environment(java, world.memory_limit_mib()),
        ServerVariant::Bedrock(bedrock) => bedrock_environment(bedrock),
    }
}

pub fn java_environment(settings: &JavaSettings, memory_limit_mib: u32) -> Environment {
    let mut env = Environment::new();
    env.insert("ENABLE_RCON".into(), "false".into());
    env.insert(
        "INIT_MEMORY".into(),
        format!("{}M", memory_limit_mib as u64 * 5 / 10),
    );
    env.insert(
        "MAX_MEMORY".into(),
        format!("{}M", memory_limit_mib as u64 * 8 / 10),
    );
    env.insert("USE_AIKAR_FLAGS".into(), "true".into());

    for setting in JAVA_SETTINGS {
        if let Some(value) = (setting.value)(settings) {
            env.insert(setting.env.to_string(), value);
        }
    }

    if let Some(type_name) = settings.server_type.type_name() {
        env.insert("TYPE".into(), type_name.into());
    }
    for (key, value) in settings.server_type.extra_environment() {
        if let Some(value) = value {
            env.insert(key.to_string(), value);
        }
    }

    if let Some(rcon) = &settings.rcon {
        env.insert("ENABLE_RCON".into(), "true".into());
        if let Some(password) = &rcon.password {
            env.insert("RCON_PASSWORD".into(), password.clone());
        }
        if let Some(port) = rcon.port {
            env.insert("RCON_PORT".into(), port.to_string());
        }
    }
    if let Some(query) = &settings.query {
        env.insert("ENABLE_QUERY".into(), "true".into());
        if let Some(port) = query.port {
            env.insert("QUERY_PORT".into(), port.to_string());
        }
    }

    env
}

pub fn bedrock_environment(settings: &BedrockSettings) -> Environment {
    let mut env = Environment::new();
    if let Some(version) = &settings.version {
        env.insert("VERSION".into(), version.clone());
    }
    if settings.eula == Some(true) {
        env.insert("EULA".into(), "true".into());
    }
    env
}
