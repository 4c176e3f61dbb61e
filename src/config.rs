/*
 * Copyright 2023 Oxide Computer Company
 */

use serde::Deserialize;

/**
 * Site-wide settings that rarely change between playbook runs.  These live in
 * an optional TOML file so that a new array or HORCM install does not require
 * a rebuild.  Every field has a default.
 */
pub const SITE_CONFIG: &str = "/etc/ldevblock.toml";

#[derive(Debug, Deserialize, Default)]
pub struct SiteConfig {
    #[serde(default)]
    pub raidcom: RaidcomConfig,
    #[serde(default)]
    pub pools: PoolConfig,
    #[serde(default)]
    pub share: ShareConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RaidcomConfig {
    pub path: String,
    pub resource_name: String,
    /// Lock expiry, in seconds, passed to "lock resource -time".
    pub lock_time: u32,
}

impl Default for RaidcomConfig {
    fn default() -> Self {
        RaidcomConfig {
            path: "/HORCM/usr/bin/raidcom".to_string(),
            resource_name: "meta_resource".to_string(),
            lock_time: 60,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Pools subject to automatic tier relocation.
    pub tiered: Vec<u32>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig { tiered: vec![15, 16] }
    }
}

impl PoolConfig {
    pub fn is_tiered(&self, pool: &str) -> bool {
        pool.trim()
            .parse::<u32>()
            .map(|p| self.tiered.contains(&p))
            .unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    /// Ports to share through when the module parameters name none.
    pub default_ports: Vec<String>,
}

impl Default for ShareConfig {
    fn default() -> Self {
        ShareConfig {
            default_ports: ["CL1-B", "CL2-B", "CL7-F", "CL8-F"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}
