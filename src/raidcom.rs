/*
 * Copyright 2023 Oxide Computer Company
 */

use crate::common::*;
use crate::error::{LdevError, LdevResult};
use crate::ldev::LdevId;
use std::process::Command;

/**
 * Which of the redundant paths a LUN mapping belongs to.  The array has a
 * host group per chassis per path, named "<chassis>-pri" and "<chassis>-sec".
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LunRole {
    Primary,
    Secondary,
}

impl LunRole {
    fn suffix(&self) -> &'static str {
        match self {
            LunRole::Primary => "pri",
            LunRole::Secondary => "sec",
        }
    }
}

/**
 * Every raidcom(1) sub-command this program knows how to issue.  The
 * "-I<instance>" HORCM flag is appended by [`RaidcomCmd::argv`], which is the
 * only place the vendor's command syntax is spelled out.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaidcomCmd {
    LockResource { resource: String, time: u32 },
    UnlockResource { resource: String },
    GetResource,
    GetLdev { ldev: LdevId },
    AddLdev { pool: String, ldev: LdevId, capacity_gb: u64 },
    ModifyLdevName { ldev: LdevId, name: String },
    DisableReallocation { ldev: LdevId },
    AddLun { port: String, chassis: String, role: LunRole, ldev: LdevId },
    ResetCommandStatus,
    GetCommandStatus,
}

impl RaidcomCmd {
    pub fn is_lock(&self) -> bool {
        matches!(self, RaidcomCmd::LockResource { .. })
    }

    pub fn argv(&self, horcm: &str) -> Vec<String> {
        let mut a: Vec<String> = match self {
            RaidcomCmd::LockResource { resource, time } => vec![
                "lock".into(),
                "resource".into(),
                "-resource_name".into(),
                resource.clone(),
                "-time".into(),
                time.to_string(),
            ],
            RaidcomCmd::UnlockResource { resource } => vec![
                "unlock".into(),
                "resource".into(),
                "-resource_name".into(),
                resource.clone(),
            ],
            RaidcomCmd::GetResource => vec!["get".into(), "resource".into()],
            RaidcomCmd::GetLdev { ldev } => vec![
                "get".into(),
                "ldev".into(),
                "-ldev_id".into(),
                ldev.to_string(),
            ],
            RaidcomCmd::AddLdev { pool, ldev, capacity_gb } => vec![
                "add".into(),
                "ldev".into(),
                "-pool".into(),
                pool.clone(),
                "-ldev_id".into(),
                ldev.to_string(),
                "-capacity".into(),
                format!("{}g", capacity_gb),
            ],
            RaidcomCmd::ModifyLdevName { ldev, name } => vec![
                "modify".into(),
                "ldev".into(),
                "-ldev_id".into(),
                ldev.to_string(),
                "-ldev_name".into(),
                name.clone(),
            ],
            /*
             * Tier relocation level 5 keeps the LDEV off the production tier
             * of a tiered pool.
             */
            RaidcomCmd::DisableReallocation { ldev } => vec![
                "modify".into(),
                "ldev".into(),
                "-ldev_id".into(),
                ldev.to_string(),
                "-status".into(),
                "enable_reallocation".into(),
                "5".into(),
            ],
            RaidcomCmd::AddLun { port, chassis, role, ldev } => vec![
                "add".into(),
                "lun".into(),
                "-port".into(),
                port.clone(),
                format!("{}-{}", chassis, role.suffix()),
                "-ldev_id".into(),
                ldev.to_string(),
            ],
            RaidcomCmd::ResetCommandStatus => {
                vec!["reset".into(), "command_status".into()]
            }
            RaidcomCmd::GetCommandStatus => {
                vec!["get".into(), "command_status".into()]
            }
        };
        a.push(format!("-I{}", horcm));
        a
    }

    /**
     * The command as a user would type it after "raidcom".
     */
    pub fn render(&self, horcm: &str) -> String {
        self.argv(horcm).join(" ")
    }
}

/**
 * Runs raidcom commands.  In production this is [`Raidcom`]; tests provide a
 * simulated array instead.
 */
pub trait Executor {
    /**
     * Run the command to completion, returning its standard output on
     * success.  A non-zero exit is a VendorCommandFailure.
     */
    fn execute(&self, horcm: &str, cmd: &RaidcomCmd) -> LdevResult<String>;
}

/**
 * The real raidcom binary.
 */
pub struct Raidcom {
    log: Logger,
    path: String,
}

impl Raidcom {
    pub fn new(log: &Logger, path: &str) -> Raidcom {
        Raidcom {
            log: log.new(o!("component" => "raidcom")),
            path: path.to_string(),
        }
    }
}

impl Executor for Raidcom {
    fn execute(&self, horcm: &str, cmd: &RaidcomCmd) -> LdevResult<String> {
        let command = format!("{} {}", self.path, cmd.render(horcm));
        info!(self.log, "exec: {}", command);

        let output = Command::new(&self.path)
            .env_clear()
            .args(cmd.argv(horcm))
            .output()
            .map_err(|source| LdevError::Exec {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(LdevError::VendorCommandFailure {
                command,
                output: output.info(),
            });
        }

        let out = String::from_utf8_lossy(&output.stdout).to_string();
        debug!(self.log, "raidcom output"; "stdout" => out.trim());
        Ok(out)
    }
}
