/*
 * Copyright 2023 Oxide Computer Company
 */

use crate::common::*;
use crate::error::{LdevError, LdevResult};
use std::process::Command;

const UNAME: &str = "/usr/bin/uname";

/**
 * The oldest Solaris release on which raidcom and the storage layout we
 * expect are known to work.
 */
const MIN_SOLARIS: u32 = 10;

fn uname(log: &Logger, flag: &str) -> LdevResult<String> {
    info!(log, "exec: uname {}", flag);
    let output = Command::new(UNAME)
        .env_clear()
        .arg(flag)
        .output()
        .map_err(|source| LdevError::Exec {
            command: format!("{} {}", UNAME, flag),
            source,
        })?;

    if !output.status.success() {
        return Err(LdevError::VendorCommandFailure {
            command: format!("{} {}", UNAME, flag),
            output: output.info(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/**
 * Decide whether a system, as described by "uname -s" and "uname -r", is one
 * we support.  SunOS release 5.10 is Solaris 10, 5.11 is Solaris 11, and so
 * on.
 */
pub fn supported(sysname: &str, release: &str) -> LdevResult<()> {
    if sysname != "SunOS" {
        return Err(LdevError::UnsupportedPlatform(
            "This module requires Solaris".to_string(),
        ));
    }

    let version = match release.split_once('.') {
        Some(("5", minor)) => minor.parse::<u32>().ok(),
        Some((major, _)) => major.parse::<u32>().ok(),
        None => release.parse::<u32>().ok(),
    };

    match version {
        Some(v) if v >= MIN_SOLARIS => Ok(()),
        Some(_) => Err(LdevError::UnsupportedPlatform(format!(
            "This module requires Solaris {} or higher (found SunOS {})",
            MIN_SOLARIS, release
        ))),
        None => Err(LdevError::UnsupportedPlatform(format!(
            "cannot make sense of SunOS release \"{}\"",
            release
        ))),
    }
}

pub fn check_platform(log: &Logger) -> LdevResult<()> {
    let sysname = uname(log, "-s")?;
    let release = uname(log, "-r")?;
    info!(log, "platform"; "sysname" => &sysname, "release" => &release);
    supported(&sysname, &release)
}
