/*
 * Copyright 2023 Oxide Computer Company
 */

/*
 * grid_disk: make the local c1d* disks usable as raw devices by the grid
 * infrastructure user.  Each disk gets an SMI label, a whole disk slice 0,
 * and slice 0 owned by grid:dba with mode 0660.
 */

mod common;
mod file;
mod module;
mod vtoc;

use std::os::unix::fs::{MetadataExt, PermissionsExt};

use serde::Deserialize;

use common::*;
use file::exists_node;
use module::Report;
use vtoc::{DiskTools, HostDisks};

const OWNER: &str = "grid";
const GROUP: &str = "dba";
const MODE: u32 = 0o660;

/*
 * Disk numbers on controller 1 that may hold grid disks.
 */
const FIRST_DISK: u32 = 10;
const LAST_DISK: u32 = 97;

#[derive(Debug, Deserialize)]
struct Params {
    #[serde(rename = "_ansible_check_mode", default)]
    check_mode: bool,
}

struct Wanted {
    uid: users::uid_t,
    gid: users::gid_t,
}

impl Wanted {
    fn lookup(owner: &str, group: &str) -> Result<Wanted> {
        let uid = if let Some(user) = users::get_user_by_name(owner) {
            user.uid()
        } else {
            bail!("could not find user {} in system", owner)
        };

        let gid = if let Some(g) = users::get_group_by_name(group) {
            g.gid()
        } else {
            bail!("could not find group {} in system", group)
        };

        Ok(Wanted { uid, gid })
    }
}

/**
 * What needs doing to bring the slice 0 device node into line.
 */
#[derive(Debug, Default, PartialEq, Eq)]
struct NodeFixes {
    owner: bool,
    group: bool,
    mode: bool,
}

fn node_fixes(w: &Wanted, uid: u32, gid: u32, mode: u32) -> NodeFixes {
    NodeFixes {
        owner: uid != w.uid,
        group: gid != w.gid,
        mode: mode & 0o7777 != MODE,
    }
}

fn ensure_label(
    disks: &dyn DiskTools,
    dev: &str,
    disk: &str,
    check_mode: bool,
    report: &mut Report,
) -> Result<()> {
    if disks.prtvtoc(dev)?.is_some() {
        return Ok(());
    }

    report.msg("Labelling disk");
    if !check_mode {
        disks.format_label(disk)?;
        report.set_changed();
    }
    Ok(())
}

fn ensure_partitions(
    log: &Logger,
    disks: &dyn DiskTools,
    dev: &str,
    check_mode: bool,
    report: &mut Report,
) -> Result<()> {
    let label = match disks.prtvtoc(dev)? {
        Some(v) => v,
        /*
         * Only possible in check mode, where we did not write a label.
         */
        None if check_mode => {
            report.msg("Creating whole disk partition table");
            return Ok(());
        }
        None => bail!("{} has no label after labelling", dev),
    };
    debug!(log, "current label"; "sector_size" => label.sector_size,
        "partitions" => ?label.partitions);

    if label.partitions.len() == 2 {
        return Ok(());
    }

    report.msg("Creating whole disk partition table");
    if !check_mode {
        let table = label.whole_disk_table()?;
        disks.fmthard(dev, &table)?;
        report.set_changed();
    }
    Ok(())
}

fn ensure_node(
    log: &Logger,
    node: &str,
    w: &Wanted,
    check_mode: bool,
    report: &mut Report,
) -> Result<()> {
    let md = std::fs::metadata(node)
        .with_context(|| format!("stat {}", node))?;
    let fixes = node_fixes(w, md.uid(), md.gid(), md.mode());

    if fixes.owner {
        report.msg(format!("Setting owner to {}", OWNER));
        if !check_mode {
            info!(log, "chown {} {}", OWNER, node);
            std::os::unix::fs::chown(node, Some(w.uid), None)?;
            report.set_changed();
        }
    }
    if fixes.group {
        report.msg(format!("Setting group to {}", GROUP));
        if !check_mode {
            info!(log, "chgrp {} {}", GROUP, node);
            std::os::unix::fs::chown(node, None, Some(w.gid))?;
            report.set_changed();
        }
    }
    if fixes.mode {
        report.msg(format!("Setting permissions to {:o}", MODE));
        if !check_mode {
            info!(log, "chmod {:o} {}", MODE, node);
            std::fs::set_permissions(
                node,
                std::fs::Permissions::from_mode(MODE),
            )?;
            report.set_changed();
        }
    }
    Ok(())
}

fn run(log: &Logger) -> Result<Report> {
    let params: Params = module::read_args(log)?;
    let mut report = Report::new(params.check_mode);

    let mut disks = Vec::new();
    for n in FIRST_DISK..=LAST_DISK {
        let disk = format!("c1d{}", n);
        if exists_node(format!("/dev/rdsk/{}s2", disk))? {
            disks.push(disk);
        }
    }
    info!(log, "found {} candidate disks", disks.len());

    /*
     * A host without any of these disks need not have the accounts either.
     */
    if disks.is_empty() {
        return Ok(report);
    }
    let w = Wanted::lookup(OWNER, GROUP)?;
    info!(log, "grid disk owner"; "uid" => w.uid, "gid" => w.gid);

    for disk in disks {
        let dev = format!("/dev/rdsk/{}s2", disk);
        let log = log.new(o!("disk" => disk.clone()));
        let tools = HostDisks::new(&log);
        report.msg(format!("Checking disk {}", dev));

        ensure_label(&tools, &dev, &disk, params.check_mode, &mut report)?;
        ensure_partitions(&log, &tools, &dev, params.check_mode, &mut report)?;

        let node = format!("/dev/rdsk/{}s0", disk);
        ensure_node(&log, &node, &w, params.check_mode, &mut report)?;
    }

    Ok(report)
}

fn main() {
    let log = init_log();
    module::run_module(&log, run)
}
