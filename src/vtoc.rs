/*
 * Copyright 2023 Oxide Computer Company
 */

use std::io::Write;
use std::process::Command;

use super::common::*;

const PRTVTOC: &str = "/usr/sbin/prtvtoc";
const FORMAT: &str = "/usr/sbin/format";
const FMTHARD: &str = "/usr/sbin/fmthard";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub id: String,
    pub tag: String,
    pub flags: String,
    pub sector_first: u64,
    pub sector_count: u64,
}

#[derive(Debug)]
pub struct Vtoc {
    pub sector_size: u64,
    pub sectors_per_cylinder: Option<u64>,
    pub accessible_cylinders: Option<u64>,
    pub partitions: Vec<Partition>,
}

impl Vtoc {
    /**
     * The partition table we want on a grid disk: slice 0 covering the whole
     * disk save for the first cylinder, plus the customary slice 2 "backup"
     * slice spanning the entire disk.  Rendered in the datafile format
     * fmthard(1M) reads with "-s".
     */
    pub fn whole_disk_table(&self) -> Result<String> {
        let (spc, cyl) =
            match (self.sectors_per_cylinder, self.accessible_cylinders) {
                (Some(spc), Some(cyl)) => (spc, cyl),
                _ => bail!("disk has no cylinder geometry; not an SMI label?"),
            };

        let total = spc.saturating_mul(cyl);
        if total <= spc {
            bail!("disk is too small: {} cylinders of {} sectors", cyl, spc);
        }

        Ok(format!("0 0 00 {} {}\n2 5 01 0 {}\n", spc, total - spc, total))
    }
}

/**
 * Parse the output of prtvtoc(1M).  Header lines begin with "*"; the
 * geometry is in the block of header lines that follows "* Dimensions:", and
 * every line that is not a header describes a partition.
 */
pub fn parse_prtvtoc(out: &str) -> Result<Vtoc> {
    enum State {
        WaitingForDimensions,
        Dimensions,
        After,
    }
    let mut sectorsize: Option<u64> = None;
    let mut spc: Option<u64> = None;
    let mut cyl: Option<u64> = None;
    let mut state = State::WaitingForDimensions;
    let mut parts = Vec::new();

    for l in out.lines() {
        let t: Vec<_> = l.trim().split_whitespace().collect();
        if t.is_empty() {
            continue;
        }

        match state {
            State::WaitingForDimensions => {
                if t == ["*", "Dimensions:"] {
                    state = State::Dimensions;
                }
            }
            State::Dimensions => match t.as_slice() {
                ["*", n, "bytes/sector"] => sectorsize = Some(n.parse()?),
                ["*", n, "sectors/cylinder"] => spc = Some(n.parse()?),
                ["*", n, "accessible", "cylinders"] => cyl = Some(n.parse()?),
                ["*"] => state = State::After,
                _ => (),
            },
            State::After => {
                if t[0].starts_with('*') {
                    continue;
                }
                if t.len() < 5 {
                    bail!("unexpected prtvtoc partition line: {:?}", l);
                }

                parts.push(Partition {
                    id: t[0].to_string(),
                    tag: t[1].to_string(),
                    flags: t[2].to_string(),
                    sector_first: t[3].parse()?,
                    sector_count: t[4].parse()?,
                });
            }
        }
    }

    let sector_size = match sectorsize {
        Some(s) => s,
        None => bail!("prtvtoc output has no dimensions: {:?}", out),
    };

    Ok(Vtoc {
        sector_size,
        sectors_per_cylinder: spc,
        accessible_cylinders: cyl,
        partitions: parts,
    })
}

/**
 * Read the label of a disk.  Returns None if prtvtoc fails, which is what
 * happens when the disk has never been labelled.
 */
pub fn prtvtoc(log: &Logger, device: &str) -> Result<Option<Vtoc>> {
    info!(log, "exec: prtvtoc {}", device);
    let output = Command::new(PRTVTOC).env_clear().arg(device).output()?;

    if !output.status.success() {
        info!(log, "prtvtoc {} failure: {}", device, output.info());
        return Ok(None);
    }

    let out = String::from_utf8(output.stdout)?;
    Ok(Some(parse_prtvtoc(&out)?))
}

/**
 * Write a default SMI (VTOC) label to a disk with format(1M).
 */
pub fn format_label(log: &Logger, disk: &str) -> Result<()> {
    info!(log, "exec: format -L vtoc -d {}", disk);
    let output = Command::new(FORMAT)
        .env_clear()
        .arg("-L")
        .arg("vtoc")
        .arg("-d")
        .arg(disk)
        .output()?;

    if !output.status.success() {
        bail!("format failure: {}", output.info());
    }

    Ok(())
}

/**
 * Replace the partition table of a disk with the contents of a fmthard(1M)
 * datafile.
 */
pub fn fmthard(log: &Logger, device: &str, table: &str) -> Result<()> {
    let tf = tempfile::NamedTempFile::new()?;
    let mut w = std::io::BufWriter::new(tf.as_file());
    w.write_all(table.as_bytes())?;
    w.flush()?;
    drop(w);

    info!(log, "exec: fmthard -s {} {}", tf.path().display(), device;
        "table" => table.trim());

    let output = Command::new(FMTHARD)
        .env_clear()
        .arg("-s")
        .arg(tf.path())
        .arg(device)
        .output()?;

    if !output.status.success() {
        bail!("fmthard failure: {}", output.info());
    }

    Ok(())
}

/**
 * The disk labelling tools, so that the grid disk reconciliation can be run
 * against something other than real disks.
 */
pub trait DiskTools {
    fn prtvtoc(&self, device: &str) -> Result<Option<Vtoc>>;
    fn format_label(&self, disk: &str) -> Result<()>;
    fn fmthard(&self, device: &str, table: &str) -> Result<()>;
}

/**
 * The tools installed on this host.
 */
pub struct HostDisks {
    log: Logger,
}

impl HostDisks {
    pub fn new(log: &Logger) -> HostDisks {
        HostDisks { log: log.clone() }
    }
}

impl DiskTools for HostDisks {
    fn prtvtoc(&self, device: &str) -> Result<Option<Vtoc>> {
        prtvtoc(&self.log, device)
    }

    fn format_label(&self, disk: &str) -> Result<()> {
        format_label(&self.log, disk)
    }

    fn fmthard(&self, device: &str, table: &str) -> Result<()> {
        fmthard(&self.log, device, table)
    }
}
