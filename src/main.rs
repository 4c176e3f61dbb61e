/*
 * Copyright 2023 Oxide Computer Company
 */

/*
 * ldevblock: create blocks of LDEVs on the SAN array and share them to a set
 * of chassis.  Safe to run repeatedly; only the missing pieces are created.
 */

mod allocator;
mod common;
mod config;
mod error;
mod file;
mod ldev;
mod module;
mod platform;
mod raidcom;

use serde::Deserialize;

use allocator::{Allocator, Apply, CommandSink, LockSpec, Record, Target};
use common::*;
use config::{SiteConfig, SITE_CONFIG};
use ldev::{Block, BlockSpec};
use module::Report;
use raidcom::Raidcom;

/**
 * HORCM instance and pool ids are numbers, and a playbook is as likely to
 * pass them bare as quoted.
 */
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Id {
    Integer(u64),
    String(String),
}

impl Id {
    fn text(&self) -> String {
        match self {
            Id::Integer(n) => n.to_string(),
            Id::String(s) => s.trim().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Params {
    horcm: Id,
    pool: Id,
    #[serde(default)]
    chassis: Option<Vec<String>>,
    #[serde(default)]
    ports: Option<Vec<String>>,
    #[serde(default)]
    blocks: Option<Vec<BlockSpec>>,
    #[serde(rename = "_ansible_check_mode", default)]
    check_mode: bool,
}

impl Params {
    fn target(&self, site: &SiteConfig) -> Result<Target> {
        let horcm = self.horcm.text();
        if horcm.is_empty() {
            bail!("horcm must name a HORCM instance");
        }
        let pool = self.pool.text();
        if pool.is_empty() {
            bail!("pool must name a storage pool");
        }

        Ok(Target {
            tiered: site.pools.is_tiered(&pool),
            horcm,
            pool,
            chassis: self.chassis.clone().unwrap_or_default(),
            ports: self
                .ports
                .clone()
                .unwrap_or_else(|| site.share.default_ports.clone()),
            lock: LockSpec {
                resource: site.raidcom.resource_name.clone(),
                time: site.raidcom.lock_time,
            },
        })
    }

    /**
     * Check every block before anything is sent to the array, so that a typo
     * in the last block does not leave the first half-done.
     */
    fn blocks(&self) -> Result<Vec<Block>> {
        let mut out = Vec::new();
        for spec in self.blocks.iter().flatten() {
            out.push(
                spec.resolve()
                    .with_context(|| format!("block \"{}\"", spec.name))?,
            );
        }
        Ok(out)
    }
}

fn run(log: &Logger) -> Result<Report> {
    platform::check_platform(log)?;

    let params: Params = module::read_args(log)?;
    let site: SiteConfig = file::read_toml(SITE_CONFIG)?.unwrap_or_default();
    debug!(log, "site configuration"; "config" => ?site);

    let target = params.target(&site)?;
    let blocks = params.blocks()?;
    info!(log, "allocating";
        "pool" => &target.pool,
        "tiered" => target.tiered,
        "blocks" => blocks.len(),
        "check_mode" => params.check_mode);

    let raidcom = Raidcom::new(log, &site.raidcom.path);
    let sink: Box<dyn CommandSink + '_> = if params.check_mode {
        Box::new(Record::new(&site.raidcom.path))
    } else {
        Box::new(Apply::new(log, &raidcom))
    };
    let alloc = Allocator::new(log, &target, &raidcom, sink.as_ref());

    let mut report = Report::new(params.check_mode);
    for block in &blocks {
        alloc.reconcile(block, &mut report)?;
    }

    Ok(report)
}

fn main() {
    let log = init_log();
    module::run_module(&log, run)
}
