/*
 * Copyright 2023 Oxide Computer Company
 */

/*
 * Plumbing for the Ansible binary module protocol: parameters arrive in a JSON
 * file named by our only argument, and a single JSON document on stdout tells
 * the controller what happened.
 */

use crate::common::*;
use crate::file::read_json;
use serde::{Deserialize, Serialize};

pub const CHECK_MODE_BANNER: &str =
    "RUNNING IN CHECK MODE - NO CHANGES WILL BE MADE";

/**
 * The accumulated outcome of a run: whether anything was (or, in check mode,
 * would have been) changed, and the log lines to show the operator.
 */
#[derive(Debug, Default)]
pub struct Report {
    changed: bool,
    messages: Vec<String>,
}

impl Report {
    pub fn new(check_mode: bool) -> Report {
        let mut r = Report::default();
        if check_mode {
            r.msg(CHECK_MODE_BANNER);
        }
        r
    }

    pub fn msg<S: Into<String>>(&mut self, m: S) {
        self.messages.push(m.into());
    }

    pub fn set_changed(&mut self) {
        self.changed = true;
    }

    pub fn changed(&self) -> bool {
        self.changed
    }

    #[cfg(test)]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn summary(&self) -> String {
        self.messages.join(" | ")
    }
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ModuleResult {
    Exit { changed: bool, msg: String },
    Fail { failed: bool, msg: String },
}

impl ModuleResult {
    pub fn exit(report: &Report) -> ModuleResult {
        ModuleResult::Exit { changed: report.changed(), msg: report.summary() }
    }

    pub fn fail<S: Into<String>>(msg: S) -> ModuleResult {
        ModuleResult::Fail { failed: true, msg: msg.into() }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ModuleResult::Fail { .. })
    }
}

/**
 * Load module parameters from the file named on the command line.
 */
pub fn read_args<T>(log: &Logger) -> Result<T>
where
    for<'de> T: Deserialize<'de>,
{
    let path = match std::env::args_os().nth(1) {
        Some(p) => p,
        None => bail!("usage: module ARGS_FILE"),
    };
    info!(log, "reading module arguments"; "file" => ?path);

    match read_json(&path)? {
        Some(args) => Ok(args),
        None => bail!("arguments file {:?} does not exist", path),
    }
}

/**
 * Print the result document and leave.  A failure is also reported through
 * the exit status.
 */
pub fn finish(log: &Logger, result: ModuleResult) -> ! {
    let code = if result.is_failure() { 1 } else { 0 };

    match serde_json::to_string(&result) {
        Ok(s) => println!("{}", s),
        Err(e) => {
            error!(log, "could not serialise module result: {}", e);
            println!("{{\"failed\": true, \"msg\": \"internal error\"}}");
            std::process::exit(1);
        }
    }

    std::process::exit(code);
}

/**
 * Run the body of a module, turning its outcome into the result document.
 */
pub fn run_module<F>(log: &Logger, body: F) -> !
where
    F: FnOnce(&Logger) -> Result<Report>,
{
    let result = match body(log) {
        Ok(report) => {
            info!(log, "ok, run complete"; "changed" => report.changed());
            ModuleResult::exit(&report)
        }
        Err(e) => {
            error!(log, "fatal error: {:?}", e);
            ModuleResult::fail(format!("{:#}", e))
        }
    };

    finish(log, result)
}
