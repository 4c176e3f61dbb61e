/*
 * Copyright 2023 Oxide Computer Company
 */

use atty::Stream;
use slog::Drain;
use std::sync::Mutex;

pub use anyhow::{bail, Context, Result};
pub use slog::{debug, error, info, o, warn, Logger};

/**
 * Initialise a logger which writes to stderr.  The module result document is
 * the only thing the orchestration framework expects to find on stdout, so
 * diagnostic output must stay out of its way.  An interactive terminal gets
 * the compact format; anything else (usually a log file captured by the
 * framework) gets the full format.
 */
pub fn init_log() -> Logger {
    let dec = slog_term::TermDecorator::new().stderr().build();
    if atty::is(Stream::Stderr) {
        let dr = Mutex::new(slog_term::CompactFormat::new(dec).build()).fuse();
        slog::Logger::root(dr, o!())
    } else {
        let dr = Mutex::new(
            slog_term::FullFormat::new(dec).use_original_order().build(),
        )
        .fuse();
        slog::Logger::root(dr, o!())
    }
}

/**
 * A logger that discards everything, for tests.
 */
#[cfg(test)]
pub fn test_log() -> Logger {
    slog::Logger::root(slog::Discard, o!())
}

pub trait OutputExt {
    fn info(&self) -> String;
}

impl OutputExt for std::process::Output {
    /**
     * Summarise a failed command: the exit code, then whatever the command
     * had to say about it.
     */
    fn info(&self) -> String {
        let mut out = String::new();

        if let Some(code) = self.status.code() {
            out.push_str(&format!("exit code {}", code));
        }

        /*
         * raidcom and friends are not consistent about which stream carries
         * the complaint, so fall back to stdout if stderr is empty:
         */
        let stderr = String::from_utf8_lossy(&self.stderr).trim().to_string();
        let extra = if stderr.is_empty() {
            String::from_utf8_lossy(&self.stdout).trim().to_string()
        } else {
            stderr
        };

        if !extra.is_empty() {
            if !out.is_empty() {
                out.push_str(": ");
            }
            out.push_str(&extra);
        }

        out
    }
}
