/*
 * Copyright 2023 Oxide Computer Company
 */

use thiserror::Error;

/// Errors that abort an LDEV allocation run.
#[derive(Debug, Error)]
pub enum LdevError {
    #[error("malformed LDEV range {begin}..{end}: {reason}")]
    MalformedRange { begin: String, end: String, reason: String },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Command '{command}' failed: {output}")]
    VendorCommandFailure { command: String, output: String },

    #[error(
        "Command '{command}' failed: {output} | \
        Unable to acquire lock, frame is locked by: | {holder}"
    )]
    LockUnavailable { command: String, output: String, holder: String },

    #[error("could not run {command}")]
    Exec {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

pub type LdevResult<T> = Result<T, LdevError>;
