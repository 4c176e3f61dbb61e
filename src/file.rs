/*
 * Copyright 2023 Oxide Computer Company
 */

use crate::common::*;
use serde::Deserialize;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

/**
 * Does this path exist at all?  Raw disk device nodes are character special
 * files, so unlike a regular file check we accept any kind of node here.
 */
#[allow(dead_code)] /* ldevblock has no use for it */
pub fn exists_node<P: AsRef<Path>>(p: P) -> Result<bool> {
    let p = p.as_ref();
    match std::fs::metadata(p) {
        Ok(_) => Ok(true),
        Err(e) => match e.kind() {
            ErrorKind::NotFound => Ok(false),
            _ => bail!("checking {}: {}", p.display(), e),
        },
    }
}

pub fn read_file<P: AsRef<Path>>(p: P) -> Result<Option<String>> {
    let p = p.as_ref();
    let f = match File::open(p) {
        Ok(f) => f,
        Err(e) => {
            match e.kind() {
                ErrorKind::NotFound => return Ok(None),
                _ => bail!("open \"{}\": {}", p.display(), e),
            };
        }
    };
    let mut r = std::io::BufReader::new(f);
    let mut out = String::new();
    r.read_to_string(&mut out)?;
    Ok(Some(out))
}

pub fn read_json<T, P>(p: P) -> Result<Option<T>>
where
    for<'de> T: Deserialize<'de>,
    P: AsRef<Path>,
{
    match read_file(&p)? {
        None => Ok(None),
        Some(s) => Ok(Some(serde_json::from_str(&s).with_context(|| {
            format!("parsing JSON in {}", p.as_ref().display())
        })?)),
    }
}

#[allow(dead_code)] /* grid_disk has no site configuration */
pub fn read_toml<T, P>(p: P) -> Result<Option<T>>
where
    for<'de> T: Deserialize<'de>,
    P: AsRef<Path>,
{
    match read_file(&p)? {
        None => Ok(None),
        Some(s) => Ok(Some(toml::from_str(&s).with_context(|| {
            format!("parsing TOML in {}", p.as_ref().display())
        })?)),
    }
}
