/*
 * Copyright 2023 Oxide Computer Company
 */

use crate::error::{LdevError, LdevResult};
use serde::Deserialize;
use std::fmt;

/**
 * An LDEV address on the array: a control unit and an index within it, both
 * hexadecimal.  Renders as "CU:II" with the index always two uppercase digits,
 * which is the form raidcom accepts for "-ldev_id".
 */
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LdevId {
    cu: String,
    index: u8,
}

impl LdevId {
    pub fn new(cu: &str, index: u8) -> LdevId {
        LdevId { cu: cu.to_uppercase(), index }
    }

    fn parse(s: &str) -> Result<LdevId, String> {
        let (cu, idx) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("\"{}\" is not of the form CU:INDEX", s))?;

        if cu.is_empty() || !cu.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("control unit in \"{}\" is not hex", s));
        }
        if idx.is_empty() || !idx.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("index in \"{}\" is not hex", s));
        }
        let index = u8::from_str_radix(idx, 16)
            .map_err(|e| format!("index in \"{}\": {}", s, e))?;

        Ok(LdevId::new(cu, index))
    }
}

impl fmt::Display for LdevId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02X}", self.cu, self.index)
    }
}

/**
 * Expand "begin" and "end" into every LDEV between them, inclusive, in index
 * order.  The control unit of the block is the one named in "begin".  An end
 * that precedes the beginning describes an empty block.
 */
pub fn expand_range(begin: &str, end: &str) -> LdevResult<Vec<LdevId>> {
    let malformed = |reason: String| LdevError::MalformedRange {
        begin: begin.to_string(),
        end: end.to_string(),
        reason,
    };

    let first = LdevId::parse(begin).map_err(malformed)?;
    let last = LdevId::parse(end).map_err(malformed)?;

    Ok((first.index..=last.index)
        .map(|index| LdevId { cu: first.cu.clone(), index })
        .collect())
}

/**
 * Block sizes arrive either as a string ("1024") or a bare number, depending
 * on how the playbook author quoted it.
 */
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Size {
    Integer(u64),
    String(String),
}

impl Size {
    pub fn gigabytes(&self) -> LdevResult<u64> {
        let invalid = |reason: String| LdevError::InvalidParameter {
            name: "size".to_string(),
            reason,
        };

        let gb = match self {
            Size::Integer(n) => *n,
            Size::String(s) => s.trim().parse::<u64>().map_err(|_| {
                invalid(format!("\"{}\" is not a whole number of GB", s))
            })?,
        };

        if gb == 0 {
            return Err(invalid("size must be at least 1 GB".to_string()));
        }

        Ok(gb)
    }
}

/**
 * One requested block of LDEVs, as it appears in the module parameters.
 */
#[derive(Debug, Deserialize, Clone)]
pub struct BlockSpec {
    pub name: String,
    pub size: Size,
    pub begin: String,
    pub end: String,
}

impl BlockSpec {
    /**
     * Validate the request and expand its range.  Nothing is sent to the
     * array for a block that fails here.
     */
    pub fn resolve(&self) -> LdevResult<Block> {
        if self.name.trim().is_empty() {
            return Err(LdevError::InvalidParameter {
                name: "name".to_string(),
                reason: "block name must not be empty".to_string(),
            });
        }

        Ok(Block {
            name: self.name.trim().to_string(),
            capacity_gb: self.size.gigabytes()?,
            ldevs: expand_range(&self.begin, &self.end)?,
        })
    }
}

/**
 * A validated block: the base name, the size of each LDEV, and every LDEV in
 * the block in address order.
 */
#[derive(Debug, Clone)]
pub struct Block {
    pub name: String,
    pub capacity_gb: u64,
    pub ldevs: Vec<LdevId>,
}

/**
 * The display name given to the nth LDEV of a block.  The counter is
 * zero-padded to two digits and simply grows wider past 99.
 */
pub fn display_name(base: &str, n: usize) -> String {
    format!("{}_{:02}", base, n)
}
