//! Reads the result of an ESP-IDF build out of its console log.
//!
//! Two lines are relied upon:
//!
//! ```text
//!   - Part 'factory' 0/0 @ 0x10000 size 0x267000 (overflow 0x1a40)
//! micropython.bin binary size 0x1a2b30 bytes. Smallest app partition is 0x267000 bytes.
//! ```
//!
//! If either cannot be read the build log format has changed and we refuse to
//! guess.

use crate::region::parse_number;

const TOO_SMALL_MARKER: &str = "partition is too small";
const OVERFLOW_MARKER: &str = "(overflow ";
/// Only the app image summary counts; the bootloader prints one too.
const APP_SIZE_MARKER: &str = ".bin binary size ";
const BOOTLOADER_PREFIX: &str = "Bootloader";
const BYTES_SUFFIX: &str = " bytes";

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BuildOutcome {
    Success { binary_size: u32 },
    /// The app did not fit; `overflow` is the missing byte count.
    Overflow { overflow: u32 },
    Failure { exit_code: i32 },
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ClassifyError {
    #[error("build reported a partition overflow without a readable byte count")]
    OverflowAmount,
    #[error("build succeeded but the binary size summary is missing or unreadable")]
    BinarySize,
}

pub fn classify(exit_code: i32, output: &str) -> Result<BuildOutcome, ClassifyError> {
    if exit_code != 0 {
        if !output.contains(TOO_SMALL_MARKER) && !output.contains(OVERFLOW_MARKER) {
            return Ok(BuildOutcome::Failure { exit_code });
        }

        return overflow_amount(output)
            .map(|overflow| BuildOutcome::Overflow { overflow })
            .ok_or(ClassifyError::OverflowAmount);
    }

    binary_size(output)
        .map(|binary_size| BuildOutcome::Success { binary_size })
        .ok_or(ClassifyError::BinarySize)
}

fn overflow_amount(output: &str) -> Option<u32> {
    let (_, rest) = output.split_once(OVERFLOW_MARKER)?;
    let (amount, _) = rest.split_once(')')?;
    let amount = amount.trim();
    let hex = amount
        .strip_prefix("0x")
        .or_else(|| amount.strip_prefix("0X"))
        .unwrap_or(amount);

    u32::from_str_radix(hex, 16).ok().filter(|v| *v != 0)
}

fn binary_size(output: &str) -> Option<u32> {
    let line = output.lines().rev().find(|line| {
        let line = line.trim_start();
        !line.starts_with(BOOTLOADER_PREFIX) && line.contains(APP_SIZE_MARKER)
    })?;
    let (_, rest) = line.rsplit_once(APP_SIZE_MARKER)?;
    let (size, _) = rest.split_once(BYTES_SUFFIX)?;
    parse_number(size)
}

/// Unused bytes of an app partition of `app_size` holding `binary_size`.
pub fn slack(app_size: u32, binary_size: u32) -> u32 {
    app_size.saturating_sub(binary_size)
}
