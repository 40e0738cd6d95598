//! Flash partition table model for ESP32 firmware builds.
//!
//! Everything in here is pure: layouts are computed from sizes, printed as the
//! CSV table the ESP-IDF build consumes, and build logs are classified without
//! touching the file system.

#![cfg_attr(not(test), no_std)]

pub mod align;
pub mod layout;
pub mod outcome;
pub mod region;

pub use align::{align_down, align_up, ALIGNMENT};
pub use layout::{Bank, Layout, LayoutError};
pub use outcome::{classify, slack, BuildOutcome, ClassifyError};
pub use region::{AppSubKind, DataSubKind, Region, RegionKind, SubKind};
