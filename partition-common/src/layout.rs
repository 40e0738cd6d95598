use core::fmt;

use arrayvec::ArrayVec;

use crate::align::{align_down, align_up, checked_align_up, ALIGNMENT};
use crate::region::{parse_number, AppSubKind, DataSubKind, Region, RegionKind, SubKind};

/// Everything below is taken by the second stage bootloader and the table itself.
pub const FIRST_OFFSET: u32 = 0x9000;
pub const NVS_SIZE: u32 = 0x6000;
pub const OTA_DATA_SIZE: u32 = 0x2000;
pub const PHY_INIT_SIZE: u32 = 0x1000;

/// App size used when the caller does not pin one.
pub const DEFAULT_APP_SIZE: u32 = 0x267000;

/// nvs, otadata, phy_init, ota_0, ota_1, vfs
pub const MAX_REGIONS: usize = 6;

pub const TABLE_HEADER: &str = "# Name,   Type, SubType, Offset,  Size, Flags";

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("not enough flash to store the firmware: {required:#x} bytes needed, {capacity:#x} available")]
    Capacity { required: u64, capacity: u32 },
    #[error("app partition size must be non zero")]
    EmptyApp,
    #[error("cannot shrink {app_size:#x} byte app partition by {slack:#x} bytes")]
    Shrink { slack: u32, app_size: u32 },
    #[error("partition name longer than 16 bytes")]
    Name,
    #[error("more than {} partitions", MAX_REGIONS)]
    TooManyRegions,
    #[error("malformed partition table line {line}")]
    Syntax { line: usize },
    #[error("partition at {offset:#x}: {reason}")]
    Invalid { offset: u32, reason: &'static str },
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Bank {
    /// One `factory` app partition.
    Single,
    /// `ota_0` + `ota_1` of equal size plus `otadata`.
    Dual,
}

impl Bank {
    pub fn from_ota(ota: bool) -> Self {
        match ota {
            true => Bank::Dual,
            false => Bank::Single,
        }
    }

    pub fn count(&self) -> u32 {
        match self {
            Bank::Single => 1,
            Bank::Dual => 2,
        }
    }
}

/// A validated partition table. Never patched in place: [`Layout::grow`] and
/// [`Layout::shrink`] derive a new one from scratch.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Layout {
    regions: ArrayVec<Region, MAX_REGIONS>,
    bank: Bank,
    capacity: u32,
    app_size: u32,
}

struct Planner {
    regions: ArrayVec<Region, MAX_REGIONS>,
    offset: u32,
}

impl Planner {
    // callers check the capacity before pushing, so the offset cannot wrap
    fn push(&mut self, name: &str, subkind: SubKind, size: u32) -> Result<(), LayoutError> {
        let region = Region::new(name, subkind, self.offset, size)?;
        self.offset += size;
        self.regions
            .try_push(region)
            .map_err(|_| LayoutError::TooManyRegions)
    }
}

impl Layout {
    pub fn new(app_size: u32, capacity: u32, bank: Bank) -> Result<Self, LayoutError> {
        if app_size == 0 {
            return Err(LayoutError::EmptyApp);
        }

        let total = align_down(capacity, ALIGNMENT);
        let app = checked_align_up(app_size, ALIGNMENT).ok_or(LayoutError::Capacity {
            required: u64::from(app_size),
            capacity: total,
        })?;
        let fixed = NVS_SIZE
            + PHY_INIT_SIZE
            + match bank {
                Bank::Single => 0,
                Bank::Dual => OTA_DATA_SIZE,
            };

        let app_end =
            u64::from(FIRST_OFFSET) + u64::from(fixed) + u64::from(app) * u64::from(bank.count());
        if app_end > u64::from(total) {
            return Err(LayoutError::Capacity {
                required: app_end,
                capacity: total,
            });
        }
        let mut planner = Planner {
            regions: ArrayVec::new(),
            offset: FIRST_OFFSET,
        };
        planner.push("nvs", SubKind::Data(DataSubKind::Nvs), NVS_SIZE)?;
        if bank == Bank::Dual {
            planner.push("otadata", SubKind::Data(DataSubKind::Ota), OTA_DATA_SIZE)?;
        }
        planner.push("phy_init", SubKind::Data(DataSubKind::Phy), PHY_INIT_SIZE)?;
        match bank {
            Bank::Single => {
                planner.push("factory", SubKind::App(AppSubKind::Factory), app)?;
            }
            Bank::Dual => {
                planner.push("ota_0", SubKind::App(AppSubKind::Ota0), app)?;
                planner.push("ota_1", SubKind::App(AppSubKind::Ota1), app)?;
            }
        }
        let vfs = align_down(total - planner.offset, ALIGNMENT);
        planner.push("vfs", SubKind::Data(DataSubKind::Fat), vfs)?;

        let layout = Self {
            regions: planner.regions,
            bank,
            capacity,
            app_size: app,
        };
        layout.validate()?;
        Ok(layout)
    }

    /// Enlarges every app partition by `overflow` rounded up to a sector.
    pub fn grow(&self, overflow: u32) -> Result<Self, LayoutError> {
        let delta = checked_align_up(overflow, ALIGNMENT).map(u64::from).unwrap_or(1 << 32);
        let app_size = u64::from(self.app_size) + delta;

        match u32::try_from(app_size) {
            Ok(app_size) => Self::new(app_size, self.capacity, self.bank),
            Err(_) => Err(LayoutError::Capacity {
                required: app_size * u64::from(self.bank.count()),
                capacity: align_down(self.capacity, ALIGNMENT),
            }),
        }
    }

    /// Gives back the whole sectors of `slack`. The result still holds
    /// `app_size - slack` bytes, so passing the measured slack never cuts into
    /// the binary.
    pub fn shrink(&self, slack: u32) -> Result<Self, LayoutError> {
        if slack >= self.app_size {
            return Err(LayoutError::Shrink {
                slack,
                app_size: self.app_size,
            });
        }

        Self::new(
            align_up(self.app_size - slack, ALIGNMENT),
            self.capacity,
            self.bank,
        )
    }

    /// Size of each app partition.
    pub fn app_size(&self) -> u32 {
        self.app_size
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn bank(&self) -> Bank {
        self.bank
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn app_regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter().filter(|r| r.kind() == RegionKind::App)
    }

    /// Where the app partitions end and the filesystem starts.
    pub fn app_end(&self) -> u32 {
        self.app_regions().map(Region::end).max().unwrap_or(FIRST_OFFSET)
    }

    pub fn filesystem(&self) -> Option<&Region> {
        self.regions
            .iter()
            .find(|r| r.subkind() == SubKind::Data(DataSubKind::Fat))
    }

    /// Re-checks every invariant of the table.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let total = align_down(self.capacity, ALIGNMENT);
        let mut offset = FIRST_OFFSET;

        for r in &self.regions {
            if !r.is_aligned() {
                return Err(LayoutError::Invalid {
                    offset: r.offset(),
                    reason: "not sector aligned",
                });
            }
            if r.offset() != offset {
                return Err(LayoutError::Invalid {
                    offset: r.offset(),
                    reason: "gap or overlap with the previous partition",
                });
            }
            offset = r.offset().checked_add(r.size()).ok_or(LayoutError::Invalid {
                offset: r.offset(),
                reason: "size wraps the address space",
            })?;
            if offset > total {
                return Err(LayoutError::Capacity {
                    required: u64::from(offset),
                    capacity: total,
                });
            }
        }

        let mut apps = self.app_regions();
        let first = apps.next().ok_or(LayoutError::Invalid {
            offset: FIRST_OFFSET,
            reason: "no app partition",
        })?;
        if first.size() != self.app_size {
            return Err(LayoutError::Invalid {
                offset: first.offset(),
                reason: "app partition size mismatch",
            });
        }
        if let Some(r) = apps.find(|r| r.size() != self.app_size) {
            return Err(LayoutError::Invalid {
                offset: r.offset(),
                reason: "ota partitions differ in size",
            });
        }

        Ok(())
    }

    /// Reads a table back from its CSV form. `capacity` is the flash size it
    /// was planned for.
    pub fn parse(text: &str, capacity: u32) -> Result<Self, LayoutError> {
        let mut regions = ArrayVec::<Region, MAX_REGIONS>::new();

        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let syntax = LayoutError::Syntax { line: i + 1 };

            let mut fields = line.split(',').map(str::trim);
            let mut next = || fields.next().ok_or(syntax);
            let name = next()?;
            let kind = RegionKind::from_name(next()?).ok_or(syntax)?;
            let subkind = SubKind::parse(kind, next()?).ok_or(syntax)?;
            let offset = parse_number(next()?).ok_or(syntax)?;
            let size = parse_number(next()?).ok_or(syntax)?;
            // flags are never written by us
            if fields.any(|f| !f.is_empty()) {
                return Err(syntax);
            }

            regions
                .try_push(Region::new(name, subkind, offset, size)?)
                .map_err(|_| LayoutError::TooManyRegions)?;
        }

        let bank = match regions
            .iter()
            .any(|r| r.subkind() == SubKind::App(AppSubKind::Ota1))
        {
            true => Bank::Dual,
            false => Bank::Single,
        };
        let app_size = regions
            .iter()
            .find(|r| r.kind() == RegionKind::App)
            .map(Region::size)
            .unwrap_or_default();

        let layout = Self {
            regions,
            bank,
            capacity,
            app_size,
        };
        layout.validate()?;
        Ok(layout)
    }
}

/// The partition table CSV consumed by the ESP-IDF build.
impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", TABLE_HEADER)?;
        for r in &self.regions {
            writeln!(f, "{}", r)?;
        }
        Ok(())
    }
}
