use core::fmt;

use num_traits::{FromPrimitive, ToPrimitive};

use crate::align::{is_aligned, ALIGNMENT};
use crate::layout::LayoutError;

/// Longest label the partition table can hold.
pub const NAME_LEN: usize = 16;

pub type Name = heapless::String<NAME_LEN>;

#[derive(Debug, Copy, Clone, Eq, PartialEq, enum_primitive_derive::Primitive)]
pub enum RegionKind {
    App = 0x00,
    Data = 0x01,
}

impl RegionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegionKind::App => "app",
            RegionKind::Data => "data",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "app" => Some(RegionKind::App),
            "data" => Some(RegionKind::Data),
            _ => parse_code(name).and_then(Self::from_u8),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, enum_primitive_derive::Primitive)]
pub enum AppSubKind {
    Factory = 0x00,
    Ota0 = 0x10,
    Ota1 = 0x11,
}

impl AppSubKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppSubKind::Factory => "factory",
            AppSubKind::Ota0 => "ota_0",
            AppSubKind::Ota1 => "ota_1",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "factory" => Some(AppSubKind::Factory),
            "ota_0" => Some(AppSubKind::Ota0),
            "ota_1" => Some(AppSubKind::Ota1),
            _ => parse_code(name).and_then(Self::from_u8),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, enum_primitive_derive::Primitive)]
pub enum DataSubKind {
    /// OTA selection metadata
    Ota = 0x00,
    /// RF calibration
    Phy = 0x01,
    Nvs = 0x02,
    Fat = 0x81,
}

impl DataSubKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSubKind::Ota => "ota",
            DataSubKind::Phy => "phy",
            DataSubKind::Nvs => "nvs",
            DataSubKind::Fat => "fat",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ota" => Some(DataSubKind::Ota),
            "phy" => Some(DataSubKind::Phy),
            "nvs" => Some(DataSubKind::Nvs),
            "fat" => Some(DataSubKind::Fat),
            _ => parse_code(name).and_then(Self::from_u8),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SubKind {
    App(AppSubKind),
    Data(DataSubKind),
}

impl SubKind {
    pub fn kind(&self) -> RegionKind {
        match self {
            SubKind::App(_) => RegionKind::App,
            SubKind::Data(_) => RegionKind::Data,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubKind::App(v) => v.as_str(),
            SubKind::Data(v) => v.as_str(),
        }
    }

    /// Numeric `(type, subtype)` pair as written to the on-flash table.
    pub fn codes(&self) -> (u8, u8) {
        // every variant has an explicit discriminant below 0x100
        let sub = match self {
            SubKind::App(v) => v.to_u8(),
            SubKind::Data(v) => v.to_u8(),
        };
        (self.kind().to_u8().unwrap_or_default(), sub.unwrap_or_default())
    }

    pub fn parse(kind: RegionKind, name: &str) -> Option<Self> {
        match kind {
            RegionKind::App => AppSubKind::from_name(name).map(SubKind::App),
            RegionKind::Data => DataSubKind::from_name(name).map(SubKind::Data),
        }
    }
}

/// Accepts `0x..` hex or plain decimal.
pub(crate) fn parse_number(s: &str) -> Option<u32> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

fn parse_code(s: &str) -> Option<u8> {
    parse_number(s).and_then(|v| u8::try_from(v).ok())
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Region {
    name: Name,
    subkind: SubKind,
    offset: u32,
    size: u32,
}

impl Region {
    pub fn new(name: &str, subkind: SubKind, offset: u32, size: u32) -> Result<Self, LayoutError> {
        let mut label = Name::new();
        label.push_str(name).map_err(|_| LayoutError::Name)?;

        Ok(Self {
            name: label,
            subkind,
            offset,
            size,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RegionKind {
        self.subkind.kind()
    }

    pub fn subkind(&self) -> SubKind {
        self.subkind
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// First byte past the region. Saturates, a saturated end never passes validation.
    pub fn end(&self) -> u32 {
        self.offset.saturating_add(self.size)
    }

    pub fn is_aligned(&self) -> bool {
        is_aligned(self.offset, ALIGNMENT) && is_aligned(self.size, ALIGNMENT)
    }
}

/// One table line: `name,type,subtype,0xOFFSET,0xSIZE`.
impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},0x{:X},0x{:X}",
            self.name,
            self.kind().as_str(),
            self.subkind.as_str(),
            self.offset,
            self.size
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subkind_names() {
        assert_eq!(RegionKind::from_name("app"), Some(RegionKind::App));
        assert_eq!(RegionKind::from_name("0x01"), Some(RegionKind::Data));
        assert_eq!(RegionKind::from_name("0x40"), None);

        assert_eq!(
            SubKind::parse(RegionKind::App, "ota_1"),
            Some(SubKind::App(AppSubKind::Ota1))
        );
        assert_eq!(
            SubKind::parse(RegionKind::Data, "0x81"),
            Some(SubKind::Data(DataSubKind::Fat))
        );
        assert_eq!(
            SubKind::parse(RegionKind::Data, "2"),
            Some(SubKind::Data(DataSubKind::Nvs))
        );
        assert_eq!(SubKind::parse(RegionKind::App, "nvs"), None);

        assert_eq!(SubKind::App(AppSubKind::Ota0).codes(), (0x00, 0x10));
        assert_eq!(SubKind::Data(DataSubKind::Phy).codes(), (0x01, 0x01));
    }

    #[test]
    fn region_line() {
        let r = Region::new("nvs", SubKind::Data(DataSubKind::Nvs), 0x9000, 0x6000).unwrap();
        assert_eq!(r.to_string(), "nvs,data,nvs,0x9000,0x6000");
        assert_eq!(r.end(), 0xF000);
        assert!(r.is_aligned());

        let r = Region::new("ota_0", SubKind::App(AppSubKind::Ota0), 0x12000, 0x1ABC00).unwrap();
        assert_eq!(r.to_string(), "ota_0,app,ota_0,0x12000,0x1ABC00");
        assert!(!r.is_aligned());
    }

    #[test]
    fn name_too_long() {
        assert_eq!(
            Region::new("a_very_long_partition", SubKind::Data(DataSubKind::Fat), 0, 0),
            Err(LayoutError::Name)
        );
    }
}
