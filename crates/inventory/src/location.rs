//! Storage-location naming.
//!
//! A storage slot is addressed as `{warehouse}-{zone}-EST{shelf}-NIV{level}`,
//! e.g. `ALM01-ZNC15-EST03-NIV02`. Zones come from a fixed enumeration split
//! into groups A, B and C. The consumption sink uses the reserved zone `CON01`
//! and is never a valid storage slot.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use wms_core::{DomainError, DomainResult};

/// Warehouse code used when none is configured.
pub const DEFAULT_WAREHOUSE: &str = "ALM01";

const CONSUMPTION_ZONE: &str = "CON01";
const SHELF_PREFIX: &str = "EST";
const LEVEL_PREFIX: &str = "NIV";
const MAX_POSITION: u8 = 99;

/// Named group of zones.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ZoneGroup {
    A,
    B,
    C,
}

impl ZoneGroup {
    pub const ALL: [ZoneGroup; 3] = [ZoneGroup::A, ZoneGroup::B, ZoneGroup::C];

    /// Number of zones in the group.
    pub fn size(self) -> u8 {
        match self {
            ZoneGroup::A => 8,
            ZoneGroup::B => 9,
            ZoneGroup::C => 22,
        }
    }

    fn letter(self) -> char {
        match self {
            ZoneGroup::A => 'A',
            ZoneGroup::B => 'B',
            ZoneGroup::C => 'C',
        }
    }

    fn from_letter(c: char) -> Option<Self> {
        match c {
            'A' => Some(ZoneGroup::A),
            'B' => Some(ZoneGroup::B),
            'C' => Some(ZoneGroup::C),
            _ => None,
        }
    }

    /// Zones of this group in order (`ZNA01`, `ZNA02`, ...).
    pub fn zones(self) -> impl Iterator<Item = Zone> {
        (1..=self.size()).map(move |number| Zone { group: self, number })
    }
}

/// One zone of the enumerated set, e.g. `ZNC15`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Zone {
    group: ZoneGroup,
    number: u8,
}

impl Zone {
    pub fn new(group: ZoneGroup, number: u8) -> DomainResult<Self> {
        if number == 0 || number > group.size() {
            return Err(DomainError::malformed_location(format!(
                "zone group {:?} has no zone {number}",
                group
            )));
        }
        Ok(Self { group, number })
    }

    pub fn group(self) -> ZoneGroup {
        self.group
    }

    pub fn number(self) -> u8 {
        self.number
    }

    /// Every selectable zone, group by group.
    pub fn all() -> impl Iterator<Item = Zone> {
        ZoneGroup::ALL.into_iter().flat_map(ZoneGroup::zones)
    }
}

impl core::fmt::Display for Zone {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "ZN{}{:02}", self.group.letter(), self.number)
    }
}

impl FromStr for Zone {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || DomainError::malformed_location(format!("unknown zone {s:?}"));

        let rest = s.strip_prefix("ZN").ok_or_else(malformed)?;
        let mut chars = rest.chars();
        let group = chars.next().and_then(ZoneGroup::from_letter).ok_or_else(malformed)?;
        let digits = chars.as_str();
        if digits.len() != 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let number: u8 = digits.parse().map_err(|_| malformed())?;
        Zone::new(group, number).map_err(|_| malformed())
    }
}

/// Formatted location identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(String);

impl LocationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for LocationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parsed storage slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StorageSlot {
    pub zone: Zone,
    pub shelf: u8,
    pub level: u8,
}

/// Formatter/parser for location and container identifiers of one warehouse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationNamer {
    warehouse: String,
}

impl Default for LocationNamer {
    fn default() -> Self {
        Self {
            warehouse: DEFAULT_WAREHOUSE.to_string(),
        }
    }
}

impl LocationNamer {
    /// Namer for `warehouse`; the code must be non-blank ASCII alphanumeric.
    pub fn new(warehouse: impl Into<String>) -> DomainResult<Self> {
        let warehouse = warehouse.into();
        if warehouse.is_empty() || !warehouse.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DomainError::validation(format!(
                "invalid warehouse code {warehouse:?}"
            )));
        }
        Ok(Self { warehouse })
    }

    pub fn warehouse(&self) -> &str {
        &self.warehouse
    }

    /// Build the identifier of a storage slot.
    pub fn format(&self, zone: Zone, shelf: u8, level: u8) -> DomainResult<LocationId> {
        check_position("shelf", shelf)?;
        check_position("level", level)?;
        Ok(LocationId(format!(
            "{}-{}-{SHELF_PREFIX}{shelf:02}-{LEVEL_PREFIX}{level:02}",
            self.warehouse, zone
        )))
    }

    /// Inverse of [`LocationNamer::format`].
    pub fn parse(&self, raw: &str) -> DomainResult<StorageSlot> {
        let malformed = |why: &str| DomainError::malformed_location(format!("{raw:?}: {why}"));

        let parts: Vec<&str> = raw.trim().split('-').collect();
        let [warehouse, zone, shelf, level] = parts.as_slice() else {
            return Err(malformed("expected WAREHOUSE-ZONE-ESTnn-NIVnn"));
        };

        if *warehouse != self.warehouse {
            return Err(malformed("belongs to another warehouse"));
        }
        if *zone == CONSUMPTION_ZONE {
            return Err(malformed("the consumption location is not a storage slot"));
        }

        let zone: Zone = zone.parse().map_err(|_| malformed("unknown zone"))?;
        let shelf = parse_position(shelf, SHELF_PREFIX).ok_or_else(|| malformed("bad shelf"))?;
        let level = parse_position(level, LEVEL_PREFIX).ok_or_else(|| malformed("bad level"))?;

        Ok(StorageSlot { zone, shelf, level })
    }

    /// Validate raw input and return its canonical identifier.
    pub fn location(&self, raw: &str) -> DomainResult<LocationId> {
        let slot = self.parse(raw)?;
        self.format(slot.zone, slot.shelf, slot.level)
    }

    /// The distinguished consumption sink of this warehouse.
    pub fn consumption(&self) -> LocationId {
        LocationId(format!(
            "{}-{CONSUMPTION_ZONE}-{SHELF_PREFIX}01-{LEVEL_PREFIX}01",
            self.warehouse
        ))
    }

    /// Container label in the scanner's `LPN-nnnnnn` shape.
    pub fn format_container(serial: u32) -> String {
        format!("LPN-{serial:06}")
    }
}

fn check_position(what: &str, value: u8) -> DomainResult<()> {
    if value == 0 || value > MAX_POSITION {
        return Err(DomainError::malformed_location(format!(
            "{what} must be between 1 and {MAX_POSITION} (got {value})"
        )));
    }
    Ok(())
}

fn parse_position(part: &str, prefix: &str) -> Option<u8> {
    let digits = part.strip_prefix(prefix)?;
    if digits.len() != 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: u8 = digits.parse().ok()?;
    (value != 0).then_some(value)
}
