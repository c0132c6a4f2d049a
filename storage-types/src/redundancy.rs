// SPDX-License-Identifier: GPL-3.0-only

//! Redundancy models for storage aggregates.
//!
//! A [`RedundancyProfile`] describes what a device (or a combination of
//! devices under some [`RaidLevel`]) can actually achieve. Profiles are
//! produced by device inspection and only ever compared, never persisted.

use serde::{Deserialize, Serialize};

/// Placement of parity blocks across array members.
///
/// The numeric values match the `ParityLayout` setting property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParityLayout {
    /// Parity lives on dedicated members (RAID4).
    NonRotated,
    /// Parity rotates across all members (RAID5, RAID6).
    Rotated,
}

impl ParityLayout {
    pub fn as_u16(self) -> u16 {
        match self {
            ParityLayout::NonRotated => 1,
            ParityLayout::Rotated => 2,
        }
    }

    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(ParityLayout::NonRotated),
            2 => Some(ParityLayout::Rotated),
            _ => None,
        }
    }
}

/// Achievable redundancy of a device or device combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RedundancyProfile {
    /// Number of independent copies of data.
    pub data_redundancy: u16,
    /// Number of whole-member failures tolerated.
    pub package_redundancy: u16,
    /// Number of members data is striped across.
    pub stripe_length: u16,
    pub no_single_point_of_failure: bool,
    /// Only meaningful for parity RAID levels.
    pub parity_layout: Option<ParityLayout>,
}

impl RedundancyProfile {
    /// Profile of a single plain device: one copy, no striping, no tolerance.
    pub fn single_device() -> Self {
        Self {
            data_redundancy: 1,
            package_redundancy: 0,
            stripe_length: 1,
            no_single_point_of_failure: false,
            parity_layout: None,
        }
    }
}

impl Default for RedundancyProfile {
    fn default() -> Self {
        Self::single_device()
    }
}

/// MD RAID levels considered when picking a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RaidLevel {
    Raid0,
    Raid1,
    Raid4,
    Raid5,
    Raid6,
    Raid10,
}

impl RaidLevel {
    pub const ALL: [RaidLevel; 6] = [
        RaidLevel::Raid0,
        RaidLevel::Raid1,
        RaidLevel::Raid4,
        RaidLevel::Raid5,
        RaidLevel::Raid6,
        RaidLevel::Raid10,
    ];

    /// Preference when several levels satisfy a goal; lower wins.
    ///
    /// Mirroring is preferred over parity, parity over plain striping.
    pub fn priority(self) -> u8 {
        match self {
            RaidLevel::Raid1 => 1,
            RaidLevel::Raid5 => 2,
            RaidLevel::Raid6 => 3,
            RaidLevel::Raid4 => 4,
            RaidLevel::Raid10 => 5,
            RaidLevel::Raid0 => 6,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            RaidLevel::Raid0 => 0,
            RaidLevel::Raid1 => 1,
            RaidLevel::Raid4 => 4,
            RaidLevel::Raid5 => 5,
            RaidLevel::Raid6 => 6,
            RaidLevel::Raid10 => 10,
        }
    }

    pub fn from_number(level: u8) -> Option<Self> {
        RaidLevel::ALL
            .into_iter()
            .find(|candidate| candidate.number() == level)
    }
}

impl std::fmt::Display for RaidLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RAID{}", self.number())
    }
}

impl std::str::FromStr for RaidLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("RAID")
            .or_else(|| trimmed.strip_prefix("raid"))
            .unwrap_or(trimmed);
        digits
            .parse::<u8>()
            .ok()
            .and_then(RaidLevel::from_number)
            .ok_or_else(|| format!("Invalid RAID level: {}", s))
    }
}
