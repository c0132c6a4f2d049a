// SPDX-License-Identifier: GPL-3.0-only

//! Shared domain models for storage settings management
//!
//! This crate holds the value types that travel between the settings
//! catalog, the redundancy resolver and the collaborators that inspect
//! real devices:
//!
//! - `RedundancyProfile` → what a device or RAID combination achieves
//! - `RaidLevel` → candidate layouts and their selection priority
//! - `SettingKind` → storage tier of a configuration object

pub mod redundancy;
pub mod setting;

pub use redundancy::{ParityLayout, RaidLevel, RedundancyProfile};
pub use setting::SettingKind;
