// SPDX-License-Identifier: GPL-3.0-only

//! Low-level on-disk storage for settings
//!
//! This crate owns the file format and file handling of the settings
//! stores: one INI-like file per setting class, one section per instance,
//! one `key=value` line per property. Writes go through a temporary file
//! and an atomic rename, so readers never observe a half-written store.

pub mod error;
pub mod settings_store;

pub use error::{Result, SysError};
pub use settings_store::{SettingsStore, StoreSection, check_entry, is_valid_class_name};
