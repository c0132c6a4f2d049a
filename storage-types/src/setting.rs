// SPDX-License-Identifier: GPL-3.0-only

//! Setting lifecycle models.

use serde::{Deserialize, Serialize};

/// Storage tier of a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKind {
    /// Durable, kept in the read-write store.
    Persistent,
    /// Ephemeral, removed when not refreshed within its lifetime.
    Transient,
    /// Administrator supplied, read from the read-only store.
    Preconfigured,
    /// Describes the current configuration of a managed element; never stored.
    ConfigurationSnapshot,
}

impl SettingKind {
    /// Whether settings of this kind belong in the read-write store.
    pub fn is_persistent(self) -> bool {
        self == SettingKind::Persistent
    }

    /// Whether settings of this kind are owned by the on-disk stores.
    pub fn is_disk_backed(self) -> bool {
        matches!(self, SettingKind::Persistent | SettingKind::Preconfigured)
    }

    pub fn expires(self) -> bool {
        self == SettingKind::Transient
    }
}

impl std::fmt::Display for SettingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SettingKind::Persistent => "persistent",
            SettingKind::Transient => "transient",
            SettingKind::Preconfigured => "preconfigured",
            SettingKind::ConfigurationSnapshot => "configuration-snapshot",
        };
        f.write_str(name)
    }
}
