// SPDX-License-Identifier: GPL-3.0-only

use storage_types::{RaidLevel, RedundancyProfile};

use crate::StorageError;

/// Inspects devices and reports the redundancy they can achieve.
pub trait RedundancySource: Send + Sync {
    /// Redundancy of a single device, as it exists today.
    fn device_redundancy(&self, device: &str) -> Result<RedundancyProfile, StorageError>;

    /// Redundancy of an array of `members` assembled at `level`.
    ///
    /// Returns an error when the level cannot be built from these members
    /// (e.g. RAID6 with fewer than four devices).
    fn combined_redundancy(
        &self,
        members: &[RedundancyProfile],
        level: RaidLevel,
    ) -> Result<RedundancyProfile, StorageError>;
}
