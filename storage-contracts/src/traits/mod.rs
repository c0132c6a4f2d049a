// SPDX-License-Identifier: GPL-3.0-only

pub mod redundancy;
pub mod timer;

pub use redundancy::RedundancySource;
pub use timer::{TimerCallback, TimerHandle, TimerService};
