// SPDX-License-Identifier: GPL-3.0-only

//! Storage settings service
//!
//! Manages declarative configuration objects ("settings") describing the
//! redundancy a storage aggregate should have, and resolves those goals
//! against the redundancy real devices can achieve:
//!
//! - [`settings`]: typed settings and the catalog with its on-disk stores
//! - [`redundancy`]: goal/bound checks and RAID level selection
//! - [`timer`]: tokio backed timers expiring transient settings

pub mod config;
pub mod error;
pub mod redundancy;
pub mod settings;
pub mod timer;

pub use config::ServiceConfig;
pub use error::{Result, ServiceError};
pub use redundancy::{
    RedundancyViolation, check_bounds, check_goal, find_raid_level, select_best_level,
    validate_profile,
};
pub use settings::{LoadReport, Setting, SettingCatalog};
pub use timer::TokioTimerService;
