// SPDX-License-Identifier: GPL-3.0-only

//! Redundancy goal resolution
//!
//! A storage setting may bound three redundancy axes with Goal/Min/Max
//! properties and pin two scalar properties exactly. The functions here
//! compare an achievable [`RedundancyProfile`] against those properties
//! and pick the best RAID level among several candidate profiles.
//!
//! All functions are pure; they read the setting and never modify it.

use std::collections::BTreeMap;

use storage_contracts::RedundancySource;
use storage_types::{ParityLayout, RaidLevel, RedundancyProfile};
use tracing::debug;

use crate::error::{Result, ServiceError};
use crate::settings::{Setting, schema::parse_bool};

/// Property names bounding one redundancy axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangedAxis {
    pub goal: &'static str,
    pub min: &'static str,
    pub max: &'static str,
}

pub const DATA_REDUNDANCY: RangedAxis = RangedAxis {
    goal: "DataRedundancyGoal",
    min: "DataRedundancyMin",
    max: "DataRedundancyMax",
};

/// The stripe length goal has no `Goal` suffix.
pub const EXTENT_STRIPE_LENGTH: RangedAxis = RangedAxis {
    goal: "ExtentStripeLength",
    min: "ExtentStripeLengthMin",
    max: "ExtentStripeLengthMax",
};

pub const PACKAGE_REDUNDANCY: RangedAxis = RangedAxis {
    goal: "PackageRedundancyGoal",
    min: "PackageRedundancyMin",
    max: "PackageRedundancyMax",
};

pub const NO_SINGLE_POINT_OF_FAILURE: &str = "NoSinglePointOfFailure";
pub const PARITY_LAYOUT: &str = "ParityLayout";
pub const EXTENT_SIZE: &str = "ExtentSize";
pub const ELEMENT_NAME: &str = "ElementName";

/// First property of a setting that a profile does not satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedundancyViolation {
    pub property: String,
    pub message: String,
}

impl RedundancyViolation {
    fn new(property: &str, message: impl Into<String>) -> Self {
        Self {
            property: property.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RedundancyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<RedundancyViolation> for ServiceError {
    fn from(violation: RedundancyViolation) -> Self {
        ServiceError::Conflict {
            property: violation.property,
            message: violation.message,
        }
    }
}

type Check = std::result::Result<(), RedundancyViolation>;

/// Ranged axes in evaluation order, paired with the profile's value.
fn ranged_axes(profile: &RedundancyProfile) -> [(RangedAxis, u16); 3] {
    [
        (DATA_REDUNDANCY, profile.data_redundancy),
        (EXTENT_STRIPE_LENGTH, profile.stripe_length),
        (PACKAGE_REDUNDANCY, profile.package_redundancy),
    ]
}

fn number(setting: &Setting, key: &str) -> std::result::Result<Option<u16>, RedundancyViolation> {
    setting
        .get_u16(key)
        .map_err(|_| RedundancyViolation::new(key, format!("{key} is not a valid number.")))
}

fn check_range(setting: &Setting, axis: RangedAxis, value: u16) -> Check {
    let max = number(setting, axis.max)?;
    let min = number(setting, axis.min)?;
    let goal = number(setting, axis.goal)?;

    if let Some(max) = max
        && value > max
    {
        return Err(RedundancyViolation::new(
            axis.max,
            format!("{} is too low.", axis.max),
        ));
    }
    if let Some(min) = min
        && value < min
    {
        return Err(RedundancyViolation::new(
            axis.min,
            format!("{} is too high.", axis.min),
        ));
    }
    // A lone goal is an exact constraint; any bound takes over from it.
    if max.is_none()
        && min.is_none()
        && let Some(goal) = goal
        && goal != value
    {
        return Err(goal_mismatch(axis));
    }
    Ok(())
}

fn goal_mismatch(axis: RangedAxis) -> RedundancyViolation {
    RedundancyViolation::new(axis.goal, format!("{} does not match.", axis.goal))
}

fn check_scalars(setting: &Setting, profile: &RedundancyProfile) -> Check {
    if let Some(text) = setting.get(NO_SINGLE_POINT_OF_FAILURE) {
        let required = parse_bool(text).ok_or_else(|| {
            RedundancyViolation::new(
                NO_SINGLE_POINT_OF_FAILURE,
                format!("{NO_SINGLE_POINT_OF_FAILURE} is not a valid boolean."),
            )
        })?;
        if required != profile.no_single_point_of_failure {
            return Err(RedundancyViolation::new(
                NO_SINGLE_POINT_OF_FAILURE,
                format!("{NO_SINGLE_POINT_OF_FAILURE} does not match."),
            ));
        }
    }

    // An unknown layout number matches no profile, not even one without parity.
    if let Some(layout) = number(setting, PARITY_LAYOUT)?
        && ParityLayout::from_u16(layout)
            .is_none_or(|layout| Some(layout) != profile.parity_layout)
    {
        return Err(RedundancyViolation::new(
            PARITY_LAYOUT,
            format!("{PARITY_LAYOUT} does not match."),
        ));
    }
    Ok(())
}

fn bounds(profile: &RedundancyProfile, setting: &Setting) -> Check {
    for (axis, value) in ranged_axes(profile) {
        check_range(setting, axis, value)?;
    }
    check_scalars(setting, profile)
}

fn goals(profile: &RedundancyProfile, setting: &Setting) -> Check {
    for (axis, value) in ranged_axes(profile) {
        if let Some(goal) = number(setting, axis.goal)?
            && goal != value
        {
            return Err(goal_mismatch(axis));
        }
    }
    check_scalars(setting, profile)?;
    bounds(profile, setting)
}

/// Check `profile` against the Min/Max bounds of `setting`.
///
/// A `Goal` only counts when its axis has neither `Min` nor `Max`.
/// Returns the first violation, in the order DataRedundancy,
/// ExtentStripeLength, PackageRedundancy, NoSinglePointOfFailure,
/// ParityLayout.
pub fn check_bounds(profile: &RedundancyProfile, setting: &Setting) -> Option<RedundancyViolation> {
    bounds(profile, setting).err()
}

/// Like [`check_bounds`], but every present `Goal` must match exactly.
pub fn check_goal(profile: &RedundancyProfile, setting: &Setting) -> Option<RedundancyViolation> {
    goals(profile, setting).err()
}

/// [`check_bounds`] as a `Conflict` error naming the offending property.
pub fn validate_profile(profile: &RedundancyProfile, setting: &Setting) -> Result<()> {
    match check_bounds(profile, setting) {
        Some(violation) => Err(violation.into()),
        None => Ok(()),
    }
}

fn best_matching(
    pass: &str,
    candidates: &BTreeMap<RaidLevel, RedundancyProfile>,
    setting: &Setting,
    check: fn(&RedundancyProfile, &Setting) -> Option<RedundancyViolation>,
) -> Option<RaidLevel> {
    let mut best: Option<RaidLevel> = None;
    for (&level, profile) in candidates {
        match check(profile, setting) {
            None => {
                if best.is_none_or(|current| level.priority() < current.priority()) {
                    best = Some(level);
                }
                debug!(
                    "{} check: matching {}, best level so far: {:?}",
                    pass, level, best
                );
            }
            Some(violation) => {
                debug!("{} check: skipping {}: {}", pass, level, violation);
            }
        }
    }
    best
}

/// Pick the RAID level whose profile satisfies `setting`.
///
/// Levels matching every present `Goal` exactly win; only when none does,
/// levels within the Min/Max bounds are considered. Ties go to the level
/// with the lowest [`RaidLevel::priority`].
pub fn select_best_level(
    candidates: &BTreeMap<RaidLevel, RedundancyProfile>,
    setting: &Setting,
) -> Option<RaidLevel> {
    best_matching("Goal", candidates, setting, check_goal)
        .or_else(|| best_matching("Any", candidates, setting, check_bounds))
}

/// Find the best RAID level for an array of `members`.
///
/// The combined profile of each level comes from `source`; levels it cannot
/// build are left out. Fails with `NoMatch`, listing why each candidate was
/// rejected, when no level satisfies `setting`.
pub fn find_raid_level(
    source: &dyn RedundancySource,
    members: &[RedundancyProfile],
    setting: &Setting,
) -> Result<RaidLevel> {
    let mut candidates = BTreeMap::new();
    for level in RaidLevel::ALL {
        match source.combined_redundancy(members, level) {
            Ok(profile) => {
                candidates.insert(level, profile);
            }
            Err(e) => debug!("{} not possible with {} members: {}", level, members.len(), e),
        }
    }

    if let Some(level) = select_best_level(&candidates, setting) {
        return Ok(level);
    }

    let mut rejected: Vec<_> = candidates
        .iter()
        .filter_map(|(level, profile)| {
            check_bounds(profile, setting).map(|violation| (*level, violation))
        })
        .collect();
    rejected.sort_by_key(|(level, _)| level.priority());
    let reasons = if rejected.is_empty() {
        format!("no RAID level can be built from {} members", members.len())
    } else {
        rejected
            .iter()
            .map(|(level, violation)| format!("{level}: {violation}"))
            .collect::<Vec<_>>()
            .join(" ")
    };
    Err(ServiceError::NoMatch(reasons))
}

impl Setting {
    /// Pin every redundancy property to what `profile` achieves.
    pub fn apply_redundancy(&mut self, profile: &RedundancyProfile) -> Result<()> {
        for (axis, value) in ranged_axes(profile) {
            self.set_u16(axis.goal, value)?;
            self.set_u16(axis.min, value)?;
            self.set_u16(axis.max, value)?;
        }
        self.set_bool(NO_SINGLE_POINT_OF_FAILURE, profile.no_single_point_of_failure)?;
        match profile.parity_layout {
            Some(layout) => self.set_u16(PARITY_LAYOUT, layout.as_u16()),
            None => self.set_null(PARITY_LAYOUT),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use storage_contracts::{StorageError, StorageErrorKind};
    use storage_types::SettingKind;

    use super::*;
    use crate::settings::schema::PropertySchema;

    fn setting(properties: &[(&str, &str)]) -> Setting {
        let mut setting = Setting::new(
            "LMI_StorageSetting",
            SettingKind::Transient,
            "LMI:LMI_StorageSetting:1",
            Arc::new(PropertySchema::storage_setting("LMI_StorageSetting")),
        );
        for (key, value) in properties {
            setting.set(key, *value).expect("valid property");
        }
        setting
    }

    fn profile(data: u16, package: u16, stripe: u16, nspof: bool) -> RedundancyProfile {
        RedundancyProfile {
            data_redundancy: data,
            package_redundancy: package,
            stripe_length: stripe,
            no_single_point_of_failure: nspof,
            parity_layout: None,
        }
    }

    fn with_parity(mut profile: RedundancyProfile, layout: ParityLayout) -> RedundancyProfile {
        profile.parity_layout = Some(layout);
        profile
    }

    /// Profiles of a four-disk array at every level.
    fn four_disk_candidates() -> BTreeMap<RaidLevel, RedundancyProfile> {
        BTreeMap::from([
            (RaidLevel::Raid0, profile(1, 0, 4, false)),
            (RaidLevel::Raid1, profile(4, 3, 1, true)),
            (
                RaidLevel::Raid4,
                with_parity(profile(1, 1, 3, true), ParityLayout::NonRotated),
            ),
            (
                RaidLevel::Raid5,
                with_parity(profile(1, 1, 3, true), ParityLayout::Rotated),
            ),
            (
                RaidLevel::Raid6,
                with_parity(profile(1, 2, 2, true), ParityLayout::Rotated),
            ),
            (RaidLevel::Raid10, profile(2, 1, 2, true)),
        ])
    }

    #[test]
    fn lone_goal_is_exact() {
        let goal = setting(&[("DataRedundancyGoal", "2")]);
        assert_eq!(check_goal(&profile(2, 0, 1, false), &goal), None);
        for data in [1, 3] {
            let violation = check_goal(&profile(data, 0, 1, false), &goal).expect("mismatch");
            assert_eq!(violation.property, "DataRedundancyGoal");
            assert_eq!(violation.message, "DataRedundancyGoal does not match.");
            assert!(check_bounds(&profile(data, 0, 1, false), &goal).is_some());
        }
    }

    #[test]
    fn bounds_without_goal() {
        let bounded = setting(&[("PackageRedundancyMin", "1"), ("PackageRedundancyMax", "2")]);
        let results: Vec<_> = (0..4)
            .map(|package| check_bounds(&profile(1, package, 1, false), &bounded))
            .collect();
        assert_eq!(results[0].as_ref().map(|v| v.property.as_str()), Some("PackageRedundancyMin"));
        assert_eq!(
            results[0].as_ref().map(|v| v.message.as_str()),
            Some("PackageRedundancyMin is too high.")
        );
        assert!(results[1].is_none());
        assert!(results[2].is_none());
        assert_eq!(
            results[3].as_ref().map(|v| v.message.as_str()),
            Some("PackageRedundancyMax is too low.")
        );
    }

    #[test]
    fn goal_is_ignored_by_bounds_when_a_bound_is_present() {
        let bounded = setting(&[("DataRedundancyGoal", "2"), ("DataRedundancyMax", "3")]);
        let achieved = profile(3, 0, 1, false);
        assert_eq!(check_bounds(&achieved, &bounded), None);
        assert_eq!(
            check_goal(&achieved, &bounded).map(|v| v.property),
            Some("DataRedundancyGoal".to_string())
        );
    }

    #[test]
    fn stripe_length_goal_uses_bare_property() {
        let goal = setting(&[("ExtentStripeLength", "4")]);
        assert_eq!(check_bounds(&profile(1, 0, 4, false), &goal), None);
        assert_eq!(
            check_bounds(&profile(1, 0, 2, false), &goal).map(|v| v.message),
            Some("ExtentStripeLength does not match.".to_string())
        );
    }

    #[test]
    fn first_violation_follows_axis_order() {
        let strict = setting(&[
            ("DataRedundancyMin", "2"),
            ("ExtentStripeLengthMin", "2"),
            ("PackageRedundancyMin", "1"),
            ("NoSinglePointOfFailure", "true"),
        ]);
        let poor = profile(1, 0, 1, false);
        assert_eq!(
            check_bounds(&poor, &strict).map(|v| v.property),
            Some("DataRedundancyMin".to_string())
        );

        let data_ok = profile(2, 0, 1, false);
        assert_eq!(
            check_bounds(&data_ok, &strict).map(|v| v.property),
            Some("ExtentStripeLengthMin".to_string())
        );

        let all_ranges_ok = profile(2, 1, 2, false);
        assert_eq!(
            check_bounds(&all_ranges_ok, &strict).map(|v| v.property),
            Some("NoSinglePointOfFailure".to_string())
        );
    }

    #[test]
    fn parity_layout_must_match_exactly() {
        let rotated = setting(&[("ParityLayout", "2")]);
        assert_eq!(
            check_bounds(&with_parity(profile(1, 1, 3, true), ParityLayout::Rotated), &rotated),
            None
        );
        assert_eq!(
            check_bounds(
                &with_parity(profile(1, 1, 3, true), ParityLayout::NonRotated),
                &rotated
            )
            .map(|v| v.property),
            Some("ParityLayout".to_string())
        );
        assert!(check_bounds(&profile(2, 1, 1, true), &rotated).is_some());
    }

    #[test]
    fn loose_goal_prefers_mirroring() {
        let loose = setting(&[("PackageRedundancyMin", "1")]);
        let candidates: BTreeMap<_, _> = four_disk_candidates()
            .into_iter()
            .filter(|(level, _)| {
                matches!(level, RaidLevel::Raid1 | RaidLevel::Raid5 | RaidLevel::Raid6)
            })
            .collect();
        assert_eq!(select_best_level(&candidates, &loose), Some(RaidLevel::Raid1));
    }

    #[test]
    fn exact_goal_beats_higher_priority_bound_match() {
        // RAID1 satisfies the bounds, but only RAID6 meets the goal exactly.
        let goal = setting(&[
            ("PackageRedundancyGoal", "2"),
            ("PackageRedundancyMin", "1"),
            ("PackageRedundancyMax", "3"),
        ]);
        assert_eq!(
            select_best_level(&four_disk_candidates(), &goal),
            Some(RaidLevel::Raid6)
        );
    }

    #[test]
    fn falls_back_to_bounds_when_no_goal_matches() {
        let goal = setting(&[("DataRedundancyGoal", "3"), ("DataRedundancyMin", "2")]);
        assert_eq!(
            select_best_level(&four_disk_candidates(), &goal),
            Some(RaidLevel::Raid1)
        );
    }

    #[test]
    fn no_match_when_nothing_avoids_single_point_of_failure() {
        let goal = setting(&[("NoSinglePointOfFailure", "true")]);
        let candidates = BTreeMap::from([
            (RaidLevel::Raid0, profile(1, 0, 2, false)),
            (RaidLevel::Raid1, profile(2, 1, 1, false)),
        ]);
        assert_eq!(select_best_level(&candidates, &goal), None);
    }

    #[test]
    fn validate_profile_reports_conflict() {
        let goal = setting(&[("DataRedundancyMax", "1")]);
        let err = validate_profile(&profile(2, 1, 1, true), &goal).expect_err("too redundant");
        let storage: StorageError = err.into();
        assert_eq!(storage.kind, StorageErrorKind::Conflict);
        assert_eq!(storage.property.as_deref(), Some("DataRedundancyMax"));
    }

    #[test]
    fn unparsable_values_are_violations() {
        let mut lenient = Setting::new(
            "LMI_Other",
            SettingKind::Transient,
            "LMI:LMI_Other:1",
            Arc::new(PropertySchema::new("LMI_Other")),
        );
        lenient.set("DataRedundancyMin", "lots").expect("untyped schema");
        assert_eq!(
            check_bounds(&profile(1, 0, 1, false), &lenient).map(|v| v.message),
            Some("DataRedundancyMin is not a valid number.".to_string())
        );
    }

    #[test]
    fn unknown_parity_layout_matches_nothing() {
        let mut lenient = Setting::new(
            "LMI_Other",
            SettingKind::Transient,
            "LMI:LMI_Other:1",
            Arc::new(PropertySchema::new("LMI_Other")),
        );
        lenient.set("ParityLayout", "3").expect("untyped schema");

        let violation = check_bounds(&profile(2, 1, 1, true), &lenient).expect("mismatch");
        assert_eq!(violation.property, "ParityLayout");
        assert_eq!(violation.message, "ParityLayout does not match.");
        assert!(
            check_bounds(
                &with_parity(profile(1, 1, 3, true), ParityLayout::Rotated),
                &lenient
            )
            .is_some()
        );
        assert_eq!(select_best_level(&four_disk_candidates(), &lenient), None);
    }

    #[test]
    fn apply_redundancy_pins_every_axis() {
        let mut pinned = setting(&[]);
        let achieved = with_parity(profile(1, 1, 3, true), ParityLayout::Rotated);
        pinned.apply_redundancy(&achieved).expect("apply profile");

        assert_eq!(pinned.get("DataRedundancyMin"), Some("1"));
        assert_eq!(pinned.get("ExtentStripeLengthMax"), Some("3"));
        assert_eq!(pinned.get("PackageRedundancyGoal"), Some("1"));
        assert_eq!(pinned.get("NoSinglePointOfFailure"), Some("true"));
        assert_eq!(pinned.get("ParityLayout"), Some("2"));
        assert_eq!(check_goal(&achieved, &pinned), None);
        assert!(check_goal(&profile(1, 1, 3, true), &pinned).is_some());
    }
}
