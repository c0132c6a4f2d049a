// SPDX-License-Identifier: GPL-3.0-only

//! Catalog of persistent, transient and preconfigured settings
//!
//! The catalog groups settings by class name and is the only long-lived
//! owner of them. It hands out unique IDs, keeps the persistent store in
//! sync with every change to a persistent setting, and expires transient
//! settings nobody refreshed.
//!
//! Preconfigured settings come from a read-only store, persistent ones
//! from a read-write store. Both stores hold one file per class and one
//! section per setting ID.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;

use storage_contracts::{TimerHandle, TimerService};
use storage_sys::{SettingsStore, is_valid_class_name};
use storage_types::SettingKind;
use tracing::{debug, info, warn};

use super::schema::SchemaRegistry;
use super::setting::Setting;
use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};

type SettingGroup = BTreeMap<String, Setting>;

#[derive(Default)]
struct CatalogState {
    classes: BTreeMap<String, SettingGroup>,
    /// Next ID suffix to try, per class.
    next_ids: HashMap<String, u64>,
}

/// A class that could not be (fully) loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLoadFailure {
    pub class_name: String,
    pub kind: SettingKind,
    pub message: String,
}

/// Outcome of [`SettingCatalog::load_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub preconfigured: usize,
    pub persistent: usize,
    pub failures: Vec<ClassLoadFailure>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// An expiry timer owned by a setting.
///
/// The generation identifies this arming: a callback only expires the
/// setting while the setting still holds the timer it was armed with.
pub(crate) struct ArmedExpiry {
    pub(crate) generation: u64,
    handle: Box<dyn TimerHandle>,
}

impl ArmedExpiry {
    pub(crate) fn cancel(&self) {
        self.handle.cancel();
    }
}

/// Arms expiry timers that call back into the catalog.
///
/// Holds the catalog state weakly: timers that fire after the catalog is
/// gone do nothing.
#[derive(Clone)]
pub(crate) struct ExpiryScheduler {
    timer: Arc<dyn TimerService>,
    lifetime: Duration,
    state: Weak<RwLock<CatalogState>>,
    generations: Arc<AtomicU64>,
}

impl ExpiryScheduler {
    pub(crate) fn arm(&self, class_name: &str, id: &str) -> ArmedExpiry {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let state = self.state.clone();
        let class_name = class_name.to_string();
        let setting_id = id.to_string();
        let handle = self.timer.schedule(
            &format!("Setting {id}"),
            self.lifetime,
            Box::new(move || {
                if let Some(state) = state.upgrade() {
                    expire_in(&state, &class_name, &setting_id, Some(generation));
                }
            }),
        );
        ArmedExpiry { generation, handle }
    }
}

pub struct SettingCatalog {
    state: Arc<RwLock<CatalogState>>,
    preconfigured: SettingsStore,
    persistent: SettingsStore,
    schemas: SchemaRegistry,
    id_prefix: String,
    max_id: Option<u64>,
    expiry: ExpiryScheduler,
}

impl SettingCatalog {
    /// Create an empty catalog. Nothing is read from disk until
    /// [`load_all`](Self::load_all).
    pub fn new(config: &ServiceConfig, timer: Arc<dyn TimerService>) -> Self {
        let state = Arc::new(RwLock::new(CatalogState::default()));
        let expiry = ExpiryScheduler {
            timer,
            lifetime: config.transient_lifetime(),
            state: Arc::downgrade(&state),
            generations: Arc::new(AtomicU64::new(0)),
        };
        Self {
            state,
            preconfigured: SettingsStore::new(&config.preconfigured_dir),
            persistent: SettingsStore::new(&config.persistent_dir),
            schemas: SchemaRegistry::storage_defaults(),
            id_prefix: config.id_prefix.clone(),
            max_id: config.max_id,
            expiry,
        }
    }

    /// Replace the property schemas used for new and loaded settings.
    pub fn with_schemas(mut self, schemas: SchemaRegistry) -> Self {
        self.schemas = schemas;
        self
    }

    fn read_state(&self) -> RwLockReadGuard<'_, CatalogState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, CatalogState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Names of all classes the catalog knows about.
    pub fn classes(&self) -> Vec<String> {
        self.read_state().classes.keys().cloned().collect()
    }

    /// Snapshot of all settings of `class_name`, ordered by ID.
    ///
    /// A class name that cannot name a store file has no settings and is
    /// not remembered.
    pub fn get_all(&self, class_name: &str) -> Vec<Setting> {
        {
            let state = self.read_state();
            if let Some(group) = state.classes.get(class_name) {
                return group.values().cloned().collect();
            }
        }
        if !is_valid_class_name(class_name) {
            debug!("No settings for invalid class name {:?}", class_name);
            return Vec::new();
        }
        self.write_state()
            .classes
            .entry(class_name.to_string())
            .or_default()
            .values()
            .cloned()
            .collect()
    }

    pub fn get(&self, class_name: &str, id: &str) -> Result<Setting> {
        self.read_state()
            .classes
            .get(class_name)
            .and_then(|group| group.get(id))
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("{class_name} {id}")))
    }

    fn format_id(&self, class_name: &str, n: u64) -> String {
        format!("{}:{}:{}", self.id_prefix, class_name, n)
    }

    /// Return a fresh ID for `class_name`.
    ///
    /// Numbering continues from the last ID handed out for the class, so an
    /// ID freed during this process lifetime is not handed out again.
    pub fn allocate_id(&self, class_name: &str) -> Result<String> {
        check_class_name(class_name)?;
        let mut guard = self.write_state();
        let CatalogState { classes, next_ids } = &mut *guard;
        let group = classes.entry(class_name.to_string()).or_default();

        let mut n = next_ids.get(class_name).copied().unwrap_or(1);
        while group.contains_key(&self.format_id(class_name, n)) {
            n += 1;
        }
        if let Some(max_id) = self.max_id
            && n > max_id
        {
            return Err(ServiceError::ResourceExhausted(format!(
                "no free {class_name} ID below {max_id}"
            )));
        }

        next_ids.insert(class_name.to_string(), n + 1);
        let id = self.format_id(class_name, n);
        debug!("Allocated setting ID {}", id);
        Ok(id)
    }

    /// Build a setting of `class_name` with the class schema. The setting is
    /// not part of the catalog until committed.
    pub fn create(&self, class_name: &str, kind: SettingKind, id: &str) -> Setting {
        Setting::new(class_name, kind, id, self.schemas.schema_for(class_name))
    }

    /// Install or replace `setting`.
    ///
    /// When the setting is persistent, or replaces a persistent one, the
    /// persistent store of its class is rewritten before this returns. If
    /// that write fails the catalog keeps its previous content.
    pub fn commit(&self, setting: Setting) -> Result<()> {
        let class_name = setting.class_name().to_string();
        let id = setting.id().to_string();
        let is_persistent = setting.kind().is_persistent();
        check_class_name(&class_name)?;

        let mut state = self.write_state();
        let group = state.classes.entry(class_name.clone()).or_default();
        let previous = group.remove(&id);
        let was_persistent = previous
            .as_ref()
            .is_some_and(|old| old.kind().is_persistent());
        group.insert(id.clone(), setting);

        if (is_persistent || was_persistent)
            && let Err(e) = self.persist_class(&class_name, group)
        {
            warn!("Failed to store {}, keeping previous state: {}", id, e);
            group.remove(&id);
            if let Some(previous) = previous {
                group.insert(id, previous);
            }
            return Err(e);
        }

        drop(previous);
        if let Some(setting) = group.get_mut(&id) {
            setting.touch(&self.expiry);
        }
        Ok(())
    }

    /// Remove the setting `id` of `class_name`. Returns whether it existed.
    ///
    /// Removing a persistent setting rewrites its class store; if that
    /// write fails the setting stays in the catalog.
    pub fn delete(&self, class_name: &str, id: &str) -> Result<bool> {
        let mut state = self.write_state();
        let Some(group) = state.classes.get_mut(class_name) else {
            return Ok(false);
        };
        let Some(removed) = group.remove(id) else {
            return Ok(false);
        };

        if removed.kind().is_persistent()
            && let Err(e) = self.persist_class(class_name, group)
        {
            warn!("Failed to remove {} from store, keeping it: {}", id, e);
            group.insert(id.to_string(), removed);
            return Err(e);
        }
        debug!("Deleted setting {}", id);
        Ok(true)
    }

    /// Restart the expiry countdown of a committed setting.
    pub fn touch(&self, class_name: &str, id: &str) -> Result<()> {
        let mut state = self.write_state();
        let setting = state
            .classes
            .get_mut(class_name)
            .and_then(|group| group.get_mut(id))
            .ok_or_else(|| ServiceError::NotFound(format!("{class_name} {id}")))?;
        setting.touch(&self.expiry);
        Ok(())
    }

    /// Expiry callback: remove `id` if it is still transient.
    pub fn expire(&self, class_name: &str, id: &str) -> bool {
        expire_in(&self.state, class_name, id, None)
    }

    /// Drop all persistent and preconfigured settings and read them again
    /// from both stores. Transient settings and configuration snapshots are
    /// kept.
    ///
    /// A class file or section that cannot be read is skipped and listed in
    /// the report. Failing to list a store directory is an error, and then
    /// the catalog is left as it was.
    pub fn load_all(&self) -> Result<LoadReport> {
        let preconfigured_classes = self.preconfigured.class_names()?;
        let persistent_classes = self.persistent.class_names()?;

        let mut state = self.write_state();
        for group in state.classes.values_mut() {
            group.retain(|_, setting| !setting.kind().is_disk_backed());
        }

        let mut report = LoadReport::default();
        report.preconfigured = self.load_store(
            &mut *state,
            &self.preconfigured,
            preconfigured_classes,
            SettingKind::Preconfigured,
            &mut report.failures,
        );
        report.persistent = self.load_store(
            &mut *state,
            &self.persistent,
            persistent_classes,
            SettingKind::Persistent,
            &mut report.failures,
        );

        info!(
            "Loaded {} preconfigured and {} persistent settings ({} failures)",
            report.preconfigured,
            report.persistent,
            report.failures.len()
        );
        Ok(report)
    }

    fn load_store(
        &self,
        state: &mut CatalogState,
        store: &SettingsStore,
        class_names: Vec<String>,
        kind: SettingKind,
        failures: &mut Vec<ClassLoadFailure>,
    ) -> usize {
        let mut loaded = 0;
        for class_name in class_names {
            let sections = match store.read_class(&class_name) {
                Ok(sections) => sections,
                Err(e) => {
                    warn!("Skipping {} {} settings: {}", kind, class_name, e);
                    failures.push(ClassLoadFailure {
                        class_name,
                        kind,
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            let group = state.classes.entry(class_name.clone()).or_default();
            for section in sections {
                let mut setting = self.create(&class_name, kind, &section.id);
                if let Err(e) = setting.load(&section) {
                    warn!("Skipping {} setting {}: {}", kind, section.id, e);
                    failures.push(ClassLoadFailure {
                        class_name: class_name.clone(),
                        kind,
                        message: format!("{}: {}", section.id, e),
                    });
                    continue;
                }
                if group.contains_key(&section.id) {
                    debug!("{} setting {} replaces a loaded one", kind, section.id);
                }
                setting.touch(&self.expiry);
                group.insert(section.id, setting);
                loaded += 1;
            }
        }
        loaded
    }

    /// Rewrite the persistent store of every known class.
    ///
    /// Returns the first failure after all classes were attempted.
    pub fn save_all(&self) -> Result<()> {
        let state = self.write_state();
        if !self.persistent.root().is_dir() {
            info!("Creating settings store {:?}", self.persistent.root());
            std::fs::create_dir_all(self.persistent.root())?;
        }
        // Every class gets its rewrite even if an earlier one fails.
        let mut first_error = None;
        for (class_name, group) in &state.classes {
            if let Err(e) = self.persist_class(class_name, group) {
                warn!("Failed to store {} settings: {}", class_name, e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn persist_class(&self, class_name: &str, group: &SettingGroup) -> Result<()> {
        let sections: Vec<_> = group
            .values()
            .filter(|setting| setting.kind().is_persistent())
            .map(Setting::save)
            .collect();
        self.persistent.write_class(class_name, &sections)?;
        info!(
            "Stored {} persistent {} settings",
            sections.len(),
            class_name
        );
        Ok(())
    }
}

fn check_class_name(class_name: &str) -> Result<()> {
    if is_valid_class_name(class_name) {
        Ok(())
    } else {
        Err(ServiceError::InvalidArgument(format!(
            "{class_name:?} is not a valid setting class name"
        )))
    }
}

/// Remove `id` if it is still transient. With a `generation`, only while
/// the setting still holds the timer armed under it.
fn expire_in(
    state: &RwLock<CatalogState>,
    class_name: &str,
    id: &str,
    generation: Option<u64>,
) -> bool {
    let mut state = state.write().unwrap_or_else(PoisonError::into_inner);
    let Some(group) = state.classes.get_mut(class_name) else {
        return false;
    };
    let Some(setting) = group.get(id) else {
        return false;
    };
    if setting.kind() != SettingKind::Transient {
        debug!("Not expiring {} setting {}", setting.kind(), id);
        return false;
    }
    if let Some(generation) = generation
        && setting.expiry_generation() != Some(generation)
    {
        debug!("Ignoring stale expiry timer of {}", id);
        return false;
    }
    group.remove(id);
    info!("Transient setting {} expired", id);
    true
}
