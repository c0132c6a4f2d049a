// SPDX-License-Identifier: GPL-3.0-only

//! A single configuration object: a keyed, typed property bag.

use std::collections::BTreeMap;
use std::sync::Arc;

use storage_sys::StoreSection;
use storage_types::SettingKind;

use super::catalog::{ArmedExpiry, ExpiryScheduler};
use super::schema::{PropertySchema, format_bool, parse_bool};
use crate::error::{Result, ServiceError};

/// Properties that are part of a setting's identity rather than its bag.
const RESERVED_PROPERTIES: [(&str, &str); 2] = [
    ("InstanceID", "allocate a new setting instead of renaming one"),
    ("ChangeableType", "change the setting kind instead"),
];

/// One setting instance.
///
/// Values are kept as text; `None` is a null value. Every write is checked
/// against the class schema. A setting only becomes visible to others once
/// it is committed to a [`SettingCatalog`](super::SettingCatalog).
///
/// Cloning yields a detached copy: the clone never carries the expiry
/// timer of the original.
pub struct Setting {
    class_name: String,
    id: String,
    kind: SettingKind,
    properties: BTreeMap<String, Option<String>>,
    schema: Arc<PropertySchema>,
    expiry: Option<ArmedExpiry>,
}

impl Setting {
    pub(crate) fn new(
        class_name: &str,
        kind: SettingKind,
        id: &str,
        schema: Arc<PropertySchema>,
    ) -> Self {
        Self {
            class_name: class_name.to_string(),
            id: id.to_string(),
            kind,
            properties: BTreeMap::new(),
            schema,
            expiry: None,
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> SettingKind {
        self.kind
    }

    /// Change the storage tier. Takes effect on disk when committed.
    pub fn set_kind(&mut self, kind: SettingKind) {
        self.kind = kind;
    }

    pub fn schema(&self) -> &PropertySchema {
        &self.schema
    }

    /// Value of `key`; `None` when missing or null.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|value| value.as_deref())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        self.store(key, Some(value.into()))
    }

    pub fn set_null(&mut self, key: &str) -> Result<()> {
        self.store(key, None)
    }

    /// Remove `key`, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<Option<String>> {
        self.properties.remove(key)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// All properties, ordered by key.
    pub fn items(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.properties
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_deref()))
    }

    pub fn properties(&self) -> &BTreeMap<String, Option<String>> {
        &self.properties
    }

    pub fn get_u16(&self, key: &str) -> Result<Option<u16>> {
        self.parse_with(key, |value| value.trim().parse::<u16>().ok())
    }

    pub fn get_u64(&self, key: &str) -> Result<Option<u64>> {
        self.parse_with(key, |value| value.trim().parse::<u64>().ok())
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        self.parse_with(key, parse_bool)
    }

    pub fn set_u16(&mut self, key: &str, value: u16) -> Result<()> {
        self.set(key, value.to_string())
    }

    pub fn set_u64(&mut self, key: &str, value: u64) -> Result<()> {
        self.set(key, value.to_string())
    }

    pub fn set_bool(&mut self, key: &str, value: bool) -> Result<()> {
        self.set(key, format_bool(value))
    }

    fn parse_with<T>(&self, key: &str, parse: impl FnOnce(&str) -> Option<T>) -> Result<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => parse(value).map(Some).ok_or_else(|| {
                ServiceError::InvalidArgument(format!(
                    "{} has invalid value {:?} for {}",
                    self.id, value, key
                ))
            }),
        }
    }

    fn store(&mut self, key: &str, value: Option<String>) -> Result<()> {
        if let Some((_, hint)) = RESERVED_PROPERTIES.iter().find(|(name, _)| *name == key) {
            return Err(ServiceError::Unsupported(format!(
                "{} cannot be set as a property; {}",
                key, hint
            )));
        }
        self.schema.validate(key, value.as_deref())?;
        self.properties.insert(key.to_string(), value);
        Ok(())
    }

    /// Replace all properties with those of a stored section.
    ///
    /// Empty values on disk are read as null. On error the setting is left
    /// untouched.
    pub fn load(&mut self, section: &StoreSection) -> Result<()> {
        let mut properties = BTreeMap::new();
        for (key, value) in &section.properties {
            let value = value.clone().filter(|value| !value.is_empty());
            self.schema.validate(key, value.as_deref())?;
            properties.insert(key.clone(), value);
        }
        self.properties = properties;
        Ok(())
    }

    /// Stored form of this setting.
    pub fn save(&self) -> StoreSection {
        StoreSection {
            id: self.id.clone(),
            properties: self
                .properties
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        }
    }

    /// Whether an expiry timer is currently armed.
    pub fn expiry_armed(&self) -> bool {
        self.expiry.is_some()
    }

    /// Generation of the armed expiry timer, if any.
    pub(crate) fn expiry_generation(&self) -> Option<u64> {
        self.expiry.as_ref().map(|armed| armed.generation)
    }

    /// Restart the expiry countdown of a transient setting.
    ///
    /// Any previous timer is cancelled first; settings of other kinds end up
    /// with no timer at all.
    pub(crate) fn touch(&mut self, scheduler: &ExpiryScheduler) {
        self.disarm();
        if self.kind.expires() {
            self.expiry = Some(scheduler.arm(&self.class_name, &self.id));
        }
    }

    fn disarm(&mut self) {
        if let Some(timer) = self.expiry.take() {
            timer.cancel();
        }
    }
}

impl Clone for Setting {
    fn clone(&self) -> Self {
        Self {
            class_name: self.class_name.clone(),
            id: self.id.clone(),
            kind: self.kind,
            properties: self.properties.clone(),
            schema: Arc::clone(&self.schema),
            expiry: None,
        }
    }
}

impl Drop for Setting {
    fn drop(&mut self) {
        self.disarm();
    }
}

impl std::fmt::Debug for Setting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Setting")
            .field("class_name", &self.class_name)
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("properties", &self.properties)
            .field("expiry_armed", &self.expiry.is_some())
            .finish()
    }
}
