// SPDX-License-Identifier: GPL-3.0-only

//! INI-backed settings store
//!
//! A store is a directory. Each file in it is named after a setting class
//! and holds one section per setting instance:
//!
//! ```text
//! [LMI:LMI_StorageSetting:1]
//! DataRedundancyGoal=2
//! ParityLayout=
//! ```
//!
//! Keys are case-sensitive. An empty value stands for a null property.
//! `#` and `;` only start a comment at the beginning of a line, so they are
//! ordinary characters inside values. Values are single-line.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use configparser::ini::Ini;
use tracing::{debug, info};

use crate::error::{Result, SysError};

/// Prefix of temporary files written during an atomic replace.
const TEMP_PREFIX: &str = ".tmp-";

/// One setting instance as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSection {
    pub id: String,
    /// Properties in file order. `None` is written as an empty value.
    pub properties: Vec<(String, Option<String>)>,
}

impl StoreSection {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            properties: Vec::new(),
        }
    }
}

/// Directory of per-class settings files.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    root: PathBuf,
}

impl SettingsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding `class_name`.
    pub fn class_path(&self, class_name: &str) -> Result<PathBuf> {
        validate_class_name(class_name)?;
        Ok(self.root.join(class_name))
    }

    /// Names of all classes present in the store, sorted.
    ///
    /// A missing directory is an empty store.
    pub fn class_names(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            debug!("Settings store {:?} does not exist", self.root);
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                debug!("Skipping non UTF-8 file name {:?}", entry.file_name());
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    /// Read every section of the file for `class_name`.
    ///
    /// A missing file has no sections.
    pub fn read_class(&self, class_name: &str) -> Result<Vec<StoreSection>> {
        let path = self.class_path(class_name)?;
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path)?;
        parse_sections(&content).map_err(|message| SysError::ConfigParse { path, message })
    }

    /// Replace the file for `class_name` with `sections`.
    ///
    /// Creates the store directory when missing. The new content is written
    /// to a temporary file which is then renamed over the old one.
    pub fn write_class(&self, class_name: &str, sections: &[StoreSection]) -> Result<()> {
        let path = self.class_path(class_name)?;
        if !self.root.is_dir() {
            info!("Creating settings store {:?}", self.root);
            fs::create_dir_all(&self.root)?;
        }

        let content = render_sections(sections);
        let temp_path = self.root.join(format!("{TEMP_PREFIX}{class_name}"));
        let written = File::create(&temp_path).and_then(|mut file| {
            file.write_all(content.as_bytes())?;
            file.sync_all()
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        debug!(
            "Wrote {} sections for {} to {:?}",
            sections.len(),
            class_name,
            path
        );
        Ok(())
    }
}

/// Check that `key` and `value` survive a write followed by a read.
pub fn check_entry(key: &str, value: Option<&str>) -> std::result::Result<(), String> {
    let key_ok = !key.is_empty()
        && key.trim() == key
        && !key.starts_with(['[', '#', ';'])
        && !key.contains(['=', ':', '\n', '\r']);
    if !key_ok {
        return Err(format!("{key:?} cannot be used as a property name"));
    }
    if value.is_some_and(|value| value.contains(['\n', '\r'])) {
        return Err(format!("value of {key} must not contain line breaks"));
    }
    Ok(())
}

/// Parser and writer shared by every store file.
fn store_ini() -> Ini {
    let mut ini = Ini::new_cs();
    ini.set_inline_comment_symbols(Some(&[]));
    ini
}

/// Whether `class_name` can name a file in a store.
pub fn is_valid_class_name(class_name: &str) -> bool {
    !class_name.is_empty()
        && !class_name.starts_with('.')
        && !class_name.contains(['/', '\\', '\0'])
}

fn validate_class_name(class_name: &str) -> Result<()> {
    if is_valid_class_name(class_name) {
        Ok(())
    } else {
        Err(SysError::InvalidName(class_name.to_string()))
    }
}

/// Parse store content into sections, preserving file order.
pub fn parse_sections(content: &str) -> std::result::Result<Vec<StoreSection>, String> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut ini = store_ini();
    let default_section = ini.defaults().default_section;
    let map = ini.read(content.to_string())?;

    let mut sections = Vec::new();
    for (id, properties) in map.iter() {
        if *id == default_section {
            if properties.is_empty() {
                continue;
            }
            return Err("property found outside of a section".to_string());
        }

        let properties = properties
            .iter()
            .map(|(key, value)| {
                let value = value.as_ref().filter(|value| !value.is_empty()).cloned();
                (key.clone(), value)
            })
            .collect();
        sections.push(StoreSection {
            id: id.clone(),
            properties,
        });
    }
    Ok(sections)
}

/// Render sections in the order given.
pub fn render_sections(sections: &[StoreSection]) -> String {
    let mut ini = store_ini();
    let map = ini.get_mut_map();
    for section in sections {
        let entry = map.entry(section.id.clone()).or_default();
        for (key, value) in &section.properties {
            entry.insert(key.clone(), Some(value.clone().unwrap_or_default()));
        }
    }
    ini.writes()
}
