// SPDX-License-Identifier: GPL-3.0-only

//! Typed property schemas
//!
//! Setting properties are stored as text. A schema declares, per setting
//! class, what each property must parse as, so malformed values are
//! rejected when they enter a setting instead of deep inside the resolver.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use storage_sys::check_entry;
use storage_types::ParityLayout;

use crate::error::{Result, ServiceError};
use crate::redundancy::{
    DATA_REDUNDANCY, ELEMENT_NAME, EXTENT_SIZE, EXTENT_STRIPE_LENGTH, NO_SINGLE_POINT_OF_FAILURE,
    PACKAGE_REDUNDANCY, PARITY_LAYOUT,
};

/// Setting classes that carry redundancy goals.
pub const STORAGE_SETTING_CLASSES: [&str; 4] = [
    "LMI_StorageSetting",
    "LMI_VGStorageSetting",
    "LMI_LVStorageSetting",
    "LMI_MDRAIDStorageSetting",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    Boolean,
    Uint16,
    Uint64,
    Text,
}

impl PropertyType {
    fn check(self, value: &str) -> std::result::Result<(), String> {
        let ok = match self {
            PropertyType::Boolean => parse_bool(value).is_some(),
            PropertyType::Uint16 => value.trim().parse::<u16>().is_ok(),
            PropertyType::Uint64 => value.trim().parse::<u64>().is_ok(),
            PropertyType::Text => true,
        };
        if ok {
            Ok(())
        } else {
            Err(format!("expected {:?}, got {:?}", self, value))
        }
    }
}

/// Parse boolean property text.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

pub fn format_bool(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// Extra check run on a value that already has the right type.
pub type Validator = fn(&str) -> bool;

#[derive(Clone, Copy)]
pub struct PropertySpec {
    pub ty: PropertyType,
    pub validator: Option<Validator>,
}

impl std::fmt::Debug for PropertySpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertySpec")
            .field("ty", &self.ty)
            .field("validated", &self.validator.is_some())
            .finish()
    }
}

/// Declared properties of one setting class.
#[derive(Debug, Clone)]
pub struct PropertySchema {
    class_name: String,
    properties: BTreeMap<String, PropertySpec>,
    /// Reject properties that are not declared.
    strict: bool,
}

impl PropertySchema {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            properties: BTreeMap::new(),
            strict: false,
        }
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn with_property(mut self, name: &str, ty: PropertyType) -> Self {
        self.properties.insert(
            name.to_string(),
            PropertySpec {
                ty,
                validator: None,
            },
        );
        self
    }

    pub fn with_validated_property(
        mut self,
        name: &str,
        ty: PropertyType,
        validator: Validator,
    ) -> Self {
        self.properties.insert(
            name.to_string(),
            PropertySpec {
                ty,
                validator: Some(validator),
            },
        );
        self
    }

    /// Schema with the redundancy properties of storage settings.
    pub fn storage_setting(class_name: impl Into<String>) -> Self {
        let mut schema = Self::new(class_name)
            .with_property(EXTENT_SIZE, PropertyType::Uint64)
            .with_property(NO_SINGLE_POINT_OF_FAILURE, PropertyType::Boolean)
            .with_validated_property(PARITY_LAYOUT, PropertyType::Uint16, |value| {
                value
                    .trim()
                    .parse::<u16>()
                    .ok()
                    .and_then(ParityLayout::from_u16)
                    .is_some()
            })
            .with_property(ELEMENT_NAME, PropertyType::Text);
        for axis in [DATA_REDUNDANCY, EXTENT_STRIPE_LENGTH, PACKAGE_REDUNDANCY] {
            for name in [axis.goal, axis.min, axis.max] {
                schema = schema.with_property(name, PropertyType::Uint16);
            }
        }
        schema
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn spec(&self, name: &str) -> Option<&PropertySpec> {
        self.properties.get(name)
    }

    /// Check that `value` may be stored under `key`. Null is accepted for
    /// every property the schema allows.
    ///
    /// Whatever the schema, keys and values must fit the store format.
    pub fn validate(&self, key: &str, value: Option<&str>) -> Result<()> {
        check_entry(key, value).map_err(|reason| {
            ServiceError::InvalidArgument(format!("{}: {}", self.class_name, reason))
        })?;

        let Some(spec) = self.properties.get(key) else {
            if self.strict {
                return Err(ServiceError::InvalidArgument(format!(
                    "{} has no property {}",
                    self.class_name, key
                )));
            }
            return Ok(());
        };

        let Some(value) = value else {
            return Ok(());
        };

        spec.ty.check(value).map_err(|reason| {
            ServiceError::InvalidArgument(format!("{}.{}: {}", self.class_name, key, reason))
        })?;
        if let Some(validator) = spec.validator
            && !validator(value)
        {
            return Err(ServiceError::InvalidArgument(format!(
                "{}.{}: value {:?} is not allowed",
                self.class_name, key, value
            )));
        }
        Ok(())
    }
}

/// Schemas by setting class name.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<PropertySchema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the redundancy schema for all storage setting classes.
    pub fn storage_defaults() -> Self {
        let mut registry = Self::new();
        for class_name in STORAGE_SETTING_CLASSES {
            registry.register(PropertySchema::storage_setting(class_name));
        }
        registry
    }

    pub fn register(&mut self, schema: PropertySchema) {
        self.schemas
            .insert(schema.class_name().to_string(), Arc::new(schema));
    }

    /// Schema for `class_name`; classes without one get an untyped schema.
    pub fn schema_for(&self, class_name: &str) -> Arc<PropertySchema> {
        self.schemas
            .get(class_name)
            .cloned()
            .unwrap_or_else(|| Arc::new(PropertySchema::new(class_name)))
    }
}
