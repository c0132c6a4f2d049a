// SPDX-License-Identifier: GPL-3.0-only

//! Storage settings: typed property bags and the catalog that owns them.

pub mod catalog;
pub mod schema;
pub mod setting;

pub use catalog::{ClassLoadFailure, LoadReport, SettingCatalog};
pub use schema::{PropertySchema, PropertySpec, PropertyType, SchemaRegistry};
pub use setting::Setting;
