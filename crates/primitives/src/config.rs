//! Presenter configuration data.
//!
//! Configuration is one [`UiConfig`] per presenter type plus any number of
//! named [`UiSetConfig`] groups. Both can be built in code or ingested from a
//! TOML document:
//!
//! ```toml
//! [[presenter]]
//! type = "Popup"
//! address = "popup"
//! layer = 5
//!
//! [[set]]
//! id = 1
//! members = [{ type = "Popup" }, { type = "Hud", address = "left" }]
//! ```

use std::fmt;
use std::ops::RangeInclusive;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::identity::{InstanceIdentity, PresenterType};

/// Layer values outside this range are accepted with a warning.
pub const LAYER_RANGE: RangeInclusive<i32> = 0..=1000;

/// Type-level presenter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiConfig {
	/// Asset key handed to the loader when instantiating this type.
	pub address: String,
	/// Sort/z-order hint applied to the instantiated resource.
	#[serde(default)]
	pub layer: i32,
	/// Presenter type this entry configures.
	#[serde(rename = "type")]
	pub presenter_type: PresenterType,
	/// Requests the loader's synchronous fast path.
	#[serde(default)]
	pub load_synchronously: bool,
}

impl UiConfig {
	/// Creates an asynchronously loaded config.
	pub fn new(presenter_type: impl Into<PresenterType>, address: impl Into<String>, layer: i32) -> Self {
		Self {
			address: address.into(),
			layer,
			presenter_type: presenter_type.into(),
			load_synchronously: false,
		}
	}

	/// Sets the synchronous-load flag.
	#[must_use]
	pub fn load_synchronously(mut self, sync: bool) -> Self {
		self.load_synchronously = sync;
		self
	}

	/// Checks the structural requirements of this entry.
	///
	/// # Errors
	///
	/// Returns [`ConfigError::InvalidConfiguration`] if the type or address is empty.
	pub fn validate(&self) -> Result<()> {
		if self.presenter_type.is_empty() {
			return Err(ConfigError::InvalidConfiguration(format!("config with address {:?} has no presenter type", self.address)));
		}
		if self.address.is_empty() {
			return Err(ConfigError::InvalidConfiguration(format!("config for {} has an empty address", self.presenter_type)));
		}
		Ok(())
	}

	/// Returns true when the layer lies inside [`LAYER_RANGE`].
	pub fn layer_in_range(&self) -> bool {
		LAYER_RANGE.contains(&self.layer)
	}
}

/// Identifier of a presenter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SetId(pub u32);

impl fmt::Display for SetId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "set#{}", self.0)
	}
}

impl From<u32> for SetId {
	fn from(id: u32) -> Self {
		Self(id)
	}
}

/// Named, ordered group of presenter instances managed together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiSetConfig {
	/// Set identifier, unique within a service.
	#[serde(rename = "id")]
	pub set_id: SetId,
	/// Members in load/open order.
	#[serde(rename = "members", default)]
	pub instances: Vec<InstanceIdentity>,
}

impl UiSetConfig {
	/// Creates a set from its members.
	pub fn new(set_id: impl Into<SetId>, instances: impl IntoIterator<Item = InstanceIdentity>) -> Self {
		Self {
			set_id: set_id.into(),
			instances: instances.into_iter().collect(),
		}
	}
}

/// Configuration bundle handed to the service at init.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiConfigs {
	/// Per-type configs.
	#[serde(rename = "presenter", default)]
	pub configs: Vec<UiConfig>,
	/// Presenter sets.
	#[serde(rename = "set", default)]
	pub sets: Vec<UiSetConfig>,
}

impl UiConfigs {
	/// Creates an empty bundle.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a type config.
	#[must_use]
	pub fn with_config(mut self, config: UiConfig) -> Self {
		self.configs.push(config);
		self
	}

	/// Adds a set.
	#[must_use]
	pub fn with_set(mut self, set: UiSetConfig) -> Self {
		self.sets.push(set);
		self
	}

	/// Parses a bundle from TOML text.
	///
	/// # Errors
	///
	/// Returns [`ConfigError::Toml`] on malformed input. The result is not validated.
	pub fn from_toml_str(input: &str) -> Result<Self> {
		Ok(toml::from_str(input)?)
	}

	/// Reads and parses a bundle from a TOML file.
	///
	/// # Errors
	///
	/// Returns [`ConfigError::Io`] if the file cannot be read and
	/// [`ConfigError::Toml`] on malformed input.
	pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let input = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&input)
	}

	/// Validates every config entry.
	///
	/// Out-of-range layers are accepted; the service warns when it registers them.
	///
	/// # Errors
	///
	/// Returns the first [`ConfigError::InvalidConfiguration`] encountered.
	pub fn validate(&self) -> Result<()> {
		for config in &self.configs {
			config.validate()?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	const SAMPLE: &str = r#"
[[presenter]]
type = "Popup"
address = "popup"
layer = 5

[[presenter]]
type = "Hud"
address = "hud"
layer = 1
load_synchronously = true

[[set]]
id = 1
members = [{ type = "Popup" }, { type = "Hud", address = "left" }]
"#;

	#[test]
	fn parses_presenters_and_sets() {
		let configs = UiConfigs::from_toml_str(SAMPLE).unwrap();
		assert_eq!(
			configs.configs,
			vec![UiConfig::new("Popup", "popup", 5), UiConfig::new("Hud", "hud", 1).load_synchronously(true)]
		);
		assert_eq!(
			configs.sets,
			vec![UiSetConfig::new(SetId(1), [InstanceIdentity::default_of("Popup"), InstanceIdentity::new("Hud", "left")])]
		);
		configs.validate().unwrap();
	}

	#[test]
	fn empty_address_is_rejected() {
		let configs = UiConfigs::new().with_config(UiConfig::new("Popup", "", 0));
		assert!(matches!(configs.validate(), Err(ConfigError::InvalidConfiguration(_))));
	}

	#[test]
	fn empty_type_is_rejected() {
		let configs = UiConfigs::new().with_config(UiConfig::new("", "popup", 0));
		assert!(matches!(configs.validate(), Err(ConfigError::InvalidConfiguration(_))));
	}

	#[test]
	fn out_of_range_layer_is_only_a_warning() {
		let configs = UiConfigs::new().with_config(UiConfig::new("Popup", "popup", 5000));
		assert!(!configs.configs[0].layer_in_range());
		configs.validate().unwrap();
	}

	#[test]
	fn reads_from_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("ui.toml");
		std::fs::write(&path, SAMPLE).unwrap();
		let configs = UiConfigs::from_path(&path).unwrap();
		assert_eq!(configs.configs.len(), 2);

		let missing = UiConfigs::from_path(dir.path().join("missing.toml"));
		assert!(matches!(missing, Err(ConfigError::Io { .. })));
	}

	#[test]
	fn malformed_toml_is_reported() {
		assert!(matches!(UiConfigs::from_toml_str("[[presenter]]\nlayer = \"x\""), Err(ConfigError::Toml(_))));
	}
}
