use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Logical presenter type name.
///
/// Every configured presenter belongs to exactly one type; the type selects
/// the [`UiConfig`](crate::UiConfig) used to load it and the factory used to
/// build its behavior and features.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresenterType(Arc<str>);

impl PresenterType {
	/// Creates a presenter type from its name.
	pub fn new(name: impl AsRef<str>) -> Self {
		Self(Arc::from(name.as_ref()))
	}

	/// Returns the type name.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Returns true when the name is empty.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl fmt::Display for PresenterType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for PresenterType {
	fn from(name: &str) -> Self {
		Self::new(name)
	}
}

impl From<String> for PresenterType {
	fn from(name: String) -> Self {
		Self(Arc::from(name))
	}
}

/// Key of one loaded presenter instance: its type plus an instance address.
///
/// An empty address denotes the default (singleton) instance of the type.
/// Equality and hashing are structural over both fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceIdentity {
	#[serde(rename = "type")]
	presenter_type: PresenterType,
	#[serde(default, skip_serializing_if = "is_default_address")]
	address: Arc<str>,
}

impl InstanceIdentity {
	/// Creates an identity for the given type and instance address.
	pub fn new(presenter_type: impl Into<PresenterType>, address: impl AsRef<str>) -> Self {
		Self {
			presenter_type: presenter_type.into(),
			address: Arc::from(address.as_ref()),
		}
	}

	/// Creates the identity of the default instance of a type.
	pub fn default_of(presenter_type: impl Into<PresenterType>) -> Self {
		Self::new(presenter_type, "")
	}

	/// Returns the presenter type.
	pub fn presenter_type(&self) -> &PresenterType {
		&self.presenter_type
	}

	/// Returns the instance address (empty for the default instance).
	pub fn address(&self) -> &str {
		&self.address
	}

	/// Returns true for the default instance of the type.
	pub fn is_default(&self) -> bool {
		self.address.is_empty()
	}
}

fn is_default_address(address: &Arc<str>) -> bool {
	address.is_empty()
}

impl fmt::Display for InstanceIdentity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.is_default() {
			write!(f, "{}", self.presenter_type)
		} else {
			write!(f, "{}:{}", self.presenter_type, self.address)
		}
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashSet;

	use super::*;

	#[test]
	fn display_omits_default_address() {
		assert_eq!(InstanceIdentity::default_of("Popup").to_string(), "Popup");
		assert_eq!(InstanceIdentity::new("Popup", "left").to_string(), "Popup:left");
	}

	#[test]
	fn equality_covers_both_fields() {
		let mut seen = HashSet::new();
		assert!(seen.insert(InstanceIdentity::new("Popup", "a")));
		assert!(seen.insert(InstanceIdentity::new("Popup", "b")));
		assert!(seen.insert(InstanceIdentity::new("Hud", "a")));
		assert!(!seen.insert(InstanceIdentity::new("Popup", "a")));
		assert!(InstanceIdentity::default_of("Hud").is_default());
		assert!(!InstanceIdentity::new("Hud", "x").is_default());
	}
}
