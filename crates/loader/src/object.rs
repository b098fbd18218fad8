use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};

use bytes::Bytes;

/// Shared handle to an instantiated UI resource.
pub type UiObjectRef = Arc<UiObject>;

/// Process-unique identifier of an instantiated resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
	fn next() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(0);
		Self(NEXT.fetch_add(1, Ordering::AcqRel).wrapping_add(1))
	}

	/// Returns the raw id.
	pub const fn raw(self) -> u64 {
		self.0
	}
}

impl fmt::Display for ObjectId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "obj{}", self.0)
	}
}

/// Parent container an instantiated resource is attached to.
///
/// The service creates one container per configured layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Container {
	name: Arc<str>,
	layer: i32,
}

impl Container {
	/// Creates a named container on a layer.
	pub fn new(name: impl AsRef<str>, layer: i32) -> Self {
		Self {
			name: Arc::from(name.as_ref()),
			layer,
		}
	}

	/// Creates the canonical container for a layer.
	pub fn for_layer(layer: i32) -> Self {
		Self::new(format!("layer-{layer}"), layer)
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn layer(&self) -> i32 {
		self.layer
	}
}

/// One instantiated UI resource.
///
/// Starts inactive. The presenter owning it flips `active` around its
/// transitions; the loader that created it flips `released` on unload.
#[derive(Debug)]
pub struct UiObject {
	id: ObjectId,
	name: Arc<str>,
	address: Arc<str>,
	parent: Container,
	content: Bytes,
	layer: AtomicI32,
	active: AtomicBool,
	released: AtomicBool,
}

impl UiObject {
	/// Creates a fresh, inactive resource.
	pub fn new(name: impl AsRef<str>, address: impl AsRef<str>, parent: Container, content: Bytes) -> UiObjectRef {
		let layer = parent.layer();
		Arc::new(Self {
			id: ObjectId::next(),
			name: Arc::from(name.as_ref()),
			address: Arc::from(address.as_ref()),
			parent,
			content,
			layer: AtomicI32::new(layer),
			active: AtomicBool::new(false),
			released: AtomicBool::new(false),
		})
	}

	pub fn id(&self) -> ObjectId {
		self.id
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Asset address this resource was loaded from.
	pub fn address(&self) -> &str {
		&self.address
	}

	pub fn parent(&self) -> &Container {
		&self.parent
	}

	/// Raw asset content.
	pub fn content(&self) -> &Bytes {
		&self.content
	}

	pub fn layer(&self) -> i32 {
		self.layer.load(Ordering::Acquire)
	}

	pub fn set_layer(&self, layer: i32) {
		self.layer.store(layer, Ordering::Release);
	}

	/// Returns true while the resource is shown.
	pub fn is_active(&self) -> bool {
		self.active.load(Ordering::Acquire)
	}

	pub fn set_active(&self, active: bool) {
		self.active.store(active, Ordering::Release);
	}

	/// Marks the resource released, returning false if it already was.
	pub fn release(&self) -> bool {
		self.active.store(false, Ordering::Release);
		!self.released.swap(true, Ordering::AcqRel)
	}

	pub fn is_released(&self) -> bool {
		self.released.load(Ordering::Acquire)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn release_is_idempotent() {
		let object = UiObject::new("popup", "popup", Container::for_layer(3), Bytes::new());
		assert_eq!(object.layer(), 3);
		object.set_active(true);
		assert!(object.release());
		assert!(!object.is_active());
		assert!(!object.release());
		assert!(object.is_released());
	}

	#[test]
	fn ids_are_unique() {
		let a = UiObject::new("a", "a", Container::for_layer(0), Bytes::new());
		let b = UiObject::new("b", "b", Container::for_layer(0), Bytes::new());
		assert_ne!(a.id(), b.id());
	}
}
