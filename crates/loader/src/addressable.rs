use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use stagehand_primitives::UiConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{AssetLoader, Container, LoaderError, ObjectId, Result, UiObject, UiObjectRef};

/// Fetches raw asset content by key.
#[async_trait]
pub trait AssetSource: Send + Sync + 'static {
	/// Fetches the asset stored under `key`.
	///
	/// # Errors
	///
	/// Returns [`LoaderError::NotFound`] if the key does not exist.
	async fn fetch(&self, key: &str, cancel: &CancellationToken) -> Result<Bytes>;

	/// Fetches the asset stored under `key` without suspending.
	///
	/// Used for configs that load synchronously.
	///
	/// # Errors
	///
	/// Returns [`LoaderError::NotFound`] if the key does not exist.
	fn fetch_now(&self, key: &str) -> Result<Bytes>;
}

/// Address-to-asset-key catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
	entries: HashMap<String, String>,
}

impl Catalog {
	pub fn new() -> Self {
		Self::default()
	}

	/// Maps `address` to the asset stored under `key`.
	#[must_use]
	pub fn with_entry(mut self, address: impl Into<String>, key: impl Into<String>) -> Self {
		self.entries.insert(address.into(), key.into());
		self
	}

	/// Resolves an address to its asset key.
	pub fn resolve(&self, address: &str) -> Option<&str> {
		self.entries.get(address).map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

struct CachedAsset {
	content: Bytes,
	refs: usize,
}

#[derive(Default)]
struct CacheState {
	assets: HashMap<String, CachedAsset>,
	owners: HashMap<ObjectId, String>,
}

/// Catalog-addressed loader with reference-counted asset caching.
///
/// Every instantiated object holds one reference on its asset. Releasing an
/// object drops that reference and evicts the cached content once no object
/// uses it. A redundant instance discarded after a lost load race is released
/// the same way and never affects the surviving instance.
pub struct AddressableLoader<S> {
	catalog: Catalog,
	source: Arc<S>,
	cache: Mutex<CacheState>,
}

impl<S: AssetSource> AddressableLoader<S> {
	pub fn new(catalog: Catalog, source: S) -> Self {
		Self {
			catalog,
			source: Arc::new(source),
			cache: Mutex::new(CacheState::default()),
		}
	}

	pub fn catalog(&self) -> &Catalog {
		&self.catalog
	}

	/// Number of live references on the asset stored under `key`.
	pub fn ref_count(&self, key: &str) -> usize {
		self.cache.lock().assets.get(key).map_or(0, |asset| asset.refs)
	}

	/// Number of cached assets.
	pub fn cached(&self) -> usize {
		self.cache.lock().assets.len()
	}

	fn acquire_cached(&self, key: &str) -> Option<Bytes> {
		let mut cache = self.cache.lock();
		let asset = cache.assets.get_mut(key)?;
		asset.refs += 1;
		Some(asset.content.clone())
	}

	fn insert_fetched(&self, key: &str, content: Bytes) -> Bytes {
		let mut cache = self.cache.lock();
		let asset = cache.assets.entry(key.to_string()).or_insert(CachedAsset { content, refs: 0 });
		asset.refs += 1;
		asset.content.clone()
	}
}

#[async_trait]
impl<S: AssetSource> AssetLoader for AddressableLoader<S> {
	async fn instantiate(&self, config: &UiConfig, parent: &Container, cancel: &CancellationToken) -> Result<UiObjectRef> {
		let key = self.catalog.resolve(&config.address).ok_or_else(|| LoaderError::NotFound {
			address: config.address.clone(),
		})?;

		let content = match self.acquire_cached(key) {
			Some(content) => content,
			None if config.load_synchronously => self.insert_fetched(key, self.source.fetch_now(key)?),
			None => {
				let fetched = self.source.fetch(key, cancel).await?;
				if cancel.is_cancelled() {
					return Err(LoaderError::Cancelled {
						address: config.address.clone(),
					});
				}
				self.insert_fetched(key, fetched)
			}
		};

		let object = UiObject::new(config.presenter_type.as_str(), &config.address, parent.clone(), content);
		self.cache.lock().owners.insert(object.id(), key.to_string());
		debug!(address = %config.address, key, object = %object.id(), refs = self.ref_count(key), "addressable.instantiate");
		Ok(object)
	}

	fn unload(&self, object: &UiObjectRef) {
		if !object.release() {
			return;
		}
		let mut cache = self.cache.lock();
		let Some(key) = cache.owners.remove(&object.id()) else {
			warn!(object = %object.id(), "addressable.unload_unknown_object");
			return;
		};
		let evict = match cache.assets.get_mut(&key) {
			Some(asset) => {
				asset.refs = asset.refs.saturating_sub(1);
				asset.refs == 0
			}
			None => false,
		};
		if evict {
			cache.assets.remove(&key);
			trace!(key = %key, "addressable.evict");
		}
	}
}
