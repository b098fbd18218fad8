//! Asset loading boundary for stagehand presenters.
//!
//! The service never creates UI resources itself. It hands a [`UiConfig`] and a
//! parent [`Container`] to an [`AssetLoader`] and receives a shared
//! [`UiObject`] handle back; unloading returns the handle to the same loader.
//!
//! Three backends are provided:
//! - [`PrefabLoader`]: in-memory registry of prefabs, useful for tests.
//! - [`ResourceLoader`]: static resource directory on disk.
//! - [`AddressableLoader`]: catalog-addressed assets with reference-counted caching.

use async_trait::async_trait;
use stagehand_primitives::UiConfig;
use tokio_util::sync::CancellationToken;

mod addressable;
mod object;
mod prefab;
mod resource;

pub use addressable::{AddressableLoader, AssetSource, Catalog};
pub use object::{Container, ObjectId, UiObject, UiObjectRef};
pub use prefab::{Prefab, PrefabLoader};
pub use resource::ResourceLoader;

/// A convenient type alias for `Result` with `E` = [`LoaderError`].
pub type Result<T, E = LoaderError> = std::result::Result<T, E>;

/// Loader failures.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum LoaderError {
	/// The backend knows nothing about the requested address.
	#[error("no asset found at address {address:?}")]
	NotFound { address: String },
	/// The load was cancelled before the resource was created.
	#[error("load of {address:?} was cancelled")]
	Cancelled { address: String },
	/// The address cannot name an asset of this backend.
	#[error("invalid asset address {address:?}")]
	InvalidAddress { address: String },
	/// Reading the asset failed.
	#[error("I/O error loading {address:?}: {message}")]
	Io { address: String, message: String },
	/// Any other backend failure.
	#[error("{0}")]
	Backend(String),
}

impl LoaderError {
	/// Returns true for [`LoaderError::NotFound`].
	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::NotFound { .. })
	}
}

/// Instantiates and releases the resources backing presenters.
#[async_trait]
pub trait AssetLoader: Send + Sync + 'static {
	/// Instantiates the resource for `config` under `parent`.
	///
	/// Implementations honor `config.load_synchronously` by completing without
	/// suspending, and should stop early when `cancel` fires.
	///
	/// # Errors
	///
	/// Returns [`LoaderError::NotFound`] if the address is unknown to the backend.
	async fn instantiate(&self, config: &UiConfig, parent: &Container, cancel: &CancellationToken) -> Result<UiObjectRef>;

	/// Releases a resource. Releasing an already-released resource is a no-op.
	fn unload(&self, object: &UiObjectRef);
}
