use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use stagehand_primitives::UiConfig;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{AssetLoader, AssetSource, Container, LoaderError, Result, UiObject, UiObjectRef};

/// Loads presenter resources from a static resource directory.
///
/// An address maps to `root/<address>` with an optional extension appended.
/// Asynchronous loads read on the blocking pool; synchronous loads read inline.
#[derive(Debug, Clone)]
pub struct ResourceLoader {
	root: PathBuf,
	extension: Option<String>,
}

impl ResourceLoader {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self {
			root: root.into(),
			extension: None,
		}
	}

	/// Appends `extension` to every resolved path.
	#[must_use]
	pub fn extension(mut self, extension: impl Into<String>) -> Self {
		self.extension = Some(extension.into());
		self
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Resolves an address to a file path under the root.
	///
	/// # Errors
	///
	/// Returns [`LoaderError::InvalidAddress`] unless the address is a relative
	/// path made only of plain segments.
	pub fn path_for(&self, address: &str) -> Result<PathBuf> {
		let relative = Path::new(address);
		let plain = relative.components().all(|component| matches!(component, Component::Normal(_)));
		if address.is_empty() || !plain {
			return Err(LoaderError::InvalidAddress { address: address.to_string() });
		}
		let path = self.root.join(relative);
		Ok(match &self.extension {
			Some(ext) => path.with_extension(ext),
			None => path,
		})
	}

	fn read_now(&self, address: &str) -> Result<Bytes> {
		read_file(&self.path_for(address)?).map_err(|e| map_io(address, e))
	}

	async fn read(&self, address: &str, sync: bool, cancel: &CancellationToken) -> Result<Bytes> {
		if sync {
			return self.read_now(address);
		}

		let path = self.path_for(address)?;
		let read = tokio::task::spawn_blocking(move || read_file(&path));
		tokio::select! {
			joined = read => match joined {
				Ok(res) => res.map_err(|e| map_io(address, e)),
				Err(e) => Err(LoaderError::Backend(format!("resource read task failed: {e}"))),
			},
			_ = cancel.cancelled() => Err(LoaderError::Cancelled { address: address.to_string() }),
		}
	}
}

fn read_file(path: &Path) -> io::Result<Bytes> {
	std::fs::read(path).map(Bytes::from)
}

fn map_io(address: &str, error: io::Error) -> LoaderError {
	if error.kind() == io::ErrorKind::NotFound {
		LoaderError::NotFound { address: address.to_string() }
	} else {
		LoaderError::Io {
			address: address.to_string(),
			message: error.to_string(),
		}
	}
}

#[async_trait]
impl AssetLoader for ResourceLoader {
	async fn instantiate(&self, config: &UiConfig, parent: &Container, cancel: &CancellationToken) -> Result<UiObjectRef> {
		let content = self.read(&config.address, config.load_synchronously, cancel).await?;
		debug!(address = %config.address, bytes = content.len(), "resource.instantiate");
		Ok(UiObject::new(config.presenter_type.as_str(), &config.address, parent.clone(), content))
	}

	fn unload(&self, object: &UiObjectRef) {
		object.release();
	}
}

#[async_trait]
impl AssetSource for ResourceLoader {
	async fn fetch(&self, key: &str, cancel: &CancellationToken) -> Result<Bytes> {
		self.read(key, false, cancel).await
	}

	fn fetch_now(&self, key: &str) -> Result<Bytes> {
		self.read_now(key)
	}
}
