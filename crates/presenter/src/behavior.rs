use std::any::Any;

use crate::PresenterError;
use crate::feature::{Feature, PresenterContext};

/// The presenter's own lifecycle hooks.
pub trait PresenterBehavior: Send + 'static {
	fn on_initialized(&mut self, _ctx: &PresenterContext) {}

	/// Receives data before the open transition starts.
	///
	/// # Errors
	///
	/// The default rejects data with [`PresenterError::DataNotAccepted`].
	fn on_set_data(&mut self, _data: Box<dyn Any + Send>) -> Result<(), PresenterError> {
		Err(PresenterError::DataNotAccepted)
	}

	/// Resource activated, open transitions about to be awaited.
	fn on_opened(&mut self) {}

	/// Close requested, close transitions about to be awaited.
	fn on_closed(&mut self) {}

	/// Fires once per open cycle after every open transition settled.
	fn on_open_transition_completed(&mut self) {}

	/// Fires once per close cycle after the resource was deactivated.
	fn on_close_transition_completed(&mut self) {}
}

/// Behavior with no hooks.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainPresenter;

impl PresenterBehavior for PlainPresenter {}

/// Recovers typed data inside [`PresenterBehavior::on_set_data`].
///
/// # Errors
///
/// Returns [`PresenterError::DataType`] if `data` is not a `T`.
pub fn downcast_data<T: Any>(data: Box<dyn Any + Send>) -> Result<T, PresenterError> {
	data.downcast::<T>().map(|data| *data).map_err(|_| PresenterError::DataType {
		expected: std::any::type_name::<T>(),
	})
}

/// Behavior that takes data of one type and hands it to a callback.
///
/// The last accepted value stays available through the callback's own state;
/// data of any other type is rejected with [`PresenterError::DataType`].
pub struct DataPresenter<T> {
	apply: Box<dyn FnMut(T) + Send>,
}

impl<T: Any + Send> DataPresenter<T> {
	pub fn new(apply: impl FnMut(T) + Send + 'static) -> Self {
		Self { apply: Box::new(apply) }
	}
}

impl<T: Any + Send> PresenterBehavior for DataPresenter<T> {
	fn on_set_data(&mut self, data: Box<dyn Any + Send>) -> Result<(), PresenterError> {
		(self.apply)(downcast_data::<T>(data)?);
		Ok(())
	}
}

/// Behavior plus ordered features used to build one presenter.
pub struct PresenterParts {
	pub(crate) behavior: Box<dyn PresenterBehavior>,
	pub(crate) features: Vec<Box<dyn Feature>>,
}

impl PresenterParts {
	pub fn new(behavior: impl PresenterBehavior) -> Self {
		Self {
			behavior: Box::new(behavior),
			features: Vec::new(),
		}
	}

	/// Parts with [`PlainPresenter`] and no features.
	pub fn plain() -> Self {
		Self::new(PlainPresenter)
	}

	/// Attaches a feature after the ones already attached.
	#[must_use]
	pub fn with_feature(mut self, feature: impl Feature) -> Self {
		self.features.push(Box::new(feature));
		self
	}

	/// Attaches an already boxed feature.
	#[must_use]
	pub fn with_boxed_feature(mut self, feature: Box<dyn Feature>) -> Self {
		self.features.push(feature);
		self
	}

	pub fn feature_count(&self) -> usize {
		self.features.len()
	}
}

impl Default for PresenterParts {
	fn default() -> Self {
		Self::plain()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn downcast_reports_expected_type() {
		assert_eq!(downcast_data::<u32>(Box::new(7u32)), Ok(7));
		let err = downcast_data::<u32>(Box::new("seven")).unwrap_err();
		assert_eq!(err, PresenterError::DataType { expected: "u32" });
	}

	#[test]
	fn data_presenter_applies_matching_data() {
		let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
		let sink = seen.clone();
		let mut presenter = DataPresenter::new(move |title: String| sink.lock().push(title));

		presenter.on_set_data(Box::new("hello".to_string())).unwrap();
		assert!(matches!(presenter.on_set_data(Box::new(3u8)), Err(PresenterError::DataType { .. })));
		assert_eq!(*seen.lock(), vec!["hello".to_string()]);
	}

	#[test]
	fn plain_presenter_rejects_data() {
		let mut plain = PlainPresenter;
		assert_eq!(plain.on_set_data(Box::new(1u8)), Err(PresenterError::DataNotAccepted));
	}
}
