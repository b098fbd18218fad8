//! Stock presenter features.

mod animation;
mod delay;

pub use animation::{AnimationClip, AnimationFeature, Animator};
pub use delay::TimeDelayFeature;

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::Transition;

/// Resolves `transition` after `delay` on a background task.
///
/// A zero delay resolves immediately and spawns nothing.
fn resolve_after(transition: &Transition, delay: Duration) -> Option<JoinHandle<()>> {
	if delay.is_zero() {
		transition.complete();
		return None;
	}
	let transition = transition.clone();
	Some(tokio::spawn(async move {
		tokio::time::sleep(delay).await;
		transition.complete();
	}))
}
