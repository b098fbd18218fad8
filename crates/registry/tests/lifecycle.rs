//! End-to-end presenter lifecycle through [`UiService`].

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use stagehand_loader::{Prefab, PrefabLoader};
use stagehand_presenter::features::TimeDelayFeature;
use stagehand_presenter::{DataPresenter, PresenterParts, PresenterState, TransitionOutcome};
use stagehand_primitives::{InstanceIdentity, UiConfig, UiConfigs};
use stagehand_registry::{Error, ErrorKind, ServiceEvent, UiService};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn popup_loader() -> Arc<PrefabLoader> {
	Arc::new(
		PrefabLoader::new()
			.with_prefab("popup", Prefab::new("Popup"))
			.with_prefab("hud", Prefab::new("Hud")),
	)
}

fn service(loader: &Arc<PrefabLoader>) -> UiService {
	init_tracing();
	let service = UiService::new(loader.clone());
	service
		.init(
			UiConfigs::new()
				.with_config(UiConfig::new("Popup", "popup", 5))
				.with_config(UiConfig::new("Hud", "hud", 1)),
		)
		.unwrap();
	service
}

fn with_delays(service: &UiService, open: u64, close: u64) {
	service.register_presenter("Popup", move |_, _| {
		PresenterParts::plain().with_feature(TimeDelayFeature::new(Duration::from_millis(open), Duration::from_millis(close)))
	});
}

#[tokio::test(start_paused = true)]
async fn popup_open_then_close_with_destroy() {
	let loader = popup_loader();
	let service = service(&loader);
	with_delays(&service, 100, 300);

	let popup = service.open_ui("Popup", None, &CancellationToken::new()).await.unwrap();
	assert_eq!(loader.instantiations(), 1);
	assert_eq!(service.visible_uis(), vec![InstanceIdentity::default_of("Popup")]);
	assert_eq!(popup.state(), PresenterState::Open);
	assert_eq!(popup.object().layer(), 5);
	assert!(popup.object().is_active());

	let closing = service.close_ui("Popup", None, true).unwrap();
	assert!(service.visible_uis().is_empty(), "visibility reflects intent immediately");
	assert!(popup.object().is_active(), "resource stays visible during the close transition");
	assert_eq!(loader.unloads(), 0);

	assert_eq!(closing.wait().await, Some(TransitionOutcome::Completed));
	assert_eq!(loader.unloads(), 1);
	assert!(service.loaded_uis().is_empty());
	assert!(service.snapshot().is_empty());
	assert!(popup.is_destroyed());
	assert!(popup.object().is_released());
}

#[tokio::test]
async fn load_then_unload_round_trip() {
	let loader = popup_loader();
	let service = service(&loader);

	let popup = service.load_ui("Popup", None, false, &CancellationToken::new()).await.unwrap();
	assert!(service.is_loaded("Popup", None));
	assert!(!service.is_visible("Popup", None));
	assert_eq!(popup.state(), PresenterState::Closed);
	assert!(!popup.object().is_active());

	let again = service.load_ui("Popup", None, false, &CancellationToken::new()).await.unwrap();
	assert!(again.ptr_eq(&popup));
	assert_eq!(loader.instantiations(), 1);

	service.unload_ui("Popup", None).unwrap();
	assert!(service.loaded_uis().is_empty());
	assert_eq!(loader.unloads(), 1);
	assert!(popup.is_destroyed());
	assert_eq!(service.get_ui("Popup", None).unwrap_err().kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn load_with_open_after_opens() {
	let loader = popup_loader();
	let service = service(&loader);

	let popup = service.load_ui("Popup", Some("left"), true, &CancellationToken::new()).await.unwrap();
	assert_eq!(popup.identity(), &InstanceIdentity::new("Popup", "left"));
	assert!(service.is_visible("Popup", Some("left")));
	assert!(popup.is_open());
}

#[tokio::test]
async fn opening_twice_keeps_one_visible_entry() {
	let loader = popup_loader();
	let service = service(&loader);
	let cancel = CancellationToken::new();

	let first = service.open_ui("Popup", None, &cancel).await.unwrap();
	let second = service.open_ui("Popup", None, &cancel).await.unwrap();
	assert!(first.ptr_eq(&second));
	assert_eq!(service.visible_uis().len(), 1);
	assert_eq!(loader.instantiations(), 1);
}

#[tokio::test]
async fn data_is_delivered_before_open() {
	let loader = popup_loader();
	let service = service(&loader);
	let titles = Arc::new(Mutex::new(Vec::new()));
	let sink = titles.clone();
	service.register_presenter("Popup", move |_, _| {
		let sink = sink.clone();
		PresenterParts::new(DataPresenter::new(move |title: String| sink.lock().push(title)))
	});

	service
		.open_ui_with_data("Popup", None, "Save changes?".to_string(), &CancellationToken::new())
		.await
		.unwrap();
	assert_eq!(*titles.lock(), vec!["Save changes?".to_string()]);

	let err = service.open_ui_with_data("Hud", None, 42u32, &CancellationToken::new()).await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Presenter);
	assert!(!service.is_visible("Hud", None), "rejected data leaves the instance closed");
	assert!(service.is_loaded("Hud", None));
}

#[tokio::test(start_paused = true)]
async fn reopening_during_destroying_close_keeps_the_instance() {
	let loader = popup_loader();
	let service = service(&loader);
	with_delays(&service, 0, 300);
	let cancel = CancellationToken::new();

	service.open_ui("Popup", None, &cancel).await.unwrap();
	let closing = service.close_ui("Popup", None, true).unwrap();
	tokio::time::sleep(Duration::from_millis(100)).await;

	let popup = service.open_ui("Popup", None, &cancel).await.unwrap();
	assert_eq!(closing.wait().await, Some(TransitionOutcome::Superseded));
	assert!(service.is_visible("Popup", None));
	assert!(popup.object().is_active());
	assert_eq!(loader.unloads(), 0);
}

#[tokio::test(start_paused = true)]
async fn unload_all_short_circuits_pending_transitions() {
	let loader = popup_loader();
	let service = service(&loader);
	with_delays(&service, 1_000, 0);

	let opening = tokio::spawn({
		let service = service.clone();
		async move { service.open_ui("Popup", None, &CancellationToken::new()).await }
	});
	tokio::time::sleep(Duration::from_millis(10)).await;
	let popup = service.get_ui("Popup", None).unwrap();
	assert_eq!(popup.state(), PresenterState::AwaitingOpenTransition);

	let start = Instant::now();
	service.unload_all();
	opening.await.unwrap().unwrap();
	assert!(start.elapsed() < Duration::from_millis(1_000));
	assert!(popup.is_destroyed());
	assert!(service.visible_uis().is_empty());
	assert!(service.loaded_uis().is_empty());
	assert_eq!(loader.unloads(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancelling_a_slow_load_registers_nothing() {
	let loader = Arc::new(PrefabLoader::new().with_prefab("popup", Prefab::new("Popup").latency(Duration::from_secs(1))));
	let service = service(&loader);
	let cancel = CancellationToken::new();

	let load = tokio::spawn({
		let service = service.clone();
		let cancel = cancel.clone();
		async move { service.load_ui("Popup", None, false, &cancel).await }
	});
	tokio::time::sleep(Duration::from_millis(100)).await;
	cancel.cancel();

	let err = load.await.unwrap().unwrap_err();
	assert!(matches!(err, Error::Cancelled(_)));
	assert_eq!(err.kind(), ErrorKind::Cancelled);
	assert_eq!(loader.instantiations(), 0);
	assert!(!service.is_loaded("Popup", None));
}

#[tokio::test(start_paused = true)]
async fn synchronous_configs_skip_loader_latency() {
	let loader = Arc::new(PrefabLoader::new().with_prefab("popup", Prefab::new("Popup").latency(Duration::from_secs(5))));
	init_tracing();
	let service = UiService::new(loader.clone());
	service.add_config(UiConfig::new("Popup", "popup", 5).load_synchronously(true));

	let start = Instant::now();
	service.load_ui("Popup", None, false, &CancellationToken::new()).await.unwrap();
	assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test]
async fn unknown_asset_address_is_a_not_found_loader_failure() {
	let loader = popup_loader();
	let service = service(&loader);
	service.add_config(UiConfig::new("Toast", "missing-toast", 2));

	let err = service.open_ui("Toast", None, &CancellationToken::new()).await.unwrap_err();
	assert!(matches!(err, Error::Loader { .. }));
	assert_eq!(err.kind(), ErrorKind::NotFound);
	assert!(!service.is_loaded("Toast", None));
	assert!(service.visible_uis().is_empty());
}

#[tokio::test]
async fn close_all_in_layer_only_touches_that_layer() {
	let loader = popup_loader();
	let service = service(&loader);
	let cancel = CancellationToken::new();
	service.open_ui("Popup", None, &cancel).await.unwrap();
	service.open_ui("Hud", None, &cancel).await.unwrap();

	let closing = service.close_all_ui_in_layer(5);
	assert_eq!(closing.len(), 1);
	for close in closing {
		close.wait().await;
	}
	assert_eq!(service.visible_uis(), vec![InstanceIdentity::default_of("Hud")]);

	for close in service.close_all_ui() {
		close.wait().await;
	}
	assert!(service.visible_uis().is_empty());
	assert_eq!(service.loaded_uis().len(), 2, "close without destroy keeps instances loaded");
}

#[tokio::test]
async fn remove_detaches_without_releasing() {
	let loader = popup_loader();
	let service = service(&loader);
	let mut events = service.subscribe();
	service.open_ui("Popup", None, &CancellationToken::new()).await.unwrap();

	let popup = service.remove_ui("Popup", None).unwrap();
	assert!(!service.is_loaded("Popup", None));
	assert!(service.visible_uis().is_empty());
	assert!(!popup.is_destroyed());
	assert!(!popup.object().is_released());
	assert_eq!(loader.unloads(), 0);

	let id = InstanceIdentity::default_of("Popup");
	assert_eq!(events.recv().await.unwrap(), ServiceEvent::Loaded(id.clone()));
	assert_eq!(events.recv().await.unwrap(), ServiceEvent::Opened(id.clone()));
	assert_eq!(events.recv().await.unwrap(), ServiceEvent::Removed(id));
}

#[tokio::test(start_paused = true)]
async fn abandoned_open_still_completes() {
	let loader = popup_loader();
	let service = service(&loader);
	with_delays(&service, 100, 0);
	let mut events = service.subscribe();

	let cancel = CancellationToken::new();
	let open = service.open_ui("Popup", None, &cancel);
	assert!(tokio::time::timeout(Duration::from_millis(10), open).await.is_err());
	tokio::time::sleep(Duration::from_millis(200)).await;

	let popup = service.get_ui("Popup", None).unwrap();
	assert_eq!(popup.state(), PresenterState::Open);
	assert!(popup.open_completed().is_completed());
	assert!(service.is_visible("Popup", None));
	let id = InstanceIdentity::default_of("Popup");
	assert_eq!(events.try_recv().unwrap(), ServiceEvent::Loaded(id.clone()));
	assert_eq!(events.try_recv().unwrap(), ServiceEvent::Opened(id));
}

#[tokio::test]
async fn events_follow_the_lifecycle() {
	let loader = popup_loader();
	let service = service(&loader);
	let mut events = service.subscribe();

	service.open_ui("Popup", None, &CancellationToken::new()).await.unwrap();
	service.close_ui("Popup", None, true).unwrap().wait().await;

	let id = InstanceIdentity::default_of("Popup");
	let mut seen = Vec::new();
	while let Ok(event) = events.try_recv() {
		seen.push(event);
	}
	assert_eq!(
		seen,
		vec![
			ServiceEvent::Loaded(id.clone()),
			ServiceEvent::Opened(id.clone()),
			ServiceEvent::Closed(id.clone()),
			ServiceEvent::Unloaded(id),
		]
	);
}

#[tokio::test]
async fn snapshot_reports_configured_loaded_and_visible() {
	let loader = popup_loader();
	let service = service(&loader);
	let cancel = CancellationToken::new();
	service.open_ui("Popup", None, &cancel).await.unwrap();
	service.load_ui("Hud", Some("left"), false, &cancel).await.unwrap();

	let snapshot = service.snapshot();
	assert_eq!(snapshot.configured.iter().map(|ty| ty.as_str()).collect::<Vec<_>>(), vec!["Hud", "Popup"]);
	assert_eq!(
		snapshot.loaded.iter().map(|entry| (entry.identity.to_string(), entry.layer, entry.state)).collect::<Vec<_>>(),
		vec![
			("Hud:left".to_string(), 1, PresenterState::Closed),
			("Popup".to_string(), 5, PresenterState::Open),
		]
	);
	assert_eq!(snapshot.visible, vec![InstanceIdentity::default_of("Popup")]);
	assert!(!snapshot.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_opens_on_a_thread_pool_instantiate_once() {
	let loader = Arc::new(PrefabLoader::new().with_prefab("popup", Prefab::new("Popup").latency(Duration::from_millis(20))));
	let service = service(&loader);

	let opens: Vec<_> = (0..8)
		.map(|_| {
			let service = service.clone();
			tokio::spawn(async move { service.open_ui("Popup", None, &CancellationToken::new()).await })
		})
		.collect();
	let mut opened = Vec::new();
	for open in opens {
		opened.push(open.await.unwrap().unwrap());
	}

	assert!(opened.iter().all(|presenter| presenter.ptr_eq(&opened[0])));
	assert_eq!(loader.instantiations(), 1);
	assert_eq!(service.visible_uis(), vec![InstanceIdentity::default_of("Popup")]);
}
