use goe_surplus::config::Config;
use goe_surplus::controller::{SurplusController, Trigger};
use goe_surplus::persistence::PersistenceManager;
use goe_surplus::service::SurplusService;
use goe_surplus::store::StateStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

fn store_with_surplus(config: &Config, priority: &str) -> Arc<StateStore> {
    let store = Arc::new(StateStore::default().with_priority_entity(&config.entities.priority_mode));
    let e = &config.entities;
    store.set_state(&e.priority_mode, priority);
    store.set_state(&e.grid_power, -500);
    store.set_state(&e.battery_power, 2000);
    store.set_state(&e.battery_soc, 50);
    store.set_state(&e.car_charge_power, 0);
    store.set_state(&e.total_energy, 0);
    store
}

#[tokio::test]
async fn runs_ticks_and_queued_triggers_then_persists() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let state_path = tmp_dir.path().join("state.json");

    let mut config = Config::default();
    config.tick_interval_ms = 3_600_000;
    let store = store_with_surplus(&config, "2");

    let controller = SurplusController::new(config, store.clone(), store.clone());
    let (service, handle) =
        SurplusService::new(controller, Some(PersistenceManager::new(&state_path)));
    let mut reports = handle.subscribe_reports();
    let task = tokio::spawn(service.run());

    // The first tick fires right away
    timeout(Duration::from_secs(5), reports.changed())
        .await
        .unwrap()
        .unwrap();
    let first = reports.borrow_and_update().clone().unwrap();
    assert_eq!(first.trigger, Trigger::TimeTick);
    assert_eq!(first.amp_value, 10);

    handle.trigger(Trigger::PriorityChanged).unwrap();
    timeout(Duration::from_secs(5), reports.changed())
        .await
        .unwrap()
        .unwrap();
    let second = reports.borrow_and_update().clone().unwrap();
    assert_eq!(second.trigger, Trigger::PriorityChanged);
    assert!(second.instant_update);

    handle.shutdown();
    let stats = timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(stats.completed_cycles, 2);
    assert_eq!(stats.aborted_cycles, 0);

    let saved = PersistenceManager::new(&state_path).load().unwrap().unwrap();
    assert!(saved.initialized);
    assert_eq!(saved.amp_value, 10);
    assert_eq!(saved.priority_mode, 2);
}

#[tokio::test]
async fn rapid_presses_keep_the_priority() {
    let mut config = Config::default();
    config.tick_interval_ms = 3_600_000;
    let store = store_with_surplus(&config, "3");

    let controller = SurplusController::new(config, store.clone(), store.clone());
    let (mut service, _handle) = SurplusService::new(controller, None);

    service.handle_trigger(Trigger::ButtonPressed).await;
    service.handle_trigger(Trigger::ButtonPressed).await;
    // Second press came too fast, so it ran a normal cycle
    assert_eq!(service.stats().completed_cycles, 2);
    assert_eq!(service.controller().state().priority_mode, 3);
}

#[tokio::test]
async fn aborted_cycles_are_counted() {
    let config = Config::default();
    let store = Arc::new(StateStore::default());
    let controller = SurplusController::new(config, store.clone(), store.clone());
    let (mut service, _handle) = SurplusService::new(controller, None);

    service.handle_trigger(Trigger::TimeTick).await;
    assert_eq!(service.stats().aborted_cycles, 1);
    assert_eq!(service.stats().completed_cycles, 0);
    assert!(store.commands().is_empty());
}

#[tokio::test]
async fn button_cycle_is_followed_by_a_priority_change_cycle() {
    use goe_surplus::button::ButtonEvent;
    use goe_surplus::debounce::ManualClock;

    let mut config = Config::default();
    config.tick_interval_ms = 3_600_000;
    let clock = ManualClock::new(chrono::Utc::now());
    let store = Arc::new(
        StateStore::new(Arc::new(clock.clone())).with_priority_entity(&config.entities.priority_mode),
    );
    let e = &config.entities;
    store.set_state(&e.priority_mode, "3");
    store.set_state(&e.grid_power, -500);
    store.set_state(&e.battery_power, 2000);
    store.set_state(&e.battery_soc, 50);
    store.set_state(&e.car_charge_power, 0);
    store.set_state(&e.total_energy, 0);

    let controller = SurplusController::new(config, store.clone(), store.clone())
        .with_clock(Arc::new(clock.clone()));
    let (service, handle) = SurplusService::new(controller, None);
    let mut reports = handle.subscribe_reports();
    let task = tokio::spawn(service.run());

    let mut next_report = async || {
        timeout(Duration::from_secs(5), reports.changed())
            .await
            .unwrap()
            .unwrap();
        reports.borrow_and_update().clone().unwrap()
    };

    assert_eq!(next_report().await.trigger, Trigger::TimeTick);

    handle.trigger(Trigger::ButtonPressed).unwrap();
    assert_eq!(next_report().await.button, Some(ButtonEvent::Activated));

    clock.advance_secs(2);
    handle.trigger(Trigger::ButtonPressed).unwrap();
    // The press and its follow-up may land in one watch update
    let mut follow_up = next_report().await;
    while follow_up.trigger != Trigger::PriorityChanged {
        assert_eq!(follow_up.button, Some(ButtonEvent::Cycled { from: 3, to: 5 }));
        follow_up = next_report().await;
    }
    assert_eq!(follow_up.priority, 5);
    assert!(
        store
            .commands()
            .contains(&goe_surplus::actuation::Command::PriorityMode(5))
    );

    handle.shutdown();
    timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
