//! Subscription lifecycle: identity-driven resets, rebinds, cancellation.

use prism_core::{Selector, WatchConfig, Watcher};
use prism_testkit::{
    counted, eventually, session_store, CallCounter, SessionAction, SessionState, UpdateLog,
};

fn tick_config(outputs: &CallCounter) -> WatchConfig<SessionState, SessionAction, u64> {
    WatchConfig::new(counted(
        outputs,
        Selector::on_change(|state: &SessionState| state.tick),
    ))
}

#[tokio::test]
async fn double_bind_to_the_same_store_is_a_no_op() {
    let store = session_store();
    let outputs = CallCounter::new();

    let mut watcher = Watcher::new(tick_config(&outputs));
    let log = UpdateLog::attach(watcher.updates());

    watcher.bind(&store);
    store.dispatch(SessionAction::Tick);
    eventually("first dispatch published", || log.len() == 2).await;

    watcher.bind(&store);

    // No re-seed, no new subscription, memo preserved.
    assert_eq!(outputs.count(), 2);
    assert_eq!(log.len(), 2);
    assert_eq!(store.subscriber_count(), 1);

    store.dispatch(SessionAction::Tick);
    eventually("the original subscription still processes", || {
        log.len() == 3
    })
    .await;
    assert_eq!(log.snapshot(), vec![0, 1, 2]);
}

#[tokio::test]
async fn reconfigure_with_new_identity_forces_a_full_reset() {
    let store = session_store();
    let first_outputs = CallCounter::new();
    let second_outputs = CallCounter::new();

    let mut watcher = Watcher::new(tick_config(&first_outputs).with_id("first"));
    let log = UpdateLog::attach(watcher.updates());

    watcher.bind(&store);
    store.dispatch(SessionAction::Tick);
    eventually("initial subscription published", || log.len() == 2).await;
    let first_count = first_outputs.count();

    watcher.reconfigure(tick_config(&second_outputs).with_id("second"));

    // Binding the very same store must now behave like a brand-new store:
    // fresh engine, unconditional first-evaluation publish.
    watcher.bind(&store);
    assert_eq!(second_outputs.count(), 1);
    eventually("the reset re-published the seed", || log.len() == 3).await;
    assert_eq!(log.snapshot(), vec![0, 1, 1]);

    // The previous task is gone: its selectors never run again.
    store.dispatch(SessionAction::Tick);
    eventually("the new subscription processes", || log.len() == 4).await;
    assert_eq!(first_outputs.count(), first_count);
    eventually("the old stream receiver was released", || {
        store.subscriber_count() == 1
    })
    .await;
}

#[tokio::test]
async fn reconfigure_with_same_identity_is_a_no_op() {
    let store = session_store();
    let original = CallCounter::new();
    let replacement = CallCounter::new();

    let mut watcher = Watcher::new(tick_config(&original).with_id("stable"));
    watcher.bind(&store);

    watcher.reconfigure(tick_config(&replacement).with_id("stable"));
    watcher.bind(&store);

    // Same logical subscription: nothing was rebuilt.
    assert_eq!(replacement.count(), 0);
    assert_eq!(original.count(), 1);
    assert_eq!(store.subscriber_count(), 1);
}

#[tokio::test]
async fn idless_reconfigure_always_resets() {
    let store = session_store();
    let original = CallCounter::new();
    let replacement = CallCounter::new();

    let mut watcher = Watcher::new(tick_config(&original));
    watcher.bind(&store);

    // Without identity tokens there is nothing to compare configurations
    // by, so the reconfigure must be taken at face value.
    watcher.reconfigure(tick_config(&replacement));
    watcher.bind(&store);

    assert_eq!(replacement.count(), 1);
}

#[tokio::test]
async fn rebinding_to_another_store_cancels_the_old_subscription() {
    let store_one = session_store();
    let store_two = session_store();

    let mut watcher = Watcher::new(WatchConfig::new(Selector::on_change(
        |state: &SessionState| state.topic.clone(),
    )));
    let log = UpdateLog::attach(watcher.updates());

    watcher.bind(&store_one);
    store_one.dispatch(SessionAction::SetTopic("alpha".into()));
    eventually("first store published", || log.len() == 2).await;

    watcher.bind(&store_two);
    assert_eq!(watcher.output(), "");
    eventually("rebind re-seeded from the new store", || log.len() == 3).await;

    // Late elements from the old stream must never reach the output.
    store_one.dispatch(SessionAction::SetTopic("stale".into()));
    store_two.dispatch(SessionAction::SetTopic("fresh".into()));

    eventually("second store published", || watcher.output() == "fresh").await;
    assert_eq!(log.snapshot(), vec!["", "alpha", "", "fresh"]);
    eventually("old store lost its subscriber", || {
        store_one.subscriber_count() == 0
    })
    .await;
}

#[tokio::test]
async fn unbind_stops_the_task_gracefully() {
    let store = session_store();
    let outputs = CallCounter::new();

    let mut watcher = Watcher::new(tick_config(&outputs));
    watcher.bind(&store);
    assert!(watcher.is_bound());

    watcher.unbind().await.unwrap();
    assert!(!watcher.is_bound());
    eventually("the stream receiver was released", || {
        store.subscriber_count() == 0
    })
    .await;

    // Unbinding again is a no-op.
    watcher.unbind().await.unwrap();

    // The handle remains reusable.
    watcher.bind(&store);
    assert!(watcher.is_bound());
    assert_eq!(watcher.output(), 0);
}

#[tokio::test]
async fn dropping_a_watcher_releases_its_subscription() {
    let store = session_store();

    {
        let mut watcher = Watcher::new(WatchConfig::new(Selector::on_change(
            |state: &SessionState| state.tick,
        )));
        watcher.bind(&store);
        assert_eq!(store.subscriber_count(), 1);
    }

    eventually("drop released the stream receiver", || {
        store.subscriber_count() == 0
    })
    .await;
}

#[test]
#[should_panic(expected = "before bind")]
fn output_before_bind_is_fatal() {
    let watcher: Watcher<SessionState, SessionAction, u64> = Watcher::new(WatchConfig::new(
        Selector::on_change(|state: &SessionState| state.tick),
    ));
    let _ = watcher.output();
}

#[tokio::test]
async fn seed_output_is_valid_immediately_after_bind() {
    let store = session_store();
    store.dispatch(SessionAction::SetTopic("preexisting".into()));

    let mut watcher = Watcher::new(WatchConfig::new(Selector::on_change(
        |state: &SessionState| state.topic.clone(),
    )));
    watcher.bind(&store);

    // No await between bind and read: the seed evaluation is synchronous.
    assert_eq!(watcher.output(), "preexisting");
}
