//! Dead-Letter Routing Tests
//!
//! Product change events whose payload carries the fail marker are retried
//! and then routed to `product-topic.DLT` with provenance headers. Everything
//! else is acknowledged.

use std::sync::Arc;
use std::time::Duration;

use stockroom_api::{AppConfig, AppState};
use stockroom_core::{ProductId, RetryConfig};
use stockroom_events::{
    headers, ChangeEventConsumer, ChannelTransport, DeliveryOutcome, InMemoryBroker,
    OutboundMessage, RetryPolicy,
};
use stockroom_test_utils::fixtures::{dto, sample_product};
use stockroom_test_utils::{wait_until, FlakyHandler, RecordingHandler};
use tokio::sync::watch;

const WAIT: Duration = Duration::from_secs(2);

async fn bootstrap() -> (AppState, watch::Sender<bool>, Vec<tokio::task::JoinHandle<()>>) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let booted = AppState::bootstrap(&AppConfig::development(), shutdown_rx)
        .await
        .expect("bootstrap should succeed");
    booted
        .state
        .records
        .seed([sample_product()])
        .expect("seed should succeed");
    (booted.state, shutdown_tx, booted.consumers)
}

// ============================================================================
// END TO END
// ============================================================================

#[tokio::test]
async fn test_poison_event_is_dead_lettered() {
    let (state, _shutdown, _consumers) = bootstrap().await;

    let created = state
        .catalog
        .create(dto("fail-widget", 100, "x"))
        .await
        .unwrap();
    let original = state.broker.published("product-topic");
    assert_eq!(original.len(), 1);

    let consumer = state.consumer.clone();
    let routed = wait_until(WAIT, || {
        let consumer = consumer.clone();
        async move { consumer.metrics().snapshot().dead_lettered == 1 }
    })
    .await;
    assert!(routed, "poison event never reached the dead-letter channel");

    let dead = &state.broker.published("product-topic.DLT")[0];
    assert_eq!(dead.payload, "Product created: fail-widget");
    assert_eq!(dead.partition, original[0].partition);
    assert_eq!(dead.key, created.id.map(|id| id.to_string()));
    assert_eq!(dead.header(headers::ORIGINAL_CHANNEL), Some("product-topic"));
    assert_eq!(
        dead.header(headers::ORIGINAL_OFFSET),
        Some(original[0].offset.to_string().as_str())
    );
    assert_eq!(dead.header(headers::ATTEMPTS), Some("3"));
    assert!(dead
        .header(headers::EXCEPTION_MESSAGE)
        .is_some_and(|e| e.contains("Simulated processing failure")));
    assert_eq!(dead.header(headers::CHANGE_KIND), Some("created"));
    assert!(dead.is_dead_letter());

    assert_eq!(state.consumer.metrics().snapshot().retried, 2);
}

#[tokio::test]
async fn test_normal_events_are_acknowledged() {
    let (state, _shutdown, _consumers) = bootstrap().await;

    state.catalog.create(dto("Lamp", 2500, "home")).await.unwrap();
    state
        .catalog
        .update(ProductId::new(1), dto("B", 20, ""))
        .await
        .unwrap();
    state.catalog.delete(ProductId::new(1)).await.unwrap();

    let consumer = state.consumer.clone();
    let done = wait_until(WAIT, || {
        let consumer = consumer.clone();
        async move { consumer.metrics().snapshot().acknowledged == 3 }
    })
    .await;
    assert!(done);
    assert!(state.broker.published("product-topic.DLT").is_empty());
}

#[tokio::test]
async fn test_audit_channel_accepts_marker() {
    let (state, _shutdown, _consumers) = bootstrap().await;

    state
        .broker
        .publish(OutboundMessage::new("demo-topic", "this should fail"))
        .await
        .unwrap();

    let consumer = state.consumer.clone();
    let done = wait_until(WAIT, || {
        let consumer = consumer.clone();
        async move { consumer.metrics().snapshot().acknowledged == 1 }
    })
    .await;
    assert!(done);
    assert!(state.broker.published("demo-topic.DLT").is_empty());
}

#[tokio::test]
async fn test_shutdown_stops_listeners() {
    let (_state, shutdown, consumers) = bootstrap().await;

    shutdown.send(true).unwrap();
    for consumer in consumers {
        tokio::time::timeout(WAIT, consumer)
            .await
            .expect("listener should stop")
            .unwrap();
    }
}

// ============================================================================
// CONSUMER IN ISOLATION
// ============================================================================

fn fast_consumer(broker: Arc<InMemoryBroker>) -> ChangeEventConsumer {
    ChangeEventConsumer::new(
        broker,
        RetryPolicy::from_config(&RetryConfig::development()),
    )
}

#[tokio::test]
async fn test_transient_failure_recovers_on_retry() {
    let broker = Arc::new(InMemoryBroker::default());
    let consumer = fast_consumer(broker.clone());
    let message = broker
        .publish(OutboundMessage::new("product-topic", "Product created: Lamp"))
        .await
        .unwrap();

    let handler = FlakyHandler::new(1);
    let outcome = consumer.process(&message, &handler).await;

    assert!(matches!(outcome, DeliveryOutcome::Acknowledged { attempts: 2 }));
    assert_eq!(handler.calls(), 2);
    assert!(broker.published("product-topic.DLT").is_empty());
}

#[tokio::test]
async fn test_dead_letter_publish_failure_is_counted_lost() {
    let broker = Arc::new(InMemoryBroker::default());
    let consumer = fast_consumer(broker.clone());
    let message = broker
        .publish(OutboundMessage::new("product-topic", "Product created: fail"))
        .await
        .unwrap();
    broker.close();

    let outcome = consumer.process(&message, &FlakyHandler::new(u32::MAX)).await;

    match outcome {
        DeliveryOutcome::DeadLettered {
            attempts,
            dead_letter,
            ..
        } => {
            assert_eq!(attempts, 3);
            assert!(dead_letter.is_none());
        }
        other => panic!("expected dead-letter outcome, got {:?}", other),
    }
    assert_eq!(consumer.metrics().snapshot().lost, 1);
}

#[tokio::test]
async fn test_spawned_listener_sees_every_message_in_order() {
    let broker = Arc::new(InMemoryBroker::default());
    let consumer = fast_consumer(broker.clone());
    let handler = Arc::new(RecordingHandler::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let task = consumer
        .spawn("product-topic", handler.clone(), shutdown_rx)
        .unwrap();
    for i in 0..5 {
        broker
            .publish(OutboundMessage::new("product-topic", format!("m{}", i)))
            .await
            .unwrap();
    }

    let seen = handler.clone();
    assert!(wait_until(WAIT, || {
        let seen = seen.clone();
        async move { seen.count() == 5 }
    })
    .await);
    assert_eq!(handler.payloads(), vec!["m0", "m1", "m2", "m3", "m4"]);

    shutdown_tx.send(true).unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_listener_ignores_history_before_it_started() {
    // Capacity 2 forces the listener onto the replay path.
    let broker = Arc::new(InMemoryBroker::new(2, 1));
    let consumer = fast_consumer(broker.clone());
    let handler = Arc::new(RecordingHandler::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    for i in 0..3 {
        broker
            .publish(OutboundMessage::new("product-topic", format!("old-{}", i)))
            .await
            .unwrap();
    }
    let task = consumer
        .spawn("product-topic", handler.clone(), shutdown_rx)
        .unwrap();
    for i in 0..6 {
        broker
            .publish(OutboundMessage::new("product-topic", format!("new-{}", i)))
            .await
            .unwrap();
    }

    let seen = handler.clone();
    assert!(wait_until(WAIT, || {
        let seen = seen.clone();
        async move { seen.count() >= 6 }
    })
    .await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(
        handler.payloads(),
        vec!["new-0", "new-1", "new-2", "new-3", "new-4", "new-5"]
    );
    assert_eq!(consumer.metrics().snapshot().acknowledged, 6);

    shutdown_tx.send(true).unwrap();
    task.await.unwrap();
}
