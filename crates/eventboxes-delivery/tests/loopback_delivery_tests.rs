//! End-to-end delivery through the loopback transport: producer, outbox,
//! sender, inbox, processor, handler.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use eventboxes_core::clock::Clock;
use eventboxes_core::error::HandlerError;
use eventboxes_core::event::ExtraProperties;
use eventboxes_core::options::BoxesOptions;
use eventboxes_core::uow::UnitOfWork;
use eventboxes_delivery::application::inbox_processor::InboxProcessor;
use eventboxes_delivery::application::ingestion::EventIngestor;
use eventboxes_delivery::application::loopback::LoopbackPublisher;
use eventboxes_delivery::application::outbox_publisher::OutboxEventPublisher;
use eventboxes_delivery::application::outbox_sender::OutboxSender;
use eventboxes_delivery::domain::outcome::CycleOutcome;
use eventboxes_delivery::domain::registry::EventHandlerRegistry;
use eventboxes_store::inbox::PgEventInbox;
use eventboxes_store::lock::PgDistributedLock;
use eventboxes_store::outbox::PgEventOutbox;
use eventboxes_test_support::{
    FixedClock, InMemoryDistributedLock, InMemoryEventInbox, InMemoryEventOutbox,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Serialize, Deserialize)]
struct OrderCreated {
    order_id: u32,
}

fn clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
    ))
}

fn options() -> BoxesOptions {
    BoxesOptions {
        distributed_lock_wait_duration: Duration::ZERO,
        ..BoxesOptions::default()
    }
}

fn recording_registry() -> (EventHandlerRegistry, Arc<Mutex<Vec<u32>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let registry = EventHandlerRegistry::builder()
        .typed("OrderCreated", move |event: OrderCreated| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().unwrap().push(event.order_id);
                Ok::<(), HandlerError>(())
            }
        })
        .build();
    (registry, seen)
}

#[tokio::test]
async fn test_in_memory_round_trip_delivers_each_event_once() {
    // Arrange
    let clock = clock();
    let outbox = InMemoryEventOutbox::new();
    let inbox = InMemoryEventInbox::new(Arc::clone(&clock), Duration::from_secs(7200));
    let lock = InMemoryDistributedLock::new();
    let producer = OutboxEventPublisher::new(outbox.clone(), Arc::clone(&clock));
    let sender = OutboxSender::new(
        "default",
        outbox.clone(),
        LoopbackPublisher::new(EventIngestor::new(inbox.clone(), Arc::clone(&clock))),
        lock.clone(),
        options(),
    );
    let (registry, seen) = recording_registry();
    let processor = InboxProcessor::new(
        "default",
        inbox.clone(),
        lock,
        registry,
        Arc::clone(&clock),
        options(),
    );
    let cancel = CancellationToken::new();

    // Act
    let mut uow = producer.begin().await.unwrap();
    for order_id in [1, 2, 3] {
        producer
            .publish(
                &mut uow,
                "OrderCreated",
                &OrderCreated { order_id },
                ExtraProperties::new(),
            )
            .await
            .unwrap();
    }
    uow.commit().await.unwrap();

    let sent = sender.run_cycle(&cancel).await.unwrap();
    let handled = processor.run_cycle(&cancel).await.unwrap();
    let idle = processor.run_cycle(&cancel).await.unwrap();

    // Assert
    assert_eq!(
        sent,
        CycleOutcome::Completed {
            processed: 3,
            failed: 0
        }
    );
    assert_eq!(
        handled,
        CycleOutcome::Completed {
            processed: 3,
            failed: 0
        }
    );
    assert_eq!(idle, CycleOutcome::IDLE);
    assert!(outbox.committed_events().is_empty());
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_postgres_round_trip(pool: PgPool) {
    // Arrange
    let clock = clock();
    let outbox = PgEventOutbox::new(pool.clone());
    let inbox = PgEventInbox::new(pool.clone(), Arc::clone(&clock), Duration::from_secs(7200));
    let producer = OutboxEventPublisher::new(outbox.clone(), Arc::clone(&clock));
    let sender = OutboxSender::new(
        "default",
        outbox,
        LoopbackPublisher::new(EventIngestor::new(inbox.clone(), Arc::clone(&clock))),
        PgDistributedLock::new(pool.clone()),
        BoxesOptions {
            batch_publish_outbox_events: false,
            ..options()
        },
    );
    let (registry, seen) = recording_registry();
    let processor = InboxProcessor::new(
        "default",
        inbox,
        PgDistributedLock::new(pool.clone()),
        registry,
        Arc::clone(&clock),
        options(),
    );
    let cancel = CancellationToken::new();

    // Act
    let mut uow = producer.begin().await.unwrap();
    producer
        .publish(
            &mut uow,
            "OrderCreated",
            &OrderCreated { order_id: 42 },
            ExtraProperties::new(),
        )
        .await
        .unwrap();
    uow.commit().await.unwrap();

    sender.run_cycle(&cancel).await.unwrap();
    processor.run_cycle(&cancel).await.unwrap();

    // Assert
    let outgoing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM outgoing_events")
        .fetch_one(&pool)
        .await
        .unwrap();
    let processed: Vec<bool> = sqlx::query_scalar("SELECT is_processed FROM incoming_events")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(outgoing, 0);
    assert_eq!(processed, vec![true]);
    assert_eq!(*seen.lock().unwrap(), vec![42]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_loopback_delivery_fits_in_two_connections(
    pool_options: PgPoolOptions,
    connect_options: PgConnectOptions,
) {
    // Arrange
    let pool = pool_options
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(2))
        .connect_with(connect_options)
        .await
        .unwrap();
    let clock = clock();
    let outbox = PgEventOutbox::new(pool.clone());
    let inbox = PgEventInbox::new(pool.clone(), Arc::clone(&clock), Duration::from_secs(7200));
    let producer = OutboxEventPublisher::new(outbox.clone(), Arc::clone(&clock));
    let sender = OutboxSender::new(
        "default",
        outbox,
        LoopbackPublisher::new(EventIngestor::new(inbox.clone(), Arc::clone(&clock))),
        PgDistributedLock::new(pool.clone()),
        options(),
    );
    let (registry, seen) = recording_registry();
    let processor = InboxProcessor::new(
        "default",
        inbox,
        PgDistributedLock::new(pool.clone()),
        registry,
        Arc::clone(&clock),
        options(),
    );
    let cancel = CancellationToken::new();

    let mut uow = producer.begin().await.unwrap();
    producer
        .publish(
            &mut uow,
            "OrderCreated",
            &OrderCreated { order_id: 7 },
            ExtraProperties::new(),
        )
        .await
        .unwrap();
    uow.commit().await.unwrap();

    // Act
    let sent = sender.run_cycle(&cancel).await.unwrap();
    let handled = processor.run_cycle(&cancel).await.unwrap();

    // Assert
    let delivered = CycleOutcome::Completed {
        processed: 1,
        failed: 0,
    };
    assert_eq!(sent, delivered);
    assert_eq!(handled, delivered);
    assert_eq!(*seen.lock().unwrap(), vec![7]);
}
