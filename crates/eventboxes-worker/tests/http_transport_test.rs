//! Integration tests for the HTTP transport against a running ingestion
//! endpoint.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use eventboxes_core::error::PublishError;
use eventboxes_core::event::{ExtraProperties, OutgoingEventInfo};
use eventboxes_core::options::BoxesOptions;
use eventboxes_core::publisher::EventPublisher;
use eventboxes_core::uow::UnitOfWork;
use eventboxes_delivery::application::outbox_publisher::OutboxEventPublisher;
use eventboxes_delivery::application::outbox_sender::OutboxSender;
use eventboxes_delivery::domain::outcome::CycleOutcome;
use eventboxes_store::lock::PgDistributedLock;
use eventboxes_store::outbox::PgEventOutbox;
use eventboxes_worker::transport::HttpEventPublisher;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const TIMEOUT: Duration = Duration::from_secs(5);

fn event(name: &str, data: &[u8]) -> OutgoingEventInfo {
    OutgoingEventInfo::new(
        Uuid::now_v7(),
        name,
        data.to_vec(),
        Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap(),
    )
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_publish_many_lands_events_in_remote_inbox(pool: PgPool) {
    // Arrange
    let base = common::spawn_test_server(pool.clone()).await;
    let publisher = HttpEventPublisher::new(format!("{base}/api/v1/inbox/events"), TIMEOUT).unwrap();
    let events = vec![
        event("OrderCreated", br#"{"order_id":1}"#),
        event("OrderPaid", &[0, 159, 146, 150]),
    ];

    // Act
    publisher.publish_many(&events).await.unwrap();

    // Assert
    let rows: Vec<(String, Vec<u8>)> = sqlx::query_as(
        "SELECT message_id, event_data FROM incoming_events ORDER BY event_name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(
        rows,
        vec![
            (events[0].id.to_string(), events[0].event_data.clone()),
            (events[1].id.to_string(), events[1].event_data.clone()),
        ]
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_republishing_is_acknowledged_without_duplicates(pool: PgPool) {
    let base = common::spawn_test_server(pool.clone()).await;
    let publisher = HttpEventPublisher::new(format!("{base}/api/v1/inbox/events"), TIMEOUT).unwrap();
    let event = event("OrderCreated", b"{}");

    publisher.publish(&event).await.unwrap();
    publisher.publish(&event).await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM incoming_events")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_non_success_status_is_rejected(pool: PgPool) {
    let base = common::spawn_test_server(pool).await;
    let publisher = HttpEventPublisher::new(format!("{base}/api/v1/nowhere"), TIMEOUT).unwrap();

    let result = publisher.publish(&event("OrderCreated", b"{}")).await;

    assert!(matches!(result, Err(PublishError::Rejected(msg)) if msg.starts_with("404")));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_a_transport_error() {
    // Arrange
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let publisher =
        HttpEventPublisher::new(format!("http://{addr}/api/v1/inbox/events"), TIMEOUT).unwrap();

    // Act
    let result = publisher.publish(&event("OrderCreated", b"{}")).await;

    // Assert
    assert!(matches!(result, Err(PublishError::Transport(_))));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_outbox_sender_delivers_over_http(pool: PgPool) {
    // Arrange
    let base = common::spawn_test_server(pool.clone()).await;
    let outbox = PgEventOutbox::new(pool.clone());
    let producer = OutboxEventPublisher::new(outbox.clone(), common::fixed_clock());
    let sender = OutboxSender::new(
        "default",
        outbox,
        Arc::new(HttpEventPublisher::new(format!("{base}/api/v1/inbox/events"), TIMEOUT).unwrap()),
        PgDistributedLock::new(pool.clone()),
        BoxesOptions {
            distributed_lock_wait_duration: Duration::ZERO,
            ..BoxesOptions::default()
        },
    );

    let mut uow = producer.begin().await.unwrap();
    let id = producer
        .publish(
            &mut uow,
            "OrderCreated",
            &serde_json::json!({ "order_id": 9 }),
            ExtraProperties::new(),
        )
        .await
        .unwrap();
    uow.commit().await.unwrap();

    // Act
    let outcome = sender.run_cycle(&CancellationToken::new()).await.unwrap();

    // Assert
    assert_eq!(
        outcome,
        CycleOutcome::Completed {
            processed: 1,
            failed: 0
        }
    );
    let outgoing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM outgoing_events")
        .fetch_one(&pool)
        .await
        .unwrap();
    let message_ids: Vec<String> = sqlx::query_scalar("SELECT message_id FROM incoming_events")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(outgoing, 0);
    assert_eq!(message_ids, vec![id.to_string()]);
}
