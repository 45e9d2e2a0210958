//! Shared test doubles for the transactional event inbox/outbox.

mod clock;
mod handler;
mod lock;
mod publisher;
mod store;

pub use clock::{FixedClock, ManualClock};
pub use handler::{FailingHandler, RecordingHandler};
pub use lock::{FailingDistributedLock, InMemoryDistributedLock, InMemoryLockHandle};
pub use publisher::{FailingPublisher, GatedPublisher, PublishCall, RecordingPublisher};
pub use store::{
    FailingEventInbox, FailingEventOutbox, InMemoryEventInbox, InMemoryEventOutbox,
    InMemoryUnitOfWork, NoopUnitOfWork,
};
