//! Event-name to handler dispatch table.
//!
//! The registry is assembled once at startup with [`EventHandlerRegistry::builder`]
//! and is immutable afterwards; the inbox processor only reads it.

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use eventboxes_core::error::HandlerError;
use eventboxes_core::event::IncomingEventInfo;
use eventboxes_core::handler::EventHandler;
use serde::de::DeserializeOwned;

/// Handlers keyed by event name.
#[derive(Clone, Default)]
pub struct EventHandlerRegistry {
    handlers: HashMap<String, Vec<Arc<dyn EventHandler>>>,
}

impl std::fmt::Debug for EventHandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("EventHandlerRegistry")
            .field("event_names", &names)
            .finish()
    }
}

impl EventHandlerRegistry {
    /// Starts an empty registry.
    #[must_use]
    pub fn builder() -> EventHandlerRegistryBuilder {
        EventHandlerRegistryBuilder::default()
    }

    /// Handlers registered for `event_name`, in registration order.
    #[must_use]
    pub fn handlers_for(&self, event_name: &str) -> &[Arc<dyn EventHandler>] {
        self.handlers.get(event_name).map_or(&[], Vec::as_slice)
    }

    /// Returns `true` if no handler is registered at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Builder for [`EventHandlerRegistry`].
#[derive(Default)]
pub struct EventHandlerRegistryBuilder {
    handlers: HashMap<String, Vec<Arc<dyn EventHandler>>>,
}

impl EventHandlerRegistryBuilder {
    /// Registers `handler` for events named `event_name`. Several handlers
    /// may share a name; all of them run for each event.
    #[must_use]
    pub fn handler(
        mut self,
        event_name: impl Into<String>,
        handler: impl EventHandler + 'static,
    ) -> Self {
        self.handlers
            .entry(event_name.into())
            .or_default()
            .push(Arc::new(handler));
        self
    }

    /// Registers an async function taking the JSON-decoded payload.
    #[must_use]
    pub fn typed<T, F, Fut>(self, event_name: impl Into<String>, f: F) -> Self
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.handler(event_name, TypedHandler::new(f))
    }

    /// Freezes the registry.
    #[must_use]
    pub fn build(self) -> EventHandlerRegistry {
        EventHandlerRegistry {
            handlers: self.handlers,
        }
    }
}

/// Adapts an async function over a typed payload into an [`EventHandler`].
///
/// Payloads that fail to decode are reported as
/// [`HandlerError::Deserialization`], so the event stays waiting.
pub struct TypedHandler<T, F> {
    f: F,
    _payload: PhantomData<fn() -> T>,
}

impl<T, F> TypedHandler<T, F> {
    /// Wraps `f`.
    #[must_use]
    pub fn new(f: F) -> Self {
        Self {
            f,
            _payload: PhantomData,
        }
    }
}

#[async_trait]
impl<T, F, Fut> EventHandler for TypedHandler<T, F>
where
    T: DeserializeOwned + Send + 'static,
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn handle(&self, event: &IncomingEventInfo) -> Result<(), HandlerError> {
        let payload: T = event.payload_as()?;
        (self.f)(payload).await
    }
}
