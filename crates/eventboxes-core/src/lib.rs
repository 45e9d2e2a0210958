//! Shared abstractions for the transactional event inbox/outbox.
//!
//! This crate defines the record types, store traits, filter model and
//! coordination contracts that the stores, processors and worker depend on.
//! It contains no infrastructure code.

pub mod clock;
pub mod error;
pub mod event;
pub mod filter;
pub mod handler;
pub mod inbox;
pub mod lock;
pub mod options;
pub mod outbox;
pub mod publisher;
pub mod uow;
