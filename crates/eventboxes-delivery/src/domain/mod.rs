//! Handler registry and cycle results.

pub mod outcome;
pub mod registry;
