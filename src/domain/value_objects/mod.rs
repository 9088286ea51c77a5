//! # Value Objects
//!
//! Immutable value types shared across layers.

mod identity;

pub use identity::{roles, Actor, Roles};
