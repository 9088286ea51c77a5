//! # Domain Layer
//!
//! Entities, repository traits and value objects of the real-time layer.
//! It is independent of any external frameworks or infrastructure concerns.
//!
//! ## Structure
//!
//! - **entities**: ChatRoom, ChatMessage, Notification and their repositories
//! - **value_objects**: caller identity and role checks
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - Repository traits define data access contracts

pub mod entities;
pub mod value_objects;

// Re-export commonly used types
pub use entities::*;
pub use value_objects::*;
