//! HTTP handlers.

pub mod events;
pub mod health;
pub mod registrations;
