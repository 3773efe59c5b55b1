//! Membership and broadcast dispatch for Linecast.
//!
//! The dispatch engine runs as a single Tokio task (actor model) that
//! owns every admitted [`Session`](linecast_session::Session). Joins,
//! leaves and chat lines all arrive on one channel and are applied one at
//! a time, so the order the engine processes them in is the order every
//! client sees.
//!
//! # Key types
//!
//! - [`DispatchHandle`] — submit registrations, deregistrations and
//!   broadcasts to the running engine
//! - [`Membership`] — read-only view of who is in the room
//! - [`DispatchConfig`] — room capacity

mod config;
mod engine;
mod error;
mod membership;

pub use config::DispatchConfig;
pub use engine::{DispatchHandle, spawn_dispatch};
pub use error::DispatchError;
pub use membership::Membership;
