//! Client session management for Linecast.
//!
//! This crate handles the per-connection side of a participant:
//!
//! 1. **Handshake rules** — turning the reply to the username prompt into
//!    a display name ([`validate_username`])
//! 2. **Session state** — identity, display name, lifecycle phase, and
//!    the bounded outbound queue ([`Session`], [`OutboundQueue`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Dispatch Layer (above)  ← owns admitted sessions, fans lines out to them
//!     ↕
//! Session Layer (this crate)  ← one participant's identity and queue
//!     ↕
//! Transport Layer (below)  ← provides ConnectionId and the Connection trait
//! ```

mod error;
mod handshake;
mod session;

pub use error::SessionError;
pub use handshake::validate_username;
pub use session::{OutboundQueue, Session, SessionConfig, SessionState};
