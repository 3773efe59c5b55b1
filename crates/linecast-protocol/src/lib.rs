//! Wire protocol for Linecast.
//!
//! This crate defines the text that travels between clients and the
//! relay:
//!
//! - **Types** ([`ServerLine`], [`ClientLine`]) — the lines the server
//!   emits and the lines a client may send after the handshake.
//! - **Codec** ([`decode_line`], [`encode_line`]) — turning raw line
//!   bytes into trimmed text and back.
//! - **Constants** — the fixed handshake and rejection strings.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (line bytes) → Protocol (text lines) → Session (who said it)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{decode_line, encode_line};
pub use error::ProtocolError;
pub use types::{ClientLine, ServerLine};

/// Sent as soon as a connection is accepted. No trailing newline.
pub const USERNAME_PROMPT: &str = "Enter your username: ";

/// Sent before closing a connection whose username has a bad length,
/// with the default 2-32 character limits.
pub const INVALID_USERNAME: &str = "Username must be 2-32 characters.\n";

/// Sent before closing a connection that arrived while the room was full.
pub const SERVER_FULL: &str = "Server is full. Try again later.\n";

/// The line a client sends to leave the chat.
pub const EXIT_COMMAND: &str = "exit";

/// Queued to every member when the server begins shutting down.
pub const SHUTDOWN_NOTICE: &str = "*** Server is shutting down ***";

/// Renders the bad-username notice for the configured limits.
pub fn invalid_username_notice(min: usize, max: usize) -> String {
    format!("Username must be {min}-{max} characters.\n")
}
