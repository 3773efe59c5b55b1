//! # Linecast
//!
//! A line-oriented TCP chat relay with one global room.
//!
//! Clients connect, answer a username prompt, and then every line they
//! send is stamped and relayed to everyone in the room. A single
//! dispatch engine applies joins, leaves and chat lines in one order and
//! drops any client that cannot keep up, so one slow reader never stalls
//! the rest.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use linecast::prelude::*;
//!
//! # async fn start() -> Result<(), LinecastError> {
//! let server = LinecastServer::builder()
//!     .bind("0.0.0.0:8888")
//!     .max_sessions(50)
//!     .build()
//!     .await?;
//! server.run_until_ctrl_c().await
//! # }
//! ```

mod error;
mod handler;
mod pumps;
mod server;

pub use error::LinecastError;
pub use server::{DEFAULT_PORT, LinecastServer, LinecastServerBuilder};

pub mod prelude {
    pub use crate::{DEFAULT_PORT, LinecastError, LinecastServer, LinecastServerBuilder};
    pub use linecast_dispatch::{DispatchConfig, DispatchError, Membership};
    pub use linecast_protocol::{ClientLine, ServerLine};
    pub use linecast_session::{SessionConfig, SessionError, SessionState};
    pub use linecast_transport::{ConnectionId, TransportError};
}
