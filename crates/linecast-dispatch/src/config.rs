//! Dispatch engine configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the dispatch engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Most members the room holds at once. Registrations beyond this
    /// are refused with [`DispatchError::ServerFull`](crate::DispatchError::ServerFull).
    pub capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { capacity: 50 }
    }
}
