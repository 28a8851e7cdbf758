//! Episode orchestration: the reflexion loop over a slate of lineages.

mod config;
mod controller;
mod lineage;

pub use config::{ConfigError, EpisodeConfig};
pub use controller::{EpisodeController, EpisodeError};
pub use lineage::LineageRunner;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation shared by every lineage in an episode.
///
/// Checked between external calls only; an in-flight call is allowed to
/// finish and its attempt is still recorded.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
