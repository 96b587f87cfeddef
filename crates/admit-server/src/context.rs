//! Shared state handed to every handler.

use admit_cache::TieredCache;
use admit_config::AppConfig;
use admit_realtime::{RealtimeServer, RoomRouter};
use std::sync::Arc;
use std::time::Instant;

/// Process-wide components, built once at startup.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub cache: Arc<TieredCache>,
    pub realtime: RealtimeServer,
    pub started_at: Instant,
}

impl AppContext {
    #[must_use]
    pub fn new(config: AppConfig, cache: Arc<TieredCache>, realtime: RealtimeServer) -> Self {
        Self {
            config: Arc::new(config),
            cache,
            realtime,
            started_at: Instant::now(),
        }
    }

    /// The event router, for producers that need to broadcast.
    #[must_use]
    pub fn router(&self) -> &RoomRouter {
        self.realtime.router()
    }
}
