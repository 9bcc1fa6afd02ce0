use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::vision::VisionEngine;

#[derive(Clone)]
pub struct AppState {
    engine: Arc<VisionEngine>,
    config: Arc<Config>,
    shutdown_tx: broadcast::Sender<()>,
    started_at: Instant,
    ws_connections: Arc<AtomicUsize>,
}

/// Releases a streaming-connection slot on drop.
pub struct ConnectionSlot {
    counter: Arc<AtomicUsize>,
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AppState {
    pub fn new(
        engine: Arc<VisionEngine>,
        config: &Config,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            engine,
            config: Arc::new(config.clone()),
            shutdown_tx,
            started_at: Instant::now(),
            ws_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn engine(&self) -> &VisionEngine {
        &self.engine
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shutdown_rx(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn shutdown_tx(&self) -> &broadcast::Sender<()> {
        &self.shutdown_tx
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn ws_connections(&self) -> usize {
        self.ws_connections.load(Ordering::SeqCst)
    }

    /// Reserve a streaming slot, or `None` when the limit is reached.
    pub fn try_acquire_ws_slot(&self) -> Option<ConnectionSlot> {
        let max = self.config.limits.max_ws_connections;
        let current = self.ws_connections.fetch_add(1, Ordering::SeqCst);
        if current >= max {
            self.ws_connections.fetch_sub(1, Ordering::SeqCst);
            return None;
        }
        Some(ConnectionSlot {
            counter: self.ws_connections.clone(),
        })
    }
}
