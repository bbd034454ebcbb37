//! The background watch loop.

use notify::{Config, Event, RecommendedWatcher, Watcher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::config::schema::WatchConfig;
use crate::watch::registry::WatchRegistry;
use crate::watch::WatchError;

/// Something that can re-check every cached contract.
pub trait Reload: Send + Sync + 'static {
    fn reload_all(&self);
}

type EventResult = notify::Result<Event>;

/// Turns file-change events for registered files into reload passes.
pub struct WatchCoordinator {
    registry: Arc<WatchRegistry>,
    idle_poll: Duration,
    debounce: Duration,
    poll_interval: Duration,
}

impl WatchCoordinator {
    pub fn new(registry: Arc<WatchRegistry>, config: &WatchConfig) -> Self {
        Self {
            registry,
            idle_poll: Duration::from_millis(config.idle_poll_ms),
            debounce: Duration::from_millis(config.debounce_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }

    /// Create the OS watcher, hand it to the registry and spawn the loop on `runtime`.
    pub fn start(
        self,
        runtime: &tokio::runtime::Handle,
        reloader: Arc<dyn Reload>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<JoinHandle<()>, WatchError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = RecommendedWatcher::new(
            move |res: EventResult| {
                // Receiver gone means the loop has stopped.
                let _ = tx.send(res);
            },
            Config::default().with_poll_interval(self.poll_interval),
        )
        .map_err(WatchError::Init)?;
        self.registry.attach(Box::new(watcher))?;

        tracing::info!(
            idle_poll_ms = self.idle_poll.as_millis() as u64,
            debounce_ms = self.debounce.as_millis() as u64,
            "Watch coordinator started"
        );
        Ok(runtime.spawn(self.run(rx, reloader, shutdown)))
    }

    async fn run(
        self,
        mut events: mpsc::UnboundedReceiver<EventResult>,
        reloader: Arc<dyn Reload>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            if self.registry.is_empty() {
                if self.idle(&mut shutdown).await {
                    break;
                }
                continue;
            }

            let first = tokio::select! {
                _ = shutdown.recv() => break,
                event = events.recv() => event,
            };
            let Some(first) = first else {
                // The watcher was released; nothing will arrive until shutdown.
                if self.idle(&mut shutdown).await {
                    break;
                }
                continue;
            };

            // Let the burst an editor save produces settle, then take all of it.
            tokio::time::sleep(self.debounce).await;
            let mut batch = vec![first];
            while let Ok(event) = events.try_recv() {
                batch.push(event);
            }

            let relevant = batch.iter().filter(|event| self.is_relevant(event)).count();
            if relevant == 0 {
                continue;
            }
            tracing::debug!(events = batch.len(), relevant, "Watched files changed");

            let reloader = reloader.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || reloader.reload_all()).await {
                tracing::error!(error = %e, "Reload pass aborted");
            }
        }
        tracing::info!("Watch coordinator stopped");
    }

    /// Sleep one idle period. Returns true if shutdown arrived first.
    async fn idle(&self, shutdown: &mut broadcast::Receiver<()>) -> bool {
        tokio::select! {
            _ = shutdown.recv() => true,
            _ = tokio::time::sleep(self.idle_poll) => false,
        }
    }

    fn is_relevant(&self, event: &EventResult) -> bool {
        match event {
            Ok(event) => {
                (event.kind.is_modify() || event.kind.is_create())
                    && event.paths.iter().any(|p| self.registry.matches(p))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Watch error");
                false
            }
        }
    }
}
