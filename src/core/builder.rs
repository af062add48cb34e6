use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use super::manager::Manager;
use crate::{
    config::Config,
    events::Bus,
    host::Host,
    observers::{Observe, ObserverSet},
    transport::Transport,
};

/// Builder for constructing a [`Manager`] with optional observers.
pub struct ManagerBuilder {
    host: Host,
    transport: Arc<dyn Transport>,
    cfg: Config,
    observers: Vec<Arc<dyn Observe>>,
}

impl ManagerBuilder {
    /// Creates a builder with the default configuration.
    pub fn new(host: Host, transport: Arc<dyn Transport>) -> Self {
        Self {
            host,
            transport,
            cfg: Config::default(),
            observers: Vec::new(),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, cfg: Config) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sets observers for runtime events.
    ///
    /// Observers receive connection, reconnect and delivery events through
    /// dedicated workers with bounded queues. Requires a Tokio runtime at
    /// [`build`](Self::build) time when non-empty.
    pub fn with_observers(mut self, observers: Vec<Arc<dyn Observe>>) -> Self {
        self.observers = observers;
        self
    }

    /// Builds the manager.
    ///
    /// Initializes the event bus and, when observers were given, spawns the
    /// listener that forwards bus events to them. The listener stops when the
    /// last manager clone is dropped.
    pub fn build(self) -> Manager {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let runtime_token = CancellationToken::new();

        if !self.observers.is_empty() {
            let set = ObserverSet::new(self.observers, bus.clone());
            observer_listener(set, &bus, runtime_token.clone());
        }
        Manager::from_parts(self.cfg, self.host, self.transport, bus, runtime_token)
    }
}

fn observer_listener(set: ObserverSet, bus: &Bus, token: CancellationToken) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                ev = rx.recv() => match ev {
                    Ok(ev) => set.emit(ev),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                },
            }
        }
        set.shutdown().await;
    });
}
