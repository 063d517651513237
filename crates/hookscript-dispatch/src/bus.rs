//! In-process event bus with ordered, halting listeners

use crate::dispatcher::EventDispatchEngine;
use async_trait::async_trait;
use hookscript_core::{Event, EventGroup, Result};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Receives events fired on the bus
#[async_trait]
pub trait EventListener: Send + Sync {
    /// Listener name, for logs
    fn name(&self) -> &str;

    /// Handle an event; `Ok(false)` halts propagation for this firing
    async fn handle(&self, event: &mut Event) -> Result<bool>;
}

struct Subscription {
    group: EventGroup,
    listener: Arc<dyn EventListener>,
}

/// Delivers each event to the listeners of its group in subscription order
#[derive(Clone, Default)]
pub struct EventBus {
    subscriptions: Arc<RwLock<Vec<Subscription>>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &"<opaque>")
            .finish()
    }
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a listener to one event group
    pub async fn subscribe(&self, group: EventGroup, listener: Arc<dyn EventListener>) {
        info!(listener = %listener.name(), group = ?group, "Event listener subscribed");

        let mut subscriptions = self.subscriptions.write().await;
        subscriptions.push(Subscription { group, listener });
    }

    /// Number of listeners subscribed to a group
    pub async fn listener_count(&self, group: EventGroup) -> usize {
        let subscriptions = self.subscriptions.read().await;
        subscriptions.iter().filter(|s| s.group == group).count()
    }

    /// Fire an event
    ///
    /// Returns `false` when a listener halted propagation. A listener error
    /// stops delivery and is returned as is.
    pub async fn fire(&self, event: &mut Event) -> Result<bool> {
        let group = event.group();
        let listeners: Vec<_> = {
            let subscriptions = self.subscriptions.read().await;
            subscriptions
                .iter()
                .filter(|s| s.group == group)
                .map(|s| Arc::clone(&s.listener))
                .collect()
        };

        debug!(event = %event.name(), listeners = listeners.len(), "Firing event");

        for listener in listeners {
            if !listener.handle(event).await? {
                info!(
                    event = %event.name(),
                    listener = %listener.name(),
                    "Event propagation halted"
                );
                return Ok(false);
            }
        }

        Ok(true)
    }
}

#[async_trait]
impl EventListener for EventDispatchEngine {
    fn name(&self) -> &str {
        "event-script-dispatch"
    }

    async fn handle(&self, event: &mut Event) -> Result<bool> {
        EventDispatchEngine::handle(self, event).await
    }
}

impl EventDispatchEngine {
    /// Subscribe this engine to the request-lifecycle and service groups
    pub async fn subscribe(self: &Arc<Self>, bus: &EventBus) {
        for group in [EventGroup::RequestLifecycle, EventGroup::Service] {
            bus.subscribe(group, Arc::clone(self) as Arc<dyn EventListener>)
                .await;
        }
    }
}
