use super::CustomEvent;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::trace;

pub type EventCallback = Arc<dyn Fn(&CustomEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub u64);

struct Registration {
    id: ListenerId,
    callback: EventCallback,
}

pub struct EventSystem {
    handlers: Arc<RwLock<HashMap<String, Vec<Registration>>>>,
    next_id: AtomicU64,
}

impl EventSystem {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn add_listener<F>(&self, event_type: &str, callback: F) -> ListenerId
    where
        F: Fn(&CustomEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut handlers = self.handlers.write().await;
        handlers
            .entry(event_type.to_string())
            .or_default()
            .push(Registration {
                id,
                callback: Arc::new(callback),
            });
        id
    }

    /// Returns false when the listener was already gone.
    pub async fn remove_listener(&self, id: ListenerId) -> bool {
        let mut handlers = self.handlers.write().await;
        let mut removed = false;
        for registrations in handlers.values_mut() {
            let before = registrations.len();
            registrations.retain(|r| r.id != id);
            removed |= registrations.len() != before;
        }
        handlers.retain(|_, registrations| !registrations.is_empty());
        removed
    }

    /// Invokes every listener registered for the event name and returns how
    /// many ran. Listeners may add or remove listeners while running.
    pub async fn dispatch(&self, event: CustomEvent) -> usize {
        let callbacks: Vec<EventCallback> = {
            let handlers = self.handlers.read().await;
            handlers
                .get(&event.name)
                .map(|regs| regs.iter().map(|r| Arc::clone(&r.callback)).collect())
                .unwrap_or_default()
        };
        trace!(event = %event.name, listeners = callbacks.len(), "dispatching");
        for callback in &callbacks {
            callback(&event);
        }
        callbacks.len()
    }

    pub async fn listener_count(&self, event_type: &str) -> usize {
        let handlers = self.handlers.read().await;
        handlers.get(event_type).map_or(0, Vec::len)
    }
}

impl Default for EventSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSystem")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish()
    }
}
