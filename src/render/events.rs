//! Side-channel event delivery
//!
//! Every page being rendered gets an id. Listeners attach to one page id and
//! collect the payloads published for it. A [`Listener`] detaches itself when
//! dropped, which covers success, failure and a render future cancelled by a
//! timeout alike.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// A JSON payload observed on a background request of a rendered page
#[derive(Debug, Clone, PartialEq)]
pub struct SideChannelEvent {
    /// URL of the background request
    pub url: String,
    /// Parsed response body
    pub payload: Value,
}

#[derive(Debug, Default)]
struct HubInner {
    next_page: u64,
    next_listener: u64,
    listeners: HashMap<u64, Registration>,
}

#[derive(Debug)]
struct Registration {
    page: u64,
    events: Vec<SideChannelEvent>,
}

/// Routes side-channel events to the listeners of the page that produced them
#[derive(Debug, Clone, Default)]
pub struct EventHub {
    inner: Arc<Mutex<HubInner>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates an id for a page about to be rendered
    pub fn open_page(&self) -> u64 {
        let mut inner = self.lock();
        inner.next_page += 1;
        inner.next_page
    }

    /// Attaches a listener to `page`
    pub fn attach(&self, page: u64) -> Listener {
        let mut inner = self.lock();
        inner.next_listener += 1;
        let id = inner.next_listener;
        inner.listeners.insert(
            id,
            Registration {
                page,
                events: Vec::new(),
            },
        );

        Listener {
            hub: self.clone(),
            id,
        }
    }

    /// Delivers `event` to every listener attached to `page`
    ///
    /// Returns the number of listeners that received it. Events for a page
    /// with no listener are discarded.
    pub fn publish(&self, page: u64, event: SideChannelEvent) -> usize {
        let mut inner = self.lock();
        let mut delivered = 0;

        for registration in inner.listeners.values_mut() {
            if registration.page == page {
                registration.events.push(event.clone());
                delivered += 1;
            }
        }

        delivered
    }

    /// Number of listeners currently attached, across all pages
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Handle on an attached listener; detaches on drop
#[derive(Debug)]
pub struct Listener {
    hub: EventHub,
    id: u64,
}

impl Listener {
    /// Takes every event received so far
    pub fn drain(&self) -> Vec<SideChannelEvent> {
        self.hub
            .lock()
            .listeners
            .get_mut(&self.id)
            .map(|registration| std::mem::take(&mut registration.events))
            .unwrap_or_default()
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.hub.lock().listeners.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(asin: &str) -> SideChannelEvent {
        SideChannelEvent {
            url: "https://shop.example/ajax/twister".to_string(),
            payload: json!({ "ASIN": asin }),
        }
    }

    #[test]
    fn test_events_reach_only_their_page() {
        let hub = EventHub::new();
        let first = hub.open_page();
        let second = hub.open_page();
        assert_ne!(first, second);

        let listener_a = hub.attach(first);
        let listener_b = hub.attach(second);

        assert_eq!(hub.publish(first, event("AAAAAAAAAA")), 1);
        assert_eq!(hub.publish(second, event("BBBBBBBBBB")), 1);

        assert_eq!(listener_a.drain(), vec![event("AAAAAAAAAA")]);
        assert_eq!(listener_b.drain(), vec![event("BBBBBBBBBB")]);
    }

    #[test]
    fn test_drain_empties_the_buffer() {
        let hub = EventHub::new();
        let page = hub.open_page();
        let listener = hub.attach(page);

        hub.publish(page, event("AAAAAAAAAA"));
        assert_eq!(listener.drain().len(), 1);
        assert!(listener.drain().is_empty());
    }

    #[test]
    fn test_drop_detaches() {
        let hub = EventHub::new();
        let page = hub.open_page();

        {
            let _listener = hub.attach(page);
            assert_eq!(hub.listener_count(), 1);
        }

        assert_eq!(hub.listener_count(), 0);
        assert_eq!(hub.publish(page, event("AAAAAAAAAA")), 0);
    }

    #[tokio::test]
    async fn test_cancelled_future_detaches() {
        let hub = EventHub::new();
        let page = hub.open_page();

        let task_hub = hub.clone();
        let pending = async move {
            let _listener = task_hub.attach(page);
            std::future::pending::<()>().await;
        };

        let result =
            tokio::time::timeout(std::time::Duration::from_millis(20), pending).await;
        assert!(result.is_err());
        assert_eq!(hub.listener_count(), 0);
    }
}
