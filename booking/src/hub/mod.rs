//! Real-time notification hub.
//!
//! Two routing tables, user → channels and bus → channels, owned by one
//! [`NotificationHub`] instance. Each live connection holds the receiving
//! half of a bounded channel and drains it in its own loop, so per-channel
//! order is publish order.
//!
//! Delivery is at-most-once: [`NotificationHub::publish`] never waits. A
//! channel that is full or whose receiver is gone is deregistered on the
//! spot; its client re-fetches state when it reconnects.

pub mod notification;

pub use notification::{BusSummary, LocationPayload, Notification, TicketSummary};

use crate::types::{BusId, UserId};
use busline_runtime::metrics::HubMetrics;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{RwLock, mpsc};
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

/// Routing key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Booking and ticket events for one user
    User(UserId),
    /// Position updates for one bus
    Bus(BusId),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Bus(id) => write!(f, "bus:{id}"),
        }
    }
}

/// Identifies one registered channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChannelId(u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch-{}", self.0)
    }
}

/// A registered channel's receiving end.
#[derive(Debug)]
pub struct Subscription {
    /// Channel ID, needed to unsubscribe
    pub id: ChannelId,
    /// Where it is registered
    pub topic: Topic,
    /// Notifications in publish order
    pub receiver: mpsc::Receiver<Notification>,
}

/// Hub errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    /// Too many live channels
    #[error("Notification hub is at capacity ({limit} channels)")]
    AtCapacity {
        /// Configured maximum
        limit: usize,
    },
}

/// Hub sizing.
#[derive(Clone, Copy, Debug)]
pub struct HubConfig {
    /// Buffered notifications per channel before it counts as lagging
    pub channel_capacity: usize,
    /// Live channels across both tables
    pub max_channels: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            max_channels: 1000,
        }
    }
}

type Senders = HashMap<ChannelId, mpsc::Sender<Notification>>;

struct Routes<K> {
    table: RwLock<HashMap<K, Senders>>,
}

impl<K> Routes<K>
where
    K: Copy + Eq + Hash + fmt::Display,
{
    fn new() -> Self {
        Self {
            table: RwLock::new(HashMap::new()),
        }
    }

    async fn insert(&self, key: K, id: ChannelId, sender: mpsc::Sender<Notification>) {
        self.table
            .write()
            .await
            .entry(key)
            .or_default()
            .insert(id, sender);
    }

    async fn remove(&self, key: K, id: ChannelId) -> bool {
        let mut table = self.table.write().await;
        let Some(senders) = table.get_mut(&key) else {
            return false;
        };
        let removed = senders.remove(&id).is_some();
        if senders.is_empty() {
            table.remove(&key);
        }
        removed
    }

    /// Returns `(delivered, dropped)`.
    async fn publish(&self, key: K, notification: &Notification) -> (usize, usize) {
        let mut delivered = 0;
        let mut dead = Vec::new();

        {
            let table = self.table.read().await;
            let Some(senders) = table.get(&key) else {
                return (0, 0);
            };
            for (id, sender) in senders {
                match sender.try_send(notification.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(channel = %id, %key, "Channel lagging, dropping it");
                        dead.push(*id);
                    },
                    Err(TrySendError::Closed(_)) => {
                        tracing::debug!(channel = %id, %key, "Channel closed, dropping it");
                        dead.push(*id);
                    },
                }
            }
        }

        let mut dropped = 0;
        for id in dead {
            if self.remove(key, id).await {
                dropped += 1;
            }
        }
        (delivered, dropped)
    }

    async fn purge_closed(&self) -> usize {
        let mut table = self.table.write().await;
        let mut purged = 0;
        table.retain(|_, senders| {
            let before = senders.len();
            senders.retain(|_, sender| !sender.is_closed());
            purged += before - senders.len();
            !senders.is_empty()
        });
        purged
    }

    async fn clear(&self) -> usize {
        let mut table = self.table.write().await;
        let count: usize = table.values().map(HashMap::len).sum();
        table.clear();
        count
    }

    async fn count(&self, key: K) -> usize {
        self.table.read().await.get(&key).map_or(0, HashMap::len)
    }
}

struct Inner {
    users: Routes<UserId>,
    buses: Routes<BusId>,
    next_id: AtomicU64,
    active: AtomicUsize,
    config: HubConfig,
}

/// Fan-out of live notifications. Clones share the same tables.
#[derive(Clone)]
pub struct NotificationHub {
    inner: Arc<Inner>,
}

impl fmt::Debug for NotificationHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationHub")
            .field("active_channels", &self.active_channels())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

impl NotificationHub {
    /// Empty hub
    #[must_use]
    pub fn new(config: HubConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                users: Routes::new(),
                buses: Routes::new(),
                next_id: AtomicU64::new(1),
                active: AtomicUsize::new(0),
                config,
            }),
        }
    }

    /// Live channels across both tables
    #[must_use]
    pub fn active_channels(&self) -> usize {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Live channels under one topic
    pub async fn channel_count(&self, topic: Topic) -> usize {
        match topic {
            Topic::User(id) => self.inner.users.count(id).await,
            Topic::Bus(id) => self.inner.buses.count(id).await,
        }
    }

    /// Register a new channel under `topic`.
    ///
    /// # Errors
    ///
    /// [`HubError::AtCapacity`] when `max_channels` are already live.
    pub async fn subscribe(&self, topic: Topic) -> Result<Subscription, HubError> {
        let limit = self.inner.config.max_channels;
        self.inner
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            })
            .map_err(|_| HubError::AtCapacity { limit })?;

        let id = ChannelId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.inner.config.channel_capacity.max(1));

        match topic {
            Topic::User(user_id) => self.inner.users.insert(user_id, id, sender).await,
            Topic::Bus(bus_id) => self.inner.buses.insert(bus_id, id, sender).await,
        }

        HubMetrics::record_active(self.active_channels());
        tracing::debug!(channel = %id, %topic, "Channel subscribed");
        Ok(Subscription {
            id,
            topic,
            receiver,
        })
    }

    /// Deregister a channel. Returns whether it was still registered;
    /// calling it again is harmless.
    pub async fn unsubscribe(&self, topic: Topic, id: ChannelId) -> bool {
        let removed = match topic {
            Topic::User(user_id) => self.inner.users.remove(user_id, id).await,
            Topic::Bus(bus_id) => self.inner.buses.remove(bus_id, id).await,
        };
        if removed {
            self.release(1);
            tracing::debug!(channel = %id, %topic, "Channel unsubscribed");
        }
        removed
    }

    /// Deliver to every channel under `topic`; returns how many got it.
    ///
    /// Never blocks on a slow consumer and never fails: dead or lagging
    /// channels are dropped.
    pub async fn publish(&self, topic: Topic, notification: Notification) -> usize {
        let (delivered, dropped) = match topic {
            Topic::User(user_id) => self.inner.users.publish(user_id, &notification).await,
            Topic::Bus(bus_id) => self.inner.buses.publish(bus_id, &notification).await,
        };

        HubMetrics::record_delivered(delivered);
        if dropped > 0 {
            HubMetrics::record_dropped(dropped);
            self.release(dropped);
        }
        tracing::debug!(%topic, kind = notification.kind(), delivered, dropped, "Notification published");
        delivered
    }

    /// Drop channels whose receiver is gone. Returns how many.
    pub async fn purge_closed(&self) -> usize {
        let purged =
            self.inner.users.purge_closed().await + self.inner.buses.purge_closed().await;
        if purged > 0 {
            HubMetrics::record_dropped(purged);
            self.release(purged);
            tracing::debug!(purged, "Closed channels purged");
        }
        purged
    }

    /// Run [`purge_closed`](Self::purge_closed) every `every` until aborted.
    #[must_use]
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let hub = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                hub.purge_closed().await;
            }
        })
    }

    /// Empty both tables; every open receiver sees its channel close.
    pub async fn shutdown(&self) {
        let cleared = self.inner.users.clear().await + self.inner.buses.clear().await;
        self.release(cleared);
        tracing::info!(cleared, "Notification hub shut down");
    }

    fn release(&self, count: usize) {
        let _ = self
            .inner
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(count))
            });
        HubMetrics::record_active(self.active_channels());
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::Location;
    use busline_core::environment::Clock;
    use busline_testing::test_clock;

    fn location_update(bus_id: BusId) -> Notification {
        Notification::location_update(
            bus_id,
            Location {
                lat: 23.8,
                lng: 90.4,
                recorded_at: test_clock().now(),
            },
        )
    }

    #[tokio::test]
    async fn bus_topics_are_isolated() {
        let hub = NotificationHub::default();
        let (bus_7, bus_8) = (BusId::new(), BusId::new());
        let mut watching_7 = hub.subscribe(Topic::Bus(bus_7)).await.expect("subscribe");
        let mut watching_8 = hub.subscribe(Topic::Bus(bus_8)).await.expect("subscribe");

        assert_eq!(hub.publish(Topic::Bus(bus_7), location_update(bus_7)).await, 1);

        let received = watching_7.receiver.try_recv().expect("delivered");
        assert_eq!(received.kind(), "location_update");
        assert!(watching_8.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn dead_channel_is_dropped_without_affecting_others() {
        let hub = NotificationHub::default();
        let user = UserId::new();
        let dead = hub.subscribe(Topic::User(user)).await.expect("subscribe");
        let mut alive = hub.subscribe(Topic::User(user)).await.expect("subscribe");
        drop(dead.receiver);

        let bus_id = BusId::new();
        assert_eq!(hub.publish(Topic::User(user), location_update(bus_id)).await, 1);
        assert!(alive.receiver.try_recv().is_ok());
        assert_eq!(hub.channel_count(Topic::User(user)).await, 1);
        assert_eq!(hub.active_channels(), 1);
    }

    #[tokio::test]
    async fn lagging_channel_is_dropped() {
        let hub = NotificationHub::new(HubConfig {
            channel_capacity: 1,
            max_channels: 10,
        });
        let bus_id = BusId::new();
        let mut slow = hub.subscribe(Topic::Bus(bus_id)).await.expect("subscribe");

        assert_eq!(hub.publish(Topic::Bus(bus_id), location_update(bus_id)).await, 1);
        assert_eq!(hub.publish(Topic::Bus(bus_id), location_update(bus_id)).await, 0);
        assert_eq!(hub.active_channels(), 0);

        // The buffered message is still readable, then the channel ends.
        assert!(slow.receiver.recv().await.is_some());
        assert!(slow.receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let hub = NotificationHub::default();
        let topic = Topic::User(UserId::new());
        let subscription = hub.subscribe(topic).await.expect("subscribe");

        assert!(hub.unsubscribe(topic, subscription.id).await);
        assert!(!hub.unsubscribe(topic, subscription.id).await);
        assert_eq!(hub.active_channels(), 0);
    }

    #[tokio::test]
    async fn capacity_is_enforced() {
        let hub = NotificationHub::new(HubConfig {
            channel_capacity: 4,
            max_channels: 1,
        });
        let _first = hub.subscribe(Topic::User(UserId::new())).await.expect("subscribe");

        let second = hub.subscribe(Topic::Bus(BusId::new())).await;
        assert_eq!(second.err(), Some(HubError::AtCapacity { limit: 1 }));
    }

    #[tokio::test]
    async fn purge_removes_closed_channels() {
        let hub = NotificationHub::default();
        let bus_id = BusId::new();
        let gone = hub.subscribe(Topic::Bus(bus_id)).await.expect("subscribe");
        let _kept = hub.subscribe(Topic::Bus(bus_id)).await.expect("subscribe");
        drop(gone);

        assert_eq!(hub.purge_closed().await, 1);
        assert_eq!(hub.channel_count(Topic::Bus(bus_id)).await, 1);
    }

    #[tokio::test]
    async fn shutdown_closes_every_receiver() {
        let hub = NotificationHub::default();
        let mut subscription = hub.subscribe(Topic::User(UserId::new())).await.expect("subscribe");

        hub.shutdown().await;

        assert_eq!(hub.active_channels(), 0);
        assert!(subscription.receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn publish_without_subscribers_delivers_nothing() {
        let hub = NotificationHub::default();
        let bus_id = BusId::new();
        assert_eq!(hub.publish(Topic::Bus(bus_id), location_update(bus_id)).await, 0);
    }
}
