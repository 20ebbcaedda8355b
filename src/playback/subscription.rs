use crate::error::{BagpiperError, Result};
use crate::playback::Callback;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Handle returned by a subscription. Unique per registry, increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// A registered callback and its handle
pub struct Subscriber {
    pub id: SubscriptionId,
    pub callback: Callback,
}

/// Address of the callback allocation
type CallbackKey = usize;

fn callback_key(callback: &Callback) -> CallbackKey {
    Arc::as_ptr(callback) as *const () as usize
}

/// Topic subscriptions, indexed both ways
///
/// The forward map keeps subscribers of a topic in registration order, which
/// is the order they receive each message. The reverse map ties each
/// callback to the single topic it is subscribed to.
#[derive(Default)]
pub struct SubscriptionRegistry {
    by_topic: HashMap<String, Vec<Subscriber>>,
    by_callback: HashMap<CallbackKey, String>,
    next_id: u64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, topic: &str, callback: Callback) -> Result<SubscriptionId> {
        let key = callback_key(&callback);
        if let Some(existing) = self.by_callback.get(&key) {
            return Err(BagpiperError::CallbackAlreadyRegistered {
                topic: existing.clone(),
            });
        }

        let id = SubscriptionId(self.next_id);
        self.next_id += 1;

        self.by_callback.insert(key, topic.to_string());
        self.by_topic
            .entry(topic.to_string())
            .or_default()
            .push(Subscriber { id, callback });
        Ok(id)
    }

    pub fn unsubscribe(&mut self, callback: &Callback) -> Result<SubscriptionId> {
        let key = callback_key(callback);
        let topic = self
            .by_callback
            .get(&key)
            .ok_or(BagpiperError::CallbackNotRegistered)?
            .clone();
        let inconsistent = || BagpiperError::InconsistentSubscription { topic: topic.clone() };

        let subscribers = self.by_topic.get_mut(&topic).ok_or_else(inconsistent)?;
        let pos = subscribers
            .iter()
            .position(|s| callback_key(&s.callback) == key)
            .ok_or_else(inconsistent)?;
        let removed = subscribers.remove(pos);
        if subscribers.is_empty() {
            self.by_topic.remove(&topic);
        }
        self.by_callback.remove(&key);
        Ok(removed.id)
    }

    /// Topic a callback is subscribed to
    pub fn topic_of(&self, callback: &Callback) -> Option<&str> {
        self.by_callback.get(&callback_key(callback)).map(String::as_str)
    }

    /// Subscribers of a topic, in registration order
    pub fn subscribers(&self, topic: &str) -> &[Subscriber] {
        self.by_topic.get(topic).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every topic with at least one subscriber
    pub fn topics(&self) -> impl Iterator<Item = (&str, &[Subscriber])> {
        self.by_topic.iter().map(|(topic, subs)| (topic.as_str(), subs.as_slice()))
    }

    /// Every registered callback
    pub fn callbacks(&self) -> impl Iterator<Item = &Callback> {
        self.by_topic.values().flatten().map(|s| &s.callback)
    }

    pub fn len(&self) -> usize {
        self.by_callback.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_callback.is_empty()
    }
}
