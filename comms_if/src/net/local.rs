//! # Local bus
//!
//! An in-process [`Transport`]. Messages are serialised to JSON on publish and deserialised for
//! each subscriber, so the bus behaves like a real network link: subscribers only ever see
//! well-formed messages of the type they asked for, anything else is dropped with a warning.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    collections::HashMap,
    marker::PhantomData,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, RwLock, Weak,
    },
};

use log::{trace, warn};
use serde::{de::DeserializeOwned, Serialize};

use super::{validate_topic, NetError, Publisher, Subscription, Transport};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

type RawCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// In-process message bus.
///
/// Cloning the bus gives another handle onto the same set of topics.
#[derive(Clone)]
pub struct LocalBus {
    shared: Arc<Shared>,
}

struct Shared {
    ready: AtomicBool,
    next_id: AtomicU64,
    topics: RwLock<HashMap<String, Vec<(u64, RawCallback)>>>,
}

/// Publisher handed out by [`LocalBus::advertise`].
pub struct LocalPublisher<M> {
    bus: LocalBus,
    topic: String,
    _msg: PhantomData<fn(&M)>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LocalBus {
    /// Create a new, ready, bus with no topics.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                ready: AtomicBool::new(true),
                next_id: AtomicU64::new(0),
                topics: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Set whether or not the bus reports itself as ready.
    pub fn set_ready(&self, ready: bool) {
        self.shared.ready.store(ready, Ordering::Relaxed);
    }

    /// Publish a message on the given topic.
    ///
    /// Returns the number of subscribers the message was delivered to.
    pub fn publish<M: Serialize>(&self, topic: &str, msg: &M) -> Result<usize, NetError> {
        let raw = serde_json::to_string(msg).map_err(NetError::SerializationError)?;
        self.publish_raw(topic, &raw)
    }

    /// Publish an already serialised message on the given topic.
    pub fn publish_raw(&self, topic: &str, raw: &str) -> Result<usize, NetError> {
        if !self.is_ready() {
            return Err(NetError::NotReady);
        }

        // Take copies of the callbacks so the lock is released before any of them run, callbacks
        // are then free to publish or subscribe themselves.
        let callbacks = {
            let topics = self.shared.topics.read().map_err(|_| NetError::PoisonError)?;
            match topics.get(topic) {
                Some(cbs) => cbs.iter().map(|(_, cb)| cb.clone()).collect(),
                None => Vec::new(),
            }
        };

        trace!("LocalBus: {} -> {} subscriber(s)", topic, callbacks.len());

        for cb in callbacks.iter() {
            cb(raw);
        }

        Ok(callbacks.len())
    }

    /// Number of subscribers on the given topic.
    pub fn num_subscribers(&self, topic: &str) -> usize {
        match self.shared.topics.read() {
            Ok(t) => t.get(topic).map(|cbs| cbs.len()).unwrap_or(0),
            Err(_) => 0,
        }
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for LocalBus {
    fn is_ready(&self) -> bool {
        self.shared.ready.load(Ordering::Relaxed)
    }

    fn subscribe<M, F>(&self, topic: &str, callback: F) -> Result<Subscription, NetError>
    where
        M: DeserializeOwned + Send + 'static,
        F: Fn(M) + Send + Sync + 'static,
    {
        validate_topic(topic)?;

        let topic_name = String::from(topic);
        let raw_cb: RawCallback = Arc::new(move |raw: &str| match serde_json::from_str::<M>(raw) {
            Ok(m) => callback(m),
            Err(e) => warn!("Dropping malformed message on {}: {}", topic_name, e),
        });

        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        self.shared
            .topics
            .write()
            .map_err(|_| NetError::PoisonError)?
            .entry(String::from(topic))
            .or_insert_with(Vec::new)
            .push((id, raw_cb));

        let shared = Arc::downgrade(&self.shared);
        let topic_name = String::from(topic);
        Ok(Subscription::new(topic, move || {
            remove_subscriber(&shared, &topic_name, id)
        }))
    }

    fn advertise<M>(&self, topic: &str) -> Result<Box<dyn Publisher<M>>, NetError>
    where
        M: Serialize + Send + 'static,
    {
        validate_topic(topic)?;

        Ok(Box::new(LocalPublisher {
            bus: self.clone(),
            topic: String::from(topic),
            _msg: PhantomData,
        }))
    }
}

impl<M> Publisher<M> for LocalPublisher<M>
where
    M: Serialize + Send,
{
    fn topic(&self) -> &str {
        &self.topic
    }

    fn publish(&self, msg: &M) -> Result<(), NetError> {
        self.bus.publish(&self.topic, msg).map(|_| ())
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Remove subscriber `id` from `topic`, if the bus still exists.
fn remove_subscriber(shared: &Weak<Shared>, topic: &str, id: u64) {
    let shared = match shared.upgrade() {
        Some(s) => s,
        None => return,
    };

    match shared.topics.write() {
        Ok(mut topics) => {
            if let Some(cbs) = topics.get_mut(topic) {
                cbs.retain(|(i, _)| *i != id);
                if cbs.is_empty() {
                    topics.remove(topic);
                }
            }
            trace!("LocalBus: unsubscribed {} from {}", id, topic);
        }
        Err(_) => warn!("LocalBus: topic map poisoned, could not unsubscribe from {}", topic),
    };
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
