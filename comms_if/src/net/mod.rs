//! # Network Module
//!
//! This module provides the messaging abstraction used by the actor controller. The controller
//! never talks to a middleware directly, instead it is handed a [`Transport`] which it uses to
//! subscribe to its command topics and to advertise its odometry topic.
//!
//! Messages are identified by topic name only, the type carried on a topic is agreed between the
//! publisher and subscriber. A [`LocalBus`] is provided for in-process use, bridges to other
//! middlewares implement [`Transport`] themselves.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod local;

pub use local::LocalBus;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{de::DeserializeOwned, Serialize};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A messaging layer able to deliver messages to subscribers and carry published messages away.
pub trait Transport {
    /// Returns `true` if the transport has been initialised and can carry messages.
    fn is_ready(&self) -> bool;

    /// Subscribe to the given topic.
    ///
    /// The `callback` is called on the transport's delivery thread for every message received on
    /// the topic. It must not block, typically it will just push the message into a queue.
    ///
    /// The subscription lasts until the returned handle is dropped.
    fn subscribe<M, F>(&self, topic: &str, callback: F) -> Result<Subscription, NetError>
    where
        M: DeserializeOwned + Send + 'static,
        F: Fn(M) + Send + Sync + 'static;

    /// Advertise a topic, returning the publisher used to send messages on it.
    fn advertise<M>(&self, topic: &str) -> Result<Box<dyn Publisher<M>>, NetError>
    where
        M: Serialize + Send + 'static;
}

/// Publishing end of a topic.
pub trait Publisher<M>: Send {
    /// Name of the topic this publisher sends on.
    fn topic(&self) -> &str;

    /// Publish a message. Delivery is best effort.
    fn publish(&self, msg: &M) -> Result<(), NetError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Handle to a subscription made through a [`Transport`].
///
/// Dropping the handle removes the subscription, after which the callback is never called again.
#[must_use = "the subscription is removed when the handle is dropped"]
pub struct Subscription {
    topic: String,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Subscription {
    /// Create a new handle, `cancel` is run once when the handle is dropped.
    pub fn new<F>(topic: &str, cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            topic: String::from(topic),
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .finish()
    }
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum NetError {
    #[error("The transport is not ready")]
    NotReady,

    #[error("Invalid topic name: {0:?}")]
    InvalidTopic(String),

    #[error("Could not serialize the message: {0}")]
    SerializationError(serde_json::Error),

    #[error("Sync primitive is poisoned")]
    PoisonError,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Check that the topic name is usable.
///
/// Topics must be non-empty and must not contain whitespace.
pub fn validate_topic(topic: &str) -> Result<(), NetError> {
    if topic.is_empty() || topic.chars().any(char::is_whitespace) {
        Err(NetError::InvalidTopic(String::from(topic)))
    } else {
        Ok(())
    }
}
