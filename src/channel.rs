// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Channel Registry
//!
//! Maps a logical channel name to a lazily-created confirm channel on the
//! shared broker connection. Callers refer to channels by name everywhere in
//! this crate, so publishers, consumers and topology setup can share a
//! channel without passing handles around.
//!
//! Resolution is idempotent: at most one channel is ever created per name,
//! even when several tasks resolve the same unregistered name concurrently.
//! Later callers await the in-flight creation instead of starting their own.

use crate::errors::AmqpError;
use async_trait::async_trait;
use lapin::{options::ConfirmSelectOptions, Channel, Connection};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, error};

/// Creates channels on demand for the registry.
///
/// The production implementation opens confirm channels on the shared lapin
/// connection; tests substitute an in-memory factory.
#[async_trait]
pub trait ChannelFactory: Send + Sync {
    type Channel: Clone + Send + Sync;

    async fn create(&self, name: &str) -> Result<Self::Channel, AmqpError>;
}

/// Opens confirm-mode channels on the shared broker connection.
pub struct ConfirmChannelFactory {
    connection: Arc<Connection>,
}

impl ConfirmChannelFactory {
    pub fn new(connection: Arc<Connection>) -> ConfirmChannelFactory {
        ConfirmChannelFactory { connection }
    }
}

#[async_trait]
impl ChannelFactory for ConfirmChannelFactory {
    type Channel = Channel;

    async fn create(&self, name: &str) -> Result<Channel, AmqpError> {
        debug!(channel = name, "creating amqp channel...");

        let channel = match self.connection.create_channel().await {
            Ok(c) => Ok(c),
            Err(err) => {
                error!(
                    error = err.to_string(),
                    channel = name,
                    "error to create the channel"
                );
                Err(AmqpError::ChannelCreationError(name.to_owned()))
            }
        }?;

        match channel
            .confirm_select(ConfirmSelectOptions { nowait: false })
            .await
        {
            Ok(_) => {
                debug!(channel = name, "channel created");
                Ok(channel)
            }
            Err(err) => {
                error!(
                    error = err.to_string(),
                    channel = name,
                    "error to put the channel in confirm mode"
                );
                Err(AmqpError::ChannelCreationError(name.to_owned()))
            }
        }
    }
}

/// Registry of named channels with idempotent get-or-create semantics.
///
/// Each name owns a `OnceCell` slot: the first resolver runs the factory,
/// concurrent resolvers of the same name await the same cell, and a failed
/// creation leaves the slot empty so the next resolve retries.
pub struct ChannelRegistry<F: ChannelFactory> {
    factory: F,
    channels: Mutex<HashMap<String, Arc<OnceCell<F::Channel>>>>,
}

impl<F: ChannelFactory> ChannelRegistry<F> {
    pub fn new(factory: F) -> ChannelRegistry<F> {
        ChannelRegistry {
            factory,
            channels: Mutex::new(HashMap::default()),
        }
    }

    /// Returns the channel registered under `name`, creating it on first use.
    pub async fn resolve(&self, name: &str) -> Result<F::Channel, AmqpError> {
        let cell = {
            let mut channels = self.channels.lock().await;
            channels.entry(name.to_owned()).or_default().clone()
        };

        let channel = cell
            .get_or_try_init(|| self.factory.create(name))
            .await?
            .clone();

        Ok(channel)
    }

    /// Returns the channel registered under `name` without creating one.
    pub async fn get(&self, name: &str) -> Result<F::Channel, AmqpError> {
        let channels = self.channels.lock().await;

        match channels.get(name).and_then(|cell| cell.get()) {
            Some(channel) => Ok(channel.clone()),
            None => Err(AmqpError::ChannelNotFoundError(name.to_owned())),
        }
    }

    /// Removes the channel registered under `name` and hands it back to the
    /// caller for the broker-side close.
    ///
    /// A name whose creation never completed counts as unregistered.
    pub async fn remove(&self, name: &str) -> Result<F::Channel, AmqpError> {
        let mut channels = self.channels.lock().await;

        let channel = match channels.get(name).and_then(|cell| cell.get()) {
            Some(channel) => channel.clone(),
            None => return Err(AmqpError::ChannelNotFoundError(name.to_owned())),
        };

        channels.remove(name);
        debug!(channel = name, "channel removed from the registry");

        Ok(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFactory {
        created: AtomicUsize,
        fail_first: AtomicUsize,
    }

    impl CountingFactory {
        fn new() -> CountingFactory {
            CountingFactory {
                created: AtomicUsize::new(0),
                fail_first: AtomicUsize::new(0),
            }
        }

        fn failing_once() -> CountingFactory {
            CountingFactory {
                created: AtomicUsize::new(0),
                fail_first: AtomicUsize::new(1),
            }
        }
    }

    #[async_trait]
    impl ChannelFactory for CountingFactory {
        type Channel = usize;

        async fn create(&self, name: &str) -> Result<usize, AmqpError> {
            if self.fail_first.load(Ordering::SeqCst) > 0 {
                self.fail_first.fetch_sub(1, Ordering::SeqCst);
                return Err(AmqpError::ChannelCreationError(name.to_owned()));
            }

            tokio::task::yield_now().await;

            Ok(self.created.fetch_add(1, Ordering::SeqCst))
        }
    }

    #[tokio::test]
    async fn resolve_creates_the_channel_once_per_name() {
        let registry = ChannelRegistry::new(CountingFactory::new());

        let first = registry.resolve("publisher").await.unwrap();
        let second = registry.resolve("publisher").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(registry.factory.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_resolves_of_the_same_name_share_one_creation() {
        let registry = Arc::new(ChannelRegistry::new(CountingFactory::new()));

        let (first, second) = tokio::join!(
            registry.resolve("publisher"),
            registry.resolve("publisher")
        );

        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(registry.factory.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_names_get_independent_channels() {
        let registry = ChannelRegistry::new(CountingFactory::new());

        let publisher = registry.resolve("publisher").await.unwrap();
        let consumer = registry.resolve("consumer").await.unwrap();

        assert_ne!(publisher, consumer);
        assert_eq!(registry.factory.created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_creation_is_retried_on_the_next_resolve() {
        let registry = ChannelRegistry::new(CountingFactory::failing_once());

        let failed = registry.resolve("publisher").await;
        assert_eq!(
            failed,
            Err(AmqpError::ChannelCreationError("publisher".to_owned()))
        );

        registry.resolve("publisher").await.unwrap();
        assert_eq!(registry.factory.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn get_never_creates_a_channel() {
        let registry = ChannelRegistry::new(CountingFactory::new());

        let missing = registry.get("publisher").await;

        assert_eq!(
            missing,
            Err(AmqpError::ChannelNotFoundError("publisher".to_owned()))
        );
        assert_eq!(registry.factory.created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn remove_unregisters_the_name() {
        let registry = ChannelRegistry::new(CountingFactory::new());

        registry.resolve("publisher").await.unwrap();
        registry.remove("publisher").await.unwrap();

        assert_eq!(
            registry.get("publisher").await,
            Err(AmqpError::ChannelNotFoundError("publisher".to_owned()))
        );
    }

    #[tokio::test]
    async fn remove_of_an_unregistered_name_fails() {
        let registry = ChannelRegistry::new(CountingFactory::new());

        assert_eq!(
            registry.remove("publisher").await,
            Err(AmqpError::ChannelNotFoundError("publisher".to_owned()))
        );
    }
}
