// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Consumers
//!
//! Consumer-side internals shared by the client: the tag map remembering the
//! broker-assigned consumer tag per channel name, and the delivery loop that
//! wraps each delivery into a [`Message`] and hands it to the caller-supplied
//! handler.
//!
//! At most one consumer is remembered per channel name. A name with a live
//! consumer rejects a second registration; cancelling or closing the channel
//! forgets the tag and frees the name again. The loop never acks on the
//! handler's behalf; undecodable payloads are the one exception, they are
//! nacked without requeue and dropped.

use crate::{
    errors::AmqpError,
    message::{Message, MessageHandler},
};
use futures_util::StreamExt;
use lapin::{options::BasicNackOptions, Consumer};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use tracing::error;

/// Consumer tags remembered per channel name.
///
/// Registration is two-step: `reserve` claims the name before the broker
/// round-trip, `remember` stores the broker-assigned tag once the consumer
/// exists. A failed registration must `forget` its reservation.
pub(crate) struct ConsumerTags {
    tags: Mutex<HashMap<String, String>>,
}

impl ConsumerTags {
    pub(crate) fn new() -> ConsumerTags {
        ConsumerTags {
            tags: Mutex::new(HashMap::default()),
        }
    }

    /// Claims `channel` for a new consumer.
    ///
    /// Fails with `ConsumerAlreadyRegisteredError` when the name already has
    /// a live or in-flight consumer, so a second `consume` on the same name
    /// never silently overwrites the remembered tag.
    pub(crate) async fn reserve(&self, channel: &str) -> Result<(), AmqpError> {
        let mut tags = self.tags.lock().await;

        if tags.contains_key(channel) {
            return Err(AmqpError::ConsumerAlreadyRegisteredError(
                channel.to_owned(),
            ));
        }

        tags.insert(channel.to_owned(), String::default());

        Ok(())
    }

    /// Stores the broker-assigned tag for a reserved name.
    pub(crate) async fn remember(&self, channel: &str, tag: &str) {
        self.tags
            .lock()
            .await
            .insert(channel.to_owned(), tag.to_owned());
    }

    /// Returns the tag remembered for `channel`.
    ///
    /// A reserved name whose registration has not completed yet counts as
    /// absent.
    pub(crate) async fn get(&self, channel: &str) -> Result<String, AmqpError> {
        let tags = self.tags.lock().await;

        match tags.get(channel) {
            Some(tag) if !tag.is_empty() => Ok(tag.clone()),
            _ => Err(AmqpError::ConsumerNotFoundError(channel.to_owned())),
        }
    }

    /// Forgets the tag for `channel`, freeing the name for a new consumer.
    pub(crate) async fn forget(&self, channel: &str) {
        self.tags.lock().await.remove(channel);
    }
}

pub(crate) async fn consumer_loop(mut consumer: Consumer, handler: Arc<dyn MessageHandler>) {
    while let Some(result) = consumer.next().await {
        match result {
            Ok(delivery) => match Message::from_delivery(&delivery) {
                Ok(message) => handler.handle(message).await,
                Err(err) => {
                    error!(
                        error = err.to_string(),
                        "removing undecodable message from the queue"
                    );

                    if let Err(err) = delivery
                        .nack(BasicNackOptions {
                            multiple: false,
                            requeue: false,
                        })
                        .await
                    {
                        error!(error = err.to_string(), "error to nack the message");
                    }
                }
            },
            Err(err) => error!(error = err.to_string(), "error receiving a delivery"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn a_second_consumer_on_the_same_channel_is_rejected() {
        let tags = ConsumerTags::new();

        tags.reserve("worker").await.unwrap();
        tags.remember("worker", "ctag-1").await;

        assert_eq!(
            tags.reserve("worker").await,
            Err(AmqpError::ConsumerAlreadyRegisteredError("worker".to_owned()))
        );
        assert_eq!(tags.get("worker").await.unwrap(), "ctag-1");
    }

    #[tokio::test]
    async fn an_in_flight_registration_already_blocks_the_name() {
        let tags = ConsumerTags::new();

        tags.reserve("worker").await.unwrap();

        assert_eq!(
            tags.reserve("worker").await,
            Err(AmqpError::ConsumerAlreadyRegisteredError("worker".to_owned()))
        );
    }

    #[tokio::test]
    async fn forgetting_the_tag_frees_the_name_for_a_new_consumer() {
        let tags = ConsumerTags::new();

        tags.reserve("worker").await.unwrap();
        tags.remember("worker", "ctag-1").await;

        tags.forget("worker").await;

        tags.reserve("worker").await.unwrap();
        tags.remember("worker", "ctag-2").await;
        assert_eq!(tags.get("worker").await.unwrap(), "ctag-2");
    }

    #[tokio::test]
    async fn a_failed_registration_releases_its_reservation() {
        let tags = ConsumerTags::new();

        tags.reserve("worker").await.unwrap();
        tags.forget("worker").await;

        tags.reserve("worker").await.unwrap();
    }

    #[tokio::test]
    async fn unregistered_names_have_no_tag() {
        let tags = ConsumerTags::new();

        assert_eq!(
            tags.get("worker").await,
            Err(AmqpError::ConsumerNotFoundError("worker".to_owned()))
        );
    }

    #[tokio::test]
    async fn a_reserved_but_incomplete_registration_has_no_tag() {
        let tags = ConsumerTags::new();

        tags.reserve("worker").await.unwrap();

        assert_eq!(
            tags.get("worker").await,
            Err(AmqpError::ConsumerNotFoundError("worker".to_owned()))
        );
    }
}
