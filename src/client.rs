// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Client
//!
//! [`AmqpClient`] owns the shared broker connection, the named-channel
//! registry and the consumer-tag map, and exposes the publish / consume /
//! ack / nack helpers, all keyed by logical channel name. It is a plain
//! caller-owned object; a process may hold several clients against
//! independent brokers.
//!
//! The client is also the production [`TopologyTarget`]: topology
//! declarations resolve their channel through the registry and are asserted
//! on it one at a time.

use crate::{
    channel::{ChannelRegistry, ConfirmChannelFactory},
    config::ConnectOptions,
    consumer::{consumer_loop, ConsumerTags},
    errors::AmqpError,
    exchange::ExchangeDeclaration,
    message::{Message, MessageHandler},
    queue::{BindingDeclaration, QueueDeclaration},
    topology::{
        Topology, TopologyTarget, AMQP_HEADERS_MAX_LENGTH, AMQP_HEADERS_MAX_LENGTH_BYTES,
        AMQP_HEADERS_MESSAGE_TTL,
    },
};
use async_trait::async_trait;
use lapin::{
    options::{
        BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicNackOptions,
        BasicPublishOptions, BasicQosOptions, ExchangeDeclareOptions, QueueBindOptions,
        QueueDeclareOptions,
    },
    types::{AMQPValue, FieldTable, LongInt, LongString, ShortString},
    BasicProperties, Connection, ConnectionProperties,
};
use serde::Serialize;
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, error};
use uuid::Uuid;

/// Default content type for JSON messages
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Reply code sent on an orderly channel close
const REPLY_SUCCESS: u16 = 200;

/// Client over one shared broker connection with named channels.
///
/// The connection is owned by the registry's channel factory and lives as
/// long as the client.
pub struct AmqpClient {
    channels: ChannelRegistry<ConfirmChannelFactory>,
    consumers: ConsumerTags,
}

impl AmqpClient {
    /// Connects to the broker and returns a ready client.
    ///
    /// Exactly one of the connection URL or the structured descriptor must
    /// be present in `options`; otherwise this fails with
    /// `ConfigurationError` before any broker call.
    pub async fn connect(options: &ConnectOptions) -> Result<AmqpClient, AmqpError> {
        let uri = options.amqp_uri()?;

        let name = options
            .connection_name
            .clone()
            .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_owned());

        debug!("creating amqp connection...");
        let properties =
            ConnectionProperties::default().with_connection_name(LongString::from(name));

        let connection = match Connection::connect(&uri, properties).await {
            Ok(c) => Ok(c),
            Err(err) => {
                error!(error = err.to_string(), "failure to connect");
                Err(AmqpError::ConnectionError)
            }
        }?;
        debug!("amqp connected");

        Ok(AmqpClient {
            channels: ChannelRegistry::new(ConfirmChannelFactory::new(Arc::new(connection))),
            consumers: ConsumerTags::new(),
        })
    }

    /// Applies a declarative topology against the broker.
    ///
    /// See [`Topology::apply`] for ordering and failure semantics.
    pub async fn setup_topology(&self, topology: &Topology) -> Result<(), AmqpError> {
        topology.apply(self).await
    }

    /// Serializes `payload` as UTF-8 JSON and publishes it with default
    /// publish options.
    ///
    /// The channel is created on first use. Publisher confirms are not
    /// awaited here; the channel is in confirm mode, so the broker still
    /// tracks them on its side.
    pub async fn publish<T: Serialize + ?Sized>(
        &self,
        channel: &str,
        exchange: &str,
        routing_key: &str,
        payload: &T,
    ) -> Result<(), AmqpError> {
        self.publish_with_options(
            channel,
            exchange,
            routing_key,
            payload,
            BasicPublishOptions::default(),
        )
        .await
    }

    /// Serializes `payload` as UTF-8 JSON and publishes it.
    pub async fn publish_with_options<T: Serialize + ?Sized>(
        &self,
        channel: &str,
        exchange: &str,
        routing_key: &str,
        payload: &T,
        options: BasicPublishOptions,
    ) -> Result<(), AmqpError> {
        let data = match serde_json::to_vec(payload) {
            Ok(data) => Ok(data),
            Err(err) => {
                error!(error = err.to_string(), "failure to serialize the payload");
                Err(AmqpError::ParsePayloadError)
            }
        }?;

        let ch = self.channels.resolve(channel).await?;

        match ch
            .basic_publish(
                exchange,
                routing_key,
                options,
                &data,
                BasicProperties::default()
                    .with_content_type(ShortString::from(JSON_CONTENT_TYPE))
                    .with_message_id(ShortString::from(Uuid::new_v4().to_string())),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error publishing message");
                Err(AmqpError::PublishError)
            }
            _ => Ok(()),
        }
    }

    /// Registers a consumer on `queue` over the named channel and spawns the
    /// delivery loop feeding `handler`.
    ///
    /// The broker-assigned consumer tag is remembered under the channel
    /// name. A channel name with a live consumer rejects a second `consume`
    /// with `ConsumerAlreadyRegisteredError`; cancel or close the channel
    /// first.
    pub async fn consume(
        &self,
        channel: &str,
        queue: &str,
        options: BasicConsumeOptions,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), AmqpError> {
        self.consumers.reserve(channel).await?;

        let ch = match self.channels.resolve(channel).await {
            Ok(ch) => ch,
            Err(err) => {
                self.consumers.forget(channel).await;
                return Err(err);
            }
        };

        let consumer = match ch
            .basic_consume(queue, "", options, FieldTable::default())
            .await
        {
            Ok(c) => c,
            Err(err) => {
                error!(error = err.to_string(), queue, "error to create the consumer");
                self.consumers.forget(channel).await;
                return Err(AmqpError::ConsumeSetupError(queue.to_owned()));
            }
        };

        self.consumers
            .remember(channel, consumer.tag().as_str())
            .await;
        debug!(channel, queue, "consumer registered");

        tokio::spawn(consumer_loop(consumer, handler));

        Ok(())
    }

    /// Acknowledges a message on an already-registered channel.
    ///
    /// Ack requires the channel to exist, so unlike publish/consume this
    /// never creates one; an unregistered name fails with
    /// `ChannelNotFoundError` before any broker call.
    pub async fn ack(
        &self,
        channel: &str,
        message: &Message,
        multiple: bool,
    ) -> Result<(), AmqpError> {
        let ch = self.channels.get(channel).await?;

        match ch
            .basic_ack(message.delivery_tag(), BasicAckOptions { multiple })
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), channel, "error to ack the message");
                Err(AmqpError::AckMessageError)
            }
            _ => Ok(()),
        }
    }

    /// Negatively acknowledges a message on an already-registered channel.
    pub async fn nack(
        &self,
        channel: &str,
        message: &Message,
        multiple: bool,
        requeue: bool,
    ) -> Result<(), AmqpError> {
        let ch = self.channels.get(channel).await?;

        match ch
            .basic_nack(message.delivery_tag(), BasicNackOptions { multiple, requeue })
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), channel, "error to nack the message");
                Err(AmqpError::NackMessageError)
            }
            _ => Ok(()),
        }
    }

    /// Acknowledges all outstanding deliveries on the named channel.
    pub async fn ack_all(&self, channel: &str) -> Result<(), AmqpError> {
        let ch = self.channels.get(channel).await?;

        match ch.basic_ack(0, BasicAckOptions { multiple: true }).await {
            Err(err) => {
                error!(error = err.to_string(), channel, "error to ack all messages");
                Err(AmqpError::AckMessageError)
            }
            _ => Ok(()),
        }
    }

    /// Negatively acknowledges all outstanding deliveries on the named
    /// channel.
    pub async fn nack_all(&self, channel: &str, requeue: bool) -> Result<(), AmqpError> {
        let ch = self.channels.get(channel).await?;

        match ch
            .basic_nack(
                0,
                BasicNackOptions {
                    multiple: true,
                    requeue,
                },
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), channel, "error to nack all messages");
                Err(AmqpError::NackMessageError)
            }
            _ => Ok(()),
        }
    }

    /// Cancels the consumer remembered for the named channel and forgets
    /// its tag, after which `consume` is allowed again on the name.
    pub async fn cancel_channel(&self, channel: &str) -> Result<(), AmqpError> {
        let ch = self.channels.get(channel).await?;
        let tag = self.consumers.get(channel).await?;

        match ch
            .basic_cancel(&tag, BasicCancelOptions { nowait: false })
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), channel, "error to cancel the consumer");
                Err(AmqpError::CancelConsumerError(channel.to_owned()))
            }
            _ => {
                self.consumers.forget(channel).await;
                debug!(channel, "consumer cancelled");
                Ok(())
            }
        }
    }

    /// Closes the named channel broker-side and removes it from the
    /// registry, along with any remembered consumer tag.
    pub async fn close_channel(&self, channel: &str) -> Result<(), AmqpError> {
        let ch = self.channels.remove(channel).await?;
        self.consumers.forget(channel).await;

        match ch.close(REPLY_SUCCESS, "channel closed by the client").await {
            Err(err) => {
                error!(error = err.to_string(), channel, "error to close the channel");
                Err(AmqpError::ChannelCloseError(channel.to_owned()))
            }
            _ => {
                debug!(channel, "channel closed");
                Ok(())
            }
        }
    }

    /// Applies a prefetch count to the named channel, creating it on first
    /// use.
    pub async fn set_prefetch(&self, channel: &str, count: u16) -> Result<(), AmqpError> {
        let ch = self.channels.resolve(channel).await?;

        match ch.basic_qos(count, BasicQosOptions { global: false }).await {
            Err(err) => {
                error!(error = err.to_string(), channel, "error to configure qos");
                Err(AmqpError::QoSDeclarationError(channel.to_owned()))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl TopologyTarget for AmqpClient {
    async fn declare_exchange(&self, declaration: &ExchangeDeclaration) -> Result<(), AmqpError> {
        let channel = self.channels.resolve(&declaration.channel).await?;

        match channel
            .exchange_declare(
                &declaration.name,
                declaration.kind.clone().into(),
                ExchangeDeclareOptions {
                    passive: declaration.passive,
                    durable: declaration.durable,
                    auto_delete: declaration.auto_delete,
                    internal: declaration.internal,
                    nowait: declaration.no_wait,
                },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(
                    error = err.to_string(),
                    exchange = declaration.name.as_str(),
                    "error to declare the exchange"
                );
                Err(AmqpError::DeclareExchangeError(
                    declaration.name.clone(),
                    declaration.channel.clone(),
                ))
            }
            _ => Ok(()),
        }
    }

    async fn declare_queue(&self, declaration: &QueueDeclaration) -> Result<(), AmqpError> {
        let channel = self.channels.resolve(&declaration.channel).await?;

        let mut queue_args = BTreeMap::new();

        if let Some(ttl) = declaration.ttl {
            queue_args.insert(
                ShortString::from(AMQP_HEADERS_MESSAGE_TTL),
                AMQPValue::LongInt(LongInt::from(ttl)),
            );
        }

        if let Some(max) = declaration.max_length {
            queue_args.insert(
                ShortString::from(AMQP_HEADERS_MAX_LENGTH),
                AMQPValue::LongInt(LongInt::from(max)),
            );
        }

        if let Some(max_bytes) = declaration.max_length_bytes {
            queue_args.insert(
                ShortString::from(AMQP_HEADERS_MAX_LENGTH_BYTES),
                AMQPValue::LongInt(LongInt::from(max_bytes)),
            );
        }

        match channel
            .queue_declare(
                &declaration.name,
                QueueDeclareOptions {
                    passive: declaration.passive,
                    durable: declaration.durable,
                    exclusive: declaration.exclusive,
                    auto_delete: declaration.auto_delete,
                    nowait: declaration.no_wait,
                },
                FieldTable::from(queue_args),
            )
            .await
        {
            Err(err) => {
                error!(
                    error = err.to_string(),
                    queue = declaration.name.as_str(),
                    "error to declare the queue"
                );
                Err(AmqpError::DeclareQueueError(
                    declaration.name.clone(),
                    declaration.channel.clone(),
                ))
            }
            _ => Ok(()),
        }
    }

    async fn bind_queue(&self, declaration: &BindingDeclaration) -> Result<(), AmqpError> {
        let channel = self.channels.resolve(&declaration.channel).await?;

        match channel
            .queue_bind(
                &declaration.queue,
                &declaration.exchange,
                &declaration.routing_key,
                QueueBindOptions {
                    nowait: declaration.no_wait,
                },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(
                    error = err.to_string(),
                    queue = declaration.queue.as_str(),
                    exchange = declaration.exchange.as_str(),
                    channel = declaration.channel.as_str(),
                    "error to bind the queue to the exchange"
                );
                Err(AmqpError::BindQueueError(
                    declaration.queue.clone(),
                    declaration.exchange.clone(),
                    declaration.channel.clone(),
                ))
            }
            _ => Ok(()),
        }
    }
}
