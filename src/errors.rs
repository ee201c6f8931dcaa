// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types
//!
//! The `AmqpError` enum covers every failure surfaced by this crate:
//! configuration validation, connection and channel lifecycle, topology
//! declarations, publishing, consumer registration, and acknowledgments.

use thiserror::Error;

/// Represents errors that can occur during AMQP/RabbitMQ operations.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AmqpError {
    /// Internal errors that don't fit into other categories
    #[error("internal error")]
    InternalError,

    /// Exactly one of a structured connection descriptor or a connection URL
    /// must be supplied
    #[error("either a connection descriptor or a connection url must be provided, not both")]
    ConfigurationError,

    /// Error establishing a connection to the RabbitMQ server
    #[error("failure to connect")]
    ConnectionError,

    /// Error creating a confirm channel for the given channel name
    #[error("failure to create the channel `{0}`")]
    ChannelCreationError(String),

    /// An operation requiring a pre-existing channel was invoked on an
    /// unregistered channel name
    #[error("channel `{0}` is not registered")]
    ChannelNotFoundError(String),

    /// Error declaring an exchange on the given channel
    #[error("failure to declare the exchange `{0}` on channel `{1}`")]
    DeclareExchangeError(String, String),

    /// Error declaring a queue on the given channel
    #[error("failure to declare the queue `{0}` on channel `{1}`")]
    DeclareQueueError(String, String),

    /// Error binding a queue to an exchange on the given channel
    #[error("failure to bind the queue `{0}` to the exchange `{1}` on channel `{2}`")]
    BindQueueError(String, String, String),

    /// Error publishing a message
    #[error("failure to publish")]
    PublishError,

    /// Broker rejected the consumer registration for the given queue
    #[error("failure to register a consumer on queue `{0}`")]
    ConsumeSetupError(String),

    /// A consumer is already registered under the given channel name
    #[error("a consumer is already registered on channel `{0}`")]
    ConsumerAlreadyRegisteredError(String),

    /// No consumer tag is remembered for the given channel name
    #[error("no consumer is registered on channel `{0}`")]
    ConsumerNotFoundError(String),

    /// Error serializing or deserializing a message payload
    #[error("failure to parse payload")]
    ParsePayloadError,

    /// Error acknowledging a message
    #[error("failure to ack message")]
    AckMessageError,

    /// Error negative-acknowledging a message
    #[error("failure to nack message")]
    NackMessageError,

    /// Error cancelling a consumer
    #[error("failure to cancel the consumer on channel `{0}`")]
    CancelConsumerError(String),

    /// Error closing a channel
    #[error("failure to close the channel `{0}`")]
    ChannelCloseError(String),

    /// Error configuring Quality of Service parameters
    #[error("failure to configure qos on channel `{0}`")]
    QoSDeclarationError(String),
}
