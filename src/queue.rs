// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue and Binding Declarations
//!
//! Types describing the queues a topology declares and the bindings that
//! route messages from exchanges into them. Like exchange declarations, both
//! carry the registry channel name they are asserted on and can be built
//! fluently or deserialized from structured configuration.

use serde::Deserialize;

/// Declaration of a RabbitMQ queue asserted during topology setup.
///
/// Besides the declare flags, a queue can carry message TTL and length
/// limits, which are sent to the broker as `x-*` queue arguments.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueDeclaration {
    /// Name of the registry channel the declaration is asserted on
    pub(crate) channel: String,
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) durable: bool,
    #[serde(default)]
    pub(crate) exclusive: bool,
    #[serde(default)]
    pub(crate) auto_delete: bool,
    #[serde(default)]
    pub(crate) passive: bool,
    #[serde(default)]
    pub(crate) no_wait: bool,
    #[serde(default)]
    pub(crate) ttl: Option<i32>,
    #[serde(default)]
    pub(crate) max_length: Option<i32>,
    #[serde(default)]
    pub(crate) max_length_bytes: Option<i32>,
}

impl QueueDeclaration {
    /// Creates a queue declaration with default flags.
    pub fn new(channel: &str, name: &str) -> QueueDeclaration {
        QueueDeclaration {
            channel: channel.to_owned(),
            name: name.to_owned(),
            ..QueueDeclaration::default()
        }
    }

    /// Makes the queue durable, persisting across broker restarts.
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    /// Makes the queue exclusive to the connection.
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    /// Sets the queue to auto-delete when no longer used.
    pub fn auto_delete(mut self) -> Self {
        self.auto_delete = true;
        self
    }

    /// Makes the declaration passive, checking for existence without creating.
    pub fn passive(mut self) -> Self {
        self.passive = true;
        self
    }

    /// Sets the no_wait flag, making the declaration non-blocking.
    pub fn no_wait(mut self) -> Self {
        self.no_wait = true;
        self
    }

    /// Sets the message Time-To-Live for the queue, in milliseconds.
    pub fn ttl(mut self, ttl: i32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Sets the maximum number of messages the queue can hold.
    pub fn max_length(mut self, max: i32) -> Self {
        self.max_length = Some(max);
        self
    }

    /// Sets the maximum size in bytes the queue can hold.
    pub fn max_length_bytes(mut self, max_bytes: i32) -> Self {
        self.max_length_bytes = Some(max_bytes);
        self
    }

    /// Name of the queue being declared.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the registry channel the declaration is asserted on.
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

/// Declaration of a queue-to-exchange binding asserted during topology setup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BindingDeclaration {
    /// Name of the registry channel the binding is asserted on
    pub(crate) channel: String,
    pub(crate) queue: String,
    pub(crate) exchange: String,
    #[serde(rename = "key", default)]
    pub(crate) routing_key: String,
    #[serde(default)]
    pub(crate) no_wait: bool,
}

impl BindingDeclaration {
    /// Creates a binding between the given queue and exchange with an empty
    /// routing key.
    pub fn new(channel: &str, queue: &str, exchange: &str) -> BindingDeclaration {
        BindingDeclaration {
            channel: channel.to_owned(),
            queue: queue.to_owned(),
            exchange: exchange.to_owned(),
            routing_key: String::default(),
            no_wait: false,
        }
    }

    /// Sets the routing key for the binding.
    pub fn routing_key(mut self, key: &str) -> Self {
        self.routing_key = key.to_owned();
        self
    }

    /// Sets the no_wait flag, making the binding non-blocking.
    pub fn no_wait(mut self) -> Self {
        self.no_wait = true;
        self
    }

    /// Name of the queue being bound.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Name of the exchange being bound to.
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Name of the registry channel the binding is asserted on.
    pub fn channel(&self) -> &str {
        &self.channel
    }
}
