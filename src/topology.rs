// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Topology Setup
//!
//! A [`Topology`] holds ordered lists of exchange, queue and binding
//! declarations and applies them against the broker: exchanges first, then
//! queues, then bindings, each list in input order. Application is strictly
//! sequential and aborts on the first failed assertion; entities already
//! declared on the broker stay declared (AMQP declarations are idempotent),
//! so there is no rollback.
//!
//! The broker side of each assertion is behind the [`TopologyTarget`] trait;
//! [`AmqpClient`](crate::client::AmqpClient) is the production target.

use crate::{
    errors::AmqpError,
    exchange::ExchangeDeclaration,
    queue::{BindingDeclaration, QueueDeclaration},
};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

/// Constant for the header field used to specify message TTL
pub const AMQP_HEADERS_MESSAGE_TTL: &str = "x-message-ttl";
/// Constant for the header field used to specify maximum queue length
pub const AMQP_HEADERS_MAX_LENGTH: &str = "x-max-length";
/// Constant for the header field used to specify maximum queue size in bytes
pub const AMQP_HEADERS_MAX_LENGTH_BYTES: &str = "x-max-length-bytes";

/// Receives the broker assertions issued while a topology is applied.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TopologyTarget: Send + Sync {
    async fn declare_exchange(&self, declaration: &ExchangeDeclaration) -> Result<(), AmqpError>;

    async fn declare_queue(&self, declaration: &QueueDeclaration) -> Result<(), AmqpError>;

    async fn bind_queue(&self, declaration: &BindingDeclaration) -> Result<(), AmqpError>;
}

/// Declarative broker topology: exchanges, queues and bindings, in the order
/// they must be asserted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub exchanges: Vec<ExchangeDeclaration>,
    #[serde(default)]
    pub queues: Vec<QueueDeclaration>,
    #[serde(default)]
    pub bindings: Vec<BindingDeclaration>,
}

impl Topology {
    pub fn new() -> Topology {
        Topology::default()
    }

    /// Adds an exchange declaration to the topology.
    pub fn exchange(mut self, declaration: ExchangeDeclaration) -> Self {
        self.exchanges.push(declaration);
        self
    }

    /// Adds a queue declaration to the topology.
    pub fn queue(mut self, declaration: QueueDeclaration) -> Self {
        self.queues.push(declaration);
        self
    }

    /// Adds a binding declaration to the topology.
    pub fn binding(mut self, declaration: BindingDeclaration) -> Self {
        self.bindings.push(declaration);
        self
    }

    /// Applies the topology against the broker.
    ///
    /// Exchanges are asserted first, then queues, then bindings, so that a
    /// binding never references an entity the broker has not seen yet.
    /// Entries sharing a channel name resolve to the same channel, which is
    /// why each assertion completes before the next begins. The first failed
    /// assertion aborts the rest and is returned to the caller.
    pub async fn apply<T: TopologyTarget>(&self, target: &T) -> Result<(), AmqpError> {
        for declaration in &self.exchanges {
            debug!(
                exchange = declaration.name.as_str(),
                channel = declaration.channel.as_str(),
                "declaring exchange"
            );
            target.declare_exchange(declaration).await?;
        }

        for declaration in &self.queues {
            debug!(
                queue = declaration.name.as_str(),
                channel = declaration.channel.as_str(),
                "declaring queue"
            );
            target.declare_queue(declaration).await?;
        }

        for declaration in &self.bindings {
            debug!(
                queue = declaration.queue.as_str(),
                exchange = declaration.exchange.as_str(),
                key = declaration.routing_key.as_str(),
                "binding queue"
            );
            target.bind_queue(declaration).await?;
        }

        debug!("topology applied");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::{predicate::function, Sequence};

    fn sample_topology() -> Topology {
        Topology::new()
            .exchange(ExchangeDeclaration::new("setup", "orders").fanout())
            .exchange(ExchangeDeclaration::new("setup", "audit"))
            .queue(QueueDeclaration::new("setup", "orders-created").durable())
            .queue(QueueDeclaration::new("setup", "orders-failed"))
            .binding(
                BindingDeclaration::new("setup", "orders-created", "orders").routing_key("created"),
            )
    }

    fn exchange_named(name: &'static str) -> impl Fn(&ExchangeDeclaration) -> bool {
        move |declaration: &ExchangeDeclaration| declaration.name == name
    }

    fn queue_named(name: &'static str) -> impl Fn(&QueueDeclaration) -> bool {
        move |declaration: &QueueDeclaration| declaration.name == name
    }

    #[tokio::test]
    async fn apply_asserts_exchanges_then_queues_then_bindings_in_input_order() {
        let mut target = MockTopologyTarget::new();
        let mut seq = Sequence::new();

        target
            .expect_declare_exchange()
            .with(function(exchange_named("orders")))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        target
            .expect_declare_exchange()
            .with(function(exchange_named("audit")))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        target
            .expect_declare_queue()
            .with(function(queue_named("orders-created")))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        target
            .expect_declare_queue()
            .with(function(queue_named("orders-failed")))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        target
            .expect_bind_queue()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        sample_topology().apply(&target).await.unwrap();
    }

    #[tokio::test]
    async fn apply_aborts_on_the_first_failed_assertion() {
        let topology = Topology::new()
            .queue(QueueDeclaration::new("setup", "first"))
            .queue(QueueDeclaration::new("setup", "second"))
            .queue(QueueDeclaration::new("setup", "third"));

        let mut target = MockTopologyTarget::new();

        target
            .expect_declare_queue()
            .with(function(queue_named("first")))
            .times(1)
            .returning(|_| Ok(()));
        target
            .expect_declare_queue()
            .with(function(queue_named("second")))
            .times(1)
            .returning(|_| {
                Err(AmqpError::DeclareQueueError(
                    "second".to_owned(),
                    "setup".to_owned(),
                ))
            });
        // no expectation for "third": reaching it would panic the mock

        let result = topology.apply(&target).await;

        assert_eq!(
            result,
            Err(AmqpError::DeclareQueueError(
                "second".to_owned(),
                "setup".to_owned()
            ))
        );
    }

    #[tokio::test]
    async fn a_failed_exchange_stops_queues_and_bindings() {
        let mut target = MockTopologyTarget::new();

        target
            .expect_declare_exchange()
            .with(function(exchange_named("orders")))
            .times(1)
            .returning(|_| {
                Err(AmqpError::DeclareExchangeError(
                    "orders".to_owned(),
                    "setup".to_owned(),
                ))
            });
        // no expectations beyond the failing exchange: any later assertion
        // would panic the mock

        let result = sample_topology().apply(&target).await;

        assert_eq!(
            result,
            Err(AmqpError::DeclareExchangeError(
                "orders".to_owned(),
                "setup".to_owned()
            ))
        );
    }

    #[tokio::test]
    async fn a_failed_binding_reports_its_queue_exchange_and_channel() {
        let topology = Topology::new().binding(
            BindingDeclaration::new("setup", "orders-created", "orders").routing_key("created"),
        );

        let mut target = MockTopologyTarget::new();

        target.expect_bind_queue().times(1).returning(|declaration| {
            Err(AmqpError::BindQueueError(
                declaration.queue.clone(),
                declaration.exchange.clone(),
                declaration.channel.clone(),
            ))
        });

        let result = topology.apply(&target).await;

        assert_eq!(
            result,
            Err(AmqpError::BindQueueError(
                "orders-created".to_owned(),
                "orders".to_owned(),
                "setup".to_owned()
            ))
        );
    }

    #[tokio::test]
    async fn an_empty_topology_applies_without_broker_calls() {
        let target = MockTopologyTarget::new();

        Topology::new().apply(&target).await.unwrap();
    }

    #[test]
    fn topology_deserializes_from_structured_configuration() {
        let topology: Topology = serde_json::from_value(serde_json::json!({
            "exchanges": [
                { "channel": "setup", "name": "orders", "type": "topic", "durable": true }
            ],
            "queues": [
                { "channel": "setup", "name": "orders-created", "durable": true, "ttl": 30000 }
            ],
            "bindings": [
                { "channel": "setup", "queue": "orders-created", "exchange": "orders", "key": "orders.*" }
            ]
        }))
        .unwrap();

        assert_eq!(topology.exchanges.len(), 1);
        assert_eq!(topology.exchanges[0].name, "orders");
        assert_eq!(
            topology.exchanges[0].kind,
            crate::exchange::ExchangeKind::Topic
        );
        assert!(topology.exchanges[0].durable);

        assert_eq!(topology.queues.len(), 1);
        assert_eq!(topology.queues[0].ttl, Some(30000));

        assert_eq!(topology.bindings.len(), 1);
        assert_eq!(topology.bindings[0].routing_key, "orders.*");
    }
}
