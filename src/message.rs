// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Wrapper
//!
//! Pairs the delivery handle received from the broker with its eagerly
//! JSON-decoded body. A `Message` lives between the delivery callback and
//! the ack/nack issued for it; the delivery tag it carries is what the
//! client's ack/nack helpers forward to the broker.

use crate::errors::AmqpError;
use async_trait::async_trait;
use lapin::message::Delivery;
use serde_json::Value;
use tracing::error;

/// A delivery received from the broker with its decoded JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    delivery_tag: u64,
    exchange: String,
    routing_key: String,
    redelivered: bool,
    body: Value,
}

impl Message {
    /// Wraps a raw delivery, decoding its payload as UTF-8 JSON text.
    ///
    /// Non-JSON payloads are a protocol-level error for this crate.
    pub fn from_delivery(delivery: &Delivery) -> Result<Message, AmqpError> {
        Message::new(
            delivery.delivery_tag,
            delivery.exchange.as_str(),
            delivery.routing_key.as_str(),
            delivery.redelivered,
            &delivery.data,
        )
    }

    /// Builds a message from the delivery fields and its raw payload.
    pub fn new(
        delivery_tag: u64,
        exchange: &str,
        routing_key: &str,
        redelivered: bool,
        payload: &[u8],
    ) -> Result<Message, AmqpError> {
        let body = match serde_json::from_slice(payload) {
            Ok(value) => Ok(value),
            Err(err) => {
                error!(
                    error = err.to_string(),
                    exchange, routing_key, "failure to decode the message payload"
                );
                Err(AmqpError::ParsePayloadError)
            }
        }?;

        Ok(Message {
            delivery_tag,
            exchange: exchange.to_owned(),
            routing_key: routing_key.to_owned(),
            redelivered,
            body,
        })
    }

    /// Broker-assigned delivery tag, forwarded on ack/nack.
    pub fn delivery_tag(&self) -> u64 {
        self.delivery_tag
    }

    /// Exchange the message was published to.
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Routing key the message was published with.
    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    /// Whether the broker redelivered this message.
    pub fn redelivered(&self) -> bool {
        self.redelivered
    }

    /// Decoded JSON body.
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Decodes the body into a concrete type.
    pub fn body_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, AmqpError> {
        serde_json::from_value(self.body.clone()).map_err(|err| {
            error!(error = err.to_string(), "failure to decode the message body");
            AmqpError::ParsePayloadError
        })
    }
}

/// Callback invoked for every message delivered to a consumer registered
/// through [`AmqpClient::consume`](crate::client::AmqpClient::consume).
///
/// Handlers receive the wrapped message only; acknowledging it is the
/// handler's responsibility, through the client's ack/nack helpers.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: Message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn published_json_round_trips_through_the_wrapper() {
        let payload = serde_json::to_vec(&json!({"a": 1})).unwrap();

        let message = Message::new(7, "orders", "created", false, &payload).unwrap();

        assert_eq!(message.body(), &json!({"a": 1}));
        assert_eq!(message.delivery_tag(), 7);
        assert_eq!(message.exchange(), "orders");
        assert_eq!(message.routing_key(), "created");
        assert!(!message.redelivered());
    }

    #[test]
    fn non_json_payloads_are_rejected() {
        let result = Message::new(1, "", "", false, b"not json at all");

        assert_eq!(result.unwrap_err(), AmqpError::ParsePayloadError);
    }

    #[test]
    fn body_decodes_into_a_concrete_type() {
        #[derive(Debug, PartialEq, Deserialize)]
        struct OrderCreated {
            a: i32,
        }

        let payload = serde_json::to_vec(&json!({"a": 1})).unwrap();
        let message = Message::new(1, "orders", "", false, &payload).unwrap();

        assert_eq!(message.body_as::<OrderCreated>().unwrap(), OrderCreated { a: 1 });
    }
}
