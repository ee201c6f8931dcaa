// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

mod consumer;

pub mod channel;
pub mod client;
pub mod config;
pub mod errors;
pub mod exchange;
pub mod message;
pub mod queue;
pub mod topology;
