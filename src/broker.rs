// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Shared Redis handle backing pub/sub, the stream, and the trim/monitor
//! tasks (§5 shared-resource policy). Replaces the teacher's
//! `RabbitMqService` — same "one cheaply-`Clone`-able client, one
//! connection per subsystem" shape, different broker.

use crate::error::NotifyError;
use redis::aio::MultiplexedConnection;
use redis::Client;

#[derive(Clone)]
pub struct Broker {
    client: Client,
}

impl Broker {
    pub fn connect(url: &str) -> Result<Self, NotifyError> {
        let client = Client::open(url)?;
        Ok(Self { client })
    }

    pub async fn multiplexed_connection(&self) -> Result<MultiplexedConnection, NotifyError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    pub async fn pubsub(&self) -> Result<redis::aio::PubSub, NotifyError> {
        Ok(self.client.get_async_connection().await?.into_pubsub())
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}
