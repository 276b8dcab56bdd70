// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Thin producer SDK mirroring the source's client: publish over pub/sub,
//! enqueue onto the worker stream, or hit the TCP ingress directly (§4.12).

use crate::broker::Broker;
use crate::error::NotifyError;
use crate::wrapper::Wrapper;
use redis::AsyncCommands;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

pub struct Client {
    broker: Broker,
}

impl Client {
    pub fn new(redis_url: &str) -> Result<Self, NotifyError> {
        Ok(Self {
            broker: Broker::connect(redis_url)?,
        })
    }

    /// `PUBLISH` onto a pub/sub channel (§4.9).
    pub async fn publish(&self, wrapper: &Wrapper, channel: &str) -> Result<(), NotifyError> {
        let mut conn = self.broker.multiplexed_connection().await?;
        let payload = wrapper.to_value().to_string();
        let _: i64 = conn.publish(channel, payload).await?;
        Ok(())
    }

    /// `XADD` onto the worker stream (§4.10). When `use_wrapper` is set,
    /// the wrapper is serialized opaquely (bincode+base64) under
    /// `uid`/`task` so the worker skips re-parsing; otherwise it ships as
    /// a plain `message` JSON string.
    pub async fn xadd(&self, wrapper: &Wrapper, stream: &str, use_wrapper: bool) -> Result<String, NotifyError> {
        let mut conn = self.broker.multiplexed_connection().await?;
        let id: String = if use_wrapper {
            let opaque = wrapper.to_opaque()?;
            conn.xadd(stream, "*", &[("uid", wrapper.id.to_string()), ("task", opaque)])
                .await?
        } else {
            conn.xadd(stream, "*", &[("message", wrapper.to_value().to_string())])
                .await?
        };
        Ok(id)
    }

}

/// Sends the wrapper's JSON over a raw TCP connection and returns the
/// server's EOF-terminated reply (§4.8). Standalone since it needs no
/// broker connection, unlike [`Client::publish`]/[`Client::xadd`].
pub async fn send_tcp(wrapper: &Wrapper, addr: &str) -> Result<String, NotifyError> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(wrapper.to_value().to_string().as_bytes()).await?;
    stream.shutdown().await?;

    let mut response = String::new();
    stream.read_to_string(&mut response).await?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn to_value_round_trips_through_wrapper_from_value() {
        let wrapper = Wrapper::from_value(json!({
            "provider": "dummy",
            "recipient": [{"chat_id": "c1"}],
            "message": "hi",
            "subject": "Subj",
        }))
        .unwrap();

        let reconstructed = Wrapper::from_value(wrapper.to_value()).unwrap();
        assert_eq!(reconstructed.provider, wrapper.provider);
        assert_eq!(reconstructed.recipients.len(), wrapper.recipients.len());
        assert_eq!(reconstructed.subject, wrapper.subject);
    }
}
