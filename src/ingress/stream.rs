// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! The operationally important ingress path (§4.10): a Redis stream read
//! as a named consumer within a group, acknowledged per message.

use crate::broker::Broker;
use crate::error::NotifyError;
use crate::provider::registry::ProviderRegistry;
use crate::settings::{Settings, StreamConfig};
use crate::template::TemplateEngine;
use crate::wrapper::Wrapper;
use chrono::Utc;
use redis::streams::{StreamId, StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Runs the consumer-group read loop until cancelled. On exit, deregisters
/// this worker's consumer name so its pending entries are redistributed.
pub async fn run(
    broker: Broker,
    config: StreamConfig,
    consumer_name: String,
    registry: Arc<ProviderRegistry>,
    template_engine: TemplateEngine,
    settings: Arc<Settings>,
    cancellation: CancellationToken,
) -> Result<(), NotifyError> {
    let mut conn = broker.multiplexed_connection().await?;
    bootstrap_group(&mut conn, &config, &consumer_name).await?;

    let options = StreamReadOptions::default()
        .group(&config.group, &consumer_name)
        .block(100)
        .count(1);

    while !cancellation.is_cancelled() {
        let reply: StreamReadReply = conn
            .xread_options(&[config.name.as_str()], &[">"], &options)
            .await?;

        for stream_key in reply.keys {
            for entry in stream_key.ids {
                match process_entry(&entry, &registry, &template_engine, &settings).await {
                    Ok(true) => {
                        let _: i64 = conn.xack(&config.name, &config.group, &[entry.id.clone()]).await?;
                    }
                    Ok(false) => {
                        log::warn!("stream entry {} had a per-recipient failure; leaving unacked", entry.id);
                    }
                    Err(err) => {
                        log::error!("stream entry {} failed: {err}; leaving unacked", entry.id);
                    }
                }
            }
        }

        tokio::task::yield_now().await;
    }

    let _: Result<(), redis::RedisError> = redis::cmd("XGROUP")
        .arg("DELCONSUMER")
        .arg(&config.name)
        .arg(&config.group)
        .arg(&consumer_name)
        .query_async(&mut conn)
        .await;

    Ok(())
}

async fn bootstrap_group(
    conn: &mut redis::aio::MultiplexedConnection,
    config: &StreamConfig,
    consumer_name: &str,
) -> Result<(), NotifyError> {
    let created: Result<(), redis::RedisError> = redis::cmd("XGROUP")
        .arg("CREATE")
        .arg(&config.name)
        .arg(&config.group)
        .arg("$")
        .arg("MKSTREAM")
        .query_async(conn)
        .await;
    if let Err(err) = created {
        if !err.to_string().contains("BUSYGROUP") {
            return Err(err.into());
        }
    }

    let _: Result<(), redis::RedisError> = redis::cmd("XGROUP")
        .arg("CREATECONSUMER")
        .arg(&config.name)
        .arg(&config.group)
        .arg(consumer_name)
        .query_async(conn)
        .await;

    let retention = chrono::Duration::days(config.retention_days);
    let minid = (Utc::now() - retention).timestamp_millis();
    let _: i64 = redis::cmd("XTRIM")
        .arg(&config.name)
        .arg("MINID")
        .arg(minid)
        .query_async(conn)
        .await?;

    Ok(())
}

/// Returns `Ok(true)` iff the wrapper completed without raising and no
/// per-recipient result is itself an error (the tightened ack rule, §9).
async fn process_entry(
    entry: &StreamId,
    registry: &ProviderRegistry,
    template_engine: &TemplateEngine,
    settings: &Arc<Settings>,
) -> Result<bool, NotifyError> {
    let wrapper = wrapper_from_entry(entry)?;
    let results = wrapper.invoke(registry, template_engine, settings.clone()).await?;
    Ok(results.iter().all(|r| r.is_ok()))
}

fn wrapper_from_entry(entry: &StreamId) -> Result<Wrapper, NotifyError> {
    if let Some(redis::Value::Data(bytes)) = entry.map.get("message") {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| NotifyError::Validation(e.to_string()))?;
        return Wrapper::from_value(value);
    }

    if let Some(redis::Value::Data(bytes)) = entry.map.get("task") {
        let encoded = String::from_utf8_lossy(bytes);
        return Wrapper::from_opaque(&encoded);
    }

    Err(NotifyError::Validation(format!(
        "stream entry {} has neither a \"message\" nor a \"task\" field",
        entry.id
    )))
}

/// Optional liveness monitor (§4.10, default off): fires a hook (or logs a
/// warning) when the stream has gone quiet longer than `threshold_minutes`.
pub async fn monitor_empty_stream(
    broker: Broker,
    stream_name: String,
    threshold_minutes: i64,
    hook: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    cancellation: CancellationToken,
) {
    let mut conn = match broker.multiplexed_connection().await {
        Ok(conn) => conn,
        Err(err) => {
            log::error!("empty-stream monitor could not connect: {err}");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = cancellation.cancelled() => break,
            _ = tokio::time::sleep(Duration::from_secs(60)) => {}
        }

        let last_timestamp_ms = match last_entry_timestamp(&mut conn, &stream_name).await {
            Ok(Some(ts)) => ts,
            Ok(None) => continue,
            Err(err) => {
                log::warn!("empty-stream monitor query failed: {err}");
                continue;
            }
        };

        let gap_minutes = (Utc::now().timestamp_millis() - last_timestamp_ms) / 60_000;
        if gap_minutes > threshold_minutes {
            match &hook {
                Some(hook) => hook(&stream_name),
                None => log::warn!("stream {stream_name} has been quiet for {gap_minutes} minutes"),
            }
        }
    }
}

async fn last_entry_timestamp(
    conn: &mut redis::aio::MultiplexedConnection,
    stream_name: &str,
) -> Result<Option<i64>, NotifyError> {
    let reply: Vec<StreamId> = redis::cmd("XREVRANGE")
        .arg(stream_name)
        .arg("+")
        .arg("-")
        .arg("COUNT")
        .arg(1)
        .query_async(conn)
        .await?;

    Ok(reply
        .first()
        .and_then(|entry| entry.id.split('-').next())
        .and_then(|ms| ms.parse::<i64>().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn wrapper_from_entry_prefers_inline_message_over_opaque_task() {
        let mut map = HashMap::new();
        map.insert(
            "message".to_string(),
            redis::Value::Data(br#"{"provider":"dummy","recipient":[],"message":"hi"}"#.to_vec()),
        );
        let entry = StreamId {
            id: "1-0".to_string(),
            map,
        };
        let wrapper = wrapper_from_entry(&entry).unwrap();
        assert_eq!(wrapper.provider, "dummy");
    }

    #[test]
    fn wrapper_from_entry_rejects_entries_missing_both_fields() {
        let entry = StreamId {
            id: "1-0".to_string(),
            map: HashMap::new(),
        };
        assert!(wrapper_from_entry(&entry).is_err());
    }
}
