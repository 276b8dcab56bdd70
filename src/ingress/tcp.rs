// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Line-oriented (well, EOF-terminated) JSON intake on a TCP port (§4.8).

use crate::error::NotifyError;
use crate::wrapper::Wrapper;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub async fn serve(
    host: &str,
    port: u16,
    sender: mpsc::Sender<Wrapper>,
    cancellation: CancellationToken,
) -> Result<(), NotifyError> {
    let listener = TcpListener::bind((host, port)).await?;
    log::info!("tcp ingress listening on {host}:{port}");
    serve_listener(listener, sender, cancellation).await
}

/// Accept loop over an already-bound listener, split out from [`serve`] so
/// callers (and tests) that need the OS-assigned port up front can bind it
/// themselves before the accept loop starts.
pub async fn serve_listener(
    listener: TcpListener,
    sender: mpsc::Sender<Wrapper>,
    cancellation: CancellationToken,
) -> Result<(), NotifyError> {
    loop {
        tokio::select! {
            _ = cancellation.cancelled() => {
                log::info!("tcp ingress shutting down");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                let sender = sender.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(stream, sender).await {
                        log::warn!("tcp connection from {peer} errored: {err}");
                    }
                });
            }
        }
    }
}

async fn handle_connection(mut stream: TcpStream, sender: mpsc::Sender<Wrapper>) -> Result<(), NotifyError> {
    let mut buffer = Vec::new();
    stream.read_to_end(&mut buffer).await?;

    let response = match parse_and_enqueue(&buffer, &sender) {
        Ok(id) => format!("Message was Queued with id {id}.\n"),
        Err(err) => serde_json::json!({"error": err.to_string()}).to_string() + "\n",
    };

    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

fn parse_and_enqueue(buffer: &[u8], sender: &mpsc::Sender<Wrapper>) -> Result<Uuid, NotifyError> {
    let de = &mut serde_json::Deserializer::from_slice(buffer);
    let value: serde_json::Value = serde_path_to_error::deserialize(de)?;
    let wrapper = Wrapper::from_value(value)?;
    let id = wrapper.id;
    sender.try_send(wrapper).map_err(|_| NotifyError::QueueFull)?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt as _;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn enqueues_a_valid_job_and_replies_with_its_id() {
        let (sender, mut receiver) = mpsc::channel(4);
        let cancellation = CancellationToken::new();
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server_cancellation = cancellation.clone();
        let server = tokio::spawn(async move {
            tokio::select! {
                _ = server_cancellation.cancelled() => {}
                accepted = listener.accept() => {
                    let (stream, _) = accepted.unwrap();
                    handle_connection(stream, sender).await.unwrap();
                }
            }
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(br#"{"provider":"dummy","recipient":[],"message":"hi"}"#)
            .await
            .unwrap();
        client.shutdown().await.unwrap();

        let mut response = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut client, &mut response)
            .await
            .unwrap();
        assert!(response.starts_with("Message was Queued with id"));

        let wrapper = receiver.recv().await.unwrap();
        assert_eq!(wrapper.provider, "dummy");

        cancellation.cancel();
        let _ = server.await;
    }
}
