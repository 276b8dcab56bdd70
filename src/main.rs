// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! CLI entry point: runs the worker by default, or drives the producer
//! SDK directly via the `client` subcommand (§6).

use clap::{Parser, Subcommand};
use notify_worker::settings::Settings;
use notify_worker::wrapper::Wrapper;
use notify_worker::Client;
use std::process::exit;

#[derive(Parser, Debug)]
#[command(author, about = env!("CARGO_PKG_DESCRIPTION"), long_about = None)]
struct Args {
    /// Overrides the TCP ingress host from settings.
    #[arg(long, env = "NOTIFY_DEFAULT_HOST")]
    host: Option<String>,

    /// Overrides the TCP ingress port from settings.
    #[arg(long, env = "NOTIFY_DEFAULT_PORT")]
    port: Option<u16>,

    #[arg(long)]
    debug: bool,

    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive the producer SDK without starting the worker.
    Client {
        #[command(subcommand)]
        action: ClientAction,
    },
}

#[derive(Subcommand, Debug)]
enum ClientAction {
    /// Publish a wrapper payload onto the pub/sub channel.
    Publish {
        #[arg(long, env = "NOTIFY_REDIS", default_value = "redis://127.0.0.1:6379")]
        redis: String,
        #[arg(long, env = "NOTIFY_CHANNEL", default_value = "NotifyChannel")]
        channel: String,
        /// The wrapper as a JSON object.
        payload: String,
    },
    /// Enqueue a wrapper payload onto the worker stream.
    Xadd {
        #[arg(long, env = "NOTIFY_REDIS", default_value = "redis://127.0.0.1:6379")]
        redis: String,
        #[arg(long, env = "NOTIFY_WORKER_STREAM", default_value = "NotifyWorkerStream")]
        stream: String,
        /// Ship the wrapper as an opaque bincode/base64 `task` field
        /// instead of a plain `message` JSON string.
        #[arg(long)]
        opaque: bool,
        payload: String,
    },
    /// Send a wrapper payload directly to the TCP ingress.
    Send {
        #[arg(long)]
        addr: String,
        payload: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::init();

    if let Some(Commands::Client { action }) = args.command {
        return run_client_action(action).await;
    }

    let mut settings = Settings::load(&args.config)?;
    if let Some(host) = args.host {
        settings.tcp.host = host;
    }
    if let Some(port) = args.port {
        settings.tcp.port = port;
    }

    if let Err(err) = notify_worker::run(settings).await {
        log::error!("fatal: {err:?}");
        exit(1);
    }
    Ok(())
}

async fn run_client_action(action: ClientAction) -> anyhow::Result<()> {
    match action {
        ClientAction::Publish { redis, channel, payload } => {
            let client = Client::new(&redis)?;
            let wrapper = Wrapper::from_value(serde_json::from_str(&payload)?)?;
            client.publish(&wrapper, &channel).await?;
            println!("published {}", wrapper.id);
        }
        ClientAction::Xadd {
            redis,
            stream,
            opaque,
            payload,
        } => {
            let client = Client::new(&redis)?;
            let wrapper = Wrapper::from_value(serde_json::from_str(&payload)?)?;
            let id = client.xadd(&wrapper, &stream, opaque).await?;
            println!("queued as {id}");
        }
        ClientAction::Send { addr, payload } => {
            let wrapper = Wrapper::from_value(serde_json::from_str(&payload)?)?;
            let response = notify_worker::client::send_tcp(&wrapper, &addr).await?;
            print!("{response}");
        }
    }
    Ok(())
}
