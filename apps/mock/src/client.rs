//! `mock_cli`: sends `hello` messages and reads the echoes.

use std::time::Duration;

use tracing::{debug, info};

use portico_core::{Client, Dialer, OpCode};

use crate::cli::{ClientArgs, Protocol};
use crate::config::MockConfig;

/// Gap between two consecutive sends.
pub const SEND_INTERVAL: Duration = Duration::from_millis(10);

/// Connects, sends `count` hellos and waits for `count` Binary replies.
/// Returns the replies in arrival order.
pub async fn exchange<D: Dialer>(
    client: &Client<D>,
    address: &str,
    count: usize,
) -> anyhow::Result<Vec<String>> {
    client.connect(address).await?;

    let result = async {
        for _ in 0..count {
            client.send(b"hello").await?;
            tokio::time::sleep(SEND_INTERVAL).await;
        }

        let mut replies = Vec::with_capacity(count);
        while replies.len() < count {
            let frame = client.read().await?;
            if frame.opcode != OpCode::Binary {
                debug!(opcode = %frame.opcode, "skipping control frame");
                continue;
            }
            let reply = String::from_utf8_lossy(&frame.payload).into_owned();
            info!(id = %client.id(), %reply, "recv");
            replies.push(reply);
        }
        Ok::<_, anyhow::Error>(replies)
    }
    .await;

    client.close().await;
    result
}

pub async fn run(args: ClientArgs) -> anyhow::Result<()> {
    let config = MockConfig::load(args.config.as_deref())?;
    let id = args.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let options = config.client_options();
    info!(%id, address = %args.address, protocol = %args.protocol, "starting mock client");

    let replies = match args.protocol {
        Protocol::Tcp => {
            let client = portico_tcp::new_client(id, "mock_cli", options);
            exchange(&client, &args.address, config.count).await?
        }
        Protocol::Ws => {
            let client = portico_websocket::new_client(id, "mock_cli", options);
            exchange(&client, &args.address, config.count).await?
        }
    };
    info!(received = replies.len(), "done");
    Ok(())
}
