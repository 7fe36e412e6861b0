use anyhow::Result;
use seedrpc::discovery::{RoundRobin, StaticRegistry, resolve_address};
use seedrpc::{Client, ClientConfig, completion_channel};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const SERVICE: &str = "Echo";
const ROUNDS: usize = 5;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let addrs = std::env::var("ECHO_ADDRS").unwrap_or_else(|_| "127.0.0.1:9000".to_string());

    let registry = StaticRegistry::new();
    for addr in addrs.split(',').map(str::trim).filter(|a| !a.is_empty()) {
        registry.register(SERVICE, addr);
    }

    let addr = resolve_address(&registry, &mut RoundRobin::new(), SERVICE).await?;
    info!(service = SERVICE, addr = %addr, "Resolved service");

    let client = Client::dial(&addr, ClientConfig::default()).await?;
    let cancel = CancellationToken::new();

    let reply: String = client
        .call(&cancel, "Echo.Repeat", &"hello".to_string())
        .await?;
    info!(reply = %reply, "Synchronous call returned");

    // Fire several calls at once and collect them as they complete
    let (done, mut completions) = completion_channel::<String>(ROUNDS)?;
    for round in 0..ROUNDS {
        client
            .go(&cancel, "Echo.Repeat", &format!("round {round}"), &done)
            .await;
    }
    drop(done);

    while let Some(call) = completions.recv().await {
        match call.into_result() {
            Ok(reply) => info!(reply = %reply, "Asynchronous call returned"),
            Err(e) => warn!(error = %e, "Asynchronous call failed"),
        }
    }

    if let Err(e) = client.call::<_, String>(&cancel, "Echo.Missing", &String::new()).await {
        info!(error = %e, "Unknown method rejected as expected");
    }

    client.close().await;
    Ok(())
}
