use clap::Parser;

use portico_mock::cli::ClientArgs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    portico_mock::init_tracing();
    portico_mock::client::run(ClientArgs::parse()).await
}
