use clap::Parser;

use portico_mock::cli::ServerArgs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    portico_mock::init_tracing();
    portico_mock::server::run(ServerArgs::parse()).await
}
