use clap::Parser;
use semdoc_server::{ServerArgs, run_server, telemetry::init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ServerArgs::parse();
    init_tracing(args.log_format);

    run_server(args).await
}
