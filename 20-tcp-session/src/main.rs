use std::io::IsTerminal;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use tcp_session::{
    cli::{Cli, Command},
    client,
    server::Server,
};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout is reserved for protocol output.
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Server(args) => {
            let framing = args.framing.framing().context("invalid framing options")?;
            let server = Server::bind(args.listen, framing)
                .with_context(|| format!("failed to listen on {}", args.listen))?;
            let addr = server.local_addr()?;
            info!("server listening on {}", addr);
            server.run().await;
        }
        Command::Client(args) => client::run(args).await?,
    }

    Ok(())
}
