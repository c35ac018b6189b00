// Sermux - serial-to-TCP gateway
use clap::Parser;
use sermux::cli::{execute_command, Args};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    execute_command(args).await?;
    Ok(())
}
