use anyhow::Result;
use clap::Parser;

use aurex::application::commands::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let cli = Cli::parse();
    run(cli).await?;
    Ok(())
}
