use anyhow::Result;
use clap::Parser;
use tallybook::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    cli.run().await
}
