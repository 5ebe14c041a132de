use anyhow::Result;
use clap::Parser;
use neocharge_wallet::cli::Cli;
use neocharge_wallet::config::Config;
use neocharge_wallet::logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    let _guards = logging::init(cli.verbose, config.log_file.as_deref())?;
    cli.run(config).await
}
