mod cli;
mod config;
mod logging;
mod render;
mod run;

use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    logging::initialize(cli.log, cli.verbose);
    let config = config::load_config(&cli.config)?;
    run::run(cli, config).await
}
