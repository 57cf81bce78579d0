use addon_updater::cli::{Cli, run};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = addon_updater::log::init()?;

    run(cli).await
}
