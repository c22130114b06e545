use std::error::Error;

use clap::Parser;

use abyssal_loot_tracker::{app, cli::Cli, util::logging};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    app::run(cli).await?;
    Ok(())
}
