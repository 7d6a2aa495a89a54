mod commands;
mod logging;

use anyhow::Result;
use clap::Parser;

use commands::CommandLine;

fn main() -> Result<()> {
    let cli = CommandLine::parse();
    let settings = cli.load_settings()?;

    logging::init_logging(settings.advanced.debug_logging);

    let output = cli.run(&settings)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
