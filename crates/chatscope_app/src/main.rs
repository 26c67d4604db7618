use anyhow::Result;
use clap::Parser;

mod cli;
mod platform;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    platform::run(cli)
}
