use anyhow::Result;
use clap::Parser;

use backchat::{app, cli};

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    app::run(cli)
}
