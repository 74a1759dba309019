use anyhow::Result;
use arc_readiness::cli;
use clap::Parser;
use tracing::error;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    match cli::dispatch(args) {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(2),
        Err(err) => {
            error!("{:#}", err);
            std::process::exit(1);
        }
    }
}
