//! swimbench CLI entry point.

use clap::Parser;

use swimbench::cli::{self, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = cli::execute(cli).await {
        std::process::exit(cli::handle_error(&err));
    }
}
