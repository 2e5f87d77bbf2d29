use clap::Parser;
use taskdeck::cli::commands::Cli;
use taskdeck::cli::handlers;

fn main() {
    let cli = Cli::parse();
    if let Err(e) = handlers::dispatch(cli) {
        tracing::error!(error = %e, "command failed");
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
