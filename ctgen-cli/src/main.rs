mod cli;
mod commands;
mod console;
mod report;

use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_guard = match ctgen::logging::init_tracing(cli.global.log_file.as_deref(), "info") {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args, &cli.global).await,
        Commands::Plan(args) => commands::plan::execute(args, &cli.global).await,
    };

    if let Err(e) = result {
        let code = commands::run::exit_code(&e);
        if code != commands::run::INTERRUPTED_EXIT_CODE {
            eprintln!("Error: {:#}", e);
        }
        // Flush buffered log-file records before exiting.
        drop(log_guard);
        std::process::exit(code);
    }
}
