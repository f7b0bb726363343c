//! Anchorscope CLI entry point.

use anchorscope::cli::{self, Cli, Commands, EXIT_ERROR};
use clap::Parser;

fn main() {
    let cli = Cli::parse();

    let verbose = matches!(&cli.command, Commands::Extract(args) if args.verbose);
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if verbose { "debug" } else { "warn" }),
    )
    .format_timestamp(None)
    .init();

    let exit_code = match cli.command {
        Commands::Extract(args) => match cli::run_extract(&args) {
            Ok(code) => code,
            Err(e) => {
                eprintln!("Error: {}", e);
                EXIT_ERROR
            }
        },
        Commands::Init(args) => match cli::run_init(&args) {
            Ok(code) => code,
            Err(e) => {
                eprintln!("Error: {}", e);
                EXIT_ERROR
            }
        },
    };

    std::process::exit(exit_code);
}
