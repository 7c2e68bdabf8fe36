//! Main binary entry point for `code-pathfinder`.

use code_pathfinder::cli::{Cli, Commands};
use code_pathfinder::commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Installs the process-wide `tracing` subscriber. Defaults to `info`,
/// overridable by `RUST_LOG`; `--debug`/`--verbose` on the invoked
/// subcommand raise the default floor to `debug`/`info` respectively when
/// `RUST_LOG` isn't set.
fn init_tracing(debug: bool, verbose: bool) {
    let default_directive = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .without_time()
        .init();
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Scan { flags, diff_aware } => {
            init_tracing(flags.debug, flags.verbose);
            let args = flags.into_scan_args(diff_aware);
            commands::scan(&args)
        }
        Commands::Ci { flags, no_diff } => {
            init_tracing(flags.debug, flags.verbose);
            let args = flags.into_scan_args(!no_diff);
            commands::ci(&args)
        }
        Commands::Diagnose { flags } => {
            init_tracing(flags.debug, flags.verbose);
            let args = flags.into_scan_args(false);
            commands::diagnose(&args)
        }
        Commands::ResolutionReport { flags } => {
            init_tracing(flags.debug, flags.verbose);
            let args = flags.into_scan_args(false);
            commands::resolution_report(&args)
        }
        Commands::Serve => {
            init_tracing(false, false);
            commands::serve()
        }
        Commands::Version => {
            commands::version();
            0
        }
    };

    std::process::exit(exit_code);
}
