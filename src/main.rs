use clap::Parser;
use std::path::Path;
use tracing::error;

use tracker_bisect::{
    patterns::{init_default_patterns, DEFAULT_PATTERN_FILE},
    print_session_report, run_session,
    utils::{setup_logging, validate_args},
    Args,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose);

    validate_args(&args)?;

    if args.init {
        init_default_patterns(Path::new(DEFAULT_PATTERN_FILE))?;
        println!("Created {} with the pattern template", DEFAULT_PATTERN_FILE);
        return Ok(());
    }

    match run_session(&args).await {
        Ok(report) => print_session_report(&report, &args),
        Err(e) => {
            error!(action = "error", component = "main", error = %e, "Debugging session failed");
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
