use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "tracker-bisect",
    about = "Find out which blocked trackers a website needs in order to work",
    version,
    long_about = None
)]
pub struct Args {
    /// File listing blocked trackers, one hostname or URL per line
    #[arg(required_unless_present = "init")]
    pub trackers: Option<PathBuf>,

    /// Public suffix list used to group trackers by domain
    #[arg(short, long)]
    pub suffixes: Option<PathBuf>,

    /// Path to custom domain pattern file
    #[arg(short, long)]
    pub patterns: Option<PathBuf>,

    /// Disable pattern-based grouping overrides
    #[arg(long)]
    pub no_patterns: bool,

    /// Commands to run instead of reading stdin, separated by commas or semicolons (e.g. "c,b,select-all,c")
    #[arg(long)]
    pub script: Option<String>,

    /// Print the session report as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Redact tracker names in the report
    #[arg(long)]
    pub redact: bool,

    /// Initialize domain_patterns.txt with the pattern template
    #[arg(long)]
    pub init: bool,
}
