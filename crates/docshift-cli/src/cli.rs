use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "docshift")]
#[command(author, version, about = "Asynchronous presentation to PDF conversion")]
pub struct Cli {
    /// Path to config file (defaults plus DOCSHIFT_* variables when omitted)
    #[arg(short, long, global = true, env = "DOCSHIFT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit one file and wait for its result
    Convert {
        /// Presentation to convert
        #[arg(required = true)]
        file: PathBuf,

        /// Give up polling after this many seconds
        #[arg(long, default_value = "600")]
        wait_secs: u64,
    },

    /// Run one retention sweep and print the report
    Sweep,

    /// Convert files dropped into an inbox directory until Ctrl-C
    Serve {
        /// Inbox directory (overrides inbox.dir)
        #[arg(long)]
        inbox: Option<PathBuf>,
    },

    /// Validate configuration and print warnings
    Validate,
}
