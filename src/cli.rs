use crate::config::DEFAULT_CONFIG_PATH;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pickscribe")]
#[command(about = "Extract predicted fight winners from podcast transcripts")]
#[command(version = "0.1.0")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Settings file (TOML); environment variables override it
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze every video in the configured playlist and export the results
    Run {
        /// Skip every confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Override the CSV export path
        #[arg(short, long)]
        export: Option<PathBuf>,
    },

    /// Analyze a single video and save the result
    Analyze {
        /// YouTube video URL or video ID
        video_id: String,

        /// Title to show the model; defaults to the video ID
        #[arg(short, long)]
        title: Option<String>,

        /// Skip every confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Print the prompt that would be sent for a video
    Prompt {
        /// YouTube video URL or video ID
        video_id: String,

        /// Title to embed in the prompt
        #[arg(short, long)]
        title: Option<String>,
    },

    /// List all stored analyses
    List,
}
