//! Command-line interface for DoodleMation.

mod commands;

use clap::{Parser, Subcommand};

/// DoodleMation - turns children's drawings into short animations
#[derive(Parser)]
#[command(name = "doodlemation")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API with background housekeeping (default)
    #[command(alias = "daemon")]
    Serve,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Generate an animation prompt from an image description
    #[command(alias = "e")]
    Enhance {
        /// What the drawing shows
        description: String,
        /// How it should move
        #[arg(long, default_value = "")]
        details: String,
    },

    /// Show the provider status of a generation job
    #[command(alias = "s")]
    Status {
        /// Prediction id returned by the generate endpoint
        job_id: String,
    },

    /// List saved generations, newest first
    #[command(alias = "ls")]
    List {
        /// Number of entries to show
        #[arg(default_value = "10")]
        limit: usize,
    },

    /// Delete stored images and videos older than the retention period
    Prune {
        /// Age threshold in days (defaults to storage.retention_days)
        #[arg(long)]
        days: Option<u32>,
    },
}

pub use commands::*;
