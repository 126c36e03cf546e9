use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

/// Merge PDF documents and list the images their pages draw.
#[derive(Debug, Parser)]
#[command(name = "pdfcompose", about, version)]
pub struct Cli {
    /// Increase log verbosity (-v: info, -vv: debug). RUST_LOG overrides this
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Concatenate PDF files into one, merging their interactive forms
    Merge {
        /// Input PDF files, in output order
        #[arg(value_name = "FILE", required = true, num_args = 1..)]
        files: Vec<PathBuf>,

        /// Path of the merged PDF
        #[arg(short, long, value_name = "OUTPUT")]
        output: PathBuf,

        /// Also keep optional content (layers) from the first file that has them
        #[arg(long)]
        advanced: bool,

        /// Do not merge interactive forms
        #[arg(long)]
        no_forms: bool,

        /// Output format for the merge report
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List the images drawn by PDF pages, including those inside Form XObjects
    Images {
        /// Path to the PDF file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Page range (e.g. '1,3-5'). Default: all pages
        #[arg(long)]
        pages: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Maximum Form XObject nesting depth to follow
        #[arg(long, value_name = "N", default_value_t = 10)]
        max_depth: usize,

        /// Print filter and colorspace usage counts after the listing
        #[arg(long)]
        stats: bool,

        /// Password for encrypted PDFs
        #[arg(long)]
        password: Option<String>,
    },
}

/// Output format for reports.
#[derive(Debug, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON
    Json,
}
