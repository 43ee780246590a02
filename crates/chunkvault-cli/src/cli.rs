use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "chunkvault",
    version,
    about = "Chunked, content-addressed file store",
    after_help = "\
Configuration file lookup order:
  1. --config <path>             (explicit flag)
  2. $CHUNKVAULT_CONFIG          (environment variable)
  3. ./chunkvault.yaml           (project)"
)]
pub(crate) struct Cli {
    /// Path to configuration file (overrides CHUNKVAULT_CONFIG and default search)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Chunk a file, store its new chunks, and write a manifest
    Put {
        /// File to store
        file: String,

        /// Owner recorded with every chunk
        #[arg(short, long, default_value = "local")]
        owner: String,

        /// Manifest path (default: <file>.manifest.json)
        #[arg(short, long)]
        manifest: Option<String>,
    },

    /// Rebuild a file from its manifest
    Get {
        /// Manifest written by `put`
        manifest: String,

        /// Output file
        output: String,
    },

    /// Print index entries for content hashes
    Locate {
        /// Hex content hashes
        #[arg(required = true)]
        hashes: Vec<String>,
    },

    /// Write a starter configuration file
    Config {
        /// Destination path (default: ./chunkvault.yaml)
        dest: Option<String>,
    },
}
