use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Emit per-member info logs instead of debug logs
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Packs a directory into a .kdat archive
    Compress {
        /// Source directory to pack
        #[arg(required = true)]
        source: PathBuf,

        /// Destination archive path, must end in .kdat
        #[arg(required = true)]
        target: PathBuf,

        /// Compression preset
        #[arg(short, long, default_value = "fastest")]
        preset: String,
    },
    /// Unpacks a .kdat archive into a directory
    Decompress {
        /// Source archive to unpack
        #[arg(required = true)]
        source: PathBuf,

        /// Destination directory
        #[arg(required = true)]
        target: PathBuf,
    },
}
