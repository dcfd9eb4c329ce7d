pub mod cli;
pub mod error;

use std::fs;
use std::path::PathBuf;

use clap::Parser as _;
use cli::{Cli, Commands};
use kaladata::config::{CodecConfig, Preset};
use kaladata::error::KdatError;
use path_absolutize::Absolutize;

fn main() -> Result<(), KdatError> {
    _ = pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .parse_default_env()
        .try_init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compress {
            source,
            target,
            preset,
        } => {
            let source = PathBuf::from(source.absolutize()?.as_os_str());
            let target = PathBuf::from(target.absolutize()?.as_os_str());
            let preset = Preset::from_name(&preset).unwrap_or(Preset::Fastest);
            let config = CodecConfig::from_preset(preset).with_verbose(cli.verbose);
            kaladata::compress_to_archive_with(&source, &target, &config)?;
        }
        Commands::Decompress { source, target } => {
            let source = PathBuf::from(source.absolutize()?.as_os_str());
            let target = PathBuf::from(target.absolutize()?.as_os_str());
            // Creating the destination directory on demand is a path
            // resolution convenience left to the CLI layer; the library
            // itself requires an existing target_root.
            fs::create_dir_all(&target)?;
            let config = CodecConfig::default().with_verbose(cli.verbose);
            kaladata::decompress_to_folder_with(&source, &target, &config)?;
        }
    }

    Ok(())
}
