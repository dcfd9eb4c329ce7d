//! KalaData: a from-scratch archive tool.
//!
//! Packs a directory tree into a single self-describing `.kdat` container
//! (LZSS back-reference coding followed by a Huffman entropy filter, with
//! a per-member raw/compressed storage fallback) and restores it exactly.
//! See `SPEC_FULL.md` for the full design.

pub mod archive;
pub mod config;
pub mod error;
pub mod huffman;
pub mod lzss;

use std::path::Path;

pub use archive::{compress_to_archive as compress_to_archive_with, decompress_to_folder as decompress_to_folder_with};
pub use config::CodecConfig;
pub use error::{KdatError, Result};

/// Packs `source_root` into `target_archive` using the process-level
/// configuration set via [`config::set_preset`] / [`config::set_window`] /
/// [`config::set_lookahead`] / [`config::set_verbose`]. Rejects re-entry
/// while another operation is in flight (spec §5).
pub fn compress_to_archive(source_root: impl AsRef<Path>, target_archive: impl AsRef<Path>) -> Result<()> {
    let cfg = config::current_config();
    config::guard_busy(|| archive::compress_to_archive(source_root, target_archive, &cfg))
        .unwrap_or(Err(KdatError::Busy))
}

/// Restores `source_archive` into `target_root` using the process-level
/// configuration. See [`compress_to_archive`] for the busy-flag contract.
pub fn decompress_to_folder(source_archive: impl AsRef<Path>, target_root: impl AsRef<Path>) -> Result<()> {
    let cfg = config::current_config();
    config::guard_busy(|| archive::decompress_to_folder(source_archive, target_root, &cfg))
        .unwrap_or(Err(KdatError::Busy))
}

pub use config::{is_busy, set_lookahead, set_preset, set_verbose, set_window};
