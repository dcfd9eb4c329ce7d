use std::path::PathBuf;

use thiserror::Error;

/// Error taxonomy for KalaData, grouped by the kinds in spec §7:
/// Precondition, I/O, Format, Codec-invariant, Security. Preconditions are
/// the only kind recovered locally by the caller before any I/O; every
/// other variant is fatal to the in-progress compress/decompress call.
#[derive(Error, Debug)]
pub enum KdatError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Walkdir error: {0}")]
    Walkdir(#[from] walkdir::Error),

    // --- Precondition ---
    #[error("source '{0}' does not exist or is not a directory")]
    SourceNotADirectory(PathBuf),

    #[error("source directory '{0}' is empty")]
    SourceEmpty(PathBuf),

    #[error("source directory '{0}' totals {1} bytes, exceeding the 5 GiB cap")]
    SourceTooLarge(PathBuf, u64),

    #[error("target archive '{0}' already exists")]
    TargetExists(PathBuf),

    #[error("target archive '{0}' must have a '.kdat' extension")]
    BadExtension(PathBuf),

    #[error("parent directory of '{0}' is not writable")]
    ParentNotWritable(PathBuf),

    #[error("archive '{0}' does not exist or is not a regular file")]
    ArchiveNotAFile(PathBuf),

    #[error("target root '{0}' does not exist or is not a directory")]
    TargetRootNotADirectory(PathBuf),

    #[error("another compress/decompress operation is already in progress")]
    Busy,

    // --- Format ---
    #[error("archive '{0}' has an invalid magic signature")]
    BadMagic(PathBuf),

    #[error("archive '{0}' declares unsupported version '{1}'")]
    BadVersion(PathBuf, String),

    #[error("archive '{0}' reports file count {1}, outside the allowed (0, 100000] range")]
    BadFileCount(PathBuf, u32),

    #[error("archive '{0}' is truncated while reading the header")]
    TruncatedHeader(PathBuf),

    #[error("archive '{0}' is truncated while reading member '{1}'")]
    TruncatedMember(PathBuf, String),

    #[error("archive '{0}' member '{1}' has unknown storage method {2}")]
    UnknownMethod(PathBuf, String, u8),

    #[error(
        "archive '{0}' member '{1}' declares method=RAW but stored_size ({2}) != original_size ({3})"
    )]
    RawSizeMismatch(PathBuf, String, u64, u64),

    #[error(
        "archive '{0}' member '{1}' declares method=LZSS but stored_size ({2}) is not smaller than original_size ({3})"
    )]
    LzssSizeMismatch(PathBuf, String, u64, u64),

    #[error("Huffman frequency table is empty")]
    EmptyFrequencyTable,

    #[error("Huffman header is malformed or truncated")]
    BadHuffmanHeader,

    #[error("archive '{0}' member '{1}' failed to decode: {2}")]
    MemberDecodeFailed(PathBuf, String, #[source] Box<KdatError>),

    // --- Codec-invariant ---
    #[error("LZSS offset {0} is zero or exceeds the produced output length {1}")]
    LzssBadOffset(u32, usize),

    #[error("LZSS match offset too large to fit in a u32")]
    LzssOffsetOverflow,

    #[error("decompressed size {0} does not match the declared original size {1} for '{2}'")]
    SizeMismatch(usize, u64, String),

    #[error("Huffman bit stream exhausted before all {0} symbols were emitted")]
    HuffmanTruncated(usize),

    // --- Security ---
    #[error("archive '{0}' member path '{1}' escapes the target root (path traversal)")]
    PathTraversal(PathBuf, String),

    #[error("archive member path is empty")]
    EmptyMemberPath,
}

pub type Result<T> = std::result::Result<T, KdatError>;
