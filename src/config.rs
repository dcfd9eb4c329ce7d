//! Compression preset / window / lookahead configuration.
//!
//! Re-architected from the original C++ `static inline` fields on the
//! `Compress` class (see `original_source/include/compress.hpp`) into an
//! explicit value type passed into each call. A process-level mirror is
//! kept only as a convenience binding for the CLI.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub const WINDOW_SIZE_FASTEST: usize = 4 * 1024;
pub const WINDOW_SIZE_FAST: usize = 32 * 1024;
pub const WINDOW_SIZE_BALANCED: usize = 256 * 1024;
pub const WINDOW_SIZE_SLOW: usize = 1024 * 1024;
pub const WINDOW_SIZE_ARCHIVE: usize = 8 * 1024 * 1024;

pub const LOOKAHEAD_FASTEST: usize = 18;
pub const LOOKAHEAD_FAST: usize = 32;
pub const LOOKAHEAD_BALANCED: usize = 64;
pub const LOOKAHEAD_SLOW: usize = 128;
pub const LOOKAHEAD_ARCHIVE: usize = 255;

/// Minimum match length shared by the LZSS encoder and decoder. Not
/// stored in the archive; both endpoints must agree on it out of band.
pub const MIN_MATCH: usize = 3;

/// Named compression presets, see spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Fastest,
    Fast,
    Balanced,
    Slow,
    Archive,
}

impl Preset {
    pub fn window_and_lookahead(self) -> (usize, usize) {
        match self {
            Preset::Fastest => (WINDOW_SIZE_FASTEST, LOOKAHEAD_FASTEST),
            Preset::Fast => (WINDOW_SIZE_FAST, LOOKAHEAD_FAST),
            Preset::Balanced => (WINDOW_SIZE_BALANCED, LOOKAHEAD_BALANCED),
            Preset::Slow => (WINDOW_SIZE_SLOW, LOOKAHEAD_SLOW),
            Preset::Archive => (WINDOW_SIZE_ARCHIVE, LOOKAHEAD_ARCHIVE),
        }
    }

    pub fn from_name(name: &str) -> Option<Preset> {
        match name {
            "fastest" => Some(Preset::Fastest),
            "fast" => Some(Preset::Fast),
            "balanced" => Some(Preset::Balanced),
            "slow" => Some(Preset::Slow),
            "archive" => Some(Preset::Archive),
            _ => None,
        }
    }
}

/// Explicit compression configuration passed into `compress_to_archive`
/// and consulted by the LZSS codec. `decompress_to_folder` only needs the
/// `verbose` flag; window/lookahead are not required to restore an
/// archive since the LZSS stream is self-describing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecConfig {
    window: usize,
    lookahead: usize,
    verbose: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self::from_preset(Preset::Fastest)
    }
}

impl CodecConfig {
    pub fn from_preset(preset: Preset) -> Self {
        let (window, lookahead) = preset.window_and_lookahead();
        Self {
            window,
            lookahead,
            verbose: false,
        }
    }

    pub fn fastest() -> Self {
        Self::from_preset(Preset::Fastest)
    }

    pub fn fast() -> Self {
        Self::from_preset(Preset::Fast)
    }

    pub fn balanced() -> Self {
        Self::from_preset(Preset::Balanced)
    }

    pub fn slow() -> Self {
        Self::from_preset(Preset::Slow)
    }

    pub fn archive() -> Self {
        Self::from_preset(Preset::Archive)
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn lookahead(&self) -> usize {
        self.lookahead
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Supported range 4096-8388608, must be a multiple of 4. Out-of-range
    /// values fall back to the `fastest` window, per spec §3.
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = clamp_window(window);
        self
    }

    /// Clamped to [18, 255], per spec §3.
    pub fn with_lookahead(mut self, lookahead: usize) -> Self {
        self.lookahead = lookahead.clamp(LOOKAHEAD_FASTEST, LOOKAHEAD_ARCHIVE);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

fn clamp_window(window: usize) -> usize {
    if window % 4 != 0 || !(WINDOW_SIZE_FASTEST..=WINDOW_SIZE_ARCHIVE).contains(&window) {
        WINDOW_SIZE_FASTEST
    } else {
        window
    }
}

static PRESET_WINDOW: AtomicUsize = AtomicUsize::new(WINDOW_SIZE_FASTEST);
static PRESET_LOOKAHEAD: AtomicUsize = AtomicUsize::new(LOOKAHEAD_FASTEST);
static VERBOSE: AtomicBool = AtomicBool::new(false);
static BUSY: AtomicBool = AtomicBool::new(false);

/// Process-level convenience binding over [`CodecConfig`], mirroring the
/// language-neutral library surface in spec §6. Library callers that want
/// explicit, reentrant configuration should construct a `CodecConfig`
/// directly instead.
pub fn set_preset(name: &str) -> bool {
    match Preset::from_name(name) {
        Some(preset) => {
            let (window, lookahead) = preset.window_and_lookahead();
            PRESET_WINDOW.store(window, Ordering::SeqCst);
            PRESET_LOOKAHEAD.store(lookahead, Ordering::SeqCst);
            true
        }
        None => false,
    }
}

pub fn set_window(window: usize) {
    PRESET_WINDOW.store(clamp_window(window), Ordering::SeqCst);
}

pub fn set_lookahead(lookahead: usize) {
    PRESET_LOOKAHEAD.store(
        lookahead.clamp(LOOKAHEAD_FASTEST, LOOKAHEAD_ARCHIVE),
        Ordering::SeqCst,
    );
}

pub fn set_verbose(verbose: bool) {
    VERBOSE.store(verbose, Ordering::SeqCst);
}

pub fn is_busy() -> bool {
    BUSY.load(Ordering::SeqCst)
}

pub fn current_config() -> CodecConfig {
    CodecConfig {
        window: PRESET_WINDOW.load(Ordering::SeqCst),
        lookahead: PRESET_LOOKAHEAD.load(Ordering::SeqCst),
        verbose: VERBOSE.load(Ordering::SeqCst),
    }
}

/// Marks the process busy for the duration of `f`, returning `None`
/// without calling `f` if an operation is already in flight (spec §5: a
/// `busy` flag rejects re-entry).
pub(crate) fn guard_busy<T>(f: impl FnOnce() -> T) -> Option<T> {
    if BUSY
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return None;
    }
    let result = f();
    BUSY.store(false, Ordering::SeqCst);
    Some(result)
}
