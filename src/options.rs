use getset::{CopyGetters, Setters};

/// Knobs shared by the readers and writers of both codecs.
#[derive(Debug, Clone, Copy, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct Options {
    /// Encode integer values with the narrowest descriptor that fits
    /// (smaller files, slightly slower).
    compress_integers: bool,
    /// Fail when an on-disk descriptor contradicts the header-declared
    /// type instead of following the disk.
    verify_header_types: bool,
    /// Emit diagnostics (unknown keys, count mismatches) via `log::warn!`.
    print_warnings: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            compress_integers: true,
            verify_header_types: false,
            print_warnings: true,
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }
}
