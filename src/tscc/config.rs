use flate2::Compression;

use super::Depth;

/// TechSmith codec configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Depth of the pixels carried by the stream, defaults to [`Depth::Indexed8`].
    pub depth: Depth,

    /// Level of the deflate pass applied to every encoded frame.
    pub compression: Compression,

    /// Force a key frame every `n` encoded frames. Set to `0` to only emit key frames when requested.
    pub key_frame_interval: u32,

    /// Stop decoding delta frames at their first skip, only key frames are then fully decoded.
    pub only_key_frames: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            depth: Depth::default(),
            compression: Compression::default(),
            key_frame_interval: 60,
            only_key_frames: false,
        }
    }
}
