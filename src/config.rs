//! Decoder configuration.

use serde::{Deserialize, Serialize};

/// Resource limits applied while decoding untrusted files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Largest `SizeOfImage` the image mapper will allocate, in bytes.
    #[serde(default = "default_max_image_size")]
    pub max_image_size: u32,
}

/// 512 MiB, far above any real DLL.
pub const DEFAULT_MAX_IMAGE_SIZE: u32 = 512 * 1024 * 1024;

fn default_max_image_size() -> u32 {
    DEFAULT_MAX_IMAGE_SIZE
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_image_size: DEFAULT_MAX_IMAGE_SIZE,
        }
    }
}
