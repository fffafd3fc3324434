/// The dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    /// Width in pixels.
    pub w: usize,
    /// Height in pixels.
    pub h: usize,
}

impl Size {
    /// Number of pixels covered by this size.
    #[must_use]
    pub const fn pixels(&self) -> usize {
        self.w * self.h
    }
}

/// Frame size used when neither the `*.idx` file nor the subtitle packet
/// provides one (NTSC DVD).
pub const DEFAULT_FRAME_SIZE: Size = Size { w: 720, h: 480 };

/// Largest width or height a subtitle can have: coordinates are 12-bit.
pub const MAX_DIMENSION: usize = 4096;
