use super::{ContentError, Size, MAX_DIMENSION};

/// Largest coordinate value of a 12-bit field.
const MAX_COORDINATE: u16 = 0xfff;

/// Cropping rectangle as stored in a subtitle packet. Right and bottom
/// coordinates are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AreaValues {
    /// min `x` coordinate value
    pub x1: u16,
    /// min `y` coordinate value
    pub y1: u16,
    /// max `x` coordinate value
    pub x2: u16,
    /// max `y` coordinate value
    pub y2: u16,
}

/// Location at which to display the subtitle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Area(AreaValues);

impl Area {
    /// The leftmost edge of the subtitle.
    #[must_use]
    pub const fn left(&self) -> u16 {
        self.0.x1
    }

    /// The top edge of the subtitle.
    #[must_use]
    pub const fn top(&self) -> u16 {
        self.0.y1
    }

    /// The width of the subtitle.
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.0.x2 + 1 - self.0.x1
    }

    /// The height of the subtitle.
    #[must_use]
    pub const fn height(&self) -> u16 {
        self.0.y2 + 1 - self.0.y1
    }

    /// The size of the subtitle.
    #[must_use]
    pub fn size(&self) -> Size {
        Size {
            w: usize::from(self.width()),
            h: usize::from(self.height()),
        }
    }

    /// An area anchored at the origin covering `size`. Returns `None` for
    /// an empty size or one that doesn't fit in 12-bit coordinates.
    #[must_use]
    pub fn from_size(size: Size) -> Option<Self> {
        if size.w > MAX_DIMENSION || size.h > MAX_DIMENSION {
            return None;
        }
        let x2 = u16::try_from(size.w.checked_sub(1)?).ok()?;
        let y2 = u16::try_from(size.h.checked_sub(1)?).ok()?;
        Some(Self(AreaValues {
            x1: 0,
            y1: 0,
            x2,
            y2,
        }))
    }
}

impl TryFrom<AreaValues> for Area {
    type Error = ContentError;

    fn try_from(coords_value: AreaValues) -> Result<Self, Self::Error> {
        // A single pixel wide (or high) area is valid, as coordinates are
        // inclusive. Everything downstream relies on non-negative sizes.
        if coords_value.x2 > MAX_COORDINATE || coords_value.y2 > MAX_COORDINATE {
            Err(ContentError::AreaOutOfRange)
        } else if coords_value.x2 < coords_value.x1 || coords_value.y2 < coords_value.y1 {
            Err(ContentError::InvalidAreaBounding)
        } else {
            Ok(Self(coords_value))
        }
    }
}
