//! Run-length encoded image format for subtitles.

use image::{ImageBuffer, Rgba, RgbaImage};
use log::{trace, warn};
use nom::{
    bits::complete::{tag as tag_bits, take as take_bits},
    branch::alt,
    combinator::value,
    sequence::preceded,
    IResult, Parser as _,
};
use thiserror::Error;

use super::{IResultExt as _, NomError, Palette};
use crate::{content::Size, util::BytesFormatter};

type BitInput<'a> = (&'a [u8], usize);

/// Errors of `vobsub` img management.
#[derive(Error, Debug)]
pub enum Error {
    /// A scan line couldn't be decoded. Lines after it in the same field are
    /// left transparent.
    #[error("Decoding scan line {line} failed")]
    ScanLine {
        /// Index of the line in the image.
        line: usize,
        /// Parsing error.
        source: NomError,
    },

    /// The image can't be represented as an `RgbaImage`.
    #[error("Image too large for RGBA conversion: {0:?}")]
    TooLarge(Size),
}

/// Raw value of pixels the RLE data didn't reach.
const UNSET: u8 = 0xff;

/// A run-length encoded value.
#[derive(Debug)]
struct Rle {
    /// The number of times to repeat this value.  A value of 0 indicates that
    /// we should fill to the end of the line.
    cnt: u16,
    /// The value to repeat.  This is 2 bits wide.
    val: u8,
}

/// Parse the count for a `Rle`.
fn count(input: BitInput<'_>) -> IResult<BitInput<'_>, u16> {
    alt((
        // Fill to end of line.
        value(0, tag_bits(0u16, 14u8)),
        // Count for 4-nibble RLE.
        preceded(tag_bits(0u8, 6u8), take_bits(8u8)),
        // Count for 3-nibble RLE.
        preceded(tag_bits(0u8, 4u8), take_bits(6u8)),
        // Count for 2-nibble RLE.
        preceded(tag_bits(0u8, 2u8), take_bits(4u8)),
        // Count for 1-nibble RLE.
        take_bits(2u8),
    ))
    .parse(input)
}

/// Parse an `Rle`.
fn rle(input: BitInput<'_>) -> IResult<BitInput<'_>, Rle> {
    let (input, (cnt, val)) = (count, take_bits(2u8)).parse(input)?;
    Ok((input, Rle { cnt, val }))
}

/// Decompress the scan-line `input` into `output`, returning the number of
/// input bytes consumed. Runs going past the end of the line are cut.
fn scan_line(input: &[u8], output: &mut [u8]) -> Result<usize, NomError> {
    trace!("scan line starting with {:?}", BytesFormatter(input));
    let width = output.len();
    let mut x = 0;
    let mut pos = (input, 0);
    while x < width {
        let (new_pos, run) = rle(pos).to_result()?;
        pos = new_pos;
        let count = if run.cnt == 0 {
            width - x
        } else {
            usize::from(run.cnt)
        };
        if x + count > width {
            trace!("clipping run of {count} at column {x} of {width}");
        }
        let end = width.min(x + count);
        output[x..end].fill(run.val);
        x = end;
    }
    // Round up to the next full byte.
    if pos.1 > 0 {
        pos = (&pos.0[1..], 0);
    }
    Ok(input.len() - pos.0.len())
}

/// A decompressed subtitle bitmap, one 2-bit pixel code per byte.
#[derive(Debug)]
pub struct DecodedImage {
    size: Size,
    raw: Vec<u8>,
    failure: Option<Error>,
}

impl DecodedImage {
    /// Dimensions of the bitmap.
    #[must_use]
    pub const fn size(&self) -> Size {
        self.size
    }

    /// Pixel code at (`x`, `y`), `None` if the RLE data didn't cover it.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> Option<u8> {
        if x >= self.size.w {
            return None;
        }
        self.raw
            .get(y * self.size.w + x)
            .copied()
            .filter(|&code| code != UNSET)
    }

    /// Did decoding stop before the end of one of the fields?
    #[must_use]
    pub const fn is_partial(&self) -> bool {
        self.failure.is_some()
    }

    /// The first error met, for partial images.
    #[must_use]
    pub const fn failure(&self) -> Option<&Error> {
        self.failure.as_ref()
    }

    /// Convert to an RGBA image. Each pixel code is mapped through `remap`
    /// to a `palette` entry, and through `alpha` to its opacity.
    /// Transparent and undecoded pixels are all zero.
    ///
    /// # Errors
    /// Return [`Error::TooLarge`] if the image dimensions don't fit in `u32`.
    #[profiling::function]
    pub fn to_rgba(
        &self,
        palette: &Palette,
        remap: &[u8; 4],
        alpha: &[u8; 4],
    ) -> Result<RgbaImage, Error> {
        let too_large = || Error::TooLarge(self.size);
        let width = u32::try_from(self.size.w).map_err(|_| too_large())?;
        let height = u32::try_from(self.size.h).map_err(|_| too_large())?;
        u32::try_from(self.size.pixels()).map_err(|_| too_large())?;

        Ok(ImageBuffer::from_fn(width, height, |x, y| {
            let offset = cast::usize(y * width + x);
            let code = self.raw[offset];
            if code == UNSET {
                return Rgba([0, 0, 0, 0]);
            }
            let px = usize::from(code);
            let a = alpha[px];
            if a == 0 {
                return Rgba([0, 0, 0, 0]);
            }
            let rgb = palette[usize::from(remap[px])].0;
            Rgba([rgb[0], rgb[1], rgb[2], a << 4 | a])
        }))
    }
}

/// Decompress a run-length encoded image, in row-major order, starting at
/// the upper-left and scanning right and down, with one byte for each 2-bit
/// value.
///
/// `data` holds the even lines stream then the odd lines one. A stream
/// which fails to decode is abandoned: the lines it didn't reach stay
/// undecoded and the image is marked partial.
#[profiling::function]
#[must_use]
pub fn decompress(size: Size, data: [&[u8]; 2]) -> DecodedImage {
    trace!(
        "decompressing image {:?}, max: [0x{:x}, 0x{:x}]",
        &size,
        data[0].len(),
        data[1].len()
    );
    let mut raw = vec![UNSET; size.pixels()];
    let mut failure = None;
    for (parity, stream) in data.into_iter().enumerate() {
        let mut offset = 0;
        for y in (parity..size.h).step_by(2) {
            trace!("line {y:?}, offset 0x{offset:x}");
            let row = &mut raw[y * size.w..(y + 1) * size.w];
            match scan_line(&stream[offset..], row) {
                Ok(consumed) => offset += consumed,
                Err(source) => {
                    warn!("RLE data ends at line {y} of {}: {source}", size.h);
                    if failure.is_none() {
                        failure = Some(Error::ScanLine { line: y, source });
                    }
                    break;
                }
            }
        }
    }
    DecodedImage {
        size,
        raw,
        failure,
    }
}
