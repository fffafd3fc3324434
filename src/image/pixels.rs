use image::{imageops, GrayImage, Luma, LumaA, Pixel as _, Primitive, RgbaImage};
use std::borrow::Borrow;

/// Create and return a closure than convert a Pixel from [`LumaA`] to [`Luma`].
///
/// The closure apply threasold value from function parameters. If the alpha and luma value
/// of the pixel is greater than or equal to threshold values, the output is [`Primitive::DEFAULT_MIN_VALUE`] (equivalent to black).
/// Otherwise, the returned value is [`Primitive::DEFAULT_MAX_VALUE`] (equivalent to white).
///
/// * `alpha_t`: alpha threshold
/// * `luma_t`: luma threshold
pub fn luma_a_to_luma_convertor<P, In>(alpha_t: P, luma_t: P) -> impl Fn(In) -> Luma<P>
where
    P: Primitive,
    In: Borrow<LumaA<P>>,
{
    move |luma| {
        let luma = luma.borrow();
        let luminance = luma[0]; //0 : Luminance idx
        let alpha = luma[1]; //1 : Alpha idx
        if alpha >= alpha_t && luminance >= luma_t {
            Luma([P::DEFAULT_MIN_VALUE])
        } else {
            Luma([P::DEFAULT_MAX_VALUE])
        }
    }
}

/// Thresholds and margin of [`binarize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinarizeOptions {
    /// Minimal opacity of a text pixel.
    pub alpha_threshold: u8,
    /// Minimal luminance of a text pixel.
    pub luma_threshold: u8,
    /// White border added around the image.
    pub margin: u32,
}

impl Default for BinarizeOptions {
    fn default() -> Self {
        Self {
            alpha_threshold: 0x80,
            luma_threshold: 0x99,
            margin: 10,
        }
    }
}

/// Turn a decoded subtitle into black text on a white background.
///
/// Subtitle text is usually a light fill with a dark outline: opaque
/// pixels bright enough become black, everything else (outline,
/// transparent background) becomes white.
#[profiling::function]
#[must_use]
pub fn binarize(image: &RgbaImage, options: BinarizeOptions) -> GrayImage {
    let to_luma = luma_a_to_luma_convertor(options.alpha_threshold, options.luma_threshold);
    let text = GrayImage::from_fn(image.width(), image.height(), |x, y| {
        to_luma(image.get_pixel(x, y).to_luma_alpha())
    });

    let margin = options.margin;
    if margin == 0 {
        return text;
    }
    let mut out = GrayImage::from_pixel(
        image.width() + 2 * margin,
        image.height() + 2 * margin,
        Luma([u8::MAX]),
    );
    imageops::overlay(&mut out, &text, i64::from(margin), i64::from(margin));
    out
}
