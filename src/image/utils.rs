use image::{EncodableLayout, Pixel, PixelWithColorType};
use std::{
    borrow::Borrow,
    fs::create_dir_all,
    io,
    ops::Deref,
    path::{Path, PathBuf},
};
use thiserror::Error;

use crate::vobsub::DecodedCue;

/// Handle Error for image dump.
#[derive(Error, Debug)]
pub enum DumpError {
    /// Error with path creation
    #[error("Could not create path for dump images '{}'", path.display())]
    Folder {
        /// Path of the folder
        path: PathBuf,
        /// Error source
        source: io::Error,
    },

    /// Error during file dump
    #[error("Could not write image dump file '{}'", filename.display())]
    DumpImage {
        /// Path of the file write failed
        filename: PathBuf,
        /// Error source
        source: image::ImageError,
    },
}

/// Dump some images in a folder specified by the path, as `000000.png`,
/// `000001.png`, ...
///
/// # Errors
/// Return a [`DumpError`] if the folder can't be created or an image can't
/// be written.
#[profiling::function]
pub fn dump_images<'a, Iter, Img, P, Container>(path: &Path, images: Iter) -> Result<(), DumpError>
where
    P: Pixel + PixelWithColorType + 'a,
    [P::Subpixel]: EncodableLayout,
    Container: Deref<Target = [P::Subpixel]> + 'a,
    Img: Borrow<image::ImageBuffer<P, Container>>,
    Iter: IntoIterator<Item = Img>,
{
    // create path if not exist
    if !path.is_dir() {
        create_dir_all(path).map_err(|source| DumpError::Folder {
            path: path.into(),
            source,
        })?;
    }

    images.into_iter().enumerate().try_for_each(|(i, img)| {
        let filepath = path.join(format!("{i:06}.png"));
        dump_image(&filepath, img.borrow()).map_err(|source| DumpError::DumpImage {
            filename: filepath,
            source,
        })
    })
}

/// Dump the images of decoded subtitles, in order.
///
/// # Errors
/// See [`dump_images`].
pub fn dump_cues(path: &Path, cues: &[DecodedCue]) -> Result<(), DumpError> {
    dump_images(path, cues.iter().map(|cue| &cue.image))
}

/// Dump one image
#[profiling::function]
fn dump_image<P, Pix, Container>(
    filename: P,
    image: &image::ImageBuffer<Pix, Container>,
) -> Result<(), image::ImageError>
where
    P: AsRef<Path>,
    Pix: Pixel + PixelWithColorType,
    [Pix::Subpixel]: EncodableLayout,
    Container: Deref<Target = [Pix::Subpixel]>,
{
    image.save(filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use std::{env, process};

    #[test]
    fn dump_into_new_folder() {
        let dir = env::temp_dir().join(format!("subtext-dump-{}", process::id()));
        let images = [
            GrayImage::from_pixel(4, 2, Luma([0])),
            GrayImage::from_pixel(2, 2, Luma([255])),
        ];
        dump_images(&dir, &images).unwrap();
        assert!(dir.join("000000.png").is_file());
        assert!(dir.join("000001.png").is_file());
        assert!(!dir.join("000002.png").exists());
    }
}
