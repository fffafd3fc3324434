//! Custom error types.

use thiserror::Error;

/// A type representing errors that are specific to `subtext`. Module level
/// functions return their own error types, which all convert into this one.
#[derive(Debug, Error)]
pub enum SubtextError {
    /// Error with `VobSub`
    #[error("Error with VobSub")]
    VobSub(#[from] crate::vobsub::VobSubError),

    /// A single subtitle could not be decoded.
    #[error("Subtitle decoding failed")]
    Cue(#[from] crate::vobsub::CueError),

    /// Error from the OCR collaborator.
    #[error("OCR failed")]
    Ocr(#[from] crate::ocr::OcrError),

    /// Error during image dump
    #[error("Dump images failed")]
    ImageDump(#[from] crate::image::DumpError),

    /// Error while writing `SubRip` output.
    #[error("Writing srt output failed")]
    Srt(#[source] std::io::Error),
}
