//! `subtext` decodes DVD `VobSub` subtitles (`*.idx` + `*.sub` pairs) into
//! timed RGBA images, and provides the plumbing to hand those images to an
//! OCR engine and write the recognized text as `SubRip`.
//!
//! The hard part lives in [`vobsub`]: the `*.idx` parser, the Sub-Picture
//! Unit locator, the control sequence interpreter and the interlaced RLE
//! bitmap decoder. Text recognition itself is delegated to an
//! [`ocr::OcrEngine`] implementation supplied by the caller.
//!
//! ```no_run
//! use subtext::{image::ImageSize as _, vobsub::VobSub};
//!
//! let vobsub = VobSub::open("./movie.idx").unwrap();
//! let mut cues = vobsub.cues();
//! for cue in &mut cues {
//!     match cue {
//!         Ok(cue) => println!("{} --> {} ({}x{})", cue.start, cue.end, cue.width(), cue.height()),
//!         Err(err) => eprintln!("skipped: {err}"),
//!     }
//! }
//! println!("{}", cues.report());
//! ```

mod errors;
mod util;

pub mod content;
pub mod image;
pub mod ocr;
pub mod srt;
pub mod time;
pub mod vobsub;

pub use errors::SubtextError;
