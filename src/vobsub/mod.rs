//! This module reads DVD subtitles in `VobSub` format.  These are typically
//! stored as two files: an `*.idx` file summarizing the subtitles, and an
//! MPEG-2 Program Stream containing the actual subtitle packets.
//!
//! ## Example code
//!
//! ```no_run
//! use subtext::vobsub::VobSub;
//!
//! let vobsub = VobSub::open("./fixtures/example.idx").unwrap();
//! for cue in vobsub.cues().flatten() {
//!     println!("Time: {} --> {}", cue.start, cue.end);
//!     println!("Always show: {:?}", cue.force);
//!     let area = cue.area;
//!     println!("At: {}, {}", area.left(), area.top());
//!     println!("Size: {}x{}", area.width(), area.height());
//!     let img: &image::RgbaImage = &cue.image;
//!
//!     // You can save or manipulate `img` using the APIs provided by the Rust
//!     // `image` crate.
//! }
//! ```
//!
//! ## Pipeline
//!
//! Decoding goes through four stages for each `timestamp:` entry of the
//! index:
//!
//! 1. [`locate_packet`] bounds the Sub-Picture Unit (SPU) found at the
//!    entry's `filepos`, unwrapping the MPEG-2 Program Stream and `PES`
//!    layers when present.
//! 2. [`ControlBlock::parse`] walks the SPU control sequences.
//! 3. [`decompress`] expands the two interlaced run-length streams.
//! 4. [`Cues`] attaches timing and converts to RGBA.
//!
//! A broken subtitle only ever costs that one subtitle: every per-cue
//! failure is reported as a [`CueError`] and iteration goes on.
//!
//! ## Background & References
//!
//! `VobSub` subtitles consist of a simple textual `*.idx` file, and a binary
//! `*.sub` file.  The binary `*.sub` file is essentially an MPEG-2 Program
//! Stream containing Packetized Elementary Stream data, but only for a
//! single subtitle track.
//!
//! Useful references include:
//!
//! - [Program Stream](https://en.wikipedia.org/wiki/MPEG_program_stream) (PS)
//! - [Packetized Elementary Stream][PES] (PES)
//! - [DVD subtitles](http://sam.zoy.org/writings/dvd/subtitles/)
//! - [System Time Clock](http://www.bretl.com/mpeghtml/STC.HTM)
//!
//! [PES]: http://dvd.sourceforge.net/dvdinfo/pes-hdr.html

mod control;
mod idx;
mod img;
mod mpeg2;
mod packet;
mod palette;
mod probe;
mod stream;

pub use self::control::{ControlBlock, ControlError};
pub use self::idx::{DecodeOptions, Index, IndexEntry, Lang, DEFAULT_LAST_DURATION};
pub use self::img::{decompress, DecodedImage, Error as ImageError};
pub use self::mpeg2::clock::Clock;
pub use self::packet::{locate_packet, PacketError, SpuPacket};
pub use self::palette::{palette, Palette, DEFAULT_PALETTE};
pub use self::probe::{has_idx_magic, has_sub_magic, is_idx_file, is_sub_file};
pub use self::stream::{CueError, CueFailure, Cues, DecodeReport, DecodedCue, VobSub};

use nom::{IResult, Needed};
use std::{fmt, io, path::PathBuf};
use thiserror::Error;

/// Error for `VobSub` handling. These errors concern a whole `*.idx`/`*.sub`
/// pair; problems with a single subtitle are reported as [`CueError`].
#[derive(Debug, Error)]
pub enum VobSubError {
    /// The `*.idx` file contains no `timestamp:` entry, so there is nothing
    /// to decode.
    #[error("No valid timestamp entry found in the idx file")]
    MalformedIndex,

    /// The `*.idx` content is not text.
    #[error("The idx data is not valid UTF-8 text")]
    IndexNotText(#[source] std::str::Utf8Error),

    /// The file given as `*.idx` doesn't start like one.
    #[error("'{}' is not a VobSub idx file", .0.display())]
    NotAnIndexFile(PathBuf),

    /// The `*.sub` file next to the `*.idx` doesn't start like one.
    #[error("'{}' is not a VobSub sub file", .0.display())]
    NotASubFile(PathBuf),

    /// The `*.sub` content is empty.
    #[error("The sub data is empty")]
    EmptySubData,

    /// Lang line didn't have the `xx, index: N` shape.
    #[error("Failed to parse lang from the `id` line")]
    LangParsing,

    /// We could not read a file.
    #[error("Could not read '{path}'")]
    Io {
        /// Source error
        source: io::Error,
        /// Path of the file we tried to read
        path: PathBuf,
    },
}

/// Error from `nom` handling
#[derive(Debug, Error)]
pub enum NomError {
    /// We have leftover input that we didn't expect.
    #[error("Unexpected extra input")]
    UnexpectedInput,

    /// Our input data ended sooner than we expected.
    #[error("Incomplete input: '{0:?}' needed.")]
    IncompleteInput(Needed),

    /// An error happend during parsing
    #[error("Error from nom : {0}")]
    Error(String),

    /// And Failure happend during parsing
    #[error("Failure from nom : {0}")]
    Failure(String),
}

impl<E: fmt::Debug> From<nom::Err<E>> for NomError {
    fn from(err: nom::Err<E>) -> Self {
        match err {
            nom::Err::Incomplete(needed) => Self::IncompleteInput(needed),
            nom::Err::Error(err) => Self::Error(format!("{err:?}")),
            nom::Err::Failure(err) => Self::Failure(format!("{err:?}")),
        }
    }
}

/// Extend `IResult` management, and convert to [`Result`] with [`NomError`]
pub trait IResultExt<I, O, E> {
    /// Convert an `IResult` to Result<_, `NomError`> and check than the buffer is empty after parsing.
    /// # Errors
    /// Forward `Error` and `Failure` from nom, and return `UnexpectedInput` if the buffer is not empty after parsing.
    fn to_result_no_rest(self) -> Result<O, NomError>;

    /// Convert an `IResult` to Result<_, `NomError`>
    /// # Errors
    /// Forward `Error` and `Failure` from nom.
    fn to_result(self) -> Result<(I, O), NomError>;
}

impl<I: Default + Eq, O, E: fmt::Debug> IResultExt<I, O, E> for IResult<I, O, E> {
    fn to_result_no_rest(self) -> Result<O, NomError> {
        match self {
            IResult::Ok((rest, val)) => {
                if rest == I::default() {
                    Ok(val)
                } else {
                    Err(NomError::UnexpectedInput)
                }
            }
            IResult::Err(err) => Err(err.into()),
        }
    }
    fn to_result(self) -> Result<(I, O), NomError> {
        self.map_err(NomError::from)
    }
}
