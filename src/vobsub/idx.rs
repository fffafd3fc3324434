//! Parse a file in `*.idx` format.

use compact_str::CompactString;
use log::{trace, warn};
use regex::Regex;
use std::{fmt, fs, iter, path::Path, sync::LazyLock};

use super::{
    palette::{palette, DEFAULT_PALETTE},
    Palette, VobSubError,
};
use crate::{
    content::{Size, DEFAULT_FRAME_SIZE, MAX_DIMENSION},
    time::{TimePoint, TimeSpan},
    vobsub::IResultExt as _,
};

/// Display duration given to the last subtitle of a file, which has no
/// following subtitle to end it.
pub const DEFAULT_LAST_DURATION: TimePoint = TimePoint::from_msecs(3000);

/// Options of a decode session.
#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions {
    last_duration: TimePoint,
    default_size: Size,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            last_duration: DEFAULT_LAST_DURATION,
            default_size: DEFAULT_FRAME_SIZE,
        }
    }
}

impl DecodeOptions {
    /// Set the duration of the last subtitle, and of subtitles whose
    /// successor starts earlier than them.
    #[must_use]
    pub const fn with_last_duration(mut self, duration: TimePoint) -> Self {
        self.last_duration = duration;
        self
    }

    /// Set the frame size used if the `*.idx` has no `size:` line.
    #[must_use]
    pub const fn with_default_size(mut self, size: Size) -> Self {
        self.default_size = size;
        self
    }

    /// Fallback duration of a subtitle.
    #[must_use]
    pub const fn last_duration(&self) -> TimePoint {
        self.last_duration
    }

    /// Frame size used if the `*.idx` has no `size:` line.
    #[must_use]
    pub const fn default_size(&self) -> Size {
        self.default_size
    }
}

/// Lang of a subtitle as reported in `VobSub` idx file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lang(CompactString);

impl Lang {
    /// Language code, as written in the `id:` line (`en`, `fr`, ...).
    #[must_use]
    pub fn lang(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Lang {
    type Error = VobSubError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        static LANG_INDEX: LazyLock<Regex> =
            LazyLock::new(|| Regex::new("^([a-z]+), index: (.*)").unwrap());
        LANG_INDEX
            .captures(value)
            .and_then(|cap| cap.get(1))
            .map(|lang| Self(lang.as_str().into()))
            .ok_or(VobSubError::LangParsing)
    }
}

/// Extend `TimePoint` to implement `idx` specific `Display`.
#[repr(transparent)]
pub struct TimePointIdx(TimePoint);

impl From<TimePoint> for TimePointIdx {
    fn from(value: TimePoint) -> Self {
        Self(value)
    }
}

impl fmt::Display for TimePointIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt_separator(f, ':')
    }
}

/// One `timestamp:` line of the `*.idx` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Display start.
    pub start: TimePoint,
    /// Display end, derived from the start of the next entry.
    pub end: TimePoint,
    /// Byte offset of the subtitle packet in the `*.sub` data.
    pub filepos: u64,
}

impl IndexEntry {
    /// Start and end of this entry.
    #[must_use]
    pub const fn time_span(&self) -> TimeSpan {
        TimeSpan::new(self.start, self.end)
    }
}

impl fmt::Display for IndexEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "timestamp: {}, filepos: {:09x}",
            TimePointIdx(self.start),
            self.filepos
        )
    }
}

/// A `*.idx` file describing the subtitles in a `*.sub` file.
#[derive(Debug, Clone)]
pub struct Index {
    /// Frame size.
    size: Size,
    /// The colors used for the subtitles.
    palette: Palette,
    /// Lang of the subtitles
    lang: Option<Lang>,
    /// Subtitle entries, in file order.
    entries: Vec<IndexEntry>,
}

const PALETTE_KEY: &str = "palette";
const SIZE_KEY: &str = "size";
const LANG_KEY: &str = "id";
const TIMESTAMP_KEY: &str = "timestamp";
const TIME_OFFSET_KEY: &str = "time offset";

impl Index {
    /// Open and parse an `*.idx` file.
    ///
    /// # Errors
    /// Will return `VobSubError::Io` if failed to read the file,
    /// and the errors of [`Index::parse_with_options`].
    #[profiling::function]
    pub fn open<P: AsRef<Path>>(path: P, options: &DecodeOptions) -> Result<Self, VobSubError> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| VobSubError::Io {
            source,
            path: path.into(),
        })?;
        let text = std::str::from_utf8(&data).map_err(VobSubError::IndexNotText)?;
        Self::parse_with_options(text, options)
    }

    /// Parse `*.idx` content with default options.
    ///
    /// # Errors
    /// See [`Index::parse_with_options`].
    pub fn parse(text: &str) -> Result<Self, VobSubError> {
        Self::parse_with_options(text, &DecodeOptions::default())
    }

    /// Parse `*.idx` content. Lines are handled independently, unknown keys
    /// and malformed values are ignored.
    ///
    /// # Errors
    /// Will return `VobSubError::MalformedIndex` if no valid `timestamp:`
    /// line is found.
    ///
    /// # Panics
    /// Panic if the Regex creation failed
    #[profiling::function]
    pub fn parse_with_options(text: &str, options: &DecodeOptions) -> Result<Self, VobSubError> {
        static KEY_VALUE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"^([A-Za-z/ ]+):\s*(.*)").unwrap());

        let mut palette_val = None;
        let mut size = None;
        let mut lang = None;
        let mut time_offset = 0;
        let mut starts = Vec::new();
        for line in text.lines().map(str::trim) {
            let Some(cap) = KEY_VALUE.captures(line) else {
                continue;
            };
            let (Some(key), Some(val)) = (cap.get(1), cap.get(2)) else {
                continue;
            };
            let val = val.as_str().trim();
            match key.as_str() {
                PALETTE_KEY => match palette(val.as_bytes()).to_result_no_rest() {
                    Ok(parsed) => palette_val = Some(parsed),
                    Err(err) => warn!("Ignoring invalid idx palette ({err}): '{val}'"),
                },
                SIZE_KEY => {
                    size = parse_size(val);
                    if size.is_none() {
                        warn!("Ignoring invalid idx size: '{val}'");
                    }
                }
                LANG_KEY => {
                    lang = Lang::try_from(val).ok();
                }
                TIME_OFFSET_KEY => match val.parse::<i64>() {
                    Ok(offset) => time_offset = offset,
                    Err(_) => warn!("Ignoring invalid idx time offset: '{val}'"),
                },
                TIMESTAMP_KEY => {
                    if let Some(entry) = parse_timestamp(val) {
                        starts.push(entry);
                    } else {
                        warn!("Ignoring invalid idx timestamp line: '{val}'");
                    }
                }
                key => trace!("Unimplemented idx key: {key}"),
            }
        }

        if starts.is_empty() {
            return Err(VobSubError::MalformedIndex);
        }
        if time_offset != 0 {
            starts.iter_mut().for_each(|(start, _)| {
                *start = TimePoint::from_msecs(start.msecs().saturating_add(time_offset).max(0));
            });
        }

        let palette = palette_val.unwrap_or(DEFAULT_PALETTE);
        let size = size.unwrap_or(options.default_size());
        let entries = with_end_times(starts, options.last_duration());

        Ok(Self {
            size,
            palette,
            lang,
            entries,
        })
    }

    /// Get the palette associated with this `*.idx` file.
    #[must_use]
    pub const fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Get the lang associated with this `*.idx` file.
    #[must_use]
    pub const fn lang(&self) -> Option<&Lang> {
        self.lang.as_ref()
    }

    /// Frame size of the video the subtitles are drawn on.
    #[must_use]
    pub const fn size(&self) -> Size {
        self.size
    }

    /// The subtitle entries, in file order.
    #[must_use]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }
}

/// Parse the `WIDTHxHEIGHT` value of a `size:` line. Both sides must be in
/// `1..=MAX_DIMENSION`.
fn parse_size(val: &str) -> Option<Size> {
    static SIZE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(\d+)\s*x\s*(\d+)").unwrap());
    let cap = SIZE.captures(val)?;
    let w = cap.get(1)?.as_str().parse().ok()?;
    let h = cap.get(2)?.as_str().parse().ok()?;
    let valid = |side: usize| (1..=MAX_DIMENSION).contains(&side);
    (valid(w) && valid(h)).then_some(Size { w, h })
}

/// Parse the `HH:MM:SS:mmm, filepos: HEX` value of a `timestamp:` line.
fn parse_timestamp(val: &str) -> Option<(TimePoint, u64)> {
    static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^(\d+):(\d{1,2}):(\d{1,2})[:,.](\d{1,3}),\s*filepos:\s*([0-9A-Fa-f]+)")
            .unwrap()
    });
    let cap = TIMESTAMP.captures(val)?;
    let num = |i| cap.get(i)?.as_str().parse::<i64>().ok();
    let start = TimePoint::from_components(num(1)?, num(2)?, num(3)?, num(4)?)?;
    let filepos = u64::from_str_radix(cap.get(5)?.as_str(), 16).ok()?;
    Some((start, filepos))
}

/// Each entry ends where the next one starts. The last one, and any entry
/// followed by an earlier one, lasts `fallback`.
fn with_end_times(starts: Vec<(TimePoint, u64)>, fallback: TimePoint) -> Vec<IndexEntry> {
    let nexts: Vec<_> = starts
        .iter()
        .skip(1)
        .map(|&(start, _)| Some(start))
        .chain(iter::once(None))
        .collect();
    starts
        .into_iter()
        .zip(nexts)
        .map(|((start, filepos), next)| {
            let end = match next {
                Some(next) if next >= start => next,
                Some(next) => {
                    warn!(
                        "Subtitle at {} is followed by an earlier one at {}",
                        TimePointIdx(start),
                        TimePointIdx(next)
                    );
                    start + fallback
                }
                None => start + fallback,
            };
            IndexEntry {
                start,
                end,
                filepos,
            }
        })
        .collect()
}
