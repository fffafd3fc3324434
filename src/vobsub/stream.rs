//! Turn the entries of an `*.idx` file into decoded, timed subtitle images.

use image::RgbaImage;
use log::{trace, warn};
use rayon::prelude::*;
use std::{fmt, fs, iter::Enumerate, path::Path, slice};
use thiserror::Error;

use super::{
    control::{ControlBlock, ControlError},
    idx::{DecodeOptions, Index, IndexEntry},
    img::{self, decompress},
    is_idx_file, is_sub_file,
    packet::{locate_packet, PacketError},
    VobSubError,
};
use crate::{
    content::Area,
    image::ImageArea,
    time::{TimePoint, TimeSpan},
};

/// Why a single subtitle couldn't be decoded.
#[derive(Debug, Error)]
pub enum CueFailure {
    /// The subtitle packet couldn't be found or bounded.
    #[error("Subtitle packet: {0}")]
    Packet(#[from] PacketError),

    /// The control sequences are unusable.
    #[error("Control sequence: {0}")]
    Control(#[from] ControlError),

    /// The bitmap couldn't be converted.
    #[error("Bitmap: {0}")]
    Image(#[from] img::Error),

    /// Neither the packet nor the frame size give a display area.
    #[error("No display area nor usable frame size")]
    NoArea,
}

/// A subtitle of the index was skipped. Iteration goes on with the next one.
#[derive(Debug, Error)]
#[error("Subtitle #{index} at {} skipped", .span.start)]
pub struct CueError {
    /// Position of the entry in the index.
    pub index: usize,
    /// Times the subtitle would have been shown.
    pub span: TimeSpan,
    /// What went wrong.
    #[source]
    pub source: CueFailure,
}

/// A decoded subtitle. The image covers the display area.
#[derive(Debug, Clone)]
pub struct DecodedCue {
    /// Position of the entry in the index.
    pub index: usize,
    /// Display start.
    pub start: TimePoint,
    /// Display end.
    pub end: TimePoint,
    /// Where the image is displayed in the frame.
    pub area: Area,
    /// Should this subtitle be shown even when subtitles are off?
    pub force: bool,
    /// Some lines couldn't be decoded and are left transparent.
    pub partial: bool,
    /// Decoded bitmap.
    pub image: RgbaImage,
}

impl DecodedCue {
    /// Start and end of this cue.
    #[must_use]
    pub const fn time_span(&self) -> TimeSpan {
        TimeSpan::new(self.start, self.end)
    }
}

impl ImageArea for DecodedCue {
    fn area(&self) -> Area {
        self.area
    }
}

/// How many subtitles were decoded, decoded in part, or skipped.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DecodeReport {
    /// Cues returned, partial ones included.
    pub produced: usize,
    /// Cues returned with missing lines.
    pub partial: usize,
    /// Entries without a cue.
    pub skipped: usize,
}

impl DecodeReport {
    /// Count one decode result.
    pub fn record(&mut self, res: &Result<DecodedCue, CueError>) {
        match res {
            Ok(cue) => {
                self.produced += 1;
                if cue.partial {
                    self.partial += 1;
                }
            }
            Err(_) => self.skipped += 1,
        }
    }
}

impl fmt::Display for DecodeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} subtitles decoded ({} partial), {} skipped",
            self.produced, self.partial, self.skipped
        )
    }
}

/// A `*.idx`/`*.sub` pair, ready to decode.
#[derive(Debug, Clone)]
pub struct VobSub {
    index: Index,
    sub: Vec<u8>,
}

impl VobSub {
    /// Open an `*.idx` file and the `*.sub` file next to it.
    ///
    /// # Errors
    /// See [`VobSub::open_with_options`].
    pub fn open<P: AsRef<Path>>(idx_path: P) -> Result<Self, VobSubError> {
        Self::open_with_options(idx_path, &DecodeOptions::default())
    }

    /// Open an `*.idx` file and the `*.sub` file next to it.
    ///
    /// # Errors
    /// Return `VobSubError::Io` if one of the files can't be read,
    /// `VobSubError::NotAnIndexFile` or `VobSubError::NotASubFile` if they
    /// don't look like what they should, and the errors of
    /// [`Index::parse_with_options`].
    #[profiling::function]
    pub fn open_with_options<P: AsRef<Path>>(
        idx_path: P,
        options: &DecodeOptions,
    ) -> Result<Self, VobSubError> {
        let idx_path = idx_path.as_ref();
        let sub_path = idx_path.with_extension("sub");
        if !is_idx_file(idx_path)? {
            return Err(VobSubError::NotAnIndexFile(idx_path.into()));
        }
        if !is_sub_file(&sub_path)? {
            return Err(VobSubError::NotASubFile(sub_path));
        }

        let index = Index::open(idx_path, options)?;
        let sub = fs::read(&sub_path).map_err(|source| VobSubError::Io {
            source,
            path: sub_path.clone(),
        })?;
        trace!(
            "opened {} with {} entries",
            idx_path.display(),
            index.entries().len()
        );
        Ok(Self::init(index, sub))
    }

    /// Build from the content of both files, with default options.
    ///
    /// # Errors
    /// See [`VobSub::with_options`].
    pub fn from_data(idx: &[u8], sub: Vec<u8>) -> Result<Self, VobSubError> {
        Self::with_options(idx, sub, &DecodeOptions::default())
    }

    /// Build from the content of both files.
    ///
    /// # Errors
    /// Return `VobSubError::EmptySubData` for an empty `sub`,
    /// `VobSubError::IndexNotText` if `idx` isn't UTF-8, and the errors of
    /// [`Index::parse_with_options`].
    pub fn with_options(
        idx: &[u8],
        sub: Vec<u8>,
        options: &DecodeOptions,
    ) -> Result<Self, VobSubError> {
        if sub.is_empty() {
            return Err(VobSubError::EmptySubData);
        }
        let text = std::str::from_utf8(idx).map_err(VobSubError::IndexNotText)?;
        let index = Index::parse_with_options(text, options)?;
        Ok(Self::init(index, sub))
    }

    /// Build from an already parsed index.
    #[must_use]
    pub const fn init(index: Index, sub: Vec<u8>) -> Self {
        Self { index, sub }
    }

    /// The parsed `*.idx` file.
    #[must_use]
    pub const fn index(&self) -> &Index {
        &self.index
    }

    /// The `*.sub` content.
    #[must_use]
    pub fn sub_data(&self) -> &[u8] {
        &self.sub
    }

    /// Decode the subtitles lazily, in index order.
    #[must_use]
    pub fn cues(&self) -> Cues<'_> {
        Cues {
            vobsub: self,
            entries: self.index.entries().iter().enumerate(),
            report: DecodeReport::default(),
        }
    }

    /// Decode the subtitle of entry `index`.
    ///
    /// # Errors
    /// Return a [`CueError`] describing why the subtitle can't be
    /// decoded.
    pub fn decode(&self, index: usize) -> Option<Result<DecodedCue, CueError>> {
        self.index
            .entries()
            .get(index)
            .map(|entry| self.decode_entry(index, entry))
    }

    /// Decode all subtitles, skipping broken ones.
    #[must_use]
    pub fn decode_all(&self) -> (Vec<DecodedCue>, DecodeReport) {
        let mut cues = self.cues();
        let decoded = cues.by_ref().flatten().collect();
        (decoded, cues.report())
    }

    /// Decode all subtitles on the `rayon` thread pool, skipping broken
    /// ones. Cues keep the index order.
    #[must_use]
    pub fn par_decode_all(&self) -> (Vec<DecodedCue>, DecodeReport) {
        profiling::scope!("VobSub par_decode_all");
        let results: Vec<_> = self
            .index
            .entries()
            .par_iter()
            .enumerate()
            .map(|(index, entry)| self.decode_entry(index, entry))
            .collect();

        let mut report = DecodeReport::default();
        let decoded = results
            .into_iter()
            .inspect(|res| report.record(res))
            .filter_map(|res| res.map_err(log_skipped).ok())
            .collect();
        (decoded, report)
    }

    fn decode_entry(&self, index: usize, entry: &IndexEntry) -> Result<DecodedCue, CueError> {
        self.decode_packet(index, entry)
            .map_err(|source| CueError {
                index,
                span: entry.time_span(),
                source,
            })
    }

    /// Locate, interpret and decompress the packet of `entry`.
    #[profiling::function]
    fn decode_packet(&self, index: usize, entry: &IndexEntry) -> Result<DecodedCue, CueFailure> {
        let packet = locate_packet(&self.sub, entry.filepos)?;
        if let Some(pts) = packet.pts() {
            trace!(
                "Subtitle #{index}: PTS {pts} ({}), idx start {}",
                pts.as_time_point(),
                entry.start
            );
        }
        let spu = packet.data();
        let control = ControlBlock::parse(spu, packet.control_offset())?;
        let area = control
            .area()
            .or_else(|| Area::from_size(self.index.size()))
            .ok_or(CueFailure::NoArea)?;

        let bitmap = decompress(area.size(), control.rle_streams(spu)?);
        let image = bitmap.to_rgba(self.index.palette(), control.palette(), control.alpha())?;
        Ok(DecodedCue {
            index,
            start: entry.start,
            end: entry.end,
            area,
            force: control.force(),
            partial: bitmap.is_partial(),
            image,
        })
    }
}

fn log_skipped(err: CueError) -> CueError {
    warn!("{err}: {}", err.source);
    err
}

/// Lazy iterator over the decoded subtitles of a [`VobSub`].
///
/// A subtitle which can't be decoded is returned as a [`CueError`];
/// iteration goes on with the next entry.
pub struct Cues<'a> {
    vobsub: &'a VobSub,
    entries: Enumerate<slice::Iter<'a, IndexEntry>>,
    report: DecodeReport,
}

impl Cues<'_> {
    /// Tally of the subtitles returned so far.
    #[must_use]
    pub const fn report(&self) -> DecodeReport {
        self.report
    }
}

impl Iterator for Cues<'_> {
    type Item = Result<DecodedCue, CueError>;

    fn next(&mut self) -> Option<Self::Item> {
        profiling::scope!("Cues next");
        let (index, entry) = self.entries.next()?;
        let res = self
            .vobsub
            .decode_entry(index, entry)
            .map_err(log_skipped);
        self.report.record(&res);
        Some(res)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for Cues<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageSize as _;

    /// 4x2 image of code 1 at (10, 20), lines filled with the end of line
    /// code.
    fn spu() -> Vec<u8> {
        let mut spu = vec![0x00, 0x00, 0x00, 0x00];
        // RLE data at 4: one line for each field.
        spu.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);
        let control_offset = u16::try_from(spu.len()).unwrap();
        let [hi, lo] = control_offset.to_be_bytes();
        spu.extend_from_slice(&[
            0x00, 0x00, hi, lo, 0x01, 0x05, 0x00, 0xa0, 0x0d, 0x01, 0x40, 0x15, 0x06, 0x00,
            0x04, 0x00, 0x06, 0xff,
        ]);
        let len = u16::try_from(spu.len()).unwrap();
        spu[..2].copy_from_slice(&len.to_be_bytes());
        spu[2..4].copy_from_slice(&control_offset.to_be_bytes());
        spu
    }

    fn idx(fileposes: &[usize]) -> String {
        let mut idx = String::from("size: 720x480\n");
        for (i, pos) in fileposes.iter().enumerate() {
            idx.push_str(&format!("timestamp: 00:00:0{i}:000, filepos: {pos:09x}\n"));
        }
        idx
    }

    #[test]
    fn decode_single_cue() {
        let vobsub = VobSub::from_data(idx(&[0]).as_bytes(), spu()).unwrap();
        let cue = vobsub.decode(0).unwrap().unwrap();
        assert_eq!((cue.width(), cue.height()), (4, 2));
        assert_eq!((cue.area.left(), cue.area.top()), (10, 20));
        assert_eq!(cue.start, TimePoint::from_msecs(0));
        assert!(!cue.partial);
        assert!(!cue.force);
        assert_eq!(cue.image.get_pixel(3, 1)[3], 0xff);
        assert!(vobsub.decode(1).is_none());
    }

    #[test]
    fn skip_bad_entries() {
        let mut sub = spu();
        let second = sub.len();
        sub.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
        let third = sub.len();
        sub.extend(spu());

        let vobsub = VobSub::from_data(idx(&[0, second, third]).as_bytes(), sub).unwrap();
        let mut cues = vobsub.cues();
        assert_eq!(cues.len(), 3);
        assert!(cues.next().unwrap().is_ok());
        let err = cues.next().unwrap().unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.span.start, TimePoint::from_msecs(1000));
        assert!(matches!(
            err.source,
            CueFailure::Packet(PacketError::ZeroLength)
        ));
        assert_eq!(cues.next().unwrap().unwrap().index, 2);
        assert!(cues.next().is_none());
        assert_eq!(
            cues.report(),
            DecodeReport {
                produced: 2,
                partial: 0,
                skipped: 1
            }
        );
        assert_eq!(
            cues.report().to_string(),
            "2 subtitles decoded (0 partial), 1 skipped"
        );
    }

    #[test]
    fn parallel_decode_keeps_order() {
        let mut sub = Vec::new();
        let mut fileposes = Vec::new();
        for _ in 0..6 {
            fileposes.push(sub.len());
            sub.extend(spu());
        }
        let vobsub = VobSub::from_data(idx(&fileposes).as_bytes(), sub).unwrap();
        let (sequential, report) = vobsub.decode_all();
        let (parallel, par_report) = vobsub.par_decode_all();
        assert_eq!(report, par_report);
        assert_eq!(report.produced, 6);
        let indexes: Vec<_> = parallel.iter().map(|cue| cue.index).collect();
        assert_eq!(indexes, [0, 1, 2, 3, 4, 5]);
        assert!(sequential
            .iter()
            .zip(&parallel)
            .all(|(a, b)| a.image == b.image && a.start == b.start));
    }

    #[test]
    fn reject_empty_sub() {
        assert!(matches!(
            VobSub::from_data(idx(&[0]).as_bytes(), Vec::new()),
            Err(VobSubError::EmptySubData)
        ));
    }
}
