//! `SubRip` (`*.srt`) output.
use std::{
    fs::File,
    io::{self, BufWriter, Write as _},
    path::Path,
};

use crate::{time::TimeSpan, SubtextError};

/// Write subtitles in srt format
///
/// # Errors
/// Forward the errors of `writer`.
#[profiling::function]
pub fn write_srt(
    data: &[(TimeSpan, String)],
    writer: &mut impl io::Write,
) -> Result<(), io::Error> {
    data.iter()
        .enumerate()
        .try_for_each(write_srt_line(writer))?;

    Ok(())
}

/// Write subtitles in srt format to a new file at `path`.
///
/// # Errors
/// Return `SubtextError::Srt` if the file can't be created or written.
pub fn save_srt(data: &[(TimeSpan, String)], path: &Path) -> Result<(), SubtextError> {
    let file = File::create(path).map_err(SubtextError::Srt)?;
    let mut writer = BufWriter::new(file);
    write_srt(data, &mut writer).map_err(SubtextError::Srt)?;
    writer.flush().map_err(SubtextError::Srt)
}

/// Write an subtitle line in Srt format
fn write_srt_line(
    writer: &mut impl io::Write,
) -> impl FnMut((usize, &(TimeSpan, String))) -> Result<(), io::Error> + '_ {
    |(idx, (time_span, text))| {
        let line_num = idx + 1;
        let start = time_span.start;
        let end = time_span.end;
        writeln!(writer, "{line_num}\n{start} --> {end}\n{text}\n")
    }
}
