//! Try to guess the types of files on disk.

use super::{mpeg2::ps::PACK_START_CODE, VobSubError};
use std::{fs, io::Read as _, path::Path};

/// First line of every `*.idx` file written by `VobSub` tools.
const IDX_MAGIC: &[u8] = b"# VobSub index file";

/// Internal helper function which looks for "magic" bytes at the start of
/// a file. A file shorter than the magic doesn't match.
fn has_magic(path: &Path, magic: &[u8]) -> Result<bool, VobSubError> {
    let mkerr = |source| VobSubError::Io {
        source,
        path: path.into(),
    };

    let f = fs::File::open(path).map_err(mkerr)?;
    let mut bytes = Vec::with_capacity(magic.len());
    f.take(magic.len() as u64)
        .read_to_end(&mut bytes)
        .map_err(mkerr)?;
    Ok(magic == &bytes[..])
}

/// Does the specified path appear to point to an `*.idx` file?
/// # Errors
///
/// Will return `Err` if the file can't be read.
pub fn is_idx_file<P: AsRef<Path>>(path: P) -> Result<bool, VobSubError> {
    has_magic(path.as_ref(), IDX_MAGIC)
}

/// Does the specified path appear to point to a `*.sub` file?
///
/// Note that this may (or may not) return false positives for certain
/// MPEG-2 related formats.
///
/// # Errors
///
/// Will return `Err` if the file can't be read.
pub fn is_sub_file<P: AsRef<Path>>(path: P) -> Result<bool, VobSubError> {
    has_magic(path.as_ref(), PACK_START_CODE)
}

/// Does this buffer start like an `*.idx` file?
#[must_use]
pub fn has_idx_magic(data: &[u8]) -> bool {
    data.starts_with(IDX_MAGIC)
}

/// Does this buffer start like a `*.sub` file?
#[must_use]
pub fn has_sub_magic(data: &[u8]) -> bool {
    data.starts_with(PACK_START_CODE)
}
