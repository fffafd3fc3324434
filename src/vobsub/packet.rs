//! Locate the Sub-Picture Unit (SPU) pointed to by an `*.idx` entry.
//!
//! `filepos` values of real `*.sub` files point at an MPEG-2 Program Stream
//! pack, and an SPU bigger than one `PES` payload is split across several
//! packs. Some producers store bare SPUs instead; both layouts are
//! accepted; the pack start code tells them apart.

use log::{trace, warn};
use std::borrow::Cow;
use thiserror::Error;

use super::{
    mpeg2::{clock::Clock, ps},
    probe::has_sub_magic,
    NomError,
};
use crate::util::{be_u16_at, BytesFormatter};

/// Errors locating or bounding a subtitle packet. They only affect the
/// subtitle they come from.
#[derive(Debug, Error)]
pub enum PacketError {
    /// The offset doesn't point inside the `*.sub` data.
    #[error("Offset 0x{offset:x} is past the end of the sub data ({len} bytes)")]
    NotFound {
        /// Requested offset.
        offset: u64,
        /// Length of the `*.sub` data.
        len: usize,
    },

    /// Less than the 4 header bytes are available.
    #[error("Subtitle packet header is truncated")]
    TruncatedHeader,

    /// The packet declares a zero length.
    #[error("Subtitle packet length is zero")]
    ZeroLength,

    /// The packet declares more bytes than available.
    #[error("Subtitle packet length ({length}) exceeds the {available} bytes available")]
    LengthExceedsBuffer {
        /// Declared packet length.
        length: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// The control sequence would start outside the packet.
    #[error("Control offset ({control_offset}) is not inside the packet ({length} bytes)")]
    ControlOffsetOutOfPacket {
        /// Declared control offset.
        control_offset: usize,
        /// Declared packet length.
        length: usize,
    },

    /// A Program Stream pack was found, but no subtitle `PES` packet in it.
    #[error("No subtitle PES packet after the Program Stream pack")]
    MissingPes,

    /// The `PES` packets wrapping the subtitle couldn't be parsed.
    #[error("Parsing the PES packets failed")]
    Pes(#[source] NomError),
}

/// A bounded Sub-Picture Unit: the 4 header bytes, the RLE data and the
/// control sequences.
#[derive(Clone, PartialEq, Eq)]
pub struct SpuPacket<'a> {
    data: Cow<'a, [u8]>,
    control_offset: usize,
    pts: Option<Clock>,
}

impl SpuPacket<'_> {
    /// Packet bytes, exactly `packet_length` long.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Declared packet length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// A located packet is never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Start of the first control sequence, relative to the packet start.
    #[must_use]
    pub const fn control_offset(&self) -> usize {
        self.control_offset
    }

    /// Presentation time stamp of the wrapping `PES` packet, if any.
    #[must_use]
    pub const fn pts(&self) -> Option<Clock> {
        self.pts
    }

    /// Did the SPU need to be reassembled from Program Stream packs?
    #[must_use]
    pub const fn is_wrapped(&self) -> bool {
        matches!(self.data, Cow::Owned(_))
    }
}

impl std::fmt::Debug for SpuPacket<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpuPacket")
            .field("data", &BytesFormatter(&self.data))
            .field("control_offset", &self.control_offset)
            .field("pts", &self.pts)
            .finish()
    }
}

/// Find the Sub-Picture Unit at `offset` in the `*.sub` data.
///
/// # Errors
/// Return a [`PacketError`] if the offset is out of range, if the wrapping
/// packets are broken, or if the declared sizes are inconsistent.
#[profiling::function]
pub fn locate_packet(sub: &[u8], offset: u64) -> Result<SpuPacket<'_>, PacketError> {
    let data = usize::try_from(offset)
        .ok()
        .and_then(|start| sub.get(start..))
        .filter(|data| !data.is_empty())
        .ok_or(PacketError::NotFound {
            offset,
            len: sub.len(),
        })?;

    if has_sub_magic(data) {
        trace!("Program Stream pack at 0x{offset:x}");
        unwrap_pes(data)
    } else {
        trace!("bare subtitle packet at 0x{offset:x}");
        bound(Cow::Borrowed(data), None)
    }
}

/// Collect the SPU from consecutive `PES` payloads of the same substream.
fn unwrap_pes(data: &[u8]) -> Result<SpuPacket<'static>, PacketError> {
    let mut packets = ps::pes_packets(data);
    let first = packets
        .next()
        .ok_or(PacketError::MissingPes)?
        .map_err(PacketError::Pes)?
        .pes_packet;
    let substream_id = first.substream_id;
    let pts = first.pts();

    let wanted = usize::from(be_u16_at(first.data, 0).ok_or(PacketError::TruncatedHeader)?);
    if wanted == 0 {
        return Err(PacketError::ZeroLength);
    }
    let mut spu = Vec::with_capacity(wanted);
    spu.extend_from_slice(first.data);

    while spu.len() < wanted {
        let next = match packets.next() {
            Some(next) => next.map_err(PacketError::Pes)?.pes_packet,
            None => {
                return Err(PacketError::LengthExceedsBuffer {
                    length: wanted,
                    available: spu.len(),
                })
            }
        };
        if next.substream_id != substream_id {
            warn!(
                "Found subtitle for stream 0x{:x} while looking for 0x{:x}",
                next.substream_id, substream_id
            );
            continue;
        }
        spu.extend_from_slice(next.data);
    }

    if spu.len() > wanted {
        trace!(
            "Found 0x{:x} bytes of data in subtitle packet, wanted 0x{:x}",
            spu.len(),
            wanted
        );
    }
    bound(Cow::Owned(spu), pts)
}

/// Validate the SPU header and cut `data` to the declared packet length.
fn bound(data: Cow<'_, [u8]>, pts: Option<Clock>) -> Result<SpuPacket<'_>, PacketError> {
    let header = |pos| be_u16_at(&data, pos).map(usize::from);
    let (Some(length), Some(control_offset)) = (header(0), header(2)) else {
        return Err(PacketError::TruncatedHeader);
    };

    if length == 0 {
        return Err(PacketError::ZeroLength);
    }
    if length > data.len() {
        return Err(PacketError::LengthExceedsBuffer {
            length,
            available: data.len(),
        });
    }
    if control_offset >= length {
        return Err(PacketError::ControlOffsetOutOfPacket {
            control_offset,
            length,
        });
    }

    let data = match data {
        Cow::Borrowed(data) => Cow::Borrowed(&data[..length]),
        Cow::Owned(mut data) => {
            data.truncate(length);
            Cow::Owned(data)
        }
    };
    Ok(SpuPacket {
        data,
        control_offset,
        pts,
    })
}
