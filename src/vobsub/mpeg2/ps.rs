//! # MPEG-2 Program Streams (PS)
//!
//! This is the container format used at the top-level of a `*.sub` file.

use log::{debug, trace, warn};
use nom::{
    bits::{
        bits,
        complete::{tag as tag_bits, take as take_bits},
    },
    bytes::complete::tag as tag_bytes,
    IResult, Parser as _,
};
use std::fmt;

use super::{
    clock::{clock_and_ext, Clock},
    pes,
};
use crate::vobsub::NomError;

/// Sync bytes at the start of every Program Stream pack.
pub const PACK_START_CODE: &[u8] = &[0x00, 0x00, 0x01, 0xba];

/// A parsed [MPEG-2 Program Stream header][MPEG-PS] (MPEG-PS).
///
/// [MPEG-PS]: https://en.wikipedia.org/wiki/MPEG_program_stream
#[derive(Debug, PartialEq, Eq)]
pub struct Header {
    /// The System Clock Reference (`SCR`) and `SCR` extension field.
    pub scr: Clock,
    /// The bit rate, in units of 50 bytes per second.
    pub bit_rate: u32,
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[PS packet @ {}, {} kbps]",
            self.scr,
            (self.bit_rate * 50 * 8) / 1024
        )
    }
}

/// The 10 bytes following the pack start code, stuffing included.
fn header_fields(input: (&[u8], usize)) -> IResult<(&[u8], usize), Header> {
    let (input, (_, scr, bit_rate, _, _, stuffing_length)) = (
        // MPEG-2 version tag.
        tag_bits(0b01u8, 2u8),
        clock_and_ext,
        take_bits::<_, u32, _, _>(22u8),
        // Marker bits.
        tag_bits(0b11u8, 2u8),
        // Reserved.
        take_bits::<_, u8, _, _>(5u8),
        take_bits::<_, usize, _, _>(3u8),
    )
        .parse(input)?;

    // Stuffing bytes.  We just want to ignore these, but use a large
    // enough type to prevent overflow panics when fuzzing.
    let (input, _) = take_bits::<_, u64, _, _>(stuffing_length * 8).parse(input)?;
    Ok((input, Header { scr, bit_rate }))
}

/// Parse a Program Stream header.
pub fn header(input: &[u8]) -> IResult<&[u8], Header> {
    let (input, (_, header)) = (tag_bytes(PACK_START_CODE), bits(header_fields)).parse(input)?;
    Ok((input, header))
}

/// A [Packetized Elementary Stream][pes] packet with a Program Stream
/// header.
///
/// [pes]: http://dvd.sourceforge.net/dvdinfo/pes-hdr.html
#[derive(Debug, PartialEq, Eq)]
pub struct PesPacket<'a> {
    /// Pack header.
    pub ps_header: Header,
    /// The subtitle `PES` packet of this pack.
    pub pes_packet: pes::Packet<'a>,
}

/// Parse a Program Stream packet and the following `PES` packet.
pub fn pes_packet(input: &[u8]) -> IResult<&[u8], PesPacket<'_>> {
    let (input, (ps_header, pes_packet)) = (header, pes::packet).parse(input)?;
    Ok((
        input,
        PesPacket {
            ps_header,
            pes_packet,
        },
    ))
}

/// An iterator over all the subtitles `PES` packets in an MPEG-2 Program
/// Stream. Packs holding other streams (padding, ...) are skipped.
pub struct PesPackets<'a> {
    /// The remaining input to parse.
    remaining: &'a [u8],
}

impl<'a> Iterator for PesPackets<'a> {
    type Item = Result<PesPacket<'a>, NomError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            // Search for the start of a ProgramStream packet.
            let start = self
                .remaining
                .windows(PACK_START_CODE.len())
                .position(|window| PACK_START_CODE == window);

            let Some(start) = start else {
                self.remaining = &[];
                trace!("Reached end of data");
                return None;
            };

            // We found the start, so try to parse it.
            self.remaining = &self.remaining[start..];
            match pes_packet(self.remaining) {
                Ok((remaining, packet)) => {
                    self.remaining = remaining;
                    trace!("Decoded packet {:?}", &packet);
                    return Some(Ok(packet));
                }
                // We have only a partial packet, and we hit the end of our
                // data.
                Err(nom::Err::Incomplete(needed)) => {
                    self.remaining = &[];
                    warn!("Incomplete packet, need: {needed:?}");
                    return Some(Err(NomError::IncompleteInput(needed)));
                }
                // We got something that looked like a packet but wasn't
                // parseable.  Log it and keep trying.
                Err(nom::Err::Error(err) | nom::Err::Failure(err)) => {
                    self.remaining = &self.remaining[PACK_START_CODE.len()..];
                    debug!("Skipping packet {:?}", &err);
                }
            }
        }
    }
}

/// Iterate over all the `PES` packets in an MPEG-2 Program Stream (or at
/// least those which contain subtitles).
#[must_use]
pub const fn pes_packets(input: &[u8]) -> PesPackets<'_> {
    PesPackets { remaining: input }
}
