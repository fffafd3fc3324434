//! # MPEG-2 Packetized Elementary Streams (`PES`)
//!
//! These packets are nested inside the MPEG-2 Program Stream packets found
//! in a `*.sub` file. Subtitles use the "private stream 1" stream id, and
//! the first payload byte is the substream id (`0x20 + track`).

use nom::{
    bits::{bits, complete::tag as tag_bits, complete::take as take_bits},
    branch::alt,
    bytes::complete::tag as tag_bytes,
    combinator::{map, rest, value},
    multi::length_value,
    number::complete::{be_u16, be_u8},
    IResult, Parser as _,
};
use std::fmt;

use super::clock::{clock, Clock};
use crate::util::BytesFormatter;

type BitInput<'a> = (&'a [u8], usize);

/// Possible combinations of `PTS` and `DTS` data which might appear inside a
/// `PES` header.
///
/// See the [`PES` header documentation][PES] for details.
///
/// [PES]: http://dvd.sourceforge.net/dvdinfo/pes-hdr.html
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PtsDtsFlags {
    /// No time stamps.
    #[default]
    None,
    /// Presentation Time Stamp only.
    Pts,
    /// Presentation and Decode Time Stamps.
    PtsDts,
}

/// Parse `PTS` & `DTS` flags in a `PES` packet header.  Consumes two bits.
fn pts_dts_flags(input: BitInput<'_>) -> IResult<BitInput<'_>, PtsDtsFlags> {
    alt((
        value(PtsDtsFlags::None, tag_bits(0b00u8, 2u8)),
        value(PtsDtsFlags::Pts, tag_bits(0b10u8, 2u8)),
        value(PtsDtsFlags::PtsDts, tag_bits(0b11u8, 2u8)),
    ))
    .parse(input)
}

/// Presentation and Decode Time Stamps, if available.
#[derive(Debug, PartialEq, Eq)]
pub struct PtsDts {
    /// Presentation Time Stamp.
    pub pts: Clock,
    /// Decode Time Stamp.
    pub dts: Option<Clock>,
}

/// Bit level parser of a `PTS` preceded by its 4-bit prefix.
fn pts_only(input: BitInput<'_>) -> IResult<BitInput<'_>, PtsDts> {
    let (input, (_, pts)) = (tag_bits(0b0010u8, 4u8), clock).parse(input)?;
    Ok((input, PtsDts { pts, dts: None }))
}

/// Bit level parser of a `PTS` and a `DTS`, each preceded by its prefix.
fn pts_and_dts(input: BitInput<'_>) -> IResult<BitInput<'_>, PtsDts> {
    let (input, (_, pts, _, dts)) = (
        tag_bits(0b0011u8, 4u8),
        clock,
        tag_bits(0b0001u8, 4u8),
        clock,
    )
        .parse(input)?;
    Ok((
        input,
        PtsDts {
            pts,
            dts: Some(dts),
        },
    ))
}

/// Parse the time stamps announced by `flags`.
fn pts_dts(input: &[u8], flags: PtsDtsFlags) -> IResult<&[u8], Option<PtsDts>> {
    match flags {
        PtsDtsFlags::None => Ok((input, None)),
        PtsDtsFlags::Pts => map(bits(pts_only), Some).parse(input),
        PtsDtsFlags::PtsDts => map(bits(pts_and_dts), Some).parse(input),
    }
}

/// Deserialize a single Boolean flag bit.
fn bool_flag(input: BitInput<'_>) -> IResult<BitInput<'_>, bool> {
    map(take_bits(1u8), |b: u8| b == 1).parse(input)
}

/// The `PES` header fields we care about.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Header {
    /// Payload starts with an access unit (for subtitles, an SPU start).
    pub data_alignment_indicator: bool,
    /// Which time stamps follow in the header data.
    pub pts_dts_flags: PtsDtsFlags,
    /// Time stamps, when present.
    pub pts_dts: Option<PtsDts>,
}

/// Parse the two flag bytes, keeping the data alignment indicator and the
/// time stamp flags.
fn header_flags(input: BitInput<'_>) -> IResult<BitInput<'_>, (bool, PtsDtsFlags)> {
    let (input, (_, _scrambling, _priority, alignment, _copyright, _original)) = (
        tag_bits(0b10u8, 2u8),
        take_bits::<_, u8, _, _>(2u8),
        bool_flag,
        bool_flag,
        bool_flag,
        bool_flag,
    )
        .parse(input)?;
    let (input, (flags, _other_flags)) =
        (pts_dts_flags, take_bits::<_, u8, _, _>(6u8)).parse(input)?;
    Ok((input, (alignment, flags)))
}

/// Parse the flag bytes, the header data length and the header data.
/// Unparsed optional header fields are skipped thanks to the length byte.
fn header(input: &[u8]) -> IResult<&[u8], Header> {
    let (input, (data_alignment_indicator, pts_dts_flags)) = bits(header_flags).parse(input)?;
    let (input, pts_dts) =
        length_value(be_u8, |input| pts_dts(input, pts_dts_flags)).parse(input)?;
    Ok((
        input,
        Header {
            data_alignment_indicator,
            pts_dts_flags,
            pts_dts,
        },
    ))
}

/// A [Packetized Elementary Stream][pes] packet.
///
/// [pes]: http://dvd.sourceforge.net/dvdinfo/pes-hdr.html
#[derive(PartialEq, Eq)]
pub struct Packet<'a> {
    /// Parsed header.
    pub header: Header,
    /// Subtitle track id, `0x20` for the first track.
    pub substream_id: u8,
    /// Payload: a whole or a piece of a Sub-Picture Unit.
    pub data: &'a [u8],
}

impl Packet<'_> {
    /// Presentation time stamp of this packet, if it has one.
    #[must_use]
    pub fn pts(&self) -> Option<Clock> {
        self.header.pts_dts.as_ref().map(|pts_dts| pts_dts.pts)
    }
}

impl fmt::Debug for Packet<'_> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("Packet")
            .field("header", &self.header)
            .field("substream_id", &self.substream_id)
            .field("data", &BytesFormatter(self.data))
            .finish()
    }
}

/// Everything after the `PES` packet length.
fn packet_body(input: &[u8]) -> IResult<&[u8], Packet<'_>> {
    let (input, (header, substream_id, data)) = (header, be_u8, rest).parse(input)?;
    Ok((
        input,
        Packet {
            header,
            substream_id,
            data,
        },
    ))
}

/// Parse a private stream 1 `PES` packet.
pub fn packet(input: &[u8]) -> IResult<&[u8], Packet<'_>> {
    const PRIVATE_STREAM_1: &[u8] = &[0x00, 0x00, 0x01, 0xbd];
    let (input, (_, packet)) =
        (tag_bytes(PRIVATE_STREAM_1), length_value(be_u16, packet_body)).parse(input)?;
    Ok((input, packet))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pts_dts_flags() {
        assert_eq!(
            pts_dts_flags((&[0b00][..], 6)),
            IResult::Ok(((&[][..], 0), PtsDtsFlags::None))
        );
        assert_eq!(
            pts_dts_flags((&[0b10][..], 6)),
            IResult::Ok(((&[][..], 0), PtsDtsFlags::Pts))
        );
        assert_eq!(
            pts_dts_flags((&[0b11][..], 6)),
            IResult::Ok(((&[][..], 0), PtsDtsFlags::PtsDts))
        );
    }

    #[test]
    fn parse_pts_only() {
        assert_eq!(
            pts_dts(&[][..], PtsDtsFlags::None),
            IResult::Ok((&[][..], None))
        );
        assert_eq!(
            pts_dts(&[0x21, 0x00, 0xab, 0xe9, 0xc1][..], PtsDtsFlags::Pts),
            IResult::Ok((
                &[][..],
                Some(PtsDts {
                    pts: Clock::base(2_815_200),
                    dts: None,
                })
            ))
        );
    }

    #[test]
    fn parse_header() {
        assert_eq!(
            header(&[0x81, 0x80, 0x05, 0x21, 0x00, 0xab, 0xe9, 0xc1][..]),
            IResult::Ok((
                &[][..],
                Header {
                    data_alignment_indicator: false,
                    pts_dts_flags: PtsDtsFlags::Pts,
                    pts_dts: Some(PtsDts {
                        pts: Clock::base(2_815_200),
                        dts: None,
                    }),
                }
            ))
        );
        // Header data longer than the announced stamps is skipped.
        assert_eq!(
            header(&[0x84, 0x00, 0x02, 0xff, 0xff, 0x20][..]),
            IResult::Ok((
                &[0x20][..],
                Header {
                    data_alignment_indicator: true,
                    ..Header::default()
                }
            ))
        );
    }

    #[test]
    fn parse_packet() {
        let input = &[
            0x00, 0x00, 0x01, 0xbd, 0x00, 0x10, 0x81, 0x80, 0x05, 0x21, 0x00, 0xab, 0xe9, 0xc1,
            0x20, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff,
        ][..];

        let (rest, packet) = packet(input).unwrap();
        assert_eq!(rest, &[0xff][..]);
        assert_eq!(packet.substream_id, 0x20);
        assert_eq!(packet.pts(), Some(Clock::base(2_815_200)));
        assert_eq!(packet.data, &[0x00; 7][..]);
    }

    #[test]
    fn reject_other_streams() {
        // Padding stream.
        let input = &[0x00, 0x00, 0x01, 0xbe, 0x00, 0x02, 0xff, 0xff][..];
        assert!(packet(input).is_err());
    }
}
