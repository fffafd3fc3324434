//! # Subtitle control sequences.
//!
//! For background, see [this documentation on the DVD subtitle format][subs].
//!
//! [subs]: http://sam.zoy.org/writings/dvd/subtitles/

use log::{trace, warn};
use nom::{
    bits::{bits, complete::take as take_bits},
    branch::alt,
    bytes::complete::{tag as tag_bytes, take},
    combinator::{cut, eof, map, value},
    multi::many_till,
    number::complete::{be_u16, be_u8},
    sequence::preceded,
    IResult, Parser as _,
};
use thiserror::Error;

use super::{IResultExt as _, NomError};
use crate::content::{Area, AreaValues};

type BitInput<'a> = (&'a [u8], usize);

/// Errors of the control sequence walk. They only affect the subtitle they
/// come from.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The first control sequence doesn't start inside the packet.
    #[error("Control sequence offset 0x{offset:x} is outside the packet ({len} bytes)")]
    OffsetOutOfPacket {
        /// Offset of the control sequence.
        offset: usize,
        /// Packet length.
        len: usize,
    },

    /// The first control sequence couldn't be parsed.
    #[error("Parsing the control sequence failed")]
    Sequence(#[source] NomError),

    /// The display area has its end before its start.
    #[error("Invalid display area {0:?}")]
    InvalidArea(AreaValues),

    /// No RLE offsets command: nothing to draw.
    #[error("No bitmap data in the subtitle packet")]
    NoBitmapData,

    /// An RLE offset points outside the packet.
    #[error("RLE offset 0x{offset:x} is outside the packet ({len} bytes)")]
    RleOffsetOutOfPacket {
        /// Offending offset.
        offset: u16,
        /// Packet length.
        len: usize,
    },
}

/// Parse four 4-bit values. They are sent for color 3 first, they are
/// returned indexed by pixel code.
fn nibbles(input: BitInput<'_>) -> IResult<BitInput<'_>, [u8; 4]> {
    let (input, (c3, c2, c1, c0)) = (
        take_bits::<_, u8, _, _>(4u8),
        take_bits::<_, u8, _, _>(4u8),
        take_bits::<_, u8, _, _>(4u8),
        take_bits::<_, u8, _, _>(4u8),
    )
        .parse(input)?;
    Ok((input, [c0, c1, c2, c3]))
}

/// Parse a 12-bit coordinate value.
fn coordinate(input: BitInput<'_>) -> IResult<BitInput<'_>, u16> {
    take_bits(12u8).parse(input)
}

/// Parse four 12-bit coordinate values as a rectangle (with right and
/// bottom coordinates inclusive).
fn coordinates(input: BitInput<'_>) -> IResult<BitInput<'_>, AreaValues> {
    let (input, (x1, x2, y1, y2)) =
        (coordinate, coordinate, coordinate, coordinate).parse(input)?;
    Ok((input, AreaValues { x1, y1, x2, y2 }))
}

/// Parse a pair of 16-bit RLE offsets.
fn rle_offsets(input: &[u8]) -> IResult<&[u8], [u16; 2]> {
    let (input, (even, odd)) = (be_u16, be_u16).parse(input)?;
    Ok((input, [even, odd]))
}

/// Skip a `CHG_COLCON` table. Its size includes the two size bytes.
fn color_contrast_table(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, size) = be_u16(input)?;
    take(usize::from(size).saturating_sub(2)).parse(input)
}

/// Individual commands which may appear in a control sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
enum ControlCommand<'a> {
    /// Should this subtitle be displayed even if subtitles are turned off?
    Force,
    /// We should start displaying the subtitle at the `date` for this
    /// `ControlSequence`.
    StartDate,
    /// We should stop displaying the subtitle at the `date` for this
    /// `ControlSequence`.
    StopDate,
    /// Map each of the 4 pixel codes to one of the 16 palette entries.
    Palette([u8; 4]),
    /// Map each of the 4 pixel codes to 4 bits of alpha channel data.
    Alpha([u8; 4]),
    /// Coordinates at which to display the subtitle.
    Coordinates(AreaValues),
    /// Offsets of first and second scan line in our data buffer.  Note
    /// that the data buffer stores alternating scan lines separately, so
    /// these are the first line in each of the two chunks.
    RleOffsets([u16; 2]),
    /// Per-region color and contrast changes, which we don't apply.
    ChangeColorContrast(&'a [u8]),
    /// Opcode we don't know. It is assumed to have no operand.
    Unsupported(u8),
}

/// Parse a single command in a control sequence. Once a known opcode is
/// read, a missing operand is a failure of the whole sequence.
fn control_command(input: &[u8]) -> IResult<&[u8], ControlCommand<'_>> {
    alt((
        value(ControlCommand::Force, tag_bytes(&[0x00][..])),
        value(ControlCommand::StartDate, tag_bytes(&[0x01][..])),
        value(ControlCommand::StopDate, tag_bytes(&[0x02][..])),
        map(
            preceded(tag_bytes(&[0x03][..]), cut(bits(nibbles))),
            ControlCommand::Palette,
        ),
        map(
            preceded(tag_bytes(&[0x04][..]), cut(bits(nibbles))),
            ControlCommand::Alpha,
        ),
        map(
            preceded(tag_bytes(&[0x05][..]), cut(bits(coordinates))),
            ControlCommand::Coordinates,
        ),
        map(
            preceded(tag_bytes(&[0x06][..]), cut(rle_offsets)),
            ControlCommand::RleOffsets,
        ),
        map(
            preceded(tag_bytes(&[0x07][..]), cut(color_contrast_table)),
            ControlCommand::ChangeColorContrast,
        ),
        map(be_u8, ControlCommand::Unsupported),
    ))
    .parse(input)
}

/// The end of a control sequence: an explicit end command, or the end of
/// the packet.
fn control_command_end(input: &[u8]) -> IResult<&[u8], ()> {
    alt((value((), tag_bytes(&[0xff][..])), value((), eof))).parse(input)
}

/// The control packet for a subtitle.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ControlSequence<'a> {
    /// The time associated with this control sequence, specified in
    /// 1/100th of a second after the Presentation Time Stamp for this
    /// subtitle's packet.
    date: u16,
    /// The offset of the next control sequence, relative to the packet
    /// start.  If this equals the offset of the current control sequence,
    /// this is the last control packet.
    next: u16,
    /// Individual commands in this sequence.
    commands: Vec<ControlCommand<'a>>,
}

/// Parse a single control sequence.
fn control_sequence(input: &[u8]) -> IResult<&[u8], ControlSequence<'_>> {
    let (input, (date, next, (commands, ()))) = (
        be_u16,
        be_u16,
        many_till(control_command, control_command_end),
    )
        .parse(input)?;
    Ok((
        input,
        ControlSequence {
            date,
            next,
            commands,
        },
    ))
}

/// Pixel code to palette entry map used when a packet doesn't set one.
const DEFAULT_REMAP: [u8; 4] = [0, 1, 2, 3];
/// Alpha map used when a packet doesn't set one: transparent background.
const DEFAULT_ALPHA: [u8; 4] = [0, 15, 15, 15];

/// What the control sequences of a subtitle packet say about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlBlock {
    area: Option<Area>,
    palette: [u8; 4],
    alpha: [u8; 4],
    rle_offsets: [u16; 2],
    force: bool,
    start_date: Option<u16>,
    stop_date: Option<u16>,
}

impl ControlBlock {
    /// Walk the chain of control sequences of `spu`, starting at
    /// `control_offset`. The chain stops on a sequence pointing to itself,
    /// or to an earlier or out of packet offset.
    ///
    /// # Errors
    /// Return [`ControlError::NoBitmapData`] if no sequence gives the RLE
    /// offsets, [`ControlError::InvalidArea`] for an inverted display area,
    /// and an error if the first sequence can't be read.
    #[profiling::function]
    pub fn parse(spu: &[u8], control_offset: usize) -> Result<Self, ControlError> {
        let mut area = None;
        let mut palette = None;
        let mut alpha = None;
        let mut rle_offsets = None;
        let mut force = false;
        let mut start_date = None;
        let mut stop_date = None;

        let mut offset = control_offset;
        loop {
            trace!("looking for control sequence at: 0x{offset:x}");
            let data = spu
                .get(offset..)
                .filter(|data| !data.is_empty())
                .ok_or(ControlError::OffsetOutOfPacket {
                    offset,
                    len: spu.len(),
                })?;
            let control = match control_sequence(data).to_result() {
                Ok((_, control)) => control,
                Err(err) if offset == control_offset => return Err(ControlError::Sequence(err)),
                Err(err) => {
                    warn!("Ignoring unreadable control sequence at 0x{offset:x}: {err}");
                    break;
                }
            };
            trace!("parsed control sequence: {:?}", &control);

            for command in control.commands {
                match command {
                    ControlCommand::Force => force = true,
                    ControlCommand::StartDate => {
                        start_date = start_date.or(Some(control.date));
                    }
                    ControlCommand::StopDate => {
                        stop_date = stop_date.or(Some(control.date));
                    }
                    ControlCommand::Palette(p) => palette = palette.or(Some(p)),
                    ControlCommand::Alpha(a) => alpha = alpha.or(Some(a)),
                    ControlCommand::Coordinates(c) => {
                        let cmd_area =
                            Area::try_from(c).map_err(|_| ControlError::InvalidArea(c))?;
                        area = area.or(Some(cmd_area));
                    }
                    ControlCommand::RleOffsets(r) => rle_offsets = Some(r),
                    ControlCommand::ChangeColorContrast(table) => {
                        trace!("skipping color/contrast table of {} bytes", table.len());
                    }
                    ControlCommand::Unsupported(opcode) => {
                        warn!("unsupported control command: 0x{opcode:02x}");
                    }
                }
            }

            let next = usize::from(control.next);
            if next <= offset {
                if next < offset {
                    trace!("control sequence chain goes backward, stopping");
                }
                break;
            }
            if next >= spu.len() {
                warn!("next control sequence 0x{next:x} is outside the packet");
                break;
            }
            offset = next;
        }

        let rle_offsets = rle_offsets.ok_or(ControlError::NoBitmapData)?;
        Ok(Self {
            area,
            palette: palette.unwrap_or(DEFAULT_REMAP),
            alpha: alpha.unwrap_or(DEFAULT_ALPHA),
            rle_offsets,
            force,
            start_date,
            stop_date,
        })
    }

    /// Display area, if the packet defines one.
    #[must_use]
    pub const fn area(&self) -> Option<Area> {
        self.area
    }

    /// Palette entry of each pixel code.
    #[must_use]
    pub const fn palette(&self) -> &[u8; 4] {
        &self.palette
    }

    /// Alpha level (0 = transparent, 15 = opaque) of each pixel code.
    #[must_use]
    pub const fn alpha(&self) -> &[u8; 4] {
        &self.alpha
    }

    /// Offsets of the even and odd lines RLE data.
    #[must_use]
    pub const fn rle_offsets(&self) -> [u16; 2] {
        self.rle_offsets
    }

    /// Should this subtitle be shown even when subtitles are off?
    #[must_use]
    pub const fn force(&self) -> bool {
        self.force
    }

    /// Display start, in 1/100 s after the packet time.
    #[must_use]
    pub const fn start_date(&self) -> Option<u16> {
        self.start_date
    }

    /// Display stop, in 1/100 s after the packet time.
    #[must_use]
    pub const fn stop_date(&self) -> Option<u16> {
        self.stop_date
    }

    /// The even and odd lines RLE streams of `spu`.
    ///
    /// Encoders reuse bytes between the streams and the control data, so
    /// each stream runs up to the end of the packet; the decoder stops
    /// reading once its lines are done.
    ///
    /// # Errors
    /// Return [`ControlError::RleOffsetOutOfPacket`] if an offset is not
    /// inside `spu`.
    pub fn rle_streams<'a>(&self, spu: &'a [u8]) -> Result<[&'a [u8]; 2], ControlError> {
        let stream = |offset: u16| {
            spu.get(usize::from(offset)..)
                .filter(|data| !data.is_empty())
                .ok_or(ControlError::RleOffsetOutOfPacket {
                    offset,
                    len: spu.len(),
                })
        };
        Ok([stream(self.rle_offsets[0])?, stream(self.rle_offsets[1])?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_palette_entries() {
        assert_eq!(
            control_command(&[0x03, 0x03, 0x10][..]),
            IResult::Ok((&[][..], ControlCommand::Palette([0x00, 0x01, 0x03, 0x00])))
        );
        assert_eq!(
            control_command(&[0x04, 0xff, 0xf0][..]),
            IResult::Ok((&[][..], ControlCommand::Alpha([0x00, 0x0f, 0x0f, 0x0f])))
        );
    }

    #[test]
    fn parse_control_sequence() {
        let input_1 = &[
            0x00, 0x00, 0x0f, 0x41, 0x01, 0x03, 0x03, 0x10, 0x04, 0xff, 0xf0, 0x05, 0x29, 0xb4,
            0xe6, 0x3c, 0x54, 0x00, 0x06, 0x00, 0x04, 0x07, 0x7b, 0xff,
        ][..];
        let expected_1 = ControlSequence {
            date: 0x0000,
            next: 0x0f41,
            commands: vec![
                ControlCommand::StartDate,
                ControlCommand::Palette([0x0, 0x1, 0x3, 0x0]),
                ControlCommand::Alpha([0x0, 0xf, 0xf, 0xf]),
                ControlCommand::Coordinates(AreaValues {
                    x1: 0x29b,
                    x2: 0x4e6,
                    y1: 0x3c5,
                    y2: 0x400,
                }),
                ControlCommand::RleOffsets([0x0004, 0x077b]),
            ],
        };
        assert_eq!(
            control_sequence(input_1),
            IResult::Ok((&[][..], expected_1))
        );

        let input_2 = &[0x00, 0x77, 0x0f, 0x41, 0x02, 0xff][..];
        let expected_2 = ControlSequence {
            date: 0x0077,
            next: 0x0f41,
            commands: vec![ControlCommand::StopDate],
        };
        assert_eq!(
            control_sequence(input_2),
            IResult::Ok((&[][..], expected_2))
        );

        // An out of order example.
        let input_3 = &[
            0x00, 0x00, 0x0b, 0x30, 0x01, 0x00, // ...other commands would appear here...
            0xff,
        ][..];
        let expected_3 = ControlSequence {
            date: 0x0000,
            next: 0x0b30,
            commands: vec![ControlCommand::StartDate, ControlCommand::Force],
        };
        assert_eq!(
            control_sequence(input_3),
            IResult::Ok((&[][..], expected_3))
        );
    }

    #[test]
    fn unknown_commands_and_missing_end() {
        let input = &[
            0x00, 0x00, 0x00, 0x00, 0x07, 0x00, 0x04, 0xaa, 0xbb, 0x09, 0x06, 0x00, 0x04, 0x00,
            0x05,
        ][..];
        let (rest, sequence) = control_sequence(input).unwrap();
        assert!(rest.is_empty());
        assert_eq!(
            sequence.commands,
            vec![
                ControlCommand::ChangeColorContrast(&[0xaa, 0xbb]),
                ControlCommand::Unsupported(0x09),
                ControlCommand::RleOffsets([0x0004, 0x0005]),
            ]
        );
    }

    #[test]
    fn truncated_operand_fails_the_sequence() {
        // The 0x05 operand is cut short by the end of the packet: its bytes
        // must not be read as a 0x06 command.
        let spu = [
            0x00, 0x0e, 0x00, 0x04, 0x00, 0x00, 0x00, 0x04, 0x05, 0x06, 0x00, 0x04, 0x00, 0x08,
        ];
        assert!(matches!(
            control_command(&spu[8..]),
            Err(nom::Err::Failure(_))
        ));
        assert!(matches!(
            ControlBlock::parse(&spu, 4),
            Err(ControlError::Sequence(NomError::Failure(_)))
        ));
    }

    #[test]
    fn truncated_operand_in_later_sequence() {
        let spu = [
            0x00, 0x18, 0x00, 0x04, // header
            0x00, 0x00, 0x00, 0x0e, 0x06, 0x00, 0x04, 0x00, 0x05, 0xff, // first sequence
            0x00, 0x10, 0x00, 0x0e, 0x05, 0x06, 0x00, 0x09, 0x00, 0x0a, // truncated 0x05
        ];
        let control = ControlBlock::parse(&spu, 4).unwrap();
        assert_eq!(control.rle_offsets(), [4, 5]);
        assert_eq!(control.area(), None);
    }

    /// Two chained sequences: display starts at date 0, stops at 0x77.
    fn chained_packet() -> Vec<u8> {
        let mut spu = vec![0x00, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00];
        spu.extend_from_slice(&[
            0x00, 0x00, 0x00, 0x1d, 0x01, 0x03, 0x03, 0x10, 0x05, 0x00, 0x00, 0x03, 0x00, 0x00,
            0x01, 0x06, 0x00, 0x04, 0x00, 0x06, 0xff,
        ]);
        spu.extend_from_slice(&[0x00, 0x77, 0x00, 0x1d, 0x02, 0xff]);
        let len = u16::try_from(spu.len()).unwrap();
        spu[..2].copy_from_slice(&len.to_be_bytes());
        spu
    }

    #[test]
    fn walk_chained_sequences() {
        let spu = chained_packet();
        let control = ControlBlock::parse(&spu, 8).unwrap();
        assert_eq!(control.start_date(), Some(0));
        assert_eq!(control.stop_date(), Some(0x77));
        assert_eq!(control.palette(), &[0, 1, 3, 0]);
        assert_eq!(control.alpha(), &DEFAULT_ALPHA);
        assert_eq!(control.rle_offsets(), [4, 6]);
        assert!(!control.force());

        let area = control.area().unwrap();
        assert_eq!((area.width(), area.height()), (4, 2));

        let [even, odd] = control.rle_streams(&spu).unwrap();
        assert_eq!(even.len(), spu.len() - 4);
        assert_eq!(odd.len(), spu.len() - 6);
    }

    #[test]
    fn missing_bitmap_data() {
        let spu = [0x00, 0x0a, 0x00, 0x04, 0x00, 0x00, 0x00, 0x04, 0x01, 0xff];
        assert!(matches!(
            ControlBlock::parse(&spu, 4),
            Err(ControlError::NoBitmapData)
        ));
    }

    #[test]
    fn inverted_area() {
        // x1 = 0x010, x2 = 0x008
        let spu = [
            0x00, 0x14, 0x00, 0x04, 0x00, 0x00, 0x00, 0x04, 0x05, 0x01, 0x00, 0x08, 0x00, 0x00,
            0x01, 0x06, 0x00, 0x00, 0x00, 0x00,
        ];
        assert!(matches!(
            ControlBlock::parse(&spu, 4),
            Err(ControlError::InvalidArea(AreaValues { x1: 0x10, x2: 0x08, .. }))
        ));
    }

    #[test]
    fn defaults_and_bad_rle_offsets() {
        let spu = [
            0x00, 0x0d, 0x00, 0x04, 0x00, 0x00, 0x00, 0x04, 0x06, 0x00, 0x02, 0x00, 0x40,
        ];
        let control = ControlBlock::parse(&spu, 4).unwrap();
        assert_eq!(control.area(), None);
        assert_eq!(control.palette(), &DEFAULT_REMAP);
        assert_eq!(control.alpha(), &DEFAULT_ALPHA);
        assert!(matches!(
            control.rle_streams(&spu),
            Err(ControlError::RleOffsetOutOfPacket { offset: 0x40, .. })
        ));
    }
}
