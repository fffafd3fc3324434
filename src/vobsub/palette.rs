use image::Rgb;
use log::warn;
use nom::{
    bytes::complete::{tag, take_while_m_n},
    character::complete::space0,
    combinator::{map, map_opt},
    multi::separated_list1,
    sequence::delimited,
    IResult, Parser as _,
};

/// Palette used when the `*.idx` file doesn't provide one, or to fill the
/// entries missing from a short one.
pub const DEFAULT_PALETTE: Palette = [
    Rgb([0x00, 0x00, 0x00]),
    Rgb([0xf0, 0xf0, 0xf0]),
    Rgb([0xcc, 0xcc, 0xcc]),
    Rgb([0x99, 0x99, 0x99]),
    Rgb([0x33, 0x33, 0xfa]),
    Rgb([0x11, 0x11, 0xbb]),
    Rgb([0xfa, 0x33, 0x33]),
    Rgb([0xbb, 0x11, 0x11]),
    Rgb([0x33, 0xfa, 0x33]),
    Rgb([0x11, 0xbb, 0x11]),
    Rgb([0xfa, 0xfa, 0x33]),
    Rgb([0xbb, 0xbb, 0x11]),
    Rgb([0xfa, 0x33, 0xfa]),
    Rgb([0xbb, 0x11, 0xbb]),
    Rgb([0x33, 0xfa, 0xfa]),
    Rgb([0x11, 0xbb, 0xbb]),
];

/// Parse a hexadecimal byte from two ASCII digits.
fn from_hex(input: &[u8]) -> Option<u8> {
    let digits = std::str::from_utf8(input).ok()?;
    u8::from_str_radix(digits, 16).ok()
}

/// Parse a single byte hexadecimal byte.
fn hex_primary(input: &[u8]) -> IResult<&[u8], u8> {
    map_opt(
        take_while_m_n(2, 2, |c: u8| c.is_ascii_hexdigit()),
        from_hex,
    )
    .parse(input)
}

/// Parse a 3-byte hexadecimal `RGB` color.
fn hex_rgb(input: &[u8]) -> IResult<&[u8], Rgb<u8>> {
    let (input, (red, green, blue)) = (hex_primary, hex_primary, hex_primary).parse(input)?;

    Ok((input, Rgb([red, green, blue])))
}

/// The 16-color palette used by the subtitles.
pub type Palette = [Rgb<u8>; 16];

/// Parse a text as Palette. Entries are separated by commas, with optional
/// spaces around them. A palette shorter than 16 entries is completed with
/// [`DEFAULT_PALETTE`], entries after the 16th are dropped.
/// # Errors
///
/// Will return `Err` if the input has no entry or an entry isn't a color.
pub fn palette(input: &[u8]) -> IResult<&[u8], Palette> {
    map(
        separated_list1(delimited(space0, tag(&b","[..]), space0), hex_rgb),
        |entries: Vec<Rgb<u8>>| {
            if entries.len() > DEFAULT_PALETTE.len() {
                warn!(
                    "Palette has {} entries, only the first {} are used",
                    entries.len(),
                    DEFAULT_PALETTE.len()
                );
            }
            let mut result = DEFAULT_PALETTE;
            result
                .iter_mut()
                .zip(entries)
                .for_each(|(slot, color)| *slot = color);
            result
        },
    )
    .parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rgb() {
        assert_eq!(
            hex_rgb(&b"1234ab"[..]),
            IResult::Ok((&b""[..], Rgb::<u8>([0x12, 0x34, 0xab])))
        );
        assert!(hex_rgb(&b"12g4ab"[..]).is_err());
    }

    #[test]
    fn parse_palette() {
        let input = b"\
000000, f0f0f0, cccccc, 999999, 3333fa, 1111bb, fa3333, bb1111, \
33fa33, 11bb11, fafa33, bbbb11, fa33fa, bb11bb, 33fafa, 11bbbb";
        assert_eq!(palette(input), IResult::Ok((&[][..], DEFAULT_PALETTE)));
    }

    #[test]
    fn parse_short_palette_without_spaces() {
        let (rest, parsed) = palette(b"ff0000,00ff00 ,0000ff").unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed[0], Rgb([0xff, 0x00, 0x00]));
        assert_eq!(parsed[1], Rgb([0x00, 0xff, 0x00]));
        assert_eq!(parsed[2], Rgb([0x00, 0x00, 0xff]));
        assert_eq!(parsed[3], DEFAULT_PALETTE[3]);
        assert_eq!(parsed[15], DEFAULT_PALETTE[15]);
    }

    #[test]
    fn extra_entries_are_dropped() {
        let mut colors = vec!["123456"; 16];
        colors.push("ffffff");
        let joined = colors.join(", ");
        let (rest, parsed) = palette(joined.as_bytes()).unwrap();
        assert!(rest.is_empty());
        assert!(parsed.iter().all(|color| *color == Rgb([0x12, 0x34, 0x56])));
    }

    #[test]
    fn reject_non_colors() {
        assert!(palette(b"zzzzzz").is_err());
    }
}
