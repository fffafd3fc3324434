use std::fmt;

use nom::{
    bits::complete::{tag as tag_bits, take as take_bits},
    IResult, Parser as _,
};

use crate::time::TimePoint;

/// This represents the 90kHz, 33-bit [System Time Clock][STC] (STC) and
/// the 9-bit STC extension value, which represents 1/300th of a tick.
///
/// [STC]: http://www.bretl.com/mpeghtml/STC.HTM
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Clock {
    value: u64,
}

impl Clock {
    /// Given a 33-bit System Time Clock value, construct a new `Clock`
    /// value.
    #[must_use]
    pub const fn base(stc: u64) -> Self {
        Self { value: stc << 9 }
    }

    /// Return a new `Clock` value, setting the 9-bit extension to the
    /// specified value.
    #[must_use]
    pub const fn with_ext(self, ext: u16) -> Self {
        Self {
            value: self.value & !0x1ff | (ext as u64 & 0x1ff),
        }
    }

    /// Ticks of the 90kHz clock, extension included as a fraction.
    fn ticks(self) -> f64 {
        let base = (self.value >> 9) as f64;
        let ext = (self.value & 0x1ff) as f64;
        base + ext / 300.0
    }

    /// Convert a `Clock` value to seconds.
    #[must_use]
    pub fn as_seconds(self) -> f64 {
        self.ticks() / 90000.0
    }

    /// Convert a `Clock` value to a `TimePoint`, in milliseconds.
    #[must_use]
    pub fn as_time_point(self) -> TimePoint {
        // 90 ticks per millisecond.
        TimePoint::from_msecs(i64::try_from((self.value >> 9) / 90).unwrap_or(i64::MAX))
    }
}

impl fmt::Display for Clock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut s = self.as_seconds();
        let h = (s / 3600.0).trunc();
        s %= 3600.0;
        let m = (s / 60.0).trunc();
        s %= 60.0;
        write!(f, "{h}:{m:02}:{s:06.3}")
    }
}

type BitInput<'a> = (&'a [u8], usize);

/// Parse a 33-bit `Clock` value with 3 marker bits, consuming 36 bits.
pub fn clock(input: BitInput<'_>) -> IResult<BitInput<'_>, Clock> {
    let (input, (hi, _, mid, _, lo, _)) = (
        // Bits 32..30.
        take_bits::<_, u64, _, _>(3u8),
        // Marker bit.
        tag_bits(0b1u8, 1u8),
        // Bits 29..15.
        take_bits::<_, u64, _, _>(15u8),
        tag_bits(0b1u8, 1u8),
        // Bits 14..0.
        take_bits::<_, u64, _, _>(15u8),
        tag_bits(0b1u8, 1u8),
    )
        .parse(input)?;
    Ok((input, Clock::base(hi << 30 | mid << 15 | lo)))
}

/// Parse a 33-bit `Clock` value plus a 9-bit extension and 4 marker bits,
/// consuming 46 bits.
pub fn clock_and_ext(input: BitInput<'_>) -> IResult<BitInput<'_>, Clock> {
    let (input, (clock, ext, _)) = (
        clock,
        take_bits::<_, u16, _, _>(9u8),
        // Marker bit.
        tag_bits(0b1u8, 1u8),
    )
        .parse(input)?;
    Ok((input, clock.with_ext(ext)))
}
