use core::fmt;
use std::ops::{Add, Neg, Sub};

/// Define a time in milliseconds
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimePoint(i64);

impl TimePoint {
    /// Create a `TimePoint` from miliseconds
    #[must_use]
    pub const fn from_msecs(time: i64) -> Self {
        Self(time)
    }

    /// Create a `TimePoint` from the four components found in `*.idx`
    /// timestamps. Returns `None` if the result doesn't fit.
    #[must_use]
    pub fn from_components(hours: i64, mins: i64, secs: i64, msecs: i64) -> Option<Self> {
        let mins = hours.checked_mul(60)?.checked_add(mins)?;
        let secs = mins.checked_mul(60)?.checked_add(secs)?;
        let msecs = secs.checked_mul(1000)?.checked_add(msecs)?;
        Some(Self(msecs))
    }

    /// Convert to seconds
    #[must_use]
    pub fn to_secs(self) -> f64 {
        self.0 as f64 / 1000.
    }

    /// Number of milliseconds.
    #[must_use]
    pub const fn msecs(self) -> i64 {
        self.0
    }

    const fn secs(self) -> i64 {
        self.0 / 1000
    }

    const fn mins(self) -> i64 {
        self.0 / (60 * 1000)
    }

    const fn hours(self) -> i64 {
        self.0 / (60 * 60 * 1000)
    }
    const fn mins_comp(self) -> i64 {
        self.mins() % 60
    }

    const fn secs_comp(self) -> i64 {
        self.secs() % 60
    }

    const fn msecs_comp(self) -> i64 {
        self.msecs() % 1000
    }

    /// Write the time as `HH:MM:SS<sep>mmm`.
    /// # Errors
    /// Forward errors from the formatter.
    pub fn fmt_separator(self, f: &mut fmt::Formatter<'_>, sep: char) -> fmt::Result {
        let t = if self.0 < 0 { -self } else { self };
        write!(
            f,
            "{}{:02}:{:02}:{:02}{sep}{:03}",
            if self.0 < 0 { "-" } else { "" },
            t.hours(),
            t.mins_comp(),
            t.secs_comp(),
            t.msecs_comp()
        )
    }
}

impl Neg for TimePoint {
    type Output = Self;
    fn neg(self) -> Self {
        Self(self.0.saturating_neg())
    }
}

impl Add for TimePoint {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for TimePoint {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

/// `SubRip` style: `HH:MM:SS,mmm`.
impl fmt::Display for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_separator(f, ',')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn components() {
        assert_eq!(
            TimePoint::from_components(0, 0, 4, 500),
            Some(TimePoint::from_msecs(4500))
        );
        assert_eq!(
            TimePoint::from_components(1, 2, 3, 4),
            Some(TimePoint::from_msecs(3_723_004))
        );
        assert_eq!(TimePoint::from_components(9_999_999_999_999_999, 0, 0, 0), None);
        assert_eq!(TimePoint::from_components(0, 0, i64::MAX / 1000, 999), None);
    }

    #[test]
    fn display_srt() {
        assert_eq!(
            TimePoint::from_msecs(3_723_004).to_string(),
            "01:02:03,004"
        );
        assert_eq!(TimePoint::from_msecs(-1500).to_string(), "-00:00:01,500");
        assert!(TimePoint::from_msecs(i64::MIN).to_string().starts_with('-'));
    }

    #[test]
    fn arithmetic() {
        let t = TimePoint::from_msecs(1000) + TimePoint::from_msecs(2000);
        assert_eq!(t, TimePoint::from_msecs(3000));
        assert_eq!(t - TimePoint::from_msecs(500), TimePoint::from_msecs(2500));
        assert!((t.to_secs() - 3.0).abs() < f64::EPSILON);
    }
}
