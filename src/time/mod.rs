//! Time handling for subtitles.
mod time_point;
mod time_span;

pub use time_point::TimePoint;
pub use time_span::TimeSpan;
