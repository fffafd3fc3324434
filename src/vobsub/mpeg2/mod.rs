//! MPEG-2 containers wrapping subtitle packets in a `*.sub` file.

pub mod clock;
pub mod pes;
pub mod ps;
