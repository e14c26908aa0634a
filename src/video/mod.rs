//! Video module
//!
//! Frame Source adapter over FFmpeg demux + decode.

mod source;

pub use source::*;
