//! Text primitives shared by the spiderfs crates.
//!
//! [`LineIndex`] maps one-based line numbers onto byte spans without holding
//! the file content, and the encoding helpers detect, decode and encode text
//! under an explicit [`DecodePolicy`]. Both are pure: no locking, no logging
//! sinks, no filesystem state beyond the reader handed in.

mod encoding;
mod error;
mod line_index;
mod range;

pub use encoding::{DecodePolicy, TextEncoding, decode, detect, encode};
pub use error::TextError;
pub use line_index::{LineIndex, LineSpan, Terminator, WINDOW_BYTES};
pub use range::{LineRange, ResolvedRange};
