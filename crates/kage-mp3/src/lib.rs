//! MPEG-1 Layer III decoder.
//!
//! [`Decoder`] wraps any [`std::io::Read`] carrying an MP3 elementary
//! stream and exposes the decoded audio as interleaved signed 16-bit
//! little-endian stereo PCM through its own `Read` implementation. Mono
//! streams are duplicated into both channels. Inputs that also implement
//! [`std::io::Seek`] can be opened with [`Decoder::new_seekable`], which
//! pre-scans the frame layout so the decoded length is known and the
//! decoder itself becomes seekable.
//!
//! ```no_run
//! use std::io::Read;
//!
//! let file = std::fs::File::open("music.mp3")?;
//! let mut decoder = kage_mp3::Decoder::new_seekable(file)?;
//! let mut pcm = Vec::new();
//! decoder.read_to_end(&mut pcm)?;
//! assert_eq!(decoder.sample_rate(), 44100);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod bands;
mod bits;
mod codes;
mod decoder;
mod error;
mod frame;
mod header;
mod huffman;
mod hybrid;
mod maindata;
mod requantize;
mod reservoir;
mod sideinfo;
mod stereo;
mod synthesis;
mod window;

pub use decoder::{BYTES_PER_FRAME, Decoder};
pub use error::Mp3Error;
pub use header::{ChannelMode, FrameHeader};
