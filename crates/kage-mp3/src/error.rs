use std::io;

/// Errors produced while decoding an MP3 stream.
#[derive(Debug, thiserror::Error)]
pub enum Mp3Error {
    /// The underlying reader failed.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// A 32-bit word that is not a valid MPEG audio frame header.
    #[error("invalid frame header {0:#010x}")]
    InvalidHeader(u32),

    /// A valid header for a layer other than Layer III.
    #[error("unsupported layer: Layer {0}")]
    UnsupportedLayer(u8),

    /// A valid header for MPEG-2 or MPEG-2.5.
    #[error("unsupported MPEG version: {0}")]
    UnsupportedVersion(&'static str),

    /// A frame longer than any valid Layer III frame.
    #[error("frame size {0} exceeds 2000 bytes")]
    FrameTooLarge(usize),

    /// The stream ended in the middle of a frame.
    #[error("unexpected end of stream inside a frame")]
    UnexpectedEof,

    /// The stream contains no MPEG audio frame at all.
    #[error("no MPEG audio frame found")]
    NoFrames,

    /// A bit pattern that is not a code of the selected Huffman table.
    #[error("invalid Huffman code in table {0}")]
    Huffman(usize),
}

impl From<Mp3Error> for io::Error {
    fn from(err: Mp3Error) -> Self {
        match err {
            Mp3Error::Io(err) => err,
            Mp3Error::UnexpectedEof => io::Error::new(io::ErrorKind::UnexpectedEof, err),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
