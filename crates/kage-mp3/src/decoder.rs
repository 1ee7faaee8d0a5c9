use std::io::{self, Read, Seek, SeekFrom};

use log::debug;

use crate::error::Mp3Error;
use crate::frame::{BYTES_PER_GRANULE, Frame, FrameDecoder, FrameReader};

/// PCM bytes produced by each frame: two granules of 576 stereo `i16`
/// sample pairs.
pub const BYTES_PER_FRAME: usize = 2 * BYTES_PER_GRANULE;

/// Streaming MP3 decoder producing interleaved 16-bit little-endian stereo
/// PCM through [`Read`].
#[derive(Debug)]
pub struct Decoder<R> {
    frames: FrameReader<R>,
    state: FrameDecoder,
    sample_rate: u32,
    /// PCM of the most recently decoded frame.
    pcm: Vec<u8>,
    cursor: usize,
    /// Position in the decoded stream, in bytes.
    pos: u64,
    /// Stream offsets of every frame, known for seekable inputs.
    offsets: Option<Vec<u64>>,
}

impl<R: Read> Decoder<R> {
    /// Creates a decoder and decodes the first frame to learn the sample
    /// rate.
    ///
    /// Fails when the stream holds no frame or its first frame is not an
    /// MPEG-1 Layer III frame.
    pub fn new(reader: R) -> Result<Self, Mp3Error> {
        let mut decoder = Self {
            frames: FrameReader::new(reader),
            state: FrameDecoder::default(),
            sample_rate: 0,
            pcm: Vec::with_capacity(BYTES_PER_FRAME),
            cursor: 0,
            pos: 0,
            offsets: None,
        };
        let frame = decoder.frames.next_frame()?.ok_or(Mp3Error::NoFrames)?;
        decoder.sample_rate = frame.header.sample_rate;
        debug!(
            "first frame: {} Hz, {} kbit/s, {:?}",
            frame.header.sample_rate,
            frame.header.bitrate / 1000,
            frame.header.mode
        );
        decoder.decode(&frame)?;
        Ok(decoder)
    }

    /// Samples per second, taken from the first frame.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Total size of the decoded stream in bytes, known only for decoders
    /// created with [`Decoder::new_seekable`].
    pub fn length(&self) -> Option<u64> {
        self.offsets
            .as_ref()
            .map(|offsets| (offsets.len() * BYTES_PER_FRAME) as u64)
    }

    /// Returns the underlying reader.
    pub fn into_inner(self) -> R {
        self.frames.into_inner()
    }

    fn decode(&mut self, frame: &Frame) -> Result<(), Mp3Error> {
        self.pcm.clear();
        self.pcm.resize(BYTES_PER_FRAME, 0);
        self.cursor = 0;
        self.state.decode(frame, &mut self.pcm)
    }

    /// Decodes the next frame into the PCM buffer; `false` at end of stream.
    fn advance(&mut self) -> Result<bool, Mp3Error> {
        match self.frames.next_frame()? {
            Some(frame) => {
                self.decode(&frame)?;
                Ok(true)
            }
            None => {
                self.pcm.clear();
                self.cursor = 0;
                Ok(false)
            }
        }
    }
}

impl<R: Read + Seek> Decoder<R> {
    /// Creates a decoder over a seekable stream.
    ///
    /// All frames are scanned up front so [`Decoder::length`] is known,
    /// then the stream is rewound and decoding starts as with
    /// [`Decoder::new`].
    pub fn new_seekable(mut reader: R) -> Result<Self, Mp3Error> {
        reader.seek(SeekFrom::Start(0))?;
        let mut scan = FrameReader::new(reader);
        let mut offsets = Vec::new();
        while let Some(frame) = scan.next_frame()? {
            offsets.push(frame.offset);
        }
        debug!("scanned {} frames", offsets.len());
        let mut reader = scan.into_inner();
        reader.seek(SeekFrom::Start(0))?;
        let mut decoder = Self::new(reader)?;
        decoder.offsets = Some(offsets);
        Ok(decoder)
    }

    /// Moves the decoder so that the next read starts at decoded byte `pos`,
    /// clamped to the end of the stream, and returns the new position.
    ///
    /// The frame before the target is decoded and discarded first so the
    /// overlap and bit reservoir state match a straight decode as closely
    /// as possible.
    fn seek_to(&mut self, pos: u64) -> Result<u64, Mp3Error> {
        let Some(offsets) = self.offsets.as_ref() else {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "decoder was not created with new_seekable",
            )
            .into());
        };
        let index = (pos / BYTES_PER_FRAME as u64) as usize;
        let Some(&target) = offsets.get(index) else {
            let end = self.frames.get_mut().seek(SeekFrom::End(0))?;
            self.frames.reset(end);
            self.pcm.clear();
            self.cursor = 0;
            self.pos = (offsets.len() * BYTES_PER_FRAME) as u64;
            return Ok(self.pos);
        };
        let start = match index.checked_sub(1) {
            Some(prev) => offsets[prev],
            None => target,
        };
        self.state = FrameDecoder::default();
        self.frames.get_mut().seek(SeekFrom::Start(start))?;
        self.frames.reset(start);
        if index > 0 {
            self.advance()?;
        }
        self.advance()?;
        self.cursor = (pos % BYTES_PER_FRAME as u64) as usize;
        self.pos = pos;
        Ok(pos)
    }
}

impl<R: Read> Read for Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.cursor == self.pcm.len() {
            if !self.advance()? {
                return Ok(0);
            }
        }
        let n = buf.len().min(self.pcm.len() - self.cursor);
        buf[..n].copy_from_slice(&self.pcm[self.cursor..self.cursor + n]);
        self.cursor += n;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R: Read + Seek> Seek for Decoder<R> {
    fn seek(&mut self, from: SeekFrom) -> io::Result<u64> {
        let target = match from {
            SeekFrom::Start(pos) => Some(pos),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
            SeekFrom::End(delta) => self
                .length()
                .ok_or_else(|| io::Error::new(io::ErrorKind::Unsupported, "length is unknown"))?
                .checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek to a negative position")
        })?;
        if target == self.pos {
            return Ok(target);
        }
        Ok(self.seek_to(target)?)
    }
}
