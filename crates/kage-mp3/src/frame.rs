//! Frame synchronization and per-frame decoding state.

use std::io::{self, Read};

use log::{trace, warn};

use crate::error::Mp3Error;
use crate::header::{FrameHeader, MAX_FRAME_SIZE};
use crate::hybrid::{self, Overlap};
use crate::maindata::MainData;
use crate::requantize::{reorder, requantize};
use crate::reservoir::Reservoir;
use crate::sideinfo::SideInfo;
use crate::stereo;
use crate::synthesis::Filterbank;

/// PCM bytes produced per granule: 576 stereo frames of two `i16`.
pub(crate) const BYTES_PER_GRANULE: usize = 576 * 4;

/// A frame as it appears in the stream.
#[derive(Debug)]
pub(crate) struct Frame {
    /// Byte offset of the header in the stream.
    pub(crate) offset: u64,
    pub(crate) header: FrameHeader,
    /// Everything after the 4 header bytes.
    pub(crate) body: Vec<u8>,
}

/// Splits a byte stream into frames, skipping bytes that cannot start one.
#[derive(Debug)]
pub(crate) struct FrameReader<R> {
    inner: R,
    pos: u64,
}

impl<R: Read> FrameReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self { inner, pos: 0 }
    }

    pub(crate) fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub(crate) fn into_inner(self) -> R {
        self.inner
    }

    /// Records that the inner reader was repositioned to `pos`.
    pub(crate) fn reset(&mut self, pos: u64) {
        self.pos = pos;
    }

    /// Fills `buf` completely, returning the number of bytes read before
    /// end of stream.
    fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
        self.pos += filled as u64;
        Ok(filled)
    }

    /// Reads the next frame, or `None` at end of stream.
    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>, Mp3Error> {
        let mut word = [0u8; 4];
        if self.fill(&mut word)? < 4 {
            return Ok(None);
        }
        let mut offset = self.pos - 4;
        let mut skipped = 0usize;
        let header = loop {
            match FrameHeader::parse(u32::from_be_bytes(word)) {
                Ok(header) => break header,
                Err(Mp3Error::InvalidHeader(_)) => {
                    let mut next = [0u8];
                    if self.fill(&mut next)? == 0 {
                        if skipped > 0 {
                            warn!("skipped {} trailing bytes without a frame", skipped + 4);
                        }
                        return Ok(None);
                    }
                    word.copy_within(1.., 0);
                    word[3] = next[0];
                    offset += 1;
                    skipped += 1;
                }
                Err(err) => return Err(err),
            }
        };
        if skipped > 0 {
            warn!("lost sync, skipped {skipped} bytes before offset {offset}");
        }
        let size = header.frame_size();
        if size > MAX_FRAME_SIZE {
            return Err(Mp3Error::FrameTooLarge(size));
        }
        let mut body = vec![0u8; size - 4];
        if self.fill(&mut body)? < body.len() {
            return Err(Mp3Error::UnexpectedEof);
        }
        trace!("frame at {offset}: {size} bytes, {:?}", header.mode);
        Ok(Some(Frame {
            offset,
            header,
            body,
        }))
    }
}

/// State carried from frame to frame: the bit reservoir, IMDCT overlap
/// and synthesis buffers.
#[derive(Debug)]
pub(crate) struct FrameDecoder {
    reservoir: Reservoir,
    overlap: Box<[Overlap; 2]>,
    filterbanks: Box<[Filterbank; 2]>,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self {
            reservoir: Reservoir::default(),
            overlap: Box::new([[[0.0; 18]; 32]; 2]),
            filterbanks: Box::default(),
        }
    }
}

impl FrameDecoder {
    /// Decodes one frame into `out`, which holds two granules of PCM.
    pub(crate) fn decode(&mut self, frame: &Frame, out: &mut [u8]) -> Result<(), Mp3Error> {
        let header = &frame.header;
        let side_start = header.crc_size();
        let main_start = side_start + header.side_info_size();
        let side = SideInfo::parse(header, &frame.body[side_start..main_start]);
        let fresh = &frame.body[main_start..];
        debug_assert_eq!(fresh.len(), header.main_data_size());

        let mut main = match self.reservoir.assemble(side.main_data_begin, fresh) {
            Some(data) => MainData::decode(header, &side, &data)?,
            None => {
                warn!(
                    "frame at {} needs {} reservoir bytes that are not available, decoding silence",
                    frame.offset, side.main_data_begin
                );
                MainData::default()
            }
        };

        let channels = header.channels();
        let rate = header.sample_rate_index;
        for gr in 0..2 {
            for ch in 0..channels {
                let info = &side.granules[gr][ch];
                let count1 = main.count1[gr][ch];
                let sf = &main.scalefactors[gr][ch];
                let lines = &mut main.lines[gr][ch];
                requantize(info, sf, rate, count1, lines);
                reorder(info, rate, count1, lines);
            }
            if channels == 2 {
                stereo::process(
                    header,
                    &side.granules[gr][0],
                    &main.scalefactors[gr][0],
                    main.count1[gr],
                    &mut main.lines[gr],
                );
            }
            let pcm = &mut out[gr * BYTES_PER_GRANULE..(gr + 1) * BYTES_PER_GRANULE];
            for ch in 0..channels {
                let info = &side.granules[gr][ch];
                let lines = &mut main.lines[gr][ch];
                hybrid::antialias(info, lines);
                hybrid::synthesize(info, lines, &mut self.overlap[ch]);
                hybrid::invert_frequencies(lines);
                let slot = (channels == 2).then_some(ch);
                self.filterbanks[ch].synthesize(lines, slot, pcm);
            }
        }
        Ok(())
    }
}
