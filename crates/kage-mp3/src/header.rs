use crate::error::Mp3Error;

const SYNC: u32 = 0xffe0_0000;

const BITRATES: [u32; 15] = [
    0, 32_000, 40_000, 48_000, 56_000, 64_000, 80_000, 96_000, 112_000, 128_000, 160_000,
    192_000, 224_000, 256_000, 320_000,
];

const SAMPLE_RATES: [u32; 3] = [44_100, 48_000, 32_000];

/// Largest frame the decoder accepts.
pub(crate) const MAX_FRAME_SIZE: usize = 2000;

/// Channel mode of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelMode {
    /// Two independent channels.
    Stereo,
    /// Two channels with optional mid/side and intensity coding.
    JointStereo,
    /// Two unrelated mono channels.
    DualChannel,
    /// A single channel.
    Mono,
}

/// Decoded fields of a 32-bit MPEG-1 Layer III frame header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    /// Bits per second.
    pub bitrate: u32,
    /// Samples per second.
    pub sample_rate: u32,
    /// Whether a 16-bit CRC follows the header.
    pub crc: bool,
    /// Whether the frame carries one extra padding byte.
    pub padding: bool,
    /// Channel mode.
    pub mode: ChannelMode,
    /// Joint stereo tools: bit 1 selects mid/side, bit 0 intensity.
    pub mode_extension: u8,
    pub(crate) sample_rate_index: usize,
}

impl FrameHeader {
    /// Parses a big-endian header word.
    ///
    /// Words that cannot start a frame (bad sync, reserved or free-format
    /// fields) yield [`Mp3Error::InvalidHeader`] so the caller can resync;
    /// well-formed headers for other layers or versions are reported as
    /// unsupported.
    pub fn parse(word: u32) -> Result<Self, Mp3Error> {
        if word & SYNC != SYNC {
            return Err(Mp3Error::InvalidHeader(word));
        }
        let version = (word >> 19) & 0x3;
        let layer = (word >> 17) & 0x3;
        let bitrate_index = ((word >> 12) & 0xf) as usize;
        let sample_rate_index = ((word >> 10) & 0x3) as usize;
        if version == 1 || layer == 0 || bitrate_index == 0 || bitrate_index == 15 {
            return Err(Mp3Error::InvalidHeader(word));
        }
        if sample_rate_index == 3 {
            return Err(Mp3Error::InvalidHeader(word));
        }
        match version {
            0 => return Err(Mp3Error::UnsupportedVersion("MPEG-2.5")),
            2 => return Err(Mp3Error::UnsupportedVersion("MPEG-2")),
            _ => {}
        }
        if layer != 1 {
            return Err(Mp3Error::UnsupportedLayer(4 - layer as u8));
        }
        let mode = match (word >> 6) & 0x3 {
            0 => ChannelMode::Stereo,
            1 => ChannelMode::JointStereo,
            2 => ChannelMode::DualChannel,
            _ => ChannelMode::Mono,
        };
        Ok(Self {
            bitrate: BITRATES[bitrate_index],
            sample_rate: SAMPLE_RATES[sample_rate_index],
            crc: (word >> 16) & 1 == 0,
            padding: (word >> 9) & 1 == 1,
            mode,
            mode_extension: ((word >> 4) & 0x3) as u8,
            sample_rate_index,
        })
    }

    /// Number of coded channels.
    pub fn channels(&self) -> usize {
        if self.mode == ChannelMode::Mono { 1 } else { 2 }
    }

    /// Total frame length in bytes, header included.
    pub fn frame_size(&self) -> usize {
        (144 * self.bitrate / self.sample_rate) as usize + usize::from(self.padding)
    }

    pub(crate) fn side_info_size(&self) -> usize {
        if self.channels() == 1 { 17 } else { 32 }
    }

    pub(crate) fn crc_size(&self) -> usize {
        if self.crc { 2 } else { 0 }
    }

    /// Bytes of main data carried by this frame.
    pub(crate) fn main_data_size(&self) -> usize {
        self.frame_size()
            .saturating_sub(4 + self.crc_size() + self.side_info_size())
    }

    pub(crate) fn uses_mid_side(&self) -> bool {
        self.mode == ChannelMode::JointStereo && self.mode_extension & 0x2 != 0
    }

    pub(crate) fn uses_intensity(&self) -> bool {
        self.mode == ChannelMode::JointStereo && self.mode_extension & 0x1 != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stereo_128k() {
        let h = FrameHeader::parse(0xfffb_9000).unwrap();
        assert_eq!(h.bitrate, 128_000);
        assert_eq!(h.sample_rate, 44_100);
        assert!(!h.crc);
        assert_eq!(h.mode, ChannelMode::Stereo);
        assert_eq!(h.frame_size(), 417);
        assert_eq!(h.main_data_size(), 417 - 4 - 32);
    }

    #[test]
    fn padding_and_crc() {
        let h = FrameHeader::parse(0xfffa_9240).unwrap();
        assert!(h.crc);
        assert!(h.padding);
        assert_eq!(h.mode, ChannelMode::JointStereo);
        assert_eq!(h.frame_size(), 418);
        assert_eq!(h.main_data_size(), 418 - 4 - 2 - 32);
    }

    #[test]
    fn mono_side_info() {
        let h = FrameHeader::parse(0xfffb_90c0).unwrap();
        assert_eq!(h.channels(), 1);
        assert_eq!(h.main_data_size(), 417 - 4 - 17);
    }

    #[test]
    fn rejects_reserved_fields() {
        for word in [0x0000_0000, 0xfffb_0000, 0xfffb_f000, 0xfffb_9c00, 0xffe9_9000, 0xfff9_9000] {
            assert!(
                matches!(FrameHeader::parse(word), Err(Mp3Error::InvalidHeader(_))),
                "{word:#x}"
            );
        }
    }

    #[test]
    fn other_layers_and_versions_are_unsupported() {
        assert!(matches!(
            FrameHeader::parse(0xffff_9000),
            Err(Mp3Error::UnsupportedLayer(1))
        ));
        assert!(matches!(
            FrameHeader::parse(0xfffd_9000),
            Err(Mp3Error::UnsupportedLayer(2))
        ));
        assert!(matches!(
            FrameHeader::parse(0xfff3_9000),
            Err(Mp3Error::UnsupportedVersion("MPEG-2"))
        ));
    }
}
