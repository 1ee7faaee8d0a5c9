use crate::bits::BitReader;
use crate::header::FrameHeader;

/// Per-granule, per-channel coding parameters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct GranuleInfo {
    pub(crate) part2_3_length: usize,
    pub(crate) big_values: usize,
    pub(crate) global_gain: u32,
    pub(crate) scalefac_compress: usize,
    pub(crate) window_switching: bool,
    pub(crate) block_type: u8,
    pub(crate) mixed_block: bool,
    pub(crate) table_select: [usize; 3],
    pub(crate) subblock_gain: [u32; 3],
    pub(crate) region0_count: usize,
    pub(crate) region1_count: usize,
    pub(crate) preflag: bool,
    pub(crate) scalefac_scale: bool,
    pub(crate) count1table_select: bool,
}

impl GranuleInfo {
    /// Whether the granule uses three short windows.
    pub(crate) fn short_blocks(&self) -> bool {
        self.window_switching && self.block_type == 2
    }

    fn read(r: &mut BitReader<'_>) -> Self {
        let mut g = Self {
            part2_3_length: r.bits(12) as usize,
            big_values: (r.bits(9) as usize).min(288),
            global_gain: r.bits(8),
            scalefac_compress: r.bits(4) as usize,
            window_switching: r.bit(),
            ..Self::default()
        };
        if g.window_switching {
            g.block_type = r.bits(2) as u8;
            g.mixed_block = r.bit();
            for t in &mut g.table_select[..2] {
                *t = r.bits(5) as usize;
            }
            for gain in &mut g.subblock_gain {
                *gain = r.bits(3);
            }
            g.region0_count = if g.block_type == 2 && !g.mixed_block { 8 } else { 7 };
            g.region1_count = 20 - g.region0_count;
        } else {
            for t in &mut g.table_select {
                *t = r.bits(5) as usize;
            }
            g.region0_count = r.bits(4) as usize;
            g.region1_count = r.bits(3) as usize;
        }
        g.preflag = r.bit();
        g.scalefac_scale = r.bit();
        g.count1table_select = r.bit();
        g
    }
}

/// Side information of one frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct SideInfo {
    /// Bytes of main data taken from the bit reservoir.
    pub(crate) main_data_begin: usize,
    /// Scalefactor reuse flags per channel and band group.
    pub(crate) scfsi: [[bool; 4]; 2],
    /// Indexed `[granule][channel]`.
    pub(crate) granules: [[GranuleInfo; 2]; 2],
}

impl SideInfo {
    /// Parses side information from the bytes right after header and CRC.
    pub(crate) fn parse(header: &FrameHeader, data: &[u8]) -> Self {
        let channels = header.channels();
        let mut r = BitReader::new(data);
        let mut info = Self {
            main_data_begin: r.bits(9) as usize,
            ..Self::default()
        };
        r.bits(if channels == 1 { 5 } else { 3 });
        for scfsi in &mut info.scfsi[..channels] {
            for flag in scfsi.iter_mut() {
                *flag = r.bit();
            }
        }
        for granule in &mut info.granules {
            for ch in granule[..channels].iter_mut() {
                *ch = GranuleInfo::read(&mut r);
            }
        }
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_side_info() {
        let header = FrameHeader::parse(0xfffb_9000).unwrap();
        let info = SideInfo::parse(&header, &[0; 32]);
        assert_eq!(info, SideInfo::default());
    }

    #[test]
    fn long_block_fields() {
        let header = FrameHeader::parse(0xfffb_90c0).unwrap();
        // main_data_begin = 3, private bits, scfsi = 1010, then granule 0:
        // part2_3_length = 100, big_values = 4, global_gain = 210,
        // scalefac_compress = 5, no window switching, tables 1/2/3,
        // region counts 2/1, preflag set.
        let mut bits = String::new();
        bits += &format!("{:09b}{:05b}1010", 3, 0);
        bits += &format!("{:012b}{:09b}{:08b}{:04b}0", 100, 4, 210, 5);
        bits += &format!("{:05b}{:05b}{:05b}{:04b}{:03b}100", 1, 2, 3, 2, 1);
        let mut data = vec![0u8; 17];
        for (i, c) in bits.chars().enumerate() {
            if c == '1' {
                data[i / 8] |= 0x80 >> (i % 8);
            }
        }
        let info = SideInfo::parse(&header, &data);
        assert_eq!(info.main_data_begin, 3);
        assert_eq!(info.scfsi[0], [true, false, true, false]);
        let g = info.granules[0][0];
        assert_eq!(g.part2_3_length, 100);
        assert_eq!(g.big_values, 4);
        assert_eq!(g.global_gain, 210);
        assert_eq!(g.scalefac_compress, 5);
        assert_eq!(g.table_select, [1, 2, 3]);
        assert_eq!((g.region0_count, g.region1_count), (2, 1));
        assert!(g.preflag);
        assert!(!g.scalefac_scale);
        assert!(!g.short_blocks());
    }
}
