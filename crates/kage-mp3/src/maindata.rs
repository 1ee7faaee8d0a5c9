//! Scalefactors and Huffman-coded frequency lines of one frame.

use log::trace;

use crate::bands::BANDS;
use crate::bits::BitReader;
use crate::error::Mp3Error;
use crate::header::FrameHeader;
use crate::huffman::{decode_pair, decode_quad};
use crate::sideinfo::{GranuleInfo, SideInfo};

/// Frequency lines per granule and channel.
pub(crate) const LINES: usize = 576;

/// Bit lengths `(slen1, slen2)` selected by `scalefac_compress`.
const SLEN: [(u32, u32); 16] = [
    (0, 0),
    (0, 1),
    (0, 2),
    (0, 3),
    (3, 0),
    (1, 1),
    (1, 2),
    (1, 3),
    (2, 1),
    (2, 2),
    (2, 3),
    (3, 1),
    (3, 2),
    (3, 3),
    (4, 2),
    (4, 3),
];

/// Long scalefactor band groups sharing one `scfsi` flag.
const SCFSI_GROUPS: [std::ops::Range<usize>; 4] = [0..6, 6..11, 11..16, 16..21];

/// Scalefactors of one granule and channel.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Scalefactors {
    pub(crate) long: [u32; 22],
    /// Indexed `[band][window]`.
    pub(crate) short: [[u32; 3]; 13],
}

/// Decoded main data, indexed `[granule][channel]`.
#[derive(Clone, Debug)]
pub(crate) struct MainData {
    pub(crate) scalefactors: [[Scalefactors; 2]; 2],
    pub(crate) lines: [[[f32; LINES]; 2]; 2],
    /// Index of the first line of the all-zero region.
    pub(crate) count1: [[usize; 2]; 2],
}

impl Default for MainData {
    fn default() -> Self {
        Self {
            scalefactors: Default::default(),
            lines: [[[0.0; LINES]; 2]; 2],
            count1: [[0; 2]; 2],
        }
    }
}

impl MainData {
    /// Decodes scalefactors and frequency lines from assembled main data.
    pub(crate) fn decode(
        header: &FrameHeader,
        side: &SideInfo,
        data: &[u8],
    ) -> Result<Self, Mp3Error> {
        let mut main = Self::default();
        let mut r = BitReader::new(data);
        for gr in 0..2 {
            for ch in 0..header.channels() {
                let info = &side.granules[gr][ch];
                let part2_start = r.position();
                main.scalefactors[gr][ch] = if info.short_blocks() {
                    read_short_scalefactors(&mut r, info)
                } else {
                    let previous = (gr == 1).then(|| main.scalefactors[0][ch]);
                    read_long_scalefactors(&mut r, info, &side.scfsi[ch], previous)
                };
                main.count1[gr][ch] = read_lines(
                    &mut r,
                    info,
                    header.sample_rate_index,
                    part2_start,
                    &mut main.lines[gr][ch],
                )?;
                trace!(
                    "granule {gr} channel {ch}: {} bits, count1 {}",
                    info.part2_3_length,
                    main.count1[gr][ch]
                );
            }
        }
        Ok(main)
    }
}

fn read_short_scalefactors(r: &mut BitReader<'_>, info: &GranuleInfo) -> Scalefactors {
    let (slen1, slen2) = SLEN[info.scalefac_compress];
    let mut sf = Scalefactors::default();
    let first_short = if info.mixed_block {
        for band in 0..8 {
            sf.long[band] = r.bits(slen1);
        }
        3
    } else {
        0
    };
    for band in first_short..12 {
        let slen = if band < 6 { slen1 } else { slen2 };
        for win in 0..3 {
            sf.short[band][win] = r.bits(slen);
        }
    }
    sf
}

fn read_long_scalefactors(
    r: &mut BitReader<'_>,
    info: &GranuleInfo,
    scfsi: &[bool; 4],
    previous: Option<Scalefactors>,
) -> Scalefactors {
    let (slen1, slen2) = SLEN[info.scalefac_compress];
    let mut sf = Scalefactors::default();
    for (group, bands) in SCFSI_GROUPS.iter().enumerate() {
        let slen = if group < 2 { slen1 } else { slen2 };
        match previous {
            Some(previous) if scfsi[group] => {
                sf.long[bands.clone()].copy_from_slice(&previous.long[bands.clone()]);
            }
            _ => {
                for band in bands.clone() {
                    sf.long[band] = r.bits(slen);
                }
            }
        }
    }
    sf
}

/// Decodes the big-values and count1 regions into `lines` and returns the
/// start of the zero region.
fn read_lines(
    r: &mut BitReader<'_>,
    info: &GranuleInfo,
    sample_rate_index: usize,
    part2_start: usize,
    lines: &mut [f32; LINES],
) -> Result<usize, Mp3Error> {
    if info.part2_3_length == 0 {
        lines.fill(0.0);
        return Ok(0);
    }
    let end = part2_start + info.part2_3_length - 1;
    let (region1, region2) = if info.short_blocks() {
        (36, LINES)
    } else {
        let long = &BANDS[sample_rate_index].long;
        (
            long[(info.region0_count + 1).min(22)],
            long[(info.region0_count + info.region1_count + 2).min(22)],
        )
    };

    let mut pos = 0;
    while pos < info.big_values * 2 {
        let table = if pos < region1 {
            info.table_select[0]
        } else if pos < region2 {
            info.table_select[1]
        } else {
            info.table_select[2]
        };
        let (x, y) = decode_pair(r, table)?;
        lines[pos] = x as f32;
        lines[pos + 1] = y as f32;
        pos += 2;
    }

    let count1_start = pos;
    while pos + 4 <= LINES && r.position() <= end {
        let quad = decode_quad(r, info.count1table_select)?;
        for (line, value) in lines[pos..pos + 4].iter_mut().zip(quad) {
            *line = value as f32;
        }
        pos += 4;
    }
    if r.position() > end + 1 && pos > count1_start {
        pos -= 4;
    }
    lines[pos..].fill(0.0);
    r.set_position(end + 1);
    Ok(pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn granule() -> GranuleInfo {
        GranuleInfo {
            global_gain: 210,
            ..GranuleInfo::default()
        }
    }

    #[test]
    fn empty_part_is_silent() {
        let mut lines = [1.0; LINES];
        let mut r = BitReader::new(&[0xff; 8]);
        assert_eq!(read_lines(&mut r, &granule(), 0, 0, &mut lines).unwrap(), 0);
        assert!(lines.iter().all(|&l| l == 0.0));
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn big_values_then_quads() {
        // Table 1 pair '01' + sign '0' gives (1, 0); count1 table B
        // '1110' gives 15 - 14 = 1 = y, followed by its sign '1'.
        let info = GranuleInfo {
            part2_3_length: 8,
            big_values: 1,
            table_select: [1, 0, 0],
            count1table_select: true,
            ..granule()
        };
        let mut lines = [0.0; LINES];
        let mut r = BitReader::new(&[0b0101_1101, 0]);
        let count1 = read_lines(&mut r, &info, 0, 0, &mut lines).unwrap();
        assert_eq!(count1, 6);
        assert_eq!(&lines[..6], &[1.0, 0.0, 0.0, 0.0, 0.0, -1.0]);
        assert_eq!(r.position(), 8);
    }

    #[test]
    fn overshooting_quad_is_dropped() {
        // Only one bit left for the count1 region; table B needs four.
        let info = GranuleInfo {
            part2_3_length: 4,
            big_values: 1,
            table_select: [1, 0, 0],
            count1table_select: true,
            ..granule()
        };
        let mut lines = [0.0; LINES];
        let mut r = BitReader::new(&[0b0100_0000]);
        let count1 = read_lines(&mut r, &info, 0, 0, &mut lines).unwrap();
        assert_eq!(count1, 2);
        assert_eq!(lines[0], 1.0);
        assert!(lines[2..].iter().all(|&l| l == 0.0));
        assert_eq!(r.position(), 4);
    }

    #[test]
    fn scfsi_reuses_first_granule() {
        let info = GranuleInfo {
            scalefac_compress: 15,
            ..granule()
        };
        let mut previous = Scalefactors::default();
        previous.long[0] = 9;
        previous.long[20] = 5;
        // Groups 0 and 3 reuse; groups 1 and 2 read 5 * 4 + 5 * 3 bits of ones.
        let data = [0xff; 8];
        let mut r = BitReader::new(&data);
        let sf = read_long_scalefactors(&mut r, &info, &[true, false, false, true], Some(previous));
        assert_eq!(sf.long[0], 9);
        assert_eq!(sf.long[6], 15);
        assert_eq!(sf.long[11], 7);
        assert_eq!(sf.long[20], 5);
        assert_eq!(r.position(), 35);
    }

    #[test]
    fn mixed_blocks_read_long_then_short() {
        let info = GranuleInfo {
            scalefac_compress: 5,
            window_switching: true,
            block_type: 2,
            mixed_block: true,
            ..granule()
        };
        let mut r = BitReader::new(&[0xff; 8]);
        let sf = read_short_scalefactors(&mut r, &info);
        assert_eq!(sf.long[7], 1);
        assert_eq!(sf.short[2], [0; 3]);
        assert_eq!(sf.short[11], [1; 3]);
        // 8 long bands and 9 short bands of three windows, one bit each.
        assert_eq!(r.position(), 8 + 27);
    }
}
