//! Requantization and short-block reordering.

use std::sync::LazyLock;

use crate::bands::BANDS;
use crate::maindata::{LINES, Scalefactors};
use crate::sideinfo::GranuleInfo;

const PRETAB: [u32; 22] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 3, 3, 3, 2, 0];

/// `n^(4/3)` for every magnitude a Huffman escape can produce.
static POW43: LazyLock<Vec<f32>> =
    LazyLock::new(|| (0..8207).map(|n| (n as f64).powf(4.0 / 3.0) as f32).collect());

fn pow43(line: f32) -> f32 {
    let magnitude = POW43[(line.abs() as usize).min(POW43.len() - 1)];
    if line < 0.0 { -magnitude } else { magnitude }
}

fn scale_multiplier(info: &GranuleInfo) -> f32 {
    if info.scalefac_scale { 1.0 } else { 0.5 }
}

fn long_line(info: &GranuleInfo, sf: &Scalefactors, band: usize, line: f32) -> f32 {
    let pre = if info.preflag { PRETAB[band] } else { 0 };
    let global = 0.25 * (info.global_gain as f32 - 210.0);
    let local = -scale_multiplier(info) * (sf.long[band] + pre) as f32;
    2f32.powf(global + local) * pow43(line)
}

fn short_line(info: &GranuleInfo, sf: &Scalefactors, band: usize, win: usize, line: f32) -> f32 {
    let gain = info.global_gain as f32 - 210.0 - 8.0 * info.subblock_gain[win] as f32;
    let local = -scale_multiplier(info) * sf.short[band][win] as f32;
    2f32.powf(0.25 * gain + local) * pow43(line)
}

/// Scales the integer lines below `count1` into spectral values.
pub(crate) fn requantize(
    info: &GranuleInfo,
    sf: &Scalefactors,
    sample_rate_index: usize,
    count1: usize,
    lines: &mut [f32; LINES],
) {
    let bands = &BANDS[sample_rate_index];
    let mut i = 0;
    if !info.short_blocks() || info.mixed_block {
        let long_end = if info.short_blocks() { 36 } else { count1 };
        let mut band = 0;
        while i < long_end {
            if i == bands.long[band + 1] {
                band += 1;
            }
            lines[i] = long_line(info, sf, band, lines[i]);
            i += 1;
        }
        if !info.short_blocks() {
            return;
        }
    }
    let mut band = if info.mixed_block { 3 } else { 0 };
    while i < count1 && band < 13 {
        let width = bands.short[band + 1] - bands.short[band];
        for win in 0..3 {
            for _ in 0..width {
                lines[i] = short_line(info, sf, band, win, lines[i]);
                i += 1;
            }
        }
        band += 1;
    }
}

/// Reorders short-block lines from window-major to frequency-major order
/// inside each scalefactor band.
pub(crate) fn reorder(
    info: &GranuleInfo,
    sample_rate_index: usize,
    count1: usize,
    lines: &mut [f32; LINES],
) {
    if !info.short_blocks() {
        return;
    }
    let short = &BANDS[sample_rate_index].short;
    let mut scratch = [0.0f32; LINES];
    let first = if info.mixed_block { 3 } else { 0 };
    for band in first..13 {
        let start = short[band] * 3;
        if start >= count1 && band > first {
            break;
        }
        let width = short[band + 1] - short[band];
        for win in 0..3 {
            for j in 0..width {
                scratch[j * 3 + win] = lines[start + win * width + j];
            }
        }
        lines[start..start + 3 * width].copy_from_slice(&scratch[..3 * width]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> GranuleInfo {
        GranuleInfo {
            global_gain: 210,
            ..GranuleInfo::default()
        }
    }

    #[test]
    fn unit_gain_is_pow43() {
        let mut lines = [0.0; LINES];
        lines[0] = 8.0;
        lines[1] = -1.0;
        requantize(&info(), &Scalefactors::default(), 0, 2, &mut lines);
        assert!((lines[0] - 16.0).abs() < 1e-3);
        assert_eq!(lines[1], -1.0);
    }

    #[test]
    fn scalefactors_attenuate() {
        let mut sf = Scalefactors::default();
        sf.long[0] = 2;
        let mut lines = [0.0; LINES];
        lines[0] = 1.0;
        lines[4] = 1.0;
        let info = GranuleInfo {
            global_gain: 214,
            ..GranuleInfo::default()
        };
        requantize(&info, &sf, 0, 8, &mut lines);
        // 2^(1 - 0.5 * 2) in band 0, 2^1 in band 1.
        assert!((lines[0] - 1.0).abs() < 1e-6);
        assert!((lines[4] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn subblock_gain_scales_one_window() {
        let info = GranuleInfo {
            window_switching: true,
            block_type: 2,
            subblock_gain: [0, 1, 0],
            ..info()
        };
        let mut lines = [0.0; LINES];
        lines[..12].fill(1.0);
        requantize(&info, &Scalefactors::default(), 0, 12, &mut lines);
        assert_eq!(lines[0], 1.0);
        assert!((lines[4] - 0.25).abs() < 1e-6);
        assert_eq!(lines[8], 1.0);
    }

    #[test]
    fn reorder_interleaves_windows() {
        let info = GranuleInfo {
            window_switching: true,
            block_type: 2,
            ..info()
        };
        let mut lines = [0.0; LINES];
        for (i, line) in lines.iter_mut().enumerate().take(12) {
            *line = i as f32;
        }
        reorder(&info, 0, 12, &mut lines);
        assert_eq!(
            &lines[..12],
            &[0.0, 4.0, 8.0, 1.0, 5.0, 9.0, 2.0, 6.0, 10.0, 3.0, 7.0, 11.0]
        );
    }
}
