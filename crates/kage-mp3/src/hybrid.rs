//! Alias reduction, IMDCT with overlap-add, and frequency inversion.

use std::f32::consts::PI;
use std::sync::LazyLock;

use crate::maindata::LINES;
use crate::sideinfo::GranuleInfo;

const ALIAS_COEFFICIENTS: [f32; 8] = [-0.6, -0.535, -0.33, -0.185, -0.095, -0.041, -0.0142, -0.0037];

/// Overlap carried between granules, per subband.
pub(crate) type Overlap = [[f32; 18]; 32];

struct Tables {
    /// `(cs, ca)` butterfly pairs.
    alias: [(f32, f32); 8],
    /// Windows for block types 0 to 3.
    windows: [[f32; 36]; 4],
    cos12: [[f32; 12]; 6],
    cos36: [[f32; 36]; 18],
}

static TABLES: LazyLock<Tables> = LazyLock::new(|| {
    let alias = ALIAS_COEFFICIENTS.map(|c| {
        let norm = (1.0 + c * c).sqrt();
        (1.0 / norm, c / norm)
    });

    let mut windows = [[0.0f32; 36]; 4];
    for i in 0..36 {
        windows[0][i] = (PI / 36.0 * (i as f32 + 0.5)).sin();
    }
    for i in 0..18 {
        windows[1][i] = (PI / 36.0 * (i as f32 + 0.5)).sin();
    }
    for i in 18..24 {
        windows[1][i] = 1.0;
    }
    for i in 24..30 {
        windows[1][i] = (PI / 12.0 * (i as f32 + 0.5 - 18.0)).sin();
    }
    for i in 0..12 {
        windows[2][i] = (PI / 12.0 * (i as f32 + 0.5)).sin();
    }
    for i in 6..12 {
        windows[3][i] = (PI / 12.0 * (i as f32 + 0.5 - 6.0)).sin();
    }
    for i in 12..18 {
        windows[3][i] = 1.0;
    }
    for i in 18..36 {
        windows[3][i] = (PI / 36.0 * (i as f32 + 0.5)).sin();
    }

    let mut cos12 = [[0.0f32; 12]; 6];
    for (i, row) in cos12.iter_mut().enumerate() {
        for (j, c) in row.iter_mut().enumerate() {
            *c = (PI / 24.0 * (2 * j + 1 + 6) as f32 * (2 * i + 1) as f32).cos();
        }
    }
    let mut cos36 = [[0.0f32; 36]; 18];
    for (i, row) in cos36.iter_mut().enumerate() {
        for (j, c) in row.iter_mut().enumerate() {
            *c = (PI / 72.0 * (2 * j + 1 + 18) as f32 * (2 * i + 1) as f32).cos();
        }
    }
    Tables {
        alias,
        windows,
        cos12,
        cos36,
    }
});

/// Butterflies across subband boundaries; skipped for pure short blocks.
pub(crate) fn antialias(info: &GranuleInfo, lines: &mut [f32; LINES]) {
    if info.short_blocks() && !info.mixed_block {
        return;
    }
    let limit = if info.short_blocks() { 2 } else { 32 };
    for sb in 1..limit {
        for (i, &(cs, ca)) in TABLES.alias.iter().enumerate() {
            let lower = 18 * sb - 1 - i;
            let upper = 18 * sb + i;
            let (l, u) = (lines[lower], lines[upper]);
            lines[lower] = l * cs - u * ca;
            lines[upper] = u * cs + l * ca;
        }
    }
}

fn imdct(input: &[f32], block_type: usize) -> [f32; 36] {
    let tables = &*TABLES;
    let window = &tables.windows[block_type];
    let mut out = [0.0f32; 36];
    if block_type == 2 {
        for win in 0..3 {
            for p in 0..12 {
                let sum: f32 = (0..6).map(|m| input[win + 3 * m] * tables.cos12[m][p]).sum();
                out[6 * win + p + 6] += sum * window[p];
            }
        }
    } else {
        for (p, o) in out.iter_mut().enumerate() {
            let sum: f32 = (0..18).map(|m| input[m] * tables.cos36[m][p]).sum();
            *o = sum * window[p];
        }
    }
    out
}

/// Runs the IMDCT of every subband and overlap-adds with the previous
/// granule, keeping the new upper halves in `overlap`.
pub(crate) fn synthesize(info: &GranuleInfo, lines: &mut [f32; LINES], overlap: &mut Overlap) {
    for (sb, (chunk, store)) in lines.chunks_exact_mut(18).zip(overlap.iter_mut()).enumerate() {
        let block_type = if info.window_switching && info.mixed_block && sb < 2 {
            0
        } else {
            usize::from(info.block_type)
        };
        let raw = imdct(chunk, block_type);
        for i in 0..18 {
            chunk[i] = raw[i] + store[i];
            store[i] = raw[i + 18];
        }
    }
}

/// Negates odd time samples of odd subbands.
pub(crate) fn invert_frequencies(lines: &mut [f32; LINES]) {
    for chunk in lines.chunks_exact_mut(18).skip(1).step_by(2) {
        for sample in chunk.iter_mut().skip(1).step_by(2) {
            *sample = -*sample;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_pairs_are_rotations() {
        for &(cs, ca) in &TABLES.alias {
            assert!((cs * cs + ca * ca - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn silence_stays_silent_and_clears_overlap() {
        let mut lines = [0.0; LINES];
        let mut overlap = [[0.0; 18]; 32];
        synthesize(&GranuleInfo::default(), &mut lines, &mut overlap);
        assert!(lines.iter().all(|&l| l == 0.0));
        assert!(overlap.iter().flatten().all(|&l| l == 0.0));
    }

    #[test]
    fn overlap_carries_into_next_granule() {
        let mut lines = [0.0; LINES];
        lines[0] = 1.0;
        let mut overlap = [[0.0; 18]; 32];
        synthesize(&GranuleInfo::default(), &mut lines, &mut overlap);
        let tail = overlap[0];
        assert!(tail.iter().any(|&v| v != 0.0));

        let mut next = [0.0; LINES];
        synthesize(&GranuleInfo::default(), &mut next, &mut overlap);
        assert_eq!(&next[..18], &tail[..]);
    }

    #[test]
    fn short_block_window_is_zero_outside_first_half() {
        assert!(TABLES.windows[2][12..].iter().all(|&w| w == 0.0));
        assert!(TABLES.windows[1][30..].iter().all(|&w| w == 0.0));
        assert!(TABLES.windows[3][..6].iter().all(|&w| w == 0.0));
    }

    fn short_info(mixed_block: bool) -> GranuleInfo {
        GranuleInfo {
            window_switching: true,
            block_type: 2,
            mixed_block,
            ..GranuleInfo::default()
        }
    }

    #[test]
    fn antialias_boundaries_per_block_kind() {
        let mut long = [1.0; LINES];
        antialias(&GranuleInfo::default(), &mut long);
        assert_ne!(long[17], 1.0);
        assert_ne!(long[36], 1.0);
        assert_ne!(long[18 * 31], 1.0);

        let mut short = [1.0; LINES];
        antialias(&short_info(false), &mut short);
        assert!(short.iter().all(|&l| l == 1.0));

        // Mixed blocks only smooth the boundary between subbands 0 and 1.
        let mut mixed = [1.0; LINES];
        antialias(&short_info(true), &mut mixed);
        assert!(mixed[..10].iter().all(|&l| l == 1.0));
        assert!(mixed[10..26].iter().all(|&l| l != 1.0));
        assert!(mixed[26..].iter().all(|&l| l == 1.0));
    }

    /// The 36 IMDCT outputs of subband 0: the overlap-added half followed
    /// by the half stored for the next granule.
    fn first_subband_outputs(info: &GranuleInfo, lines: &mut [f32; LINES]) -> Vec<f32> {
        let mut overlap = [[0.0; 18]; 32];
        synthesize(info, lines, &mut overlap);
        lines[..18].iter().chain(&overlap[0]).copied().collect()
    }

    #[test]
    fn short_window_impulse_lands_in_its_window() {
        for win in 0..3 {
            let mut lines = [0.0; LINES];
            lines[win] = 1.0;
            let out = first_subband_outputs(&short_info(false), &mut lines);
            let window = 6 + 6 * win..18 + 6 * win;
            for (i, &v) in out.iter().enumerate() {
                assert_eq!(v != 0.0, window.contains(&i), "window {win}, output {i}");
            }
            assert!(lines[18..].iter().all(|&l| l == 0.0));
        }
    }

    #[test]
    fn mixed_blocks_use_long_transform_below_subband_two() {
        let mut lines = [0.0; LINES];
        lines[0] = 1.0;
        let out = first_subband_outputs(&short_info(true), &mut lines);
        assert!(out.iter().all(|&v| v != 0.0));

        // Subband 2 of the same granule is a short block.
        let mut lines = [0.0; LINES];
        lines[36] = 1.0;
        let mut overlap = [[0.0; 18]; 32];
        synthesize(&short_info(true), &mut lines, &mut overlap);
        assert!(lines[36..42].iter().all(|&l| l == 0.0));
        assert!(lines[42..54].iter().all(|&l| l != 0.0));
        assert!(overlap[2].iter().all(|&l| l == 0.0));
    }

    #[test]
    fn inversion_touches_odd_samples_of_odd_subbands() {
        let mut lines = [1.0; LINES];
        invert_frequencies(&mut lines);
        assert_eq!(lines[1], 1.0);
        assert_eq!(lines[18], 1.0);
        assert_eq!(lines[19], -1.0);
        assert_eq!(lines[20], 1.0);
        assert_eq!(lines[18 * 31 + 17], -1.0);
    }
}
