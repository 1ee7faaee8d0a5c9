//! Joint stereo decoding.

use std::f32::consts::{FRAC_1_SQRT_2, PI};

use crate::bands::BANDS;
use crate::header::FrameHeader;
use crate::maindata::{LINES, Scalefactors};
use crate::sideinfo::GranuleInfo;

/// Left and right gains for an intensity position, `None` when the
/// position disables intensity coding for the band.
fn intensity_ratios(position: u32) -> Option<(f32, f32)> {
    match position {
        0..=5 => {
            let tan = (position as f32 * PI / 12.0).tan();
            Some((tan / (1.0 + tan), 1.0 / (1.0 + tan)))
        }
        6 => Some((1.0, 0.0)),
        _ => None,
    }
}

fn intensity(left: &mut [f32], right: &mut [f32], position: u32) {
    let Some((ratio_l, ratio_r)) = intensity_ratios(position) else {
        return;
    };
    for (l, r) in left.iter_mut().zip(right.iter_mut()) {
        let value = *l;
        *l = value * ratio_l;
        *r = value * ratio_r;
    }
}

/// Applies mid/side and intensity stereo to both channels of a granule.
///
/// Intensity positions come from the left channel's scalefactors and
/// apply to the bands at or above the right channel's zero region.
pub(crate) fn process(
    header: &FrameHeader,
    info: &GranuleInfo,
    sf: &Scalefactors,
    count1: [usize; 2],
    lines: &mut [[f32; LINES]; 2],
) {
    let [left, right] = lines;
    if header.uses_mid_side() {
        let end = count1[0].max(count1[1]);
        for (l, r) in left[..end].iter_mut().zip(right[..end].iter_mut()) {
            let (mid, side) = (*l, *r);
            *l = (mid + side) * FRAC_1_SQRT_2;
            *r = (mid - side) * FRAC_1_SQRT_2;
        }
    }
    if !header.uses_intensity() {
        return;
    }
    let bands = &BANDS[header.sample_rate_index];
    let zero_start = count1[1];
    let long_bands = match (info.short_blocks(), info.mixed_block) {
        (false, _) => 0..21,
        (true, true) => 0..8,
        (true, false) => 0..0,
    };
    for band in long_bands {
        let (start, stop) = (bands.long[band], bands.long[band + 1]);
        if start >= zero_start {
            intensity(&mut left[start..stop], &mut right[start..stop], sf.long[band]);
        }
    }
    if !info.short_blocks() {
        return;
    }
    let first_short = if info.mixed_block { 3 } else { 0 };
    for band in first_short..12 {
        let width = bands.short[band + 1] - bands.short[band];
        let base = bands.short[band] * 3;
        if base < zero_start {
            continue;
        }
        for win in 0..3 {
            let start = base + win * width;
            intensity(
                &mut left[start..start + width],
                &mut right[start..start + width],
                sf.short[band][win],
            );
        }
    }
}
