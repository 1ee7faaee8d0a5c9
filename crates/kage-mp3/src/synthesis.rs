//! Polyphase subband synthesis to 16-bit PCM.

use std::f64::consts::PI;
use std::sync::LazyLock;

use crate::maindata::LINES;
use crate::window::WINDOW_D;

/// Matrixing coefficients `cos((16 + i)(2j + 1)π / 64)`.
static MATRIX: LazyLock<[[f32; 32]; 64]> = LazyLock::new(|| {
    let mut matrix = [[0.0f32; 32]; 64];
    for (i, row) in matrix.iter_mut().enumerate() {
        for (j, c) in row.iter_mut().enumerate() {
            *c = ((16 + i) as f64 * (2 * j + 1) as f64 * PI / 64.0).cos() as f32;
        }
    }
    matrix
});

/// The 1024-entry V buffer of one channel.
#[derive(Clone, Debug)]
pub(crate) struct Filterbank {
    v: [f32; 1024],
}

impl Default for Filterbank {
    fn default() -> Self {
        Self { v: [0.0; 1024] }
    }
}

impl Filterbank {
    /// Synthesizes the 576 time samples of one granule and writes them as
    /// little-endian `i16` into `out`, which holds 576 interleaved stereo
    /// frames. `channel` picks the left or right slot; `None` writes both.
    pub(crate) fn synthesize(&mut self, lines: &[f32; LINES], channel: Option<usize>, out: &mut [u8]) {
        let matrix = &*MATRIX;
        let mut u = [0.0f32; 512];
        for ss in 0..18 {
            self.v.copy_within(0..1024 - 64, 64);
            for (i, row) in matrix.iter().enumerate() {
                self.v[i] = row
                    .iter()
                    .enumerate()
                    .map(|(j, c)| c * lines[j * 18 + ss])
                    .sum();
            }
            for i in 0..8 {
                u[i * 64..i * 64 + 32].copy_from_slice(&self.v[i * 128..i * 128 + 32]);
                u[i * 64 + 32..i * 64 + 64].copy_from_slice(&self.v[i * 128 + 96..i * 128 + 128]);
            }
            for (value, d) in u.iter_mut().zip(WINDOW_D.iter()) {
                *value *= d;
            }
            for j in 0..32 {
                let sum: f32 = (0..16).map(|i| u[j + 32 * i]).sum();
                let sample = pcm(sum).to_le_bytes();
                let frame = 4 * (32 * ss + j);
                match channel {
                    Some(ch) => out[frame + 2 * ch..frame + 2 * ch + 2].copy_from_slice(&sample),
                    None => {
                        out[frame..frame + 2].copy_from_slice(&sample);
                        out[frame + 2..frame + 4].copy_from_slice(&sample);
                    }
                }
            }
        }
    }
}

fn pcm(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32767.0, 32767.0) as i16
}
