//! Converts an SSD value into a weight and accumulates a weighted neighbor contribution (§4.F).

use crate::buffer::PixelBuffer;
use crate::fastexp::fast_mexp2;

/// The empirical falloff constants calibrating weight decay to the stabilized noise variance.
/// Must be reproduced literally (§4.F).
const NORM_SCALE: f32 = 0.015;
const CUTOFF: f32 = 2.0;

/// Weight for a patch at SSD distance `ssd`, for a `(2*patch+1)`-wide patch.
#[inline]
pub fn weight(ssd: f32, patch: u32) -> f32 {
    let norm = NORM_SCALE / (2 * patch + 1) as f32;
    fast_mexp2((ssd * norm - CUTOFF).max(0.0))
}

/// Accumulates `w * input[i+ki, j+kj][0..2]` into `out_px[0..2]` and `w` into `out_px[3]`, where
/// `out_px` is the 4-float slice of the output pixel at `(i, j)`.
///
/// Takes a bare pixel slice rather than the whole output buffer so the row-parallel caller (§5)
/// can hand each worker a disjoint mutable row without aliasing the rest of the buffer.
#[inline]
pub fn accumulate(out_px: &mut [f32], input: &PixelBuffer, i: usize, j: usize, ki: i32, kj: i32, w: f32) {
    let neighbor = input.clamped_pixel(i as i64 + ki as i64, j as i64 + kj as i64);
    for c in 0..3 {
        out_px[c] += w * neighbor[c];
    }
    out_px[3] += w;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_ssd_gives_weight_one() {
        assert!((weight(0.0, 3) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn large_ssd_gives_zero_weight() {
        assert_eq!(weight(1e6, 3), 0.0);
    }

    #[test]
    fn accumulate_adds_weighted_neighbor_and_weight() {
        let mut input = PixelBuffer::zeroed(3, 3).unwrap();
        input[(1, 1, 0)] = 2.0;
        input[(1, 1, 1)] = 4.0;
        input[(1, 1, 2)] = 6.0;

        let mut out_px = [0.0f32; 4];
        accumulate(&mut out_px, &input, 1, 1, 0, 0, 0.5);

        assert_eq!(out_px, [1.0, 2.0, 3.0, 0.5]);
    }
}
