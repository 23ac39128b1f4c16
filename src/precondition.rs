//! Forward and inverse generalized Anscombe transform (§4.A).
//!
//! Both passes are per-pixel and embarrassingly parallel across rows; channel 3 (the auxiliary
//! weight channel) is passed through unchanged.

use crate::buffer::PixelBuffer;
use crate::pool;
use crate::profile::EffectiveProfile;

/// `sigma2[2]` deliberately divides by `a[1]`, not `a[2]` — a transcription quirk in the upstream
/// source that this crate preserves for numerical parity rather than silently fixing (§9).
fn sigma2(profile: &EffectiveProfile) -> [f32; 3] {
    [
        (profile.b[0] / profile.a[0]).powi(2),
        (profile.b[1] / profile.a[1]).powi(2),
        (profile.b[2] / profile.a[1]).powi(2),
    ]
}

/// Transforms `input` into the Anscombe-stabilized domain, writing the result into `output`.
/// Both buffers must have identical dimensions.
pub fn forward(input: &PixelBuffer, output: &mut PixelBuffer, profile: &EffectiveProfile) {
    assert_eq!(input.width, output.width);
    assert_eq!(input.height, output.height);

    let sigma2 = sigma2(profile);
    let a = profile.a;
    let width = input.width;
    let in_slice = input.as_slice();

    pool::for_each_row_mut(output.as_mut_slice(), width * 4, output.height, |row_idx, out_row| {
        let in_row = &in_slice[row_idx * width * 4..(row_idx + 1) * width * 4];
        for px in 0..width {
            for c in 0..3 {
                let x = in_row[px * 4 + c];
                let d = (x / a[c] + 3.0 / 8.0 + sigma2[c]).max(0.0);
                out_row[px * 4 + c] = 2.0 * d.sqrt();
            }
            out_row[px * 4 + 3] = in_row[px * 4 + 3];
        }
    });
}

/// Inverts the Anscombe transform in place, back into linear units.
pub fn inverse(buf: &mut PixelBuffer, profile: &EffectiveProfile) {
    let sigma2 = sigma2(profile);
    let a = profile.a;
    let width = buf.width;

    pool::for_each_row_mut(buf.as_mut_slice(), width * 4, buf.height, |_row_idx, row| {
        for px in 0..width {
            for c in 0..3 {
                let y = row[px * 4 + c];
                row[px * 4 + c] = if y < 0.5 {
                    0.0
                } else {
                    let inv = y * y / 4.0 + 0.25 * (1.5f32).sqrt() / y - (11.0 / 8.0) / (y * y)
                        + (5.0 / 8.0) * (1.5f32).sqrt() / (y * y * y)
                        - 0.125
                        - sigma2[c];
                    a[c] * inv
                };
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{NoiseProfile, WhiteBalance};

    fn profile(a: f32, b: f32) -> EffectiveProfile {
        let np = NoiseProfile { a: [a; 3], b: [b; 3] };
        let wb = WhiteBalance { max: [1.0; 3], strength: 1.0 };
        np.effective(&wb)
    }

    #[test]
    fn round_trip_recovers_large_values() {
        let profile = profile(0.01, 0.001);
        let width = 8;
        let height = 8;
        let mut input = PixelBuffer::zeroed(width, height).unwrap();
        for y in 0..height {
            for x in 0..width {
                let v = 0.2 + 0.01 * (x + y * width) as f32;
                for c in 0..3 {
                    input[(x, y, c)] = v;
                }
            }
        }

        let mut stabilized = PixelBuffer::zeroed(width, height).unwrap();
        forward(&input, &mut stabilized, &profile);
        inverse(&mut stabilized, &profile);

        for y in 0..height {
            for x in 0..width {
                for c in 0..3 {
                    let expected = input[(x, y, c)];
                    let actual = stabilized[(x, y, c)];
                    let rel_err = (actual - expected).abs() / expected.max(1e-6);
                    assert!(
                        rel_err < 0.01,
                        "pixel ({x},{y},{c}): expected {expected}, got {actual}"
                    );
                }
            }
        }
    }

    #[test]
    fn channel_three_is_preserved_by_forward() {
        let profile = profile(0.01, 0.001);
        let mut input = PixelBuffer::zeroed(2, 2).unwrap();
        input[(0, 0, 3)] = 42.0;
        let mut out = PixelBuffer::zeroed(2, 2).unwrap();
        forward(&input, &mut out, &profile);
        assert_eq!(out[(0, 0, 3)], 42.0);
    }

    #[test]
    fn inverse_clips_small_values_to_zero() {
        let profile = profile(0.01, 0.001);
        let mut buf = PixelBuffer::zeroed(1, 1).unwrap();
        buf[(0, 0, 0)] = 0.1;
        inverse(&mut buf, &profile);
        assert_eq!(buf[(0, 0, 0)], 0.0);
    }
}
