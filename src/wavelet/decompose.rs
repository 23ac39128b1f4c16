//! Edge-aware à-trous wavelet decomposition, one scale (§4.C).

use crate::buffer::PixelBuffer;
use crate::fastexp::fast_mexp2;
use crate::pool;

const TAPS: [f32; 5] = [1.0 / 16.0, 4.0 / 16.0, 6.0 / 16.0, 4.0 / 16.0, 1.0 / 16.0];

/// Squared-norm cutoff corresponding to a `(3*sigma*2*3)^2` threshold in the stabilized domain.
const CUTOFF: f32 = 324.0;

fn similarity(p: &[f32; 4], q: &[f32; 4]) -> f32 {
    let mut sq = 0.0f32;
    for c in 0..3 {
        let d = p[c] - q[c];
        sq += d * d;
    }
    fast_mexp2((0.5 * sq - CUTOFF).max(0.0))
}

/// Decomposes `input` at scale `s` (dilation multiplier `m = 2^s`) into a coarse approximation
/// and a detail residual, both the same dimensions as `input`.
pub fn decompose(input: &PixelBuffer, coarse: &mut PixelBuffer, detail: &mut PixelBuffer, scale: u32) {
    assert_eq!(input.width, coarse.width);
    assert_eq!(input.height, coarse.height);
    assert_eq!(input.width, detail.width);
    assert_eq!(input.height, detail.height);

    let m = 1i64 << scale;
    let width = input.width;
    let height = input.height;

    // Two outputs are written per pixel (coarse and detail); interleave them into one pass keyed
    // off coarse's row layout and slice detail in lockstep.
    let detail_slice = detail.as_mut_slice();
    let coarse_slice = coarse.as_mut_slice();
    let row_len = width * 4;

    // Borrow-check friendly: zip the two mutable buffers' row stripes together by hand, using the
    // same static partition for both (§5).
    let chunks = pool::row_chunks(height);
    pool::install(|| {
        rayon::scope(|s| {
            let mut coarse_rest = coarse_slice;
            let mut detail_rest = detail_slice;
            let mut row_start = 0;
            for range in chunks {
                let rows = range.len();
                let split = rows * row_len;
                let (coarse_chunk, coarse_tail) = coarse_rest.split_at_mut(split);
                coarse_rest = coarse_tail;
                let (detail_chunk, detail_tail) = detail_rest.split_at_mut(split);
                detail_rest = detail_tail;
                let base_row = row_start;
                row_start += rows;

                s.spawn(move |_| {
                    for (i, (crow, drow)) in coarse_chunk
                        .chunks_exact_mut(row_len)
                        .zip(detail_chunk.chunks_exact_mut(row_len))
                        .enumerate()
                    {
                        let j = base_row + i;
                        for x in 0..width {
                            let p = input.clamped_pixel(x as i64, j as i64);

                            let mut acc = [0.0f32; 4];
                            let mut wsum = 0.0f32;
                            for v in 0..5 {
                                let qy = j as i64 + m * (v as i64 - 2);
                                for u in 0..5 {
                                    let qx = x as i64 + m * (u as i64 - 2);
                                    let q = input.clamped_pixel(qx, qy);
                                    let w = TAPS[u] * TAPS[v] * similarity(&p, &q);
                                    wsum += w;
                                    for c in 0..4 {
                                        acc[c] += w * q[c];
                                    }
                                }
                            }

                            let inv = if wsum > 0.0 { 1.0 / wsum } else { 0.0 };
                            for c in 0..4 {
                                let coarse_val = acc[c] * inv;
                                crow[x * 4 + c] = coarse_val;
                                drow[x * 4 + c] = p[c] - coarse_val;
                            }
                        }
                    }
                });
            }
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_field_is_its_own_coarse_band() {
        let width = 16;
        let height = 16;
        let mut input = PixelBuffer::zeroed(width, height).unwrap();
        for px in input.as_mut_slice().iter_mut() {
            *px = 0.5;
        }
        let mut coarse = PixelBuffer::zeroed(width, height).unwrap();
        let mut detail = PixelBuffer::zeroed(width, height).unwrap();

        decompose(&input, &mut coarse, &mut detail, 0);

        for (c, d) in coarse.as_slice().iter().zip(detail.as_slice()) {
            assert!((c - 0.5).abs() < 1e-4);
            assert!(d.abs() < 1e-4);
        }
    }

    #[test]
    fn coarse_plus_detail_reconstructs_input() {
        let width = 12;
        let height = 9;
        let mut input = PixelBuffer::zeroed(width, height).unwrap();
        for (i, px) in input.as_mut_slice().iter_mut().enumerate() {
            *px = (i % 7) as f32 * 0.1;
        }
        let mut coarse = PixelBuffer::zeroed(width, height).unwrap();
        let mut detail = PixelBuffer::zeroed(width, height).unwrap();

        decompose(&input, &mut coarse, &mut detail, 1);

        for ((c, d), i) in coarse.as_slice().iter().zip(detail.as_slice()).zip(input.as_slice()) {
            assert!((c + d - i).abs() < 1e-5);
        }
    }
}
