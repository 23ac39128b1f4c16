//! Wavelet-mode orchestrator: loops over scales, computes per-scale BayesShrink thresholds, and
//! drives decomposition and synthesis (§4.G).

mod decompose;
mod synthesize;

use std::sync::atomic::{AtomicBool, Ordering};

use crate::buffer::PixelBuffer;
use crate::error::Result;

pub use decompose::decompose;
pub use synthesize::synthesize;

/// Number of à-trous scales the wavelet algorithm always decomposes into (§3).
pub const MAX_SCALE: u32 = 5;

/// `v = sqrt(2 + 32 + 36) / 16`, the per-scale noise-band decay factor (§4.G step 1).
fn band_decay() -> f32 {
    (2.0f32 + 32.0 + 36.0).sqrt() / 16.0
}

/// Mean and (n-1)-biased variance of channels 0..2 over an entire detail buffer.
fn channel_mean_var(detail: &PixelBuffer) -> ([f32; 3], [f32; 3]) {
    let n = (detail.width * detail.height) as f32;
    let mut sum = [0.0f64; 3];
    for px in detail.as_slice().chunks_exact(4) {
        for c in 0..3 {
            sum[c] += px[c] as f64;
        }
    }
    let mean = [
        (sum[0] / n as f64) as f32,
        (sum[1] / n as f64) as f32,
        (sum[2] / n as f64) as f32,
    ];

    let mut sq_dev = [0.0f64; 3];
    for px in detail.as_slice().chunks_exact(4) {
        for c in 0..3 {
            let d = px[c] as f64 - mean[c] as f64;
            sq_dev[c] += d * d;
        }
    }
    let denom = (n - 1.0).max(1.0) as f64;
    let var = [
        (sq_dev[0] / denom) as f32,
        (sq_dev[1] / denom) as f32,
        (sq_dev[2] / denom) as f32,
    ];

    (mean, var)
}

/// BayesShrink threshold and boost vectors for scale `s` given its detail band (§4.G).
fn bayes_shrink(detail: &PixelBuffer, s: u32) -> ([f32; 4], [f32; 4]) {
    let sigma_band = band_decay().powi(s as i32);
    let (_mean, var_y) = channel_mean_var(detail);

    let mut thrs = [0.0f32; 4];
    let boost = [1.0f32; 4];
    let adjt = 2.0 * 0.5f32.powi(s as i32);

    for c in 0..3 {
        // NumericDegeneracy (§7): floor std_x rather than surfacing an error when the detail
        // band's variance doesn't exceed the expected noise floor.
        let std_x = (var_y[c] - sigma_band * sigma_band).max(1e-6).sqrt();
        thrs[c] = adjt / std_x;
    }
    // thrs[3] = 0, boost[3] = 1: the auxiliary channel's detail always passes through untouched.

    (thrs, boost)
}

/// Runs the full wavelet pipeline over an already-Anscombe-stabilized `input`, writing the
/// denoised result into `output`. `cancel`, when set, is polled once per scale boundary so a host
/// cancellation aborts promptly between phases (§5).
pub fn denoise(input: &PixelBuffer, output: &mut PixelBuffer, cancel: Option<&AtomicBool>) -> Result<()> {
    let width = input.width;
    let height = input.height;

    let mut coarse_a = PixelBuffer::from_slice(width, height, input.as_slice())?;
    let mut coarse_b = PixelBuffer::zeroed(width, height)?;
    let mut details = Vec::with_capacity(MAX_SCALE as usize);
    let mut thresholds = Vec::with_capacity(MAX_SCALE as usize);

    for s in 0..MAX_SCALE {
        if let Some(flag) = cancel {
            if flag.load(Ordering::Relaxed) {
                return Ok(());
            }
        }

        let mut detail = PixelBuffer::zeroed(width, height)?;
        decompose(&coarse_a, &mut coarse_b, &mut detail, s);

        thresholds.push(bayes_shrink(&detail, s));
        details.push(detail);
        std::mem::swap(&mut coarse_a, &mut coarse_b);
    }

    // coarse_a now holds the coarsest band; synthesize back down from max_scale-1 to 0.
    let mut current = coarse_a;
    for s in (0..MAX_SCALE).rev() {
        if let Some(flag) = cancel {
            if flag.load(Ordering::Relaxed) {
                return Ok(());
            }
        }

        let (thrs, boost) = thresholds[s as usize];
        let detail = &details[s as usize];
        let mut next = PixelBuffer::zeroed(width, height)?;
        synthesize(&current, detail, thrs, boost, &mut next);
        current = next;
    }

    output.as_mut_slice().copy_from_slice(current.as_slice());
    Ok(())
}
