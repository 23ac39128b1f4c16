//! Top-level entry point: derives radii from the region of interest, preconditions the tile,
//! dispatches to the selected algorithm, and inverts the preconditioning (§4.H).

use std::sync::atomic::AtomicBool;

use crate::buffer::PixelBuffer;
use crate::error::Result;
use crate::params::{Mode, ParamsV2};
use crate::precondition;
use crate::profile::{NoiseProfile, WhiteBalance};
use crate::roi::{Radii, Roi, TilingHint};
use crate::{nlm, wavelet};

/// Computes the tiling hint a host should use before calling [`process`], given the module's
/// current parameters and the pipeline's scale relative to the tile it's about to hand in (§4.H).
pub fn tiling_hint(params: &ParamsV2, roi_in: &Roi, scale_pipe: f32) -> TilingHint {
    let radii = Radii::derive(params.radius, roi_in.scale_in, scale_pipe);
    TilingHint::for_radii(radii)
}

/// Runs the full denoise pipeline on `input`, writing the result into `output`. Both buffers must
/// have identical dimensions matching `roi_in`.
///
/// `cancel`, when set, is polled at each phase boundary (precondition, algorithm, invert) so a
/// host cancellation is observed promptly rather than only between whole `process` calls (§5).
///
/// `mask_display`, when set, copies the input's auxiliary channel into the output's auxiliary
/// channel after processing, overriding whatever the algorithm left there (weight sums for NLM,
/// an untouched pass-through for wavelets) (§6).
pub fn process(
    input: &PixelBuffer,
    output: &mut PixelBuffer,
    params: &ParamsV2,
    profile: &NoiseProfile,
    wb: &WhiteBalance,
    roi_in: &Roi,
    scale_pipe: f32,
    mask_display: bool,
    cancel: Option<&AtomicBool>,
) -> Result<()> {
    let width = input.width;
    let height = input.height;
    let effective = profile.effective(wb);
    let radii = Radii::derive(params.radius, roi_in.scale_in, scale_pipe);

    let mut stabilized = PixelBuffer::zeroed(width, height)?;
    precondition::forward(input, &mut stabilized, &effective);

    let mut denoised = PixelBuffer::zeroed(width, height)?;
    match params.mode {
        Mode::Nlm => nlm::denoise(&stabilized, &mut denoised, radii.patch, radii.search, cancel)?,
        Mode::Wavelets => wavelet::denoise(&stabilized, &mut denoised, cancel)?,
    }

    precondition::inverse(&mut denoised, &effective);
    output.as_mut_slice().copy_from_slice(denoised.as_slice());

    if mask_display {
        for (out_px, in_px) in output.as_mut_slice().chunks_exact_mut(4).zip(input.as_slice().chunks_exact(4)) {
            out_px[3] = in_px[3];
        }
    }
    Ok(())
}

/// Runs [`process`] over raw, flat pixel slices rather than [`PixelBuffer`]s. Used by the GPU
/// path (§4.I) to fall back to the CPU for modes it has no kernel for, without forcing its
/// callers to construct a [`PixelBuffer`] themselves.
#[cfg(feature = "opencl")]
pub fn process_cpu_fallback(
    input: &[f32],
    output: &mut [f32],
    width: usize,
    height: usize,
    params: &ParamsV2,
    profile: &NoiseProfile,
    wb: &WhiteBalance,
    roi_in_scale: f32,
    scale_pipe: f32,
) -> Result<()> {
    let in_buf = PixelBuffer::from_slice(width, height, input)?;
    let mut out_buf = PixelBuffer::zeroed(width, height)?;
    let roi = Roi { width, height, scale_in: roi_in_scale };
    process(&in_buf, &mut out_buf, params, profile, wb, &roi, scale_pipe, false, None)?;
    output.copy_from_slice(out_buf.as_slice());
    Ok(())
}
