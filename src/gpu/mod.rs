//! OpenCL orchestration for the NLM path, gated behind the `opencl` feature (§4.I).
//!
//! Mirrors the reference crate's `OpenCLQueue` lifecycle (`Uninitialized` -> `Ready`/`Failed`,
//! torn down on `unload`), but built synchronously since this crate has no async runtime of its
//! own — the host is expected to call `process_cl` from whatever thread it likes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use ocl::{Buffer, Device, DeviceType, Kernel, Platform, ProQue};
use once_cell::sync::Lazy;

use crate::config::CONFIG;
use crate::error::{Error, Result};
use crate::params::ParamsV2;
use crate::profile::{NoiseProfile, WhiteBalance};
use crate::roi::Radii;

const KERNEL_SRC: &str = include_str!("denoise.cl");

static WARNED_WAVELET_FALLBACK: AtomicBool = AtomicBool::new(false);

enum GpuQueue {
    Uninitialized,
    Ready(ProQue),
    Failed,
}

static QUEUE: Lazy<Mutex<GpuQueue>> = Lazy::new(|| Mutex::new(GpuQueue::Uninitialized));

/// Finds the first GPU device on any platform whose name starts with `gpu_prefix`, taking the
/// first available GPU overall when the prefix is empty.
fn find_best_opencl_device(gpu_prefix: &str) -> Option<(Platform, Device)> {
    for platform in Platform::list() {
        if let Some(device) = Device::list(platform, Some(DeviceType::GPU))
            .iter()
            .flatten()
            .find(|d| d.name().unwrap_or_default().starts_with(gpu_prefix))
        {
            return Some((platform, *device));
        }
    }
    if !gpu_prefix.is_empty() {
        error!("Could not find matching GPU for prefix \"{gpu_prefix}\"");
    }
    None
}

fn build_queue() -> Result<ProQue> {
    let Some((platform, device)) = find_best_opencl_device(&CONFIG.gpu_prefix) else {
        return Err(Error::DeviceFailure("no matching OpenCL GPU device found".into()));
    };

    Ok(ProQue::builder().src(KERNEL_SRC).platform(platform).device(device).build()?)
}

/// Tears down the cached `ProQue`, if any. The next call to [`process_cl`] rebuilds it.
pub fn unload() {
    let mut guard = QUEUE.lock().expect("GPU queue lock poisoned");
    *guard = GpuQueue::Uninitialized;
}

fn with_ready_queue<R>(f: impl FnOnce(&ProQue) -> Result<R>) -> Result<R> {
    let mut guard = QUEUE.lock().expect("GPU queue lock poisoned");
    if matches!(*guard, GpuQueue::Uninitialized) {
        *guard = match build_queue() {
            Ok(pq) => GpuQueue::Ready(pq),
            Err(e) => {
                error!("Failed to initialize OpenCL context: {e}");
                GpuQueue::Failed
            }
        };
    }

    match &*guard {
        GpuQueue::Ready(pq) => f(pq),
        GpuQueue::Failed => Err(Error::DeviceFailure("OpenCL context unavailable".into())),
        GpuQueue::Uninitialized => unreachable!("queue was just initialized above"),
    }
}

/// Runs the NLM pipeline on the GPU: `precondition`, `init`, then `dist`/`box_h`/`box_v`/
/// `accumulate` for each shift vector with `kj` in `[-K, 0]` (the `kj > 0` half is recovered by
/// the `accumulate` kernel's symmetric write-back, which it skips for the `kj == 0` row since
/// that row's own `ki`/`-ki` pair already covers both directions directly), and finally `finish`.
/// On any error every device buffer allocated for this call is dropped before returning.
pub fn process_cl(
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
    use crate::params::Mode;
    if params.mode == Mode::Wavelets {
        if !WARNED_WAVELET_FALLBACK.swap(true, Ordering::Relaxed) {
            warn!("Wavelet mode has no GPU kernel, falling back to CPU");
        } else {
            debug!("Wavelet mode has no GPU kernel, falling back to CPU");
        }
        return crate::dispatch::process_cpu_fallback(input, output, width, height, params, profile, wb, roi_in_scale, scale_pipe);
    }

    let vram_limit_mb = CONFIG.gpu_vram_limit_mb;
    if vram_limit_mb > 0 {
        // Six float buffers sized for the tile, plus two scratch distance buffers at quarter
        // size: a rough but conservative over-estimate of device memory for this call.
        let estimated_bytes = (input.len() * 3 + width * height * 2) * std::mem::size_of::<f32>();
        let estimated_mb = (estimated_bytes / (1024 * 1024)) as u32;
        if estimated_mb > vram_limit_mb {
            debug!("Estimated GPU memory {estimated_mb}MB exceeds limit {vram_limit_mb}MB, falling back to CPU");
            return crate::dispatch::process_cpu_fallback(input, output, width, height, params, profile, wb, roi_in_scale, scale_pipe);
        }
    }

    let radii = Radii::derive(params.radius, roi_in_scale, scale_pipe);
    let effective = profile.effective(wb);
    let a4 = [effective.a[0], effective.a[1], effective.a[2], 1.0f32];
    let sigma2 = [
        (effective.b[0] / effective.a[0]).powi(2),
        (effective.b[1] / effective.a[1]).powi(2),
        (effective.b[2] / effective.a[1]).powi(2),
        0.0f32,
    ];

    with_ready_queue(|pq| {
        let dims = (width, height);
        let in_buf: Buffer<f32> = Buffer::builder().queue(pq.queue().clone()).len(input.len()).copy_host_slice(input).build()?;
        let stabilized: Buffer<f32> = Buffer::builder().queue(pq.queue().clone()).len(input.len()).build()?;
        let accum: Buffer<f32> = Buffer::builder().queue(pq.queue().clone()).len(input.len()).build()?;
        let dist_a: Buffer<f32> = Buffer::builder().queue(pq.queue().clone()).len(width * height).build()?;
        let dist_b: Buffer<f32> = Buffer::builder().queue(pq.queue().clone()).len(width * height).build()?;
        let weight_buf: Buffer<f32> = Buffer::builder().queue(pq.queue().clone()).len(width * height).build()?;

        let precondition = Kernel::builder()
            .program(pq.program())
            .name("precondition")
            .queue(pq.queue().clone())
            .global_work_size([width, height])
            .arg(&in_buf)
            .arg(&stabilized)
            .arg(a4)
            .arg(sigma2)
            .build()?;
        // SAFETY: every kernel argument buffer above was sized to match this kernel's global work
        // size; enqueueing is the standard `ocl` unchecked dispatch.
        unsafe { precondition.enq()? };

        let init = Kernel::builder()
            .program(pq.program())
            .name("init")
            .queue(pq.queue().clone())
            .global_work_size(dims)
            .arg(&accum)
            .build()?;
        unsafe { init.enq()? };

        let norm = 0.015f32 / (2 * radii.patch + 1) as f32;
        let k = radii.search as i32;
        for kj in -k..=0 {
            for ki in -k..=k {
                let dist = Kernel::builder()
                    .program(pq.program())
                    .name("dist")
                    .queue(pq.queue().clone())
                    .global_work_size(dims)
                    .arg(&stabilized)
                    .arg(&dist_a)
                    .arg(ki)
                    .arg(kj)
                    .build()?;
                unsafe { dist.enq()? };

                let box_h = Kernel::builder()
                    .program(pq.program())
                    .name("box_h")
                    .queue(pq.queue().clone())
                    .global_work_size(dims)
                    .arg(&dist_a)
                    .arg(&dist_b)
                    .arg(radii.patch as i32)
                    .build()?;
                unsafe { box_h.enq()? };

                let box_v = Kernel::builder()
                    .program(pq.program())
                    .name("box_v")
                    .queue(pq.queue().clone())
                    .global_work_size(dims)
                    .arg(&dist_b)
                    .arg(&weight_buf)
                    .arg(radii.patch as i32)
                    .arg(norm)
                    .build()?;
                unsafe { box_v.enq()? };

                let accumulate = Kernel::builder()
                    .program(pq.program())
                    .name("accumulate")
                    .queue(pq.queue().clone())
                    .global_work_size(dims)
                    .arg(&stabilized)
                    .arg(&weight_buf)
                    .arg(&accum)
                    .arg(ki)
                    .arg(kj)
                    .build()?;
                unsafe { accumulate.enq()? };
            }
        }

        let out_buf: Buffer<f32> = Buffer::builder().queue(pq.queue().clone()).len(output.len()).build()?;
        let finish = Kernel::builder()
            .program(pq.program())
            .name("finish")
            .queue(pq.queue().clone())
            .global_work_size(dims)
            .arg(&accum)
            .arg(&out_buf)
            .arg(a4)
            .arg(sigma2)
            .build()?;
        unsafe { finish.enq()? };

        out_buf.read(output).enq()?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unload_is_idempotent_without_a_device() {
        unload();
        unload();
    }
}
