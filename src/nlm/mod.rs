//! Non-local means orchestrator: drives the SSD engine and weight/accumulate pass over every
//! shift vector, then normalizes (§4.E, §4.F).

mod ssd;
mod weight;

use std::sync::atomic::{AtomicBool, Ordering};

use crate::buffer::PixelBuffer;
use crate::config::CONFIG;
use crate::error::Result;
use crate::pool;

/// Runs the full NLM pipeline over an already-Anscombe-stabilized `input`, writing the denoised
/// (but not yet normalized by weight) result into `output`, then normalizing it in place.
///
/// `cancel`, when set, is polled once per shift vector so a host cancellation aborts promptly
/// between shifts (§5).
pub fn denoise(
    input: &PixelBuffer,
    output: &mut PixelBuffer,
    patch: u32,
    search: u32,
    cancel: Option<&AtomicBool>,
) -> Result<()> {
    let width = input.width;
    let height = input.height;
    assert_eq!(input.width, output.width);
    assert_eq!(input.height, output.height);

    // "init" pass: zero the output accumulator (§4.H GPU kernel order names this step
    // explicitly; the CPU path does the same thing here).
    output.as_mut_slice().fill(0.0);

    let workers = pool::row_chunks(height).len().max(1);
    let mut arena = vec![0.0f32; workers * width];

    let k = search as i32;
    for kj in -k..=k {
        for ki in -k..=k {
            if let Some(flag) = cancel {
                if flag.load(Ordering::Relaxed) {
                    return Ok(());
                }
            }
            process_shift(input, output, &mut arena, ki, kj, patch);
        }
    }

    normalize(output);
    Ok(())
}

fn process_shift(
    input: &PixelBuffer,
    output: &mut PixelBuffer,
    arena: &mut [f32],
    ki: i32,
    kj: i32,
    patch: u32,
) {
    let width = input.width;
    let height = input.height;
    let row_len = width * 4;
    let rebuild_rows = CONFIG.ssd_rebuild_rows.get();
    let chunks = pool::row_chunks(height);

    pool::install(|| {
        rayon::scope(|s| {
            let mut out_rest = output.as_mut_slice();
            let mut arena_rest = &mut *arena;
            let mut row_start = 0;

            for range in chunks {
                let rows = range.len();
                let (out_chunk, out_tail) = out_rest.split_at_mut(rows * row_len);
                out_rest = out_tail;
                let (arena_chunk, arena_tail) = arena_rest.split_at_mut(width);
                arena_rest = arena_tail;
                let base_row = row_start;
                row_start += rows;

                s.spawn(move |_| {
                    let mut sums = ssd::ColumnSums::from_slice(arena_chunk);
                    let mut prev_j: Option<usize> = None;

                    for (local, out_row) in out_chunk.chunks_exact_mut(row_len).enumerate() {
                        let j = base_row + local;
                        let force_rebuild = j > 0 && j % rebuild_rows == 0;

                        ssd::process_row(
                            &mut sums,
                            input,
                            j,
                            prev_j,
                            ki,
                            kj,
                            patch,
                            force_rebuild,
                            |i, slide| {
                                let w = weight::weight(slide, patch);
                                weight::accumulate(&mut out_row[i * 4..i * 4 + 4], input, i, j, ki, kj, w);
                            },
                        );
                        prev_j = Some(j);
                    }
                });
            }
        });
    });
}

/// Divides channels 0..2 by the accumulated weight in channel 3, wherever that weight is
/// positive (§4.F).
fn normalize(buf: &mut PixelBuffer) {
    let width = buf.width;
    pool::for_each_row_mut(buf.as_mut_slice(), width * 4, buf.height, |_row_idx, row| {
        for px in row.chunks_exact_mut(4) {
            let w = px[3];
            if w > 0.0 {
                for c in 0..3 {
                    px[c] /= w;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_field(width: usize, height: usize, value: f32) -> PixelBuffer {
        let mut buf = PixelBuffer::zeroed(width, height).unwrap();
        for px in buf.as_mut_slice().chunks_exact_mut(4) {
            px[0] = value;
            px[1] = value;
            px[2] = value;
        }
        buf
    }

    #[test]
    fn flat_field_is_a_no_op() {
        let width = 24;
        let height = 24;
        let input = flat_field(width, height, 0.5);
        let mut output = PixelBuffer::zeroed(width, height).unwrap();

        denoise(&input, &mut output, 1, 2, None).unwrap();

        for px in output.as_slice().chunks_exact(4) {
            for c in 0..3 {
                assert!((px[c] - 0.5).abs() < 1e-4, "channel {c} was {}", px[c]);
            }
        }
    }

    #[test]
    fn weight_sum_is_always_positive() {
        let width = 12;
        let height = 12;
        let mut input = PixelBuffer::zeroed(width, height).unwrap();
        input[(6, 6, 0)] = 1.0;
        input[(6, 6, 1)] = 1.0;
        input[(6, 6, 2)] = 1.0;

        let mut output = PixelBuffer::zeroed(width, height).unwrap();
        // Run the pre-normalization pipeline manually to inspect channel 3 before it's divided
        // away.
        output.as_mut_slice().fill(0.0);
        let workers = pool::row_chunks(height).len().max(1);
        let mut arena = vec![0.0f32; workers * width];
        for kj in -1..=1 {
            for ki in -1..=1 {
                process_shift(&input, &mut output, &mut arena, ki, kj, 0);
            }
        }

        for px in output.as_slice().chunks_exact(4) {
            assert!(px[3] > 0.0);
        }
    }

    #[test]
    fn impulse_is_smoothed_into_neighbors() {
        let width = 32;
        let height = 32;
        let mut input = PixelBuffer::zeroed(width, height).unwrap();
        input[(16, 16, 0)] = 1.0;
        input[(16, 16, 1)] = 1.0;
        input[(16, 16, 2)] = 1.0;

        let mut output = PixelBuffer::zeroed(width, height).unwrap();
        denoise(&input, &mut output, 1, 7, None).unwrap();

        assert!(output[(16, 16, 0)] < 0.5);
        assert!(output[(15, 16, 0)] > 0.0);
        assert!(output[(19, 16, 0)] > 0.0);
    }

    #[test]
    fn cancellation_leaves_output_zeroed_from_init() {
        let width = 8;
        let height = 8;
        let input = flat_field(width, height, 0.5);
        let mut output = PixelBuffer::zeroed(width, height).unwrap();
        for px in output.as_mut_slice().iter_mut() {
            *px = -1.0;
        }

        let cancel = AtomicBool::new(true);
        denoise(&input, &mut output, 1, 2, Some(&cancel)).unwrap();

        assert!(output.as_slice().iter().all(|&v| v == 0.0));
    }
}
