//! Shift-indexed sliding-window patch-distance accumulator (§4.E).
//!
//! For a single shift vector `(ki, kj)` this produces, for every valid output column `i` in a
//! row `j`, the sum-of-squared-differences between the `(2P+1)x(2P+1)` patch centered at `(i,j)`
//! and the patch at `(i+ki, j+kj)`, using only color channels 0..2. The column-sum array `S`
//! makes this a separable two-pass sliding window instead of an `O(P^2)` reduction per pixel.

use crate::buffer::PixelBuffer;

/// Per-thread scratch: one column-sum entry per image column (§5 per-thread scratch arena).
///
/// Borrows its storage from a single contiguous arena of size `width * thread_count`, sliced by
/// thread index, rather than allocating afresh per shift (§5).
pub struct ColumnSums<'a> {
    s: &'a mut [f32],
}

impl<'a> ColumnSums<'a> {
    pub fn from_slice(s: &'a mut [f32]) -> Self {
        Self { s }
    }
}

#[inline]
fn col_term(input: &PixelBuffer, x: usize, row_a: i64, row_b: i64, x_b: i64) -> f32 {
    let a = input.clamped_pixel(x as i64, row_a);
    let b = input.clamped_pixel(x_b, row_b);
    let mut sq = 0.0f32;
    for c in 0..3 {
        let d = a[c] - b[c];
        sq += d * d;
    }
    sq
}

/// Valid horizontal domain for column `x` under shift `ki`: both `x` and `x+ki` must land inside
/// `[0, width)` (§4.E boundary treatment). Columns outside this range are never accumulated for
/// this shift.
fn valid_x_range(width: usize, ki: i32) -> std::ops::Range<usize> {
    let lo = (-ki).max(0) as usize;
    let hi = (width as i64 + ki.min(0) as i64).max(0) as usize;
    lo..hi.min(width)
}

/// Rebuilds `S` from scratch for row `j`, per the `P_m`/`P_M`-truncated window definition: the
/// vertical window shrinks near the top/bottom of the image (or of the shifted row) instead of
/// reading out of bounds.
fn rebuild(sums: &mut ColumnSums, input: &PixelBuffer, j: usize, ki: i32, kj: i32, patch: u32) {
    let width = input.width;
    let height = input.height;
    let p = patch as i64;
    let p_m = p.min(j as i64).min(j as i64 + kj as i64);
    let p_big_m = p
        .min(height as i64 - 1 - j as i64)
        .min(height as i64 - 1 - j as i64 - kj as i64);

    let range = valid_x_range(width, ki);
    for x in range {
        let mut acc = 0.0f32;
        let mut dj = -p_m;
        while dj <= p_big_m {
            let row_a = j as i64 + dj;
            let row_b = row_a + kj as i64;
            acc += col_term(input, x, row_a, row_b, (x as i64) + ki as i64);
            dj += 1;
        }
        sums.s[x] = acc;
    }
}

/// Whether row `j` has a full, untruncated vertical window for this shift — the condition under
/// which the `O(1)` incremental update below is valid.
fn full_window(height: usize, j: usize, kj: i32, patch: u32) -> bool {
    let p = patch as i64;
    let j = j as i64;
    let height = height as i64;
    j - p >= 0 && j + kj - p >= 0 && j + p <= height - 1 && j + kj + p <= height - 1
}

/// Advances `S` from row `j-1` to row `j`, assuming `full_window` held for row `j` (and hence for
/// `j-1` too): `S[x] += term(j+P) - term(j-P-1)`.
fn advance(sums: &mut ColumnSums, input: &PixelBuffer, j: usize, ki: i32, kj: i32, patch: u32) {
    let width = input.width;
    let p = patch as i64;
    let range = valid_x_range(width, ki);

    let add_row = j as i64 + p;
    let sub_row = j as i64 - p - 1;

    for x in range {
        let x_b = x as i64 + ki as i64;
        let added = col_term(input, x, add_row, add_row + kj as i64, x_b);
        let removed = col_term(input, x, sub_row, sub_row + kj as i64, x_b);
        sums.s[x] += added - removed;
    }
}

/// Processes one output row `j` for shift `(ki, kj)`, invoking `emit(i, ssd)` for every column
/// `i` where `i+ki` lands inside `[0, width)`. `prev_j` is the previous row processed by this
/// call's caller within the same stripe (or `None` at a stripe's first row), used to decide
/// between an incremental update and a full rebuild.
pub fn process_row(
    sums: &mut ColumnSums,
    input: &PixelBuffer,
    j: usize,
    prev_j: Option<usize>,
    ki: i32,
    kj: i32,
    patch: u32,
    force_rebuild: bool,
    mut emit: impl FnMut(usize, f32),
) {
    let width = input.width;
    let height = input.height;

    if kj < 0 && (j as i64 + kj as i64) < 0 {
        return;
    }
    if j as i64 + kj as i64 >= height as i64 {
        return;
    }

    let can_increment = !force_rebuild
        && prev_j == Some(j.wrapping_sub(1))
        && full_window(height, j, kj, patch)
        && full_window(height, j - 1, kj, patch);

    if can_increment {
        advance(sums, input, j, ki, kj, patch);
    } else {
        rebuild(sums, input, j, ki, kj, patch);
    }

    let p = patch as i64;
    let x_range = valid_x_range(width, ki);
    if x_range.is_empty() {
        return;
    }

    let get_s = |x: i64| -> f32 {
        let clamped = x.clamp(x_range.start as i64, x_range.end as i64 - 1) as usize;
        sums.s[clamped]
    };

    // Horizontal sliding window over S, same separable trick as the vertical one.
    let mut slide: f32 = (-p..=p).map(get_s).sum();
    for i in 0..width {
        if i > 0 {
            slide += get_s(i as i64 + p) - get_s(i as i64 - p - 1);
        }
        let target = i as i64 + ki as i64;
        if target >= 0 && (target as usize) < width {
            emit(i, slide);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_image(width: usize, height: usize) -> PixelBuffer {
        let mut buf = PixelBuffer::zeroed(width, height).unwrap();
        for y in 0..height {
            for x in 0..width {
                for c in 0..3 {
                    buf[(x, y, c)] = ((x + y * width) % 13) as f32 * 0.07;
                }
            }
        }
        buf
    }

    fn brute_force_ssd(input: &PixelBuffer, i: usize, j: usize, ki: i32, kj: i32, patch: u32) -> f32 {
        let p = patch as i64;
        let mut acc = 0.0f32;
        for dj in -p..=p {
            for di in -p..=p {
                let a = input.clamped_pixel(i as i64 + di, j as i64 + dj);
                let b = input.clamped_pixel(
                    i as i64 + di + ki as i64,
                    j as i64 + dj + kj as i64,
                );
                for c in 0..3 {
                    let d = a[c] - b[c];
                    acc += d * d;
                }
            }
        }
        acc
    }

    #[test]
    fn matches_brute_force_for_interior_shift() {
        let width = 20;
        let height = 20;
        let input = sample_image(width, height);
        let (ki, kj, patch) = (2, -1, 2);

        let mut sums_buf = vec![0.0; width];
        let mut sums = ColumnSums::from_slice(&mut sums_buf);
        let mut prev = None;
        for j in 0..height {
            if (j as i64 + kj as i64) < 0 || (j as i64 + kj as i64) >= height as i64 {
                continue;
            }
            let mut got = vec![None; width];
            process_row(&mut sums, &input, j, prev, ki, kj, patch, false, |i, ssd| {
                got[i] = Some(ssd);
            });
            prev = Some(j);

            for i in 0..width {
                if (i as i64 + ki as i64) < 0 || (i as i64 + ki as i64) >= width as i64 {
                    continue;
                }
                let expected = brute_force_ssd(&input, i, j, ki, kj, patch);
                let actual = got[i].expect("expected a value for in-bounds column");
                assert!(
                    (actual - expected).abs() < 1e-3,
                    "i={i} j={j}: expected {expected}, got {actual}"
                );
            }
        }
    }

    #[test]
    fn zero_shift_gives_zero_ssd() {
        let width = 10;
        let height = 10;
        let input = sample_image(width, height);
        let mut sums_buf = vec![0.0; width];
        let mut sums = ColumnSums::from_slice(&mut sums_buf);
        let mut prev = None;
        for j in 0..height {
            let mut got = vec![None; width];
            process_row(&mut sums, &input, j, prev, 0, 0, 1, false, |i, ssd| {
                got[i] = Some(ssd);
            });
            prev = Some(j);
            for i in 0..width {
                assert!(got[i].unwrap().abs() < 1e-5);
            }
        }
    }
}
