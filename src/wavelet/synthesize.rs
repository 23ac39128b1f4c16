//! Soft-threshold wavelet recomposition, one scale (§4.D).

use crate::buffer::PixelBuffer;
use crate::pool;

/// Recombines a coarse band with its detail band using classical soft-thresholding:
/// `out = coarse + boost * sign(detail) * max(0, |detail| - thrs)`, per channel.
pub fn synthesize(
    coarse: &PixelBuffer,
    detail: &PixelBuffer,
    thrs: [f32; 4],
    boost: [f32; 4],
    out: &mut PixelBuffer,
) {
    assert_eq!(coarse.width, detail.width);
    assert_eq!(coarse.width, out.width);
    assert_eq!(coarse.height, detail.height);
    assert_eq!(coarse.height, out.height);

    let width = coarse.width;
    let coarse_slice = coarse.as_slice();
    let detail_slice = detail.as_slice();

    pool::for_each_row_mut(out.as_mut_slice(), width * 4, out.height, |row_idx, out_row| {
        let row_start = row_idx * width * 4;
        let c_row = &coarse_slice[row_start..row_start + width * 4];
        let d_row = &detail_slice[row_start..row_start + width * 4];

        for i in 0..width * 4 {
            let c = i % 4;
            let d = d_row[i];
            let shrunk = d.signum() * (d.abs() - thrs[c]).max(0.0);
            out_row[i] = c_row[i] + boost[c] * shrunk;
        }
    });
}
