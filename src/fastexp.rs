//! Branchless approximation of 2^(-x) for non-negative x (§4.B).
//!
//! The source implements this with a `union { f32; u32 }` reinterpretation cast over interpolation
//! constants that are themselves numeric casts of IEEE-754 bit patterns (`i1 = (float)0x3f800000u`,
//! not `*(float*)&0x3f800000u`). We keep the numeric casts as numeric casts and only reach for a
//! bit reinterpretation where the source does: the final truncate-to-`u32`-then-reinterpret step.

/// Approximates `2^(-x)` for `x >= 0`. At `x = 126` the interpolated bit pattern lands exactly on
/// the smallest normal `f32` (~1.18e-38) — negligible for any weight this feeds into — and from
/// `x >= 127` on it underflows below that threshold and the result is exactly `0.0`.
/// Monotonically non-increasing in `x`.
#[inline]
pub fn fast_mexp2(x: f32) -> f32 {
    // Numeric values of the bit patterns for 2^0 and 2^-1, not their reinterpreted floats.
    const I1: f32 = 0x3f80_0000u32 as f32;
    const I2: f32 = 0x3f00_0000u32 as f32;

    let k0 = I1 + x * (I2 - I1);
    let bits = if k0 >= 0x0080_0000u32 as f32 { k0 as u32 } else { 0 };
    f32::from_bits(bits)
}
