//! Per-sensor noise profile and the whitebalance-adjusted coefficients derived from it (§3).

use serde::{Deserialize, Serialize};

/// Immutable per-sensor noise profile: `a` encodes photon-shot scaling, `b` encodes read-noise
/// variance, both per color channel. Only the green channel (index 1) is actually consulted when
/// deriving the coefficients the preconditioner uses — that is by design, not an oversight (§3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseProfile {
    pub a: [f32; 3],
    pub b: [f32; 3],
}

/// The pipeline's processed-maximum white level, scaled by a user strength multiplier, giving
/// the per-channel whitebalance vector `W[c] = max[c] * strength`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WhiteBalance {
    pub max: [f32; 3],
    pub strength: f32,
}

impl WhiteBalance {
    #[inline]
    pub fn weights(&self) -> [f32; 3] {
        [
            self.max[0] * self.strength,
            self.max[1] * self.strength,
            self.max[2] * self.strength,
        ]
    }
}

/// The per-channel `a`/`b` coefficients actually fed to the preconditioner, after folding in the
/// whitebalance vector. `a'[c] = a[1] * W[c]`, `b'[c] = b[1] * W[c]` (§3) — note this reads only
/// the green-channel profile entries, scaled per output channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveProfile {
    pub a: [f32; 3],
    pub b: [f32; 3],
}

impl NoiseProfile {
    pub fn effective(&self, wb: &WhiteBalance) -> EffectiveProfile {
        let w = wb.weights();
        EffectiveProfile {
            a: [self.a[1] * w[0], self.a[1] * w[1], self.a[1] * w[2]],
            b: [self.b[1] * w[0], self.b[1] * w[1], self.b[1] * w[2]],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_profile_uses_green_channel_only() {
        let profile = NoiseProfile { a: [1.0, 2.0, 3.0], b: [4.0, 5.0, 6.0] };
        let wb = WhiteBalance { max: [1.0, 1.0, 1.0], strength: 1.0 };
        let eff = profile.effective(&wb);
        assert_eq!(eff.a, [2.0, 2.0, 2.0]);
        assert_eq!(eff.b, [5.0, 5.0, 5.0]);
    }

    #[test]
    fn whitebalance_scales_by_strength() {
        let wb = WhiteBalance { max: [2.0, 3.0, 4.0], strength: 0.5 };
        assert_eq!(wb.weights(), [1.0, 1.5, 2.0]);
    }
}
