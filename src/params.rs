//! The persisted parameter block and its legacy-version upgrade path (§4.H, §6).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which denoising algorithm a [`ParamsV2`] block selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum Mode {
    Nlm = 0,
    Wavelets = 1,
}

/// Version 1 parameter layout: the same prefix as [`ParamsV2`], without the mode field. Always
/// meant NLM (§6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamsV1 {
    pub radius: f32,
    pub strength: f32,
    pub a: [f32; 3],
    pub b: [f32; 3],
}

/// Version 2 parameter layout, current.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamsV2 {
    pub radius: f32,
    pub strength: f32,
    pub a: [f32; 3],
    pub b: [f32; 3],
    pub mode: Mode,
}

/// Upgrades an older parameter block to the current version. Mirrors the legacy upgrader's
/// contract: unrecognized versions are rejected with an error and the caller's current
/// parameters are left untouched; recognized versions copy the common prefix verbatim.
pub fn legacy_upgrade(old_version: u32, old: &ParamsV1) -> Result<ParamsV2> {
    match old_version {
        1 => Ok(ParamsV2 {
            radius: old.radius,
            strength: old.strength,
            a: old.a,
            b: old.b,
            mode: Mode::Nlm,
        }),
        found => Err(Error::InvalidVersion { found }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_upgrades_to_nlm_with_prefix_preserved() {
        let old = ParamsV1 { radius: 2.0, strength: 1.0, a: [1.0, 2.0, 3.0], b: [4.0, 5.0, 6.0] };
        let upgraded = legacy_upgrade(1, &old).unwrap();

        assert_eq!(upgraded.radius, old.radius);
        assert_eq!(upgraded.strength, old.strength);
        assert_eq!(upgraded.a, old.a);
        assert_eq!(upgraded.b, old.b);
        assert_eq!(upgraded.mode, Mode::Nlm);
    }

    #[test]
    fn unrecognized_version_is_rejected() {
        let old = ParamsV1 { radius: 0.0, strength: 0.0, a: [0.0; 3], b: [0.0; 3] };
        let err = legacy_upgrade(3, &old).unwrap_err();
        assert!(matches!(err, Error::InvalidVersion { found: 3 }));
    }
}
