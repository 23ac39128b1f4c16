//! Region-of-interest scale arithmetic and the tiling contract published to the host (§4.H, §6).

/// The region-of-interest descriptor the host supplies alongside an input tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Roi {
    pub width: usize,
    pub height: usize,
    pub scale_in: f32,
}

/// Patch radius `P` and search radius `K`, derived from the module's `radius` parameter and the
/// ratio between the tile's scale and the pipeline's own scale (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Radii {
    pub patch: u32,
    pub search: u32,
}

impl Radii {
    pub fn derive(radius: f32, roi_in_scale: f32, scale_pipe: f32) -> Self {
        let ratio = roi_in_scale / scale_pipe;
        Self {
            patch: (radius * ratio).ceil().max(0.0) as u32,
            search: (7.0 * ratio).ceil().max(0.0) as u32,
        }
    }
}

/// The tiling descriptor published to the host so its tile decomposition supplies enough halo
/// pixels for the algorithms to read without wrapping (§4.H).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TilingHint {
    pub factor: f32,
    pub maxbuf: f32,
    pub overhead: usize,
    pub overlap: u32,
    pub xalign: u32,
    pub yalign: u32,
}

impl TilingHint {
    pub fn for_radii(radii: Radii) -> Self {
        Self {
            factor: 3.5,
            maxbuf: 1.0,
            overhead: 0,
            overlap: radii.patch + radii.search,
            xalign: 1,
            yalign: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiling_overlap_matches_derived_radii() {
        // S6: roi scale_in=0.5, iscale=1.0, radius=3 -> overlap = ceil(1.5) + ceil(3.5) = 6.
        let radii = Radii::derive(3.0, 0.5, 1.0);
        assert_eq!(radii.patch, 2);
        assert_eq!(radii.search, 4);

        let hint = TilingHint::for_radii(radii);
        assert_eq!(hint.overlap, 6);
        assert_eq!(hint.factor, 3.5);
        assert_eq!(hint.maxbuf, 1.0);
        assert_eq!(hint.overhead, 0);
        assert_eq!(hint.xalign, 1);
        assert_eq!(hint.yalign, 1);
    }

    #[test]
    fn identity_scale_gives_unscaled_radii() {
        let radii = Radii::derive(1.0, 1.0, 1.0);
        assert_eq!(radii.patch, 1);
        assert_eq!(radii.search, 7);
    }
}
