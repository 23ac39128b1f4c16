#[macro_use]
extern crate log;

mod buffer;
mod config;
mod dispatch;
mod error;
mod fastexp;
mod nlm;
mod params;
mod pool;
mod precondition;
mod profile;
mod roi;
mod wavelet;

#[cfg(feature = "opencl")]
mod gpu;

pub use buffer::PixelBuffer;
pub use dispatch::{process, tiling_hint};
pub use error::{Error, Result};
pub use params::{legacy_upgrade, Mode, ParamsV1, ParamsV2};
pub use profile::{EffectiveProfile, NoiseProfile, WhiteBalance};
pub use roi::{Radii, Roi, TilingHint};

#[cfg(feature = "opencl")]
pub use gpu::{process_cl, unload as unload_gpu};
