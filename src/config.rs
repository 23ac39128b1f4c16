//! Environment-driven tunables. There is no preset file and no GUI on this side of the pipeline
//! element boundary, so unlike the reference crate's TOML-backed `Config` this one reads plain
//! environment variables and falls back to sane defaults on anything malformed.

use std::env;
use std::num::NonZeroUsize;
use std::str::FromStr;

use once_cell::sync::Lazy;

#[derive(Debug)]
pub struct Config {
    /// Size of the row-parallel thread pool (§4.J). Defaults to the available parallelism.
    pub threads: NonZeroUsize,
    /// OpenCL device name prefix used to select a GPU, same semantics as the reference crate's
    /// GPU-prefix device selection.
    pub gpu_prefix: String,
    /// Skip the GPU path and fall back to CPU when the estimated device memory for a tile would
    /// exceed this many megabytes. Zero means unlimited.
    pub gpu_vram_limit_mb: u32,
    /// How many rows the NLM SSD engine's column-sum array goes before being rebuilt from
    /// scratch, bounding the accumulated floating-point error of the incremental update.
    pub ssd_rebuild_rows: NonZeroUsize,
}

fn env_var<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(s) => match s.parse() {
            Ok(v) => v,
            Err(_) => {
                warn!("Ignoring malformed {name}={s:?}, using default");
                default
            }
        },
        Err(env::VarError::NotPresent) => default,
        Err(env::VarError::NotUnicode(s)) => {
            warn!("Ignoring non-unicode {name}={s:?}, using default");
            default
        }
    }
}

fn default_threads() -> NonZeroUsize {
    std::thread::available_parallelism().unwrap_or(NonZeroUsize::new(1).unwrap())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threads: env_var("DENOISE_CORE_THREADS", default_threads()),
            gpu_prefix: env::var("DENOISE_CORE_GPU_PREFIX").unwrap_or_default(),
            gpu_vram_limit_mb: env_var("DENOISE_CORE_GPU_VRAM_LIMIT_MB", 0),
            ssd_rebuild_rows: env_var(
                "DENOISE_CORE_SSD_REBUILD_ROWS",
                NonZeroUsize::new(1024).unwrap(),
            ),
        }
    }
}

pub static CONFIG: Lazy<Config> = Lazy::new(Config::default);
