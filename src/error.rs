use std::fmt;

/// Crate-local result alias, mirroring the one error surface every entry point returns through.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong inside a single [`crate::process`] (or `process_cl`) call.
///
/// All variants are returned by value; nothing in this crate unwinds on these paths.
#[derive(Debug)]
pub enum Error {
    /// The legacy parameter upgrader was asked to convert a version it doesn't recognize.
    InvalidVersion { found: u32 },
    /// A per-invocation scratch buffer could not be acquired. Any buffers already acquired for
    /// this call have been released and the output buffer is left unmodified.
    AllocationFailure(&'static str),
    /// An OpenCL kernel submission or device allocation failed. All device buffers for this call
    /// have been released; the caller may retry on the CPU path.
    #[cfg(feature = "opencl")]
    DeviceFailure(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidVersion { found } => {
                write!(f, "unrecognized parameter block version {found}")
            }
            Self::AllocationFailure(what) => write!(f, "failed to allocate {what}"),
            #[cfg(feature = "opencl")]
            Self::DeviceFailure(e) => write!(f, "OpenCL device failure: {e}"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(feature = "opencl")]
impl From<ocl::Error> for Error {
    fn from(e: ocl::Error) -> Self {
        Self::DeviceFailure(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_non_empty() {
        let e = Error::InvalidVersion { found: 7 };
        assert!(!e.to_string().is_empty());
        let e = Error::AllocationFailure("column-sum arena");
        assert!(e.to_string().contains("column-sum arena"));
    }
}
