use core::fmt::Debug;
use page_flash::{ErrorKind, PageFlashError};

/// Error type for [crate::PageStore].
///
/// Generic over the page flash error type (FE). Chip failures are passed
/// through untouched so their status code survives.
#[derive(Debug, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<FE> {
    /// Scratch page could not be allocated
    #[error("Out of memory for the scratch page")]
    OutOfMemory,
    /// Operation before [crate::PageStore::init]
    #[error("Block device not initialised")]
    NotInitialized,
    /// Address and length are out of bounds or not aligned
    #[error("Invalid range: {0:?}")]
    InvalidRange(ErrorKind),
    /// Chip reported a zero page size or a capacity past `u32::MAX`
    #[error("Invalid flash geometry")]
    InvalidGeometry,
    /// Error from the page flash
    #[error("Flash error: {0:?}")]
    Flash(FE),
}

impl<FE: PageFlashError> PageFlashError for Error<FE> {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::OutOfMemory => ErrorKind::OutOfMemory,
            Error::NotInitialized => ErrorKind::NotInitialized,
            Error::InvalidRange(kind) => *kind,
            Error::InvalidGeometry => ErrorKind::Other,
            Error::Flash(e) => e.kind(),
        }
    }

    fn code(&self) -> i32 {
        match self {
            Error::Flash(e) => e.code(),
            _ => self.kind().status(),
        }
    }
}

// Lets the range check helpers be used with `?`
impl<FE> From<ErrorKind> for Error<FE> {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::OutOfMemory => Error::OutOfMemory,
            ErrorKind::NotInitialized => Error::NotInitialized,
            kind => Error::InvalidRange(kind),
        }
    }
}
