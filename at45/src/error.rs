use core::fmt::Debug;
use page_flash::{ErrorKind, PageFlashError};

/// Error type for the AT45 driver.
///
/// Generic over the SPI error type (SE), so the driver works over any
/// [`embedded_hal::spi::SpiDevice`].
#[derive(Debug, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum At45Error<SE> {
    /// Error from the SPI peripheral
    #[error("SpiDevice error: {0:?}")]
    Spi(SE),
    /// Density bits of the status register match no known part
    #[error("Unknown density code {0:#04x}")]
    UnknownDensity(u8),
    /// Buffer is not exactly one page long
    #[error("Buffer is not one page long")]
    BufferSize,
    /// Requested page is past the end of the chip
    #[error("Page out of bounds")]
    OutOfBounds,
    /// Chip stayed busy for longer than the poll limit
    #[error("Timed out waiting for the chip to become ready")]
    Timeout,
}

impl<SE: Debug> PageFlashError for At45Error<SE> {
    fn kind(&self) -> ErrorKind {
        match self {
            At45Error::Spi(_) | At45Error::Timeout => ErrorKind::Transport,
            At45Error::BufferSize => ErrorKind::NotAligned,
            At45Error::OutOfBounds => ErrorKind::OutOfBounds,
            At45Error::UnknownDensity(_) => ErrorKind::Other,
        }
    }
}
