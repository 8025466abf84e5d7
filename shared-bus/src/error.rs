use embedded_hal::spi::{self, ErrorKind};

/// Error type for shared bus transfers.
///
/// Generic over the controller error type (E).
#[derive(Debug, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError<E> {
    /// Error from the bus controller
    #[error("Bus controller error: {0:?}")]
    Transport(E),
    /// Chip select pin could not be driven
    #[error("Chip select error")]
    ChipSelect,
    /// An asynchronous transfer is running on the controller
    #[error("Bus busy with an asynchronous transfer")]
    Busy,
    /// Every device id has been handed out
    #[error("No device ids left")]
    DevicesExhausted,
    /// Asynchronous transfer queue is full
    #[error("Transfer queue full")]
    QueueFull,
    /// Asynchronous transfer does not fit the transfer buffer
    #[error("Transfer larger than the {0} byte transfer buffer")]
    Oversized(usize),
    /// The device has no delay source for [spi::Operation::DelayNs]
    #[error("Delay operations are not supported")]
    DelayUnsupported,
}

impl<E: spi::Error> spi::Error for BusError<E> {
    fn kind(&self) -> ErrorKind {
        match self {
            BusError::Transport(e) => e.kind(),
            BusError::ChipSelect => ErrorKind::ChipSelectFault,
            BusError::Busy
            | BusError::DevicesExhausted
            | BusError::QueueFull
            | BusError::Oversized(_)
            | BusError::DelayUnsupported => ErrorKind::Other,
        }
    }
}
