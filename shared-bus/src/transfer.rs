use embedded_hal::spi::ErrorKind;
use heapless::Vec;

use crate::{BusConfig, DeviceId, Events};

/// Called exactly once per asynchronous transfer, when it has finished,
/// failed to start or was aborted.
///
/// Runs in the context that serviced the interrupt, outside the bus lock, so
/// it may submit further transfers.
pub type CompletionHandler = fn(&Completion<'_>);

/// How an asynchronous transfer ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// The controller finished the transfer, raising these of the requested
    /// events. Empty if it finished without raising any of them.
    Finished(Events),
    /// The transfer was dequeued but the controller refused to start it
    Failed(ErrorKind),
    /// The transfer was cancelled before it finished
    Aborted,
}

/// Passed to a [CompletionHandler]
#[derive(Debug)]
pub struct Completion<'a> {
    /// Device that submitted the transfer
    pub device: DeviceId,
    pub outcome: Outcome,
    /// Received frames. Only meaningful for [Outcome::Finished].
    pub rx: &'a [u8],
}

/// A submitted asynchronous transfer, with the owning device's settings as
/// they were when it was submitted.
pub(crate) struct PendingTransfer<const N: usize> {
    pub(crate) device: DeviceId,
    pub(crate) config: BusConfig,
    pub(crate) fill: u8,
    pub(crate) tx: Vec<u8, N>,
    pub(crate) rx: Vec<u8, N>,
    pub(crate) events: Events,
    pub(crate) handler: CompletionHandler,
}

impl<const N: usize> PendingTransfer<N> {
    pub(crate) fn notify(&self, outcome: Outcome) {
        (self.handler)(&Completion {
            device: self.device,
            outcome,
            rx: &self.rx,
        });
    }
}
