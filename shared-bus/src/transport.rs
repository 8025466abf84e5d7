//! Capabilities the physical bus controller has to provide.
use embedded_hal::spi::{Mode, SpiBus};

use crate::Events;

/// A bus controller whose frame format and clock can be changed at runtime.
///
/// The arbiter calls these whenever ownership of the bus moves to a device
/// with different settings, so they should be cheap but need not be free.
pub trait ConfigurableBus: SpiBus<u8> {
    /// Set bits per frame and clock polarity/phase
    fn set_format(&mut self, bits: u8, mode: Mode);

    /// Set the clock frequency in Hz
    fn set_frequency(&mut self, hz: u32);

    /// Free the controller's hardware resources. It must be usable again after
    /// the next [ConfigurableBus::set_format].
    fn release(&mut self) {}
}

/// Interrupt driven transfers.
///
/// The controller starts a transfer and returns immediately; completion is
/// signalled by an interrupt which is forwarded to
/// [crate::BusArbiter::on_interrupt].
pub trait AsyncTransport: ConfigurableBus {
    /// A transfer is currently running on the controller
    fn is_active(&self) -> bool;

    /// Start a transfer of `max(tx.len(), rx_len)` frames.
    ///
    /// Frames past the end of `tx` are sent as `fill`. `events` is the set of
    /// events the caller wants reported.
    fn start_transfer(
        &mut self,
        tx: &[u8],
        rx_len: usize,
        bit_width: u8,
        fill: u8,
        events: Events,
    ) -> Result<(), Self::Error>;

    /// Service the controller interrupt.
    ///
    /// Copies received frames into `rx` once the transfer is done and returns
    /// the events raised, [Events::NONE] if the transfer is still running.
    fn handle_interrupt(&mut self, rx: &mut [u8]) -> Events;

    /// Stop the running transfer, if any
    fn abort(&mut self);
}
