use core::fmt::Debug;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::{
    digital::OutputPin,
    spi::{ErrorType, Mode, Operation, SpiBus, SpiDevice},
};
use heapless::Vec;

use crate::{
    arbiter::BusArbiter,
    error::BusError,
    transfer::{CompletionHandler, PendingTransfer},
    transport::{AsyncTransport, ConfigurableBus},
    BusConfig, DeviceId, Events, DEFAULT_FILL,
};

/// A device on a shared bus that can hand the controller back.
///
/// Drivers call [BusDevice::release] when they are torn down so the
/// controller's hardware resources can be freed.
pub trait BusDevice: SpiDevice<u8> {
    fn release(&mut self);
}

/// One device's handle on a bus shared through a [BusArbiter].
///
/// Each handle carries its own [BusConfig], fill byte and chip select. The
/// handle's settings are pushed to the controller only when a transfer moves
/// ownership of the bus to it, so back to back transfers from the same
/// device never reconfigure the controller.
///
/// Dropping the handle releases the bus if it is the owner.
pub struct SharedBus<'a, M: RawMutex, BUS: ConfigurableBus, CS, const Q: usize = 4, const N: usize = 64>
{
    arbiter: &'a BusArbiter<M, BUS, Q, N>,
    cs: CS,
    id: DeviceId,
    config: BusConfig,
    fill: u8,
}

impl<'a, M, BUS, CS, const Q: usize, const N: usize> SharedBus<'a, M, BUS, CS, Q, N>
where
    M: RawMutex,
    BUS: ConfigurableBus,
    CS: OutputPin,
{
    /// Attach a device with the default [BusConfig]
    pub fn new(
        arbiter: &'a BusArbiter<M, BUS, Q, N>,
        cs: CS,
    ) -> Result<Self, BusError<BUS::Error>> {
        Self::with_config(arbiter, cs, BusConfig::default())
    }

    /// Attach a device. It takes ownership of the bus only if no other
    /// device holds it.
    ///
    /// Fails with [BusError::DevicesExhausted] once `u16::MAX + 1` devices
    /// have been attached to the arbiter.
    pub fn with_config(
        arbiter: &'a BusArbiter<M, BUS, Q, N>,
        mut cs: CS,
        config: BusConfig,
    ) -> Result<Self, BusError<BUS::Error>> {
        cs.set_high().map_err(|_| BusError::ChipSelect)?;
        let id = arbiter.attach(&config)?;
        debug!("Attached device {} to shared bus", id.as_u16());
        Ok(SharedBus {
            arbiter,
            cs,
            id,
            config,
            fill: DEFAULT_FILL,
        })
    }
}

impl<'a, M, BUS, CS, const Q: usize, const N: usize> SharedBus<'a, M, BUS, CS, Q, N>
where
    M: RawMutex,
    BUS: ConfigurableBus,
{
    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Set bits per frame and mode. Applied now if this device owns the bus,
    /// otherwise on its next transfer.
    pub fn format(&mut self, bits: u8, mode: Mode) {
        self.config.bits = bits;
        self.config.mode = mode;
        self.arbiter.configure(self.id, &self.config);
    }

    /// Set the clock frequency. Applied now if this device owns the bus,
    /// otherwise on its next transfer.
    pub fn frequency(&mut self, hz: u32) {
        self.config.frequency = hz;
        self.arbiter.configure(self.id, &self.config);
    }

    /// Replace all settings at once
    pub fn configure(&mut self, config: BusConfig) {
        self.config = config;
        self.arbiter.configure(self.id, &self.config);
    }

    /// Byte clocked out while receiving past the end of the transmit data
    pub fn set_fill_byte(&mut self, fill: u8) {
        self.fill = fill;
    }

    pub fn fill_byte(&self) -> u8 {
        self.fill
    }

    /// Take the bus now rather than on the next transfer
    pub fn acquire(&mut self) -> Result<(), BusError<BUS::Error>> {
        self.arbiter.acquire(self.id, &self.config)
    }

    /// Give up the bus if this device owns it
    pub fn release(&mut self) {
        self.arbiter.release(self.id);
    }
}

impl<'a, M, BUS, CS, const Q: usize, const N: usize> SharedBus<'a, M, BUS, CS, Q, N>
where
    M: RawMutex,
    BUS: ConfigurableBus,
    CS: OutputPin,
{
    /// Send one frame and return the frame received in its place
    pub fn write_byte(&mut self, value: u8) -> Result<u8, BusError<BUS::Error>> {
        let mut rx = [0];
        self.transfer_sync(&[value], &mut rx)?;
        Ok(rx[0])
    }

    /// Full duplex transfer of `max(tx.len(), rx.len())` frames.
    ///
    /// Frames past the end of `tx` are sent as the fill byte, frames received
    /// past the end of `rx` are discarded. Returns the number of frames
    /// clocked.
    pub fn transfer_sync(
        &mut self,
        tx: &[u8],
        rx: &mut [u8],
    ) -> Result<usize, BusError<BUS::Error>> {
        let frames = tx.len().max(rx.len());
        self.transaction(&mut [Operation::Transfer(rx, tx)])?;
        Ok(frames)
    }
}

impl<'a, M, BUS, CS, const Q: usize, const N: usize> SharedBus<'a, M, BUS, CS, Q, N>
where
    M: RawMutex,
    BUS: AsyncTransport,
{
    /// Queue an interrupt driven transfer of `max(tx.len(), rx_len)` frames.
    ///
    /// The transfer starts straight away if the controller is idle. Otherwise
    /// it waits its turn and runs with this device's settings as they are
    /// now. `handler` is called once the transfer completes, is aborted or
    /// fails to start. Chip select is not driven.
    pub fn transfer_async(
        &mut self,
        tx: &[u8],
        rx_len: usize,
        events: Events,
        handler: CompletionHandler,
    ) -> Result<(), BusError<BUS::Error>> {
        let tx = Vec::from_slice(tx).map_err(|_| BusError::Oversized(N))?;
        let mut rx = Vec::new();
        rx.resize(rx_len, 0).map_err(|_| BusError::Oversized(N))?;
        self.arbiter.submit(PendingTransfer {
            device: self.id,
            config: self.config,
            fill: self.fill,
            tx,
            rx,
            events,
            handler,
        })
    }

    /// See [BusArbiter::abort_transfer]
    pub fn abort_transfer(&mut self) {
        self.arbiter.abort_transfer();
    }

    /// See [BusArbiter::abort_all_transfers]
    pub fn abort_all_transfers(&mut self) {
        self.arbiter.abort_all_transfers();
    }
}

/// Run one operation on a bus already configured for the device
fn run_operation<BUS: SpiBus<u8>>(
    bus: &mut BUS,
    operation: &mut Operation<'_, u8>,
    fill: u8,
) -> Result<(), BusError<BUS::Error>> {
    match operation {
        Operation::Read(buf) => {
            buf.fill(fill);
            bus.transfer_in_place(buf).map_err(BusError::Transport)
        }
        Operation::Write(buf) => bus.write(buf).map_err(BusError::Transport),
        Operation::Transfer(read, write) => {
            let common = read.len().min(write.len());
            let (read_head, read_tail) = read.split_at_mut(common);
            let (write_head, write_tail) = write.split_at(common);
            bus.transfer(read_head, write_head)
                .map_err(BusError::Transport)?;
            if !write_tail.is_empty() {
                bus.write(write_tail).map_err(BusError::Transport)?;
            }
            if !read_tail.is_empty() {
                read_tail.fill(fill);
                bus.transfer_in_place(read_tail)
                    .map_err(BusError::Transport)?;
            }
            Ok(())
        }
        Operation::TransferInPlace(buf) => bus.transfer_in_place(buf).map_err(BusError::Transport),
        Operation::DelayNs(_) => Err(BusError::DelayUnsupported),
    }
}

impl<'a, M, BUS, CS, const Q: usize, const N: usize> ErrorType for SharedBus<'a, M, BUS, CS, Q, N>
where
    M: RawMutex,
    BUS: ConfigurableBus,
{
    type Error = BusError<BUS::Error>;
}

impl<'a, M, BUS, CS, const Q: usize, const N: usize> SpiDevice<u8>
    for SharedBus<'a, M, BUS, CS, Q, N>
where
    M: RawMutex,
    BUS: ConfigurableBus,
    CS: OutputPin,
{
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        let fill = self.fill;
        let cs = &mut self.cs;
        self.arbiter.transfer(self.id, &self.config, |bus| {
            cs.set_low().map_err(|_| BusError::ChipSelect)?;
            let result = operations
                .iter_mut()
                .try_for_each(|op| run_operation(bus, op, fill));
            let flushed = bus.flush().map_err(BusError::Transport);
            let deselected = cs.set_high().map_err(|_| BusError::ChipSelect);
            result?;
            flushed?;
            deselected
        })
    }
}

impl<'a, M, BUS, CS, const Q: usize, const N: usize> BusDevice for SharedBus<'a, M, BUS, CS, Q, N>
where
    M: RawMutex,
    BUS: ConfigurableBus,
    CS: OutputPin,
{
    fn release(&mut self) {
        self.arbiter.release(self.id);
    }
}

impl<'a, M, BUS, CS, const Q: usize, const N: usize> Drop for SharedBus<'a, M, BUS, CS, Q, N>
where
    M: RawMutex,
    BUS: ConfigurableBus,
{
    fn drop(&mut self) {
        self.arbiter.release(self.id);
    }
}

impl<'a, M, BUS, CS, const Q: usize, const N: usize> Debug for SharedBus<'a, M, BUS, CS, Q, N>
where
    M: RawMutex,
    BUS: ConfigurableBus,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SharedBus")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("fill", &self.fill)
            .finish_non_exhaustive()
    }
}
