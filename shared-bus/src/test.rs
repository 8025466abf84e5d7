//! Test doubles for a bus controller and a chip select pin
use core::convert::Infallible;

use embedded_hal::{
    digital,
    spi::{self, ErrorKind, Mode, SpiBus},
};
use heapless::Vec;

use crate::{AsyncTransport, ConfigurableBus, Events};

/// Bytes of transmit history a [MockBus] keeps
pub const SENT_LOG_LEN: usize = 256;

/// Largest asynchronous transfer a [MockBus] can loop back
pub const MOCK_TRANSFER_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError(pub ErrorKind);

impl spi::Error for MockError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

/// Loopback bus controller.
///
/// Every frame received is the frame that was sent in the same slot, so a
/// read returns whatever the caller clocked out. Synchronous writes and the
/// transmit side of asynchronous transfers are logged.
///
/// Asynchronous transfers stay active until [MockBus::finish] is called and
/// the next interrupt is serviced.
#[derive(Debug, Default)]
pub struct MockBus {
    format: Option<(u8, Mode)>,
    frequency: Option<u32>,
    format_calls: u32,
    frequency_calls: u32,
    sent: Vec<u8, SENT_LOG_LEN>,
    fail: bool,
    refuse_start: bool,
    active: bool,
    raised: Option<Events>,
    loopback: Vec<u8, MOCK_TRANSFER_LEN>,
    started: u32,
    aborted: u32,
    released: u32,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame format currently applied
    pub fn live_format(&self) -> Option<(u8, Mode)> {
        self.format
    }

    /// Clock frequency currently applied
    pub fn live_frequency(&self) -> Option<u32> {
        self.frequency
    }

    pub fn format_calls(&self) -> u32 {
        self.format_calls
    }

    pub fn frequency_calls(&self) -> u32 {
        self.frequency_calls
    }

    /// Everything transmitted so far, oldest first
    pub fn sent(&self) -> &[u8] {
        &self.sent
    }

    /// Make synchronous transfers fail
    pub fn fail_transfers(&mut self, fail: bool) {
        self.fail = fail;
    }

    /// Refuse the next asynchronous transfer
    pub fn refuse_next_start(&mut self) {
        self.refuse_start = true;
    }

    /// Complete the running asynchronous transfer, raising `events` on the
    /// next interrupt.
    pub fn finish(&mut self, events: Events) {
        if self.active {
            self.raised = Some(events);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Asynchronous transfers started
    pub fn started(&self) -> u32 {
        self.started
    }

    pub fn aborted(&self) -> u32 {
        self.aborted
    }

    pub fn released(&self) -> u32 {
        self.released
    }

    fn log(&mut self, bytes: &[u8]) {
        for byte in bytes {
            if self.sent.push(*byte).is_err() {
                break;
            }
        }
    }

    fn check(&self) -> Result<(), MockError> {
        if self.fail {
            Err(MockError(ErrorKind::Other))
        } else {
            Ok(())
        }
    }
}

impl spi::ErrorType for MockBus {
    type Error = MockError;
}

impl SpiBus<u8> for MockBus {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        self.check()?;
        // Line idles high
        words.fill(0xFF);
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        self.check()?;
        self.log(words);
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        self.check()?;
        self.log(write);
        for (i, word) in read.iter_mut().enumerate() {
            *word = write.get(i).copied().unwrap_or(0);
        }
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        self.check()?;
        self.log(words);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl ConfigurableBus for MockBus {
    fn set_format(&mut self, bits: u8, mode: Mode) {
        self.format = Some((bits, mode));
        self.format_calls += 1;
    }

    fn set_frequency(&mut self, hz: u32) {
        self.frequency = Some(hz);
        self.frequency_calls += 1;
    }

    fn release(&mut self) {
        self.format = None;
        self.frequency = None;
        self.released += 1;
    }
}

impl AsyncTransport for MockBus {
    fn is_active(&self) -> bool {
        self.active
    }

    fn start_transfer(
        &mut self,
        tx: &[u8],
        rx_len: usize,
        _bit_width: u8,
        fill: u8,
        _events: Events,
    ) -> Result<(), Self::Error> {
        if core::mem::take(&mut self.refuse_start) {
            return Err(MockError(ErrorKind::Other));
        }
        let frames = tx.len().max(rx_len);
        self.loopback.clear();
        for i in 0..frames {
            let frame = tx.get(i).copied().unwrap_or(fill);
            self.log(&[frame]);
            if i < rx_len {
                self.loopback
                    .push(frame)
                    .map_err(|_| MockError(ErrorKind::Overrun))?;
            }
        }
        self.active = true;
        self.started += 1;
        Ok(())
    }

    fn handle_interrupt(&mut self, rx: &mut [u8]) -> Events {
        match self.raised.take() {
            Some(events) => {
                self.active = false;
                let len = rx.len().min(self.loopback.len());
                rx[..len].copy_from_slice(&self.loopback[..len]);
                events | Events::INTERNAL_COMPLETE
            }
            None => Events::NONE,
        }
    }

    fn abort(&mut self) {
        if self.active {
            self.aborted += 1;
        }
        self.active = false;
        self.raised = None;
    }
}

/// Chip select pin that remembers its level
#[derive(Debug)]
pub struct MockPin {
    high: bool,
    selects: u32,
}

impl MockPin {
    pub fn new() -> Self {
        MockPin {
            high: false,
            selects: 0,
        }
    }

    pub fn is_high(&self) -> bool {
        self.high
    }

    /// Times the pin was driven low
    pub fn selects(&self) -> u32 {
        self.selects
    }
}

impl Default for MockPin {
    fn default() -> Self {
        Self::new()
    }
}

impl digital::ErrorType for MockPin {
    type Error = Infallible;
}

impl digital::OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = false;
        self.selects += 1;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = true;
        Ok(())
    }
}
