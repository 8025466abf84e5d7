//! Simulated AT45 chip for the driver tests
extern crate std;

use std::{vec, vec::Vec};

use embedded_hal::spi::{self, ErrorKind, Mode, SpiBus};
use shared_bus::ConfigurableBus;

use crate::{cmd, Geometry};

/// An AT45 wired straight to a bus controller, shared through a
/// [shared_bus::BusArbiter].
///
/// Bytes written since the last flush make up the current command. Reads
/// are answered from that command, and the flush that ends the transaction
/// carries out programs and erases.
pub struct SimAt45 {
    frame: Vec<u8>,
    format: Option<(u8, Mode)>,
    frequency: Option<u32>,
    released: u32,
    status: u8,
    geometry: Option<Geometry>,
    memory: Vec<u8>,
    busy: u32,
    stay_busy: bool,
    busy_after_write: u32,
    fail: bool,
    last_address: u32,
    status_reads: u32,
    programs: u32,
    erases: u32,
}

impl SimAt45 {
    /// A chip with the given density code, in binary or DataFlash page mode
    pub fn new(density: u8, binary: bool) -> Self {
        let status = (density << 2) | u8::from(binary);
        let geometry = Geometry::from_status(status).ok();
        let size = geometry
            .map(|g| (g.page_size() * g.page_count()) as usize)
            .unwrap_or(0);
        SimAt45 {
            frame: Vec::new(),
            format: None,
            frequency: None,
            released: 0,
            status,
            geometry,
            memory: vec![0xFF; size],
            busy: 0,
            stay_busy: false,
            busy_after_write: 0,
            fail: false,
            last_address: 0,
            status_reads: 0,
            programs: 0,
            erases: 0,
        }
    }

    /// Report busy forever
    pub fn stay_busy(&mut self, busy: bool) {
        self.stay_busy = busy;
    }

    /// Report busy for `polls` status reads after each program or erase
    pub fn busy_for(&mut self, polls: u32) {
        self.busy_after_write = polls;
    }

    pub fn fail(&mut self, fail: bool) {
        self.fail = fail;
    }

    pub fn page(&self, page: usize) -> &[u8] {
        let size = self.page_size();
        &self.memory[page * size..(page + 1) * size]
    }

    pub fn last_address(&self) -> u32 {
        self.last_address
    }

    pub fn status_reads(&self) -> u32 {
        self.status_reads
    }

    pub fn programs(&self) -> u32 {
        self.programs
    }

    pub fn erases(&self) -> u32 {
        self.erases
    }

    /// Frame format currently applied
    pub fn live_format(&self) -> Option<(u8, Mode)> {
        self.format
    }

    /// Clock frequency currently applied
    pub fn live_frequency(&self) -> Option<u32> {
        self.frequency
    }

    /// Times the controller was released
    pub fn released(&self) -> u32 {
        self.released
    }

    fn page_size(&self) -> usize {
        self.geometry.map(|g| g.page_size() as usize).unwrap_or(0)
    }

    /// Byte offset into memory of a wire address
    fn offset(&mut self, bytes: &[u8]) -> usize {
        let address = u32::from_be_bytes([0, bytes[1], bytes[2], bytes[3]]);
        self.last_address = address;
        let Some(g) = self.geometry else {
            return 0;
        };
        let page = (address >> g.page_bits()) as usize;
        let column = (address & ((1 << g.page_bits()) - 1)) as usize;
        page * g.page_size() as usize + column
    }

    fn read_reply(&mut self, command: &[u8], buf: &mut [u8]) {
        match command[0] {
            cmd::STATUS_READ_COMMAND => {
                self.status_reads += 1;
                let ready = if self.stay_busy || self.busy > 0 {
                    self.busy = self.busy.saturating_sub(1);
                    0
                } else {
                    cmd::STATUS_READY
                };
                buf.fill(self.status | ready);
            }
            cmd::JEDEC_COMMAND => {
                let id = [0x1F, 0x22, 0x00];
                for (b, id) in buf.iter_mut().zip(id) {
                    *b = id;
                }
            }
            cmd::PAGE_READ_COMMAND => {
                assert_eq!(command.len(), 8, "page read takes 4 dummy bytes");
                let start = self.offset(command);
                buf.copy_from_slice(&self.memory[start..start + buf.len()]);
            }
            other => panic!("unexpected read after command {other:#04x}"),
        }
    }

    fn finish(&mut self, written: &[u8]) {
        match written.first() {
            Some(&cmd::PROGRAM_THROUGH_BUFFER_COMMAND) => {
                let start = self.offset(written);
                let data = &written[4..];
                self.memory[start..start + data.len()].copy_from_slice(data);
                self.programs += 1;
                self.busy = self.busy_after_write;
            }
            Some(&cmd::PAGE_ERASE_COMMAND) => {
                let start = self.offset(written);
                let size = self.page_size();
                self.memory[start..start + size].fill(0xFF);
                self.erases += 1;
                self.busy = self.busy_after_write;
            }
            _ => {}
        }
    }
}

impl spi::ErrorType for SimAt45 {
    type Error = ErrorKind;
}

impl SpiBus<u8> for SimAt45 {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        self.transfer_in_place(words)
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        if self.fail {
            return Err(ErrorKind::Other);
        }
        self.frame.extend_from_slice(words);
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        self.write(write)?;
        self.transfer_in_place(read)
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        if self.fail {
            return Err(ErrorKind::Other);
        }
        let command = self.frame.clone();
        self.read_reply(&command, words);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        let written = core::mem::take(&mut self.frame);
        if self.fail {
            return Err(ErrorKind::Other);
        }
        self.finish(&written);
        Ok(())
    }
}

impl ConfigurableBus for SimAt45 {
    fn set_format(&mut self, bits: u8, mode: Mode) {
        self.format = Some((bits, mode));
    }

    fn set_frequency(&mut self, hz: u32) {
        self.frequency = Some(hz);
    }

    fn release(&mut self) {
        self.format = None;
        self.frequency = None;
        self.released += 1;
    }
}
