//! Single SPI transactions understood by AT45 DataFlash parts.
//!
//! Addresses passed here are already in the chip's page/column layout, see
//! [crate::Geometry::page_address].
use embedded_hal::spi::{Operation, SpiDevice};
use utils::{spi_transaction, spi_write};

use crate::{error::At45Error, JedecId};

/// Read the status register
pub const STATUS_READ_COMMAND: u8 = 0xD7;
/// Read manufacturer and device id
pub const JEDEC_COMMAND: u8 = 0x9F;
/// Read a page straight from main memory, bypassing the buffers
pub const PAGE_READ_COMMAND: u8 = 0xD2;
/// Load buffer 1 and program it to a page with built-in erase
pub const PROGRAM_THROUGH_BUFFER_COMMAND: u8 = 0x82;
/// Erase a single page
pub const PAGE_ERASE_COMMAND: u8 = 0x81;

/// Don't care bytes clocked between the address and the data of a page read
const PAGE_READ_DUMMY_BYTES: usize = 4;

/// Status register bit set while the chip is ready
pub const STATUS_READY: u8 = 0x80;
/// Status register bit set when the chip uses power of two pages
pub const STATUS_BINARY_PAGES: u8 = 0x01;

fn address_bytes(address: u32) -> [u8; 3] {
    [(address >> 16) as u8, (address >> 8) as u8, address as u8]
}

/// Read the status register
pub fn read_status<SPI: SpiDevice>(spi: &mut SPI) -> Result<u8, At45Error<SPI::Error>> {
    let mut status = [0];
    spi_transaction(
        spi,
        &mut [
            Operation::Write(&[STATUS_READ_COMMAND]),
            Operation::Read(&mut status),
        ],
    )?;
    Ok(status[0])
}

/// Read the JEDEC manufacturer and device id
pub fn read_jedec_id<SPI: SpiDevice>(spi: &mut SPI) -> Result<JedecId, At45Error<SPI::Error>> {
    let mut buf = [0; 3];
    spi_transaction(
        spi,
        &mut [Operation::Write(&[JEDEC_COMMAND]), Operation::Read(&mut buf)],
    )?;
    Ok(JedecId::new(buf[0], u16::from_be_bytes([buf[1], buf[2]])))
}

/// Read bytes from main memory starting at `address`
pub fn page_read<SPI: SpiDevice>(
    spi: &mut SPI,
    address: u32,
    buf: &mut [u8],
) -> Result<(), At45Error<SPI::Error>> {
    let [a2, a1, a0] = address_bytes(address);
    let mut cmd = [0; 4 + PAGE_READ_DUMMY_BYTES];
    cmd[..4].copy_from_slice(&[PAGE_READ_COMMAND, a2, a1, a0]);
    spi_transaction(spi, &mut [Operation::Write(&cmd), Operation::Read(buf)])
}

/// Load buffer 1 with `buf` and program it to the page at `address`.
///
/// The chip erases the page first. Poll [read_status] until ready before the
/// next command.
pub fn program_through_buffer<SPI: SpiDevice>(
    spi: &mut SPI,
    address: u32,
    buf: &[u8],
) -> Result<(), At45Error<SPI::Error>> {
    let [a2, a1, a0] = address_bytes(address);
    let cmd = [PROGRAM_THROUGH_BUFFER_COMMAND, a2, a1, a0];
    spi_transaction(spi, &mut [Operation::Write(&cmd), Operation::Write(buf)])
}

/// Erase the page at `address`. Poll [read_status] until ready before the
/// next command.
pub fn page_erase<SPI: SpiDevice>(spi: &mut SPI, address: u32) -> Result<(), At45Error<SPI::Error>> {
    let [a2, a1, a0] = address_bytes(address);
    spi_write(spi, &[PAGE_ERASE_COMMAND, a2, a1, a0])
}

pub mod utils {
    use embedded_hal::spi::{Operation, SpiDevice};

    use super::At45Error;

    /// Wrapper around [SpiDevice::write] that maps errors
    pub fn spi_write<SPI: SpiDevice>(spi: &mut SPI, buf: &[u8]) -> Result<(), At45Error<SPI::Error>> {
        spi.write(buf).map_err(At45Error::Spi)
    }

    /// Wrapper around [SpiDevice::transaction] that maps errors
    pub fn spi_transaction<SPI: SpiDevice>(
        spi: &mut SPI,
        operations: &mut [Operation<'_, u8>],
    ) -> Result<(), At45Error<SPI::Error>> {
        spi.transaction(operations).map_err(At45Error::Spi)
    }
}
