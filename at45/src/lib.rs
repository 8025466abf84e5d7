//! Page flash driver for Adesto/Atmel AT45 DataFlash.
//!
//! Geometry is read from the chip's status register, so one driver covers
//! the whole family in both DataFlash and binary page configurations.
#![no_std]
// Must be first to share macros across crate
pub(crate) mod fmt;

pub mod cmd;
pub mod error;
mod geometry;

use core::fmt::Debug;

use embedded_hal::spi::SpiDevice;
use page_flash::{ErrorType, PageFlash, PageIndex};
use shared_bus::BusDevice;

pub use error::At45Error;
pub use geometry::Geometry;

/// Default number of status polls before a program or erase times out
pub const DEFAULT_POLL_LIMIT: u32 = 100_000;

/// The JEDEC manufacturer and device id of a flash device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JedecId {
    manufacturer: u8,
    /// MSB first on wire
    device: u16,
}

impl JedecId {
    pub fn new(manufacturer: u8, device: u16) -> Self {
        JedecId {
            manufacturer,
            device,
        }
    }

    pub fn manufacturer(&self) -> u8 {
        self.manufacturer
    }

    pub fn device(&self) -> u16 {
        self.device
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for JedecId {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "JedecId(manufacturer: {:02X}, device: {:04X})",
            self.manufacturer,
            self.device
        );
    }
}

/// An AT45 chip on an SPI device.
///
/// Implements [PageFlash] so a block device can sit on top of it. Writes use
/// program through buffer with built-in erase, so pages never need erasing
/// before they are written.
pub struct At45<SPI> {
    spi: SPI,
    geometry: Geometry,
    poll_limit: u32,
}

// Manually implement Debug to avoid bounds on SPI
impl<SPI> Debug for At45<SPI> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("At45")
            .field("geometry", &self.geometry)
            .field("poll_limit", &self.poll_limit)
            .finish()
    }
}

impl<SPI: SpiDevice> At45<SPI> {
    /// Read the chip's geometry and wrap it.
    pub fn new(mut spi: SPI) -> Result<Self, At45Error<SPI::Error>> {
        let status = cmd::read_status(&mut spi)?;
        let geometry = Geometry::from_status(status).map_err(|density| {
            error!("Unknown AT45 density code {}", density);
            At45Error::UnknownDensity(density)
        })?;
        debug!(
            "AT45 with {} pages of {} bytes",
            geometry.page_count(),
            geometry.page_size()
        );
        Ok(At45 {
            spi,
            geometry,
            poll_limit: DEFAULT_POLL_LIMIT,
        })
    }

    /// Number of status polls before a program or erase fails with
    /// [At45Error::Timeout]
    pub fn with_poll_limit(mut self, poll_limit: u32) -> Self {
        self.poll_limit = poll_limit;
        self
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn jedec_id(&mut self) -> Result<JedecId, At45Error<SPI::Error>> {
        cmd::read_jedec_id(&mut self.spi)
    }

    pub fn status(&mut self) -> Result<u8, At45Error<SPI::Error>> {
        cmd::read_status(&mut self.spi)
    }

    /// Poll the status register until the chip reports ready
    pub fn wait_ready(&mut self) -> Result<(), At45Error<SPI::Error>> {
        for _ in 0..self.poll_limit {
            if self.status()? & cmd::STATUS_READY != 0 {
                return Ok(());
            }
        }
        warn!("AT45 still busy after {} polls", self.poll_limit);
        Err(At45Error::Timeout)
    }

    /// Give back the SPI device
    pub fn into_inner(self) -> SPI {
        self.spi
    }

    fn check(&self, page: PageIndex, len: Option<usize>) -> Result<u32, At45Error<SPI::Error>> {
        if page.as_u32() >= self.geometry.page_count() {
            return Err(At45Error::OutOfBounds);
        }
        if len.is_some_and(|len| len != self.geometry.page_size() as usize) {
            return Err(At45Error::BufferSize);
        }
        Ok(self.geometry.page_address(page))
    }
}

impl<SPI: SpiDevice> ErrorType for At45<SPI> {
    type Error = At45Error<SPI::Error>;
}

impl<SPI: BusDevice> PageFlash for At45<SPI> {
    fn page_size(&self) -> u32 {
        self.geometry.page_size()
    }

    fn page_count(&self) -> u32 {
        self.geometry.page_count()
    }

    fn read_page(&mut self, page: PageIndex, buf: &mut [u8]) -> Result<(), Self::Error> {
        let address = self.check(page, Some(buf.len()))?;
        trace!("Reading page {}", page.as_u32());
        cmd::page_read(&mut self.spi, address, buf)
    }

    fn write_page(&mut self, page: PageIndex, buf: &[u8]) -> Result<(), Self::Error> {
        let address = self.check(page, Some(buf.len()))?;
        trace!("Programming page {}", page.as_u32());
        cmd::program_through_buffer(&mut self.spi, address, buf)?;
        self.wait_ready()
    }

    fn erase_page(&mut self, page: PageIndex) -> Result<(), Self::Error> {
        let address = self.check(page, None)?;
        trace!("Erasing page {}", page.as_u32());
        cmd::page_erase(&mut self.spi, address)?;
        self.wait_ready()
    }

    fn release(&mut self) {
        debug!("Releasing AT45 bus");
        self.spi.release();
    }
}

#[cfg(test)]
mod sim;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimAt45;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use embedded_hal::spi::{ErrorKind, MODE_0, MODE_3};
    use page_flash::{BlockDevice, ErrorKind as FlashErrorKind, PageFlashError};
    use page_store::PageStore;
    use shared_bus::{test::MockPin, BusArbiter, BusConfig, BusError, SharedBus};
    use test_log::test;

    type Arbiter = BusArbiter<NoopRawMutex, SimAt45>;
    type Chip<'a> = At45<SharedBus<'a, NoopRawMutex, SimAt45, MockPin>>;

    fn attach(arbiter: &Arbiter) -> Chip<'_> {
        At45::new(SharedBus::new(arbiter, MockPin::new()).unwrap()).unwrap()
    }

    #[test]
    fn discovers_geometry() {
        let binary = Arbiter::new(SimAt45::new(0x0B, true));
        let chip = attach(&binary);
        assert_eq!(chip.page_size(), 512);
        assert_eq!(chip.page_count(), 4096);
        assert_eq!(chip.capacity(), Some(512 * 4096));

        let unknown = Arbiter::new(SimAt45::new(0x01, false));
        let err = At45::new(SharedBus::new(&unknown, MockPin::new()).unwrap()).unwrap_err();
        assert!(matches!(err, At45Error::UnknownDensity(1)));
        assert_eq!(err.kind(), FlashErrorKind::Other);
    }

    #[test]
    fn jedec_id() {
        let arbiter = Arbiter::new(SimAt45::new(0x03, false));
        let mut chip = attach(&arbiter);
        let id = chip.jedec_id().unwrap();
        assert_eq!(id.manufacturer(), 0x1F);
        assert_eq!(id.device(), 0x2200);
    }

    #[test]
    fn page_read_write_erase() {
        let arbiter = Arbiter::new(SimAt45::new(0x03, false));
        let mut chip = attach(&arbiter);
        let page = PageIndex::new(5);
        let data: [u8; 264] = core::array::from_fn(|i| i as u8);
        chip.write_page(page, &data).unwrap();

        let mut buf = [0; 264];
        chip.read_page(page, &mut buf).unwrap();
        assert_eq!(buf, data);

        arbiter.inspect(|sim| {
            // Page 5 of a 264 byte part starts at 5 << 9
            assert_eq!(sim.last_address(), 5 << 9);
            assert_eq!(sim.page(5), &data[..]);
        });

        chip.erase_page(page).unwrap();
        chip.read_page(page, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0xFF));
        arbiter.inspect(|sim| assert_eq!(sim.erases(), 1));
    }

    #[test]
    fn rejects_wrong_buffer_and_page() {
        let arbiter = Arbiter::new(SimAt45::new(0x03, false));
        let mut chip = attach(&arbiter);
        assert!(matches!(
            chip.write_page(PageIndex::new(0), &[0; 256]),
            Err(At45Error::BufferSize)
        ));
        assert!(matches!(
            chip.erase_page(PageIndex::new(512)),
            Err(At45Error::OutOfBounds)
        ));
        arbiter.inspect(|sim| assert_eq!(sim.programs(), 0));
    }

    #[test]
    fn busy_chip_times_out() {
        let arbiter = Arbiter::new(SimAt45::new(0x03, false));
        let mut chip = attach(&arbiter).with_poll_limit(10);
        arbiter.inspect(|sim| sim.stay_busy(true));
        let err = chip.erase_page(PageIndex::new(0)).unwrap_err();
        assert!(matches!(err, At45Error::Timeout));
        assert_eq!(err.kind(), FlashErrorKind::Transport);
        arbiter.inspect(|sim| assert_eq!(sim.status_reads(), 1 + 10));
    }

    #[test]
    fn waits_for_ready_after_program() {
        let arbiter = Arbiter::new(SimAt45::new(0x03, false));
        let mut chip = attach(&arbiter);
        let reads = arbiter.inspect(|sim| {
            sim.busy_for(3);
            sim.status_reads()
        });
        chip.write_page(PageIndex::new(0), &[0xAB; 264]).unwrap();
        arbiter.inspect(|sim| assert_eq!(sim.status_reads() - reads, 4));
    }

    #[test]
    fn spi_errors_are_transport() {
        let arbiter = Arbiter::new(SimAt45::new(0x03, false));
        let mut chip = attach(&arbiter);
        arbiter.inspect(|sim| sim.fail(true));
        let mut buf = [0; 264];
        let err = chip.read_page(PageIndex::new(0), &mut buf).unwrap_err();
        assert!(matches!(
            err,
            At45Error::Spi(BusError::Transport(ErrorKind::Other))
        ));
        assert_eq!(err.kind(), FlashErrorKind::Transport);
    }

    #[test]
    fn release_reaches_bus() {
        let arbiter = Arbiter::new(SimAt45::new(0x03, false));
        let mut chip = attach(&arbiter);
        assert_eq!(arbiter.owner(), Some(chip.spi.id()));
        chip.release();
        assert_eq!(arbiter.owner(), None);
        arbiter.inspect(|sim| assert_eq!(sim.released(), 1));
    }

    #[test]
    fn block_device_over_shared_bus() {
        let arbiter = Arbiter::new(SimAt45::new(0x03, false));
        let bus = SharedBus::with_config(
            &arbiter,
            MockPin::new(),
            BusConfig::new(8, MODE_0, 20_000_000),
        )
        .unwrap();
        let mut store = PageStore::new(At45::new(bus).unwrap()).unwrap();
        let mut other = SharedBus::with_config(
            &arbiter,
            MockPin::new(),
            BusConfig::new(8, MODE_3, 4_000_000),
        )
        .unwrap();
        store.init().unwrap();

        // Partial first and last page around one whole page
        let data: [u8; 600] = core::array::from_fn(|i| (i * 7) as u8);
        store.program(100, &data).unwrap();
        let mut out = [0; 600];
        store.read(100, &mut out).unwrap();
        assert_eq!(out, data);
        let mut edges = [0; 2];
        store.read(99, &mut edges[..1]).unwrap();
        store.read(700, &mut edges[1..]).unwrap();
        assert_eq!(edges, [0xFF; 2]);
        arbiter.inspect(|sim| {
            assert_eq!(sim.page(1), &data[164..428]);
            assert_eq!(sim.live_frequency(), Some(20_000_000));
        });

        // Another device takes the bus, the store's next access takes it back
        other.write(&[0x00]).unwrap();
        arbiter.inspect(|sim| assert_eq!(sim.live_format(), Some((8, MODE_3))));
        let reconfigurations = arbiter.reconfigurations();
        store.read(100, &mut out).unwrap();
        assert_eq!(out, data);
        assert_eq!(arbiter.reconfigurations(), reconfigurations + 1);
        arbiter.inspect(|sim| {
            assert_eq!(sim.live_format(), Some((8, MODE_0)));
            assert_eq!(sim.live_frequency(), Some(20_000_000));
        });

        store.erase(264, 264).unwrap();
        arbiter.inspect(|sim| assert!(sim.page(1).iter().all(|&b| b == 0xFF)));

        store.deinit().unwrap();
        assert_eq!(arbiter.owner(), None);
        arbiter.inspect(|sim| {
            assert_eq!(sim.released(), 1);
            assert_eq!(sim.live_frequency(), None);
        });

        // Usable again after deinit, settings pushed once more
        store.read(100, &mut out[..164]).unwrap();
        assert_eq!(out[..164], data[..164]);
        assert_eq!(arbiter.owner(), Some(store.flash().spi.id()));
        arbiter.inspect(|sim| assert_eq!(sim.live_frequency(), Some(20_000_000)));
    }
}
