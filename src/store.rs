use page_flash::{
    check_erase, check_program, check_read, BlockDevice, ByteAddress, ErrorType, PageFlash,
    PageRange, PageSpan,
};

use crate::{
    config::{EraseStrategy, PageStoreConfig},
    error::Error,
    scratch::ScratchPage,
};

/// Byte addressed block device over a page flash.
///
/// Reads and programs may start and end anywhere. A program that covers only
/// part of a page reads the page into a scratch buffer, overlays the new bytes
/// and writes the whole page back. Pages are always processed in ascending
/// order, and the first failing page aborts the call. Pages already written
/// stay written.
///
/// A single store is not re-entrant: callers must make sure only one
/// operation is in flight at a time.
pub struct PageStore<F> {
    flash: F,
    config: PageStoreConfig,
    page_size: u32,
    size: u32,
    scratch: ScratchPage,
}

impl<F: PageFlash> PageStore<F> {
    /// Wrap `flash` with the default [PageStoreConfig]
    pub fn new(flash: F) -> Result<Self, Error<F::Error>> {
        Self::with_config(flash, PageStoreConfig::default())
    }

    /// Wrap `flash`, taking the geometry from the chip.
    ///
    /// Fails with [Error::InvalidGeometry] for a zero page size or a capacity
    /// that does not fit in a `u32`.
    pub fn with_config(flash: F, config: PageStoreConfig) -> Result<Self, Error<F::Error>> {
        let page_size = flash.page_size();
        if page_size == 0 {
            error!("Flash reports a zero page size");
            return Err(Error::InvalidGeometry);
        }
        let size = flash.capacity().ok_or(Error::InvalidGeometry)?;
        debug!(
            "Page store with {} pages of {} bytes",
            flash.page_count(),
            page_size
        );
        Ok(PageStore {
            flash,
            config,
            page_size,
            size,
            scratch: ScratchPage::new(),
        })
    }

    pub fn config(&self) -> &PageStoreConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.scratch.is_allocated()
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    /// Give back the page flash
    pub fn into_inner(self) -> F {
        self.flash
    }

    fn ensure_initialized(&self) -> Result<(), Error<F::Error>> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }
}

impl<F: PageFlash> ErrorType for PageStore<F> {
    type Error = Error<F::Error>;
}

impl<F: PageFlash> BlockDevice for PageStore<F> {
    /// Allocate the scratch page. Does nothing if already initialised.
    fn init(&mut self) -> Result<(), Self::Error> {
        self.scratch
            .allocate(self.page_size as usize, self.config.scratch_budget)
            .inspect_err(|_| warn!("No memory for a {} byte scratch page", self.page_size))?;
        Ok(())
    }

    /// Release the flash's bus. The scratch page is kept, so the store can
    /// be used again and will reacquire the bus on the next access.
    fn deinit(&mut self) -> Result<(), Self::Error> {
        debug!("Releasing page store");
        self.flash.release();
        Ok(())
    }

    fn program(&mut self, address: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        self.ensure_initialized()?;
        check_program(&*self, address, bytes.len())?;
        trace!("Program {} bytes at {}", bytes.len(), address);

        for chunk in PageSpan::new(ByteAddress::new(address), bytes.len(), self.page_size) {
            let data = &bytes[chunk.buffer_range()];
            if chunk.is_full_page() {
                self.flash
                    .write_page(chunk.page, data)
                    .map_err(Error::Flash)?;
                continue;
            }
            let page = self.scratch.lease()?;
            self.flash
                .read_page(chunk.page, page)
                .map_err(Error::Flash)?;
            page[chunk.page_range()].copy_from_slice(data);
            self.flash
                .write_page(chunk.page, page)
                .map_err(Error::Flash)?;
        }
        Ok(())
    }

    fn read(&mut self, address: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.ensure_initialized()?;
        check_read(&*self, address, bytes.len())?;
        trace!("Read {} bytes at {}", bytes.len(), address);

        for chunk in PageSpan::new(ByteAddress::new(address), bytes.len(), self.page_size) {
            let page = self.scratch.lease()?;
            self.flash
                .read_page(chunk.page, page)
                .map_err(Error::Flash)?;
            bytes[chunk.buffer_range()].copy_from_slice(&page[chunk.page_range()]);
        }
        Ok(())
    }

    fn erase(&mut self, address: u32, length: u32) -> Result<(), Self::Error> {
        self.ensure_initialized()?;
        check_erase(&*self, address, length)?;
        trace!("Erase {} bytes at {}", length, address);

        let pages = PageRange::covering(ByteAddress::new(address), length, self.page_size);
        match self.config.erase_strategy {
            EraseStrategy::FillAndRewrite => {
                let page = self.scratch.lease()?;
                page.fill(0xFF);
                for index in pages {
                    self.flash.write_page(index, page).map_err(Error::Flash)?;
                }
            }
            EraseStrategy::PageErase => {
                for index in pages {
                    self.flash.erase_page(index).map_err(Error::Flash)?;
                }
            }
        }
        Ok(())
    }

    fn read_size(&self) -> u32 {
        self.page_size
    }

    fn program_size(&self) -> u32 {
        self.page_size
    }

    fn erase_size(&self) -> u32 {
        self.page_size
    }

    fn size(&self) -> u32 {
        self.size
    }
}
