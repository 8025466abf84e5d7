use page_flash::PageIndex;

use crate::cmd::STATUS_BINARY_PAGES;

/// Page layout of an AT45 part, read from its status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Geometry {
    page_size: u32,
    page_count: u32,
    /// Width of the column part of a page address
    page_bits: u32,
}

impl Geometry {
    /// Decode the density and page size bits of the status register.
    ///
    /// Returns the density code if it matches no known part.
    pub fn from_status(status: u8) -> Result<Self, u8> {
        let density = (status >> 2) & 0x0F;
        // (pages, DataFlash page size)
        let (page_count, dataflash_size) = match density {
            0x03 => (512, 264),
            0x05 => (1024, 264),
            0x07 => (2048, 264),
            0x09 => (4096, 264),
            0x0B => (4096, 528),
            0x0D => (8192, 528),
            0x0F => (8192, 1056),
            other => return Err(other),
        };
        let page_size = if status & STATUS_BINARY_PAGES != 0 {
            // Binary parts drop the 8 (or 16, 32) extra bytes per page
            match dataflash_size {
                264 => 256,
                528 => 512,
                _ => 1024,
            }
        } else {
            dataflash_size
        };
        Ok(Geometry {
            page_size,
            page_count,
            page_bits: u32::BITS - (page_size - 1).leading_zeros(),
        })
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn page_bits(&self) -> u32 {
        self.page_bits
    }

    /// Address sent on the wire for column 0 of `page`
    pub fn page_address(&self, page: PageIndex) -> u32 {
        page.as_u32() << self.page_bits
    }
}
