//! Byte addressed block device over page oriented flash.
//!
//! [PageStore] turns any [page_flash::PageFlash] into a
//! [page_flash::BlockDevice] that can read and program at arbitrary offsets,
//! merging partial pages through a scratch buffer.
#![no_std]
extern crate alloc;

// Must be first to share macros across crate
pub(crate) mod fmt;

mod config;
mod error;
mod scratch;
mod store;

pub use config::{EraseStrategy, PageStoreConfig};
pub use error::Error;
pub use page_flash::{status, BlockDevice, ErrorKind, PageFlash, PageFlashError, STATUS_OK};
pub use store::PageStore;
