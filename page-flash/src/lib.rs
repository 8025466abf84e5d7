#![no_std]
// Must be first to share macros across crate
pub(crate) mod fmt;

mod address;
pub mod iter;
pub use address::{ByteAddress, ColumnAddress, PageIndex};
pub use iter::{PageChunk, PageRange, PageSpan};

/// Status returned for a successful operation
pub const STATUS_OK: i32 = 0;

pub trait PageFlashError: core::fmt::Debug {
    /// Convert a specific page flash error into a generic error kind
    fn kind(&self) -> ErrorKind;

    /// Negative status code for this error.
    ///
    /// Defaults to the status of [PageFlashError::kind]. Drivers that have their
    /// own numeric codes can override this to pass them through untouched.
    fn code(&self) -> i32 {
        self.kind().status()
    }
}

/// A trait that page flash and block device implementations can use to share an error type.
pub trait ErrorType {
    /// Errors returned by this device.
    type Error: PageFlashError;
}

/// Page flash error kinds.
///
/// Implementations must map their error to those generic error kinds through the
/// [`PageFlashError`] trait.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ErrorKind {
    /// The arguments are not properly aligned.
    NotAligned,

    /// The arguments are out of bounds.
    OutOfBounds,

    /// A working buffer could not be allocated.
    OutOfMemory,

    /// The device has not been initialised.
    NotInitialized,

    /// The chip or bus transport reported a failure.
    Transport,

    /// Error specific to the implementation.
    Other,
}

impl ErrorKind {
    /// Negative status code for the kind, `0` is reserved for success
    pub fn status(&self) -> i32 {
        match self {
            ErrorKind::Other => -4000,
            ErrorKind::Transport => -4001,
            ErrorKind::OutOfMemory => -4002,
            ErrorKind::NotAligned | ErrorKind::OutOfBounds => -4003,
            ErrorKind::NotInitialized => -4004,
        }
    }

    /// Both alignment and bounds failures describe an invalid range
    pub fn is_invalid_range(&self) -> bool {
        matches!(self, ErrorKind::NotAligned | ErrorKind::OutOfBounds)
    }
}

impl PageFlashError for ErrorKind {
    fn kind(&self) -> ErrorKind {
        *self
    }
}

/// Collapse a result into a status code: `0` on success, negative on failure.
pub fn status<E: PageFlashError>(result: Result<(), E>) -> i32 {
    match result {
        Ok(()) => STATUS_OK,
        Err(e) => e.code(),
    }
}

/// Chip level page access.
///
/// This is the capability a block device is built on: whole page reads, writes
/// and erases addressed by page index. Geometry is reported at runtime as
/// it is usually discovered from the chip itself.
pub trait PageFlash: ErrorType {
    /// Size of a page in bytes. Never zero.
    fn page_size(&self) -> u32;

    /// Number of pages in the device
    fn page_count(&self) -> u32;

    /// The capacity of the device in bytes, `None` if it does not fit in a `u32`.
    fn capacity(&self) -> Option<u32> {
        self.page_size().checked_mul(self.page_count())
    }

    /// Read a whole page into `buf`, which must be [PageFlash::page_size] long.
    fn read_page(&mut self, page: PageIndex, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Overwrite a whole page with `buf`, which must be [PageFlash::page_size] long.
    fn write_page(&mut self, page: PageIndex, buf: &[u8]) -> Result<(), Self::Error>;

    /// Return a page to the erased state (all bytes `0xFF`).
    fn erase_page(&mut self, page: PageIndex) -> Result<(), Self::Error>;

    /// Give up any bus resources held by the chip driver.
    fn release(&mut self) {}
}

/// Byte addressed block device.
///
/// The interface storage clients (file systems, logs) program against.
/// Callers must serialise access to a single device: one call in flight at a
/// time.
pub trait BlockDevice: ErrorType {
    /// Prepare the device for use
    fn init(&mut self) -> Result<(), Self::Error>;

    /// Release the resources held by the device
    fn deinit(&mut self) -> Result<(), Self::Error>;

    /// Write `bytes` starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is out of bounds. The implementation can
    /// use the [`check_program`] helper function.
    fn program(&mut self, address: u32, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Fill `bytes` starting from `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is out of bounds. The implementation can
    /// use the [`check_read`] helper function.
    fn read(&mut self, address: u32, bytes: &mut [u8]) -> Result<(), Self::Error>;

    /// Erase `length` bytes from `address`. The range will read as all 1s afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments are not aligned or out of bounds. The
    /// implementation can use the [`check_erase`] helper function.
    fn erase(&mut self, address: u32, length: u32) -> Result<(), Self::Error>;

    /// Size of a readable block in bytes
    fn read_size(&self) -> u32;

    /// Size of a programmable block in bytes
    fn program_size(&self) -> u32;

    /// Size of an erasable block in bytes
    fn erase_size(&self) -> u32;

    /// Total size of the device in bytes
    fn size(&self) -> u32;

    fn is_valid_read(&self, address: u32, length: usize) -> bool
    where
        Self: Sized,
    {
        check_read(self, address, length).is_ok()
    }

    fn is_valid_program(&self, address: u32, length: usize) -> bool
    where
        Self: Sized,
    {
        check_program(self, address, length).is_ok()
    }

    fn is_valid_erase(&self, address: u32, length: u32) -> bool
    where
        Self: Sized,
    {
        check_erase(self, address, length).is_ok()
    }
}

/// Return whether a read operation is within bounds.
///
/// Reads can start and end anywhere, partial pages are copied out of a page buffer.
pub fn check_read<T: BlockDevice>(
    device: &T,
    address: u32,
    length: usize,
) -> Result<(), ErrorKind> {
    check_bounds(device.size(), address, length)
}

/// Return whether a program operation is within bounds.
///
/// Programs can start and end anywhere, partial pages are merged with the
/// existing page contents.
pub fn check_program<T: BlockDevice>(
    device: &T,
    address: u32,
    length: usize,
) -> Result<(), ErrorKind> {
    check_bounds(device.size(), address, length)
}

/// Return whether an erase operation is aligned and within bounds.
pub fn check_erase<T: BlockDevice>(device: &T, address: u32, length: u32) -> Result<(), ErrorKind> {
    check_bounds(device.size(), address, length as usize)?;
    let align = device.erase_size();
    if !ByteAddress::new(address).is_page_aligned(align) || length % align != 0 {
        return Err(ErrorKind::NotAligned);
    }
    Ok(())
}

/// Return whether `[address, address + length)` fits in `capacity` bytes.
pub fn check_bounds(capacity: u32, address: u32, length: usize) -> Result<(), ErrorKind> {
    let length = u32::try_from(length).map_err(|_| ErrorKind::OutOfBounds)?;
    if length > capacity || address > capacity - length {
        return Err(ErrorKind::OutOfBounds);
    }
    Ok(())
}
