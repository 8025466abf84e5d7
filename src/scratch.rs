use alloc::vec::Vec;

use page_flash::ErrorKind;

/// Page sized working buffer for merges and erase fills.
///
/// Handed out one borrow at a time through [ScratchPage::lease], so two
/// operations can never share it. Contents are never assumed to survive
/// between leases.
#[derive(Debug, Default)]
pub(crate) struct ScratchPage {
    buf: Vec<u8>,
}

impl ScratchPage {
    pub(crate) const fn new() -> Self {
        ScratchPage { buf: Vec::new() }
    }

    /// Allocate `size` bytes unless already allocated.
    ///
    /// Fails with [ErrorKind::OutOfMemory] if `size` is over `budget` or the
    /// allocator refuses, leaving nothing allocated.
    pub(crate) fn allocate(&mut self, size: usize, budget: Option<usize>) -> Result<(), ErrorKind> {
        if self.is_allocated() {
            return Ok(());
        }
        if budget.is_some_and(|budget| size > budget) {
            return Err(ErrorKind::OutOfMemory);
        }
        let mut buf = Vec::new();
        buf.try_reserve_exact(size)
            .map_err(|_| ErrorKind::OutOfMemory)?;
        buf.resize(size, 0);
        self.buf = buf;
        Ok(())
    }

    pub(crate) fn is_allocated(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Borrow the whole page for one operation
    pub(crate) fn lease(&mut self) -> Result<&mut [u8], ErrorKind> {
        if self.is_allocated() {
            Ok(&mut self.buf)
        } else {
            Err(ErrorKind::NotInitialized)
        }
    }
}
