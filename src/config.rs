/// How [crate::PageStore::erase] returns pages to the erased state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EraseStrategy {
    /// Write a page of `0xFF` over every page in the range.
    ///
    /// For chips whose page write erases first, so a full page write is as
    /// cheap as an erase.
    #[default]
    FillAndRewrite,
    /// Issue the chip's own page erase for every page in the range
    PageErase,
}

/// Runtime configuration of a [crate::PageStore]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageStoreConfig {
    pub erase_strategy: EraseStrategy,
    /// Largest scratch page in bytes the store may allocate. `None` for no
    /// limit beyond the allocator's.
    pub scratch_budget: Option<usize>,
}

impl PageStoreConfig {
    pub const fn new() -> Self {
        PageStoreConfig {
            erase_strategy: EraseStrategy::FillAndRewrite,
            scratch_budget: None,
        }
    }

    pub const fn with_erase_strategy(mut self, erase_strategy: EraseStrategy) -> Self {
        self.erase_strategy = erase_strategy;
        self
    }

    pub const fn with_scratch_budget(mut self, bytes: usize) -> Self {
        self.scratch_budget = Some(bytes);
        self
    }
}
