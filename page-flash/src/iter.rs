use core::ops::Range;

use crate::{ByteAddress, ColumnAddress, PageIndex};

/// The part of a byte range that falls within a single page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PageChunk {
    /// Page the chunk lives in
    pub page: PageIndex,
    /// First byte of the chunk within the page
    pub column: ColumnAddress,
    /// First byte of the chunk within the caller's buffer
    pub offset: usize,
    /// Number of bytes in the chunk
    pub len: usize,
    pub(crate) page_size: u32,
}

impl PageChunk {
    /// True if the chunk covers every byte of its page
    pub fn is_full_page(&self) -> bool {
        self.column.as_u32() == 0 && self.len == self.page_size as usize
    }

    /// Range of the chunk within the caller's buffer
    pub fn buffer_range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }

    /// Range of the chunk within the page
    pub fn page_range(&self) -> Range<usize> {
        self.column.as_usize()..self.column.as_usize() + self.len
    }
}

/// Split a byte range into per page chunks, in ascending page order.
///
/// The first and last chunk may be partial pages, everything in between is
/// a whole page.
#[derive(Debug, Clone)]
pub struct PageSpan {
    pub(crate) cursor: ByteAddress,
    pub(crate) offset: usize,
    pub(crate) remaining: usize,
    pub(crate) page_size: u32,
}

impl PageSpan {
    /// `page_size` must be non zero.
    pub fn new(start: ByteAddress, length: usize, page_size: u32) -> Self {
        PageSpan {
            cursor: start,
            offset: 0,
            remaining: length,
            page_size,
        }
    }
}

impl Iterator for PageSpan {
    type Item = PageChunk;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let column = self.cursor.as_column_address(self.page_size);
        let left_in_page = (self.page_size - column.as_u32()) as usize;
        let len = left_in_page.min(self.remaining);
        let chunk = PageChunk {
            page: self.cursor.as_page_index(self.page_size),
            column,
            offset: self.offset,
            len,
            page_size: self.page_size,
        };
        self.cursor += len as u32;
        self.offset += len;
        self.remaining -= len;
        Some(chunk)
    }
}

/// Iterate over page indices in `[start, end)`
#[derive(Debug, Clone)]
pub struct PageRange {
    pub(crate) next: u32,
    pub(crate) end: u32,
}

impl PageRange {
    pub fn new(start: PageIndex, end: PageIndex) -> Self {
        PageRange {
            next: start.as_u32(),
            end: end.as_u32(),
        }
    }

    /// Pages holding the bytes `[start, start + length)`, end exclusive.
    ///
    /// For a page aligned range this is exactly the pages of the range.
    pub fn covering(start: ByteAddress, length: u32, page_size: u32) -> Self {
        let first = start.as_page_index(page_size);
        let end = (start + length).as_u32().div_ceil(page_size);
        PageRange::new(first, PageIndex::new(end))
    }
}

impl Iterator for PageRange {
    type Item = PageIndex;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next < self.end {
            let page = PageIndex::new(self.next);
            self.next += 1;
            Some(page)
        } else {
            None
        }
    }
}
