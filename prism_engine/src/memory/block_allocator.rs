/// Best-fit free-list allocator over a linear byte range
///
/// The block list is kept sorted by offset and always covers `[0, total)` with
/// no gaps. Allocation picks the smallest free block that fits (ties go to the
/// lowest offset) and splits off the remainder as a new free block. Freeing
/// merges the block with free neighbours, so two free blocks are never
/// adjacent.

use crate::engine_bail;
use crate::error::{Error, Result};

/// One contiguous range of the managed buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub offset: u64,
    pub size: u64,
    pub free: bool,
}

impl Block {
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

#[derive(Debug, Clone)]
pub struct BlockAllocator {
    /// Diagnostic name used in error messages
    name: String,
    total: u64,
    blocks: Vec<Block>,
}

impl BlockAllocator {
    /// Create an allocator managing `total` bytes, initially one free block
    pub fn new(name: impl Into<String>, total: u64) -> Self {
        let blocks = if total > 0 {
            vec![Block { offset: 0, size: total, free: true }]
        } else {
            Vec::new()
        };
        Self { name: name.into(), total, blocks }
    }

    /// Allocate `size` bytes and return their offset
    pub fn allocate(&mut self, size: u64) -> Result<u64> {
        if size == 0 {
            engine_bail!("prism::BlockAllocator" => Error::InvalidResource,
                "[{}] zero-sized allocation", self.name);
        }

        let Some(index) = self.best_fit(size) else {
            engine_bail!("prism::BlockAllocator" => Error::ResourceExhausted,
                "[{}] no free block of {} bytes (free {} of {} bytes in {} blocks)",
                self.name, size, self.free_bytes(), self.total, self.blocks.len());
        };

        let block = &mut self.blocks[index];
        let offset = block.offset;
        let remainder = block.size - size;
        block.size = size;
        block.free = false;

        if remainder > 0 {
            self.blocks.insert(index + 1, Block { offset: offset + size, size: remainder, free: true });
        }
        Ok(offset)
    }

    /// Release the allocation starting at `offset`, merging it with free neighbours
    pub fn free(&mut self, offset: u64) -> Result<()> {
        let Ok(mut index) = self.blocks.binary_search_by_key(&offset, |b| b.offset) else {
            engine_bail!("prism::BlockAllocator" => Error::InvalidResource,
                "[{}] no allocation starts at offset {}", self.name, offset);
        };
        if self.blocks[index].free {
            engine_bail!("prism::BlockAllocator" => Error::InvalidResource,
                "[{}] double free at offset {}", self.name, offset);
        }
        self.blocks[index].free = true;

        if index + 1 < self.blocks.len() && self.blocks[index + 1].free {
            let next = self.blocks.remove(index + 1);
            self.blocks[index].size += next.size;
        }
        if index > 0 && self.blocks[index - 1].free {
            let current = self.blocks.remove(index);
            index -= 1;
            self.blocks[index].size += current.size;
        }
        Ok(())
    }

    /// Smallest free block with at least `size` bytes
    fn best_fit(&self, size: u64) -> Option<usize> {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| b.free && b.size >= size)
            .min_by_key(|(_, b)| (b.size, b.offset))
            .map(|(i, _)| i)
    }

    /// Size of the allocation starting at `offset`
    pub fn allocation_size(&self, offset: u64) -> Option<u64> {
        self.blocks
            .binary_search_by_key(&offset, |b| b.offset)
            .ok()
            .map(|i| self.blocks[i])
            .filter(|b| !b.free)
            .map(|b| b.size)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn total_size(&self) -> u64 {
        self.total
    }

    pub fn used_bytes(&self) -> u64 {
        self.blocks.iter().filter(|b| !b.free).map(|b| b.size).sum()
    }

    pub fn free_bytes(&self) -> u64 {
        self.total - self.used_bytes()
    }

    /// Size of the largest free block
    pub fn largest_free_block(&self) -> u64 {
        self.blocks.iter().filter(|b| b.free).map(|b| b.size).max().unwrap_or(0)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
#[path = "block_allocator_tests.rs"]
mod tests;
