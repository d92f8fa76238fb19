//! Chunk arithmetic: which chunk holds a byte and how long each chunk is.

/// Fixed chunk size of one stored file. Every chunk but the last is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    pub chunk_size: u32,
}

/// Chunks covering an inclusive byte range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub first_chunk: u32,
    pub last_chunk: u32,
    /// Bytes dropped from the front of `first_chunk`.
    pub head_offset: usize,
    /// Bytes kept from the front of `last_chunk`.
    pub tail_len: usize,
}

impl ChunkLayout {
    pub fn new(chunk_size: u32) -> Self {
        debug_assert!(chunk_size > 0, "chunk size must be positive");
        Self { chunk_size }
    }

    pub fn chunk_index_of(&self, offset: u64) -> u64 {
        offset / self.chunk_size as u64
    }

    pub fn within_chunk_offset(&self, offset: u64) -> u64 {
        offset % self.chunk_size as u64
    }

    /// Number of chunks a file of `total_length` bytes is split into.
    pub fn chunk_count(&self, total_length: u64) -> u64 {
        total_length.div_ceil(self.chunk_size as u64)
    }

    /// Length chunk `seq` must have in a file of `total_length` bytes, or
    /// `None` when the file has no such chunk.
    pub fn chunk_len(&self, total_length: u64, seq: u32) -> Option<u64> {
        let count = self.chunk_count(total_length);
        let seq = seq as u64;
        if seq >= count {
            None
        } else if seq + 1 == count {
            Some(total_length - self.chunk_size as u64 * (count - 1))
        } else {
            Some(self.chunk_size as u64)
        }
    }

    /// Chunk span of the inclusive range `[start, end]`; `None` if `start > end`.
    pub fn span(&self, start: u64, end: u64) -> Option<ChunkSpan> {
        if start > end {
            return None;
        }
        Some(ChunkSpan {
            first_chunk: u32::try_from(self.chunk_index_of(start)).ok()?,
            last_chunk: u32::try_from(self.chunk_index_of(end)).ok()?,
            head_offset: self.within_chunk_offset(start) as usize,
            tail_len: self.within_chunk_offset(end) as usize + 1,
        })
    }
}
