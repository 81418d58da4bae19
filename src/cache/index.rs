//! Index Module
//!
//! Secondary index of a shard: 256 sorted chunks of `(hash16 -> offset)`
//! entries carved from one contiguous backing vector.
//!
//! Chunk `c` occupies slots `[c * chunk_capacity, c * chunk_capacity + len[c])`.
//! Entries inside a chunk stay sorted by `hash16` so lookups binary search for
//! the first candidate and scan the run of equal hashes.

use crate::cache::CHUNK_COUNT;

// == Index Entry ==
/// One pointer from a secondary hash to a record offset in the ring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexEntry {
    pub hash16: u16,
    pub key_len: u16,
    pub offset: u32,
}

// == Index Table ==
/// The 256 index chunks of one shard.
#[derive(Debug)]
pub struct IndexTable {
    /// Backing storage for all chunks
    entries: Vec<IndexEntry>,
    /// Number of used slots per chunk
    lens: Box<[u32]>,
    /// Slots reserved per chunk
    chunk_capacity: usize,
}

impl IndexTable {
    // == Constructor ==
    /// Creates an empty table with `chunk_capacity` slots per chunk.
    pub fn new(chunk_capacity: usize) -> Self {
        let chunk_capacity = chunk_capacity.max(1);
        Self {
            entries: vec![IndexEntry::default(); chunk_capacity * CHUNK_COUNT],
            lens: vec![0u32; CHUNK_COUNT].into_boxed_slice(),
            chunk_capacity,
        }
    }

    /// Slots currently reserved per chunk.
    pub fn chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }

    /// Total number of entries across all chunks.
    pub fn len(&self) -> usize {
        self.lens.iter().map(|&n| n as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lens.iter().all(|&n| n == 0)
    }

    // == Chunk ==
    /// The sorted, used slice of one chunk.
    pub fn chunk(&self, chunk: u8) -> &[IndexEntry] {
        let start = chunk as usize * self.chunk_capacity;
        &self.entries[start..start + self.lens[chunk as usize] as usize]
    }

    // == Lower Bound ==
    /// Position of the first entry in `chunk` whose hash is not below `hash16`.
    pub fn lower_bound(&self, chunk: u8, hash16: u16) -> usize {
        self.chunk(chunk).partition_point(|e| e.hash16 < hash16)
    }

    // == Position Of ==
    /// Finds the entry for the record stored at `offset`.
    pub fn position_of(&self, chunk: u8, hash16: u16, offset: u32) -> Option<usize> {
        let entries = self.chunk(chunk);
        let start = self.lower_bound(chunk, hash16);
        entries[start..]
            .iter()
            .take_while(|e| e.hash16 == hash16)
            .position(|e| e.offset == offset)
            .map(|i| start + i)
    }

    // == Insert ==
    /// Inserts `entry` in sorted position, growing the table if the chunk is full.
    pub fn insert(&mut self, chunk: u8, entry: IndexEntry) {
        if self.lens[chunk as usize] as usize == self.chunk_capacity {
            self.grow();
        }
        let len = self.lens[chunk as usize] as usize;
        let start = chunk as usize * self.chunk_capacity;
        let pos = self.entries[start..start + len].partition_point(|e| e.hash16 <= entry.hash16);

        self.entries
            .copy_within(start + pos..start + len, start + pos + 1);
        self.entries[start + pos] = entry;
        self.lens[chunk as usize] += 1;
    }

    // == Remove ==
    /// Removes the entry at `pos` in `chunk`, shifting the tail left.
    pub fn remove(&mut self, chunk: u8, pos: usize) -> IndexEntry {
        let len = self.lens[chunk as usize] as usize;
        let start = chunk as usize * self.chunk_capacity;
        let removed = self.entries[start + pos];

        self.entries
            .copy_within(start + pos + 1..start + len, start + pos);
        self.lens[chunk as usize] -= 1;
        removed
    }

    // == Update Offset ==
    /// Repoints the entry for a relocated record. Returns false if no entry matched.
    pub fn update_offset(&mut self, chunk: u8, hash16: u16, old: u32, new: u32) -> bool {
        match self.position_of(chunk, hash16, old) {
            Some(pos) => {
                let start = chunk as usize * self.chunk_capacity;
                self.entries[start + pos].offset = new;
                true
            }
            None => false,
        }
    }

    // == Grow ==
    /// Doubles every chunk's capacity, re-laying out the backing vector.
    fn grow(&mut self) {
        let new_capacity = self.chunk_capacity * 2;
        let mut entries = vec![IndexEntry::default(); new_capacity * CHUNK_COUNT];

        for (chunk, &len) in self.lens.iter().enumerate() {
            let old_start = chunk * self.chunk_capacity;
            let new_start = chunk * new_capacity;
            let len = len as usize;
            entries[new_start..new_start + len]
                .copy_from_slice(&self.entries[old_start..old_start + len]);
        }

        self.entries = entries;
        self.chunk_capacity = new_capacity;
    }
}
