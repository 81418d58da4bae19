//! Bucket Module
//!
//! One cache shard: a ring buffer of serialized records, the index chunks that
//! locate them, and the counters behind the idle-eviction heuristic.
//!
//! The live window is `[begin, begin + size)` modulo the ring capacity and
//! always holds whole records, oldest first. New records are appended at the
//! tail. When the tail runs out of room, `set` reclaims or relocates records
//! from the head until the new record fits.

use tracing::{debug, trace};

use crate::cache::index::{IndexEntry, IndexTable};
use crate::cache::record::{
    self, RecordHeader, ACCESSED_AT_OFFSET, HEADER_SIZE, SPARE_BYTES, TOMBSTONE_OFFSET,
};
use crate::cache::ring::Ring;
use crate::cache::stats::ShardStats;
use crate::cache::MAX_CONSECUTIVE_KEEPS;

/// Splits a primary hash into the secondary hash and its index chunk.
pub(crate) fn secondary_hash(hash: u32) -> (u16, u8) {
    let hash16 = (hash >> 8) as u16;
    (hash16, hash16 as u8)
}

/// A record found through the index.
#[derive(Debug, Clone, Copy)]
struct Located {
    chunk: u8,
    pos: usize,
    offset: usize,
    header: RecordHeader,
}

// == Bucket ==
/// A single shard of the cache.
#[derive(Debug)]
pub struct Bucket {
    /// Record storage
    ring: Ring,
    /// Offset of the oldest record
    begin: usize,
    /// Bytes in the live window
    size: usize,
    /// Records in the window, tombstoned ones included
    count: u64,
    /// Sum of every record's last-access timestamp
    total: u64,
    /// Secondary index
    index: IndexTable,
    stats: ShardStats,
}

impl Bucket {
    // == Constructor ==
    /// Creates an empty shard with a ring of `capacity` bytes.
    ///
    /// Callers are expected to pass at least `MIN_SHARD_CAPACITY`;
    /// [`Cache`](crate::cache::Cache) validates this before building shards.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    ///
    /// # Arguments
    /// * `capacity` - Ring size in bytes
    /// * `chunk_capacity` - Starting slots per index chunk
    pub fn new(capacity: usize, chunk_capacity: usize) -> Self {
        assert!(capacity > 0, "shard capacity must be nonzero");
        Self {
            ring: Ring::new(capacity),
            begin: 0,
            size: 0,
            count: 0,
            total: 0,
            index: IndexTable::new(chunk_capacity),
            stats: ShardStats::default(),
        }
    }

    // == Set ==
    /// Stores `value` under `key` and reports whether it was stored.
    ///
    /// Records that would take more than half the ring are dropped without
    /// touching any previous value for the key.
    ///
    /// # Arguments
    /// * `key` - Raw key bytes
    /// * `value` - Raw value bytes
    /// * `hash` - Primary hash of the key
    /// * `expire_at` - Expiry timestamp, 0 = never
    /// * `now` - Current timestamp
    pub fn set_at(
        &mut self,
        key: &[u8],
        value: &[u8],
        hash: u32,
        expire_at: u32,
        now: u32,
    ) -> bool {
        let (hash16, chunk) = secondary_hash(hash);
        let needed = record::encoded_len(key.len(), value.len());

        if needed > self.ring.capacity() / 2 || key.len() > u16::MAX as usize {
            self.stats.dropped += 1;
            debug!(
                "Dropping oversized record: key_len={}, value_len={}, capacity={}",
                key.len(),
                value.len(),
                self.ring.capacity()
            );
            return false;
        }

        if let Some(found) = self.locate(key, hash16, chunk) {
            if value.len() <= found.header.value_cap as usize {
                self.rewrite_in_place(&found, value, expire_at, now);
                return true;
            }
            self.tombstone(&found);
        }

        self.reclaim(needed, now);
        self.append(key, value, hash16, chunk, expire_at, now);
        true
    }

    // == Get ==
    /// Returns a copy of the value stored under `key` and refreshes its access time.
    ///
    /// Expired records report a miss but stay in place until a later `set`
    /// reclaims them.
    pub fn get_at(&mut self, key: &[u8], hash: u32, now: u32) -> Option<Vec<u8>> {
        let (hash16, chunk) = secondary_hash(hash);

        let found = match self.locate(key, hash16, chunk) {
            Some(found) if !found.header.tombstone && !found.header.is_expired(now) => found,
            _ => {
                self.stats.misses += 1;
                return None;
            }
        };

        let header = found.header;
        self.ring.write(
            self.ring.skip(found.offset, ACCESSED_AT_OFFSET),
            &now.to_le_bytes(),
        );
        self.total = self.total - u64::from(header.accessed_at) + u64::from(now);

        let mut value = vec![0u8; header.value_len as usize];
        self.ring.read(
            self.ring.skip(found.offset, HEADER_SIZE + header.key_len as usize),
            &mut value,
        );
        self.stats.hits += 1;
        Some(value)
    }

    // == Delete ==
    /// Tombstones the record for `key` and drops its index entry.
    ///
    /// Returns true if the key was indexed.
    pub fn del(&mut self, key: &[u8], hash: u32) -> bool {
        let (hash16, chunk) = secondary_hash(hash);
        match self.locate(key, hash16, chunk) {
            Some(found) => {
                self.tombstone(&found);
                true
            }
            None => false,
        }
    }

    // == Accessors ==
    /// Ring capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Records in the live window, tombstoned ones included.
    pub fn len(&self) -> usize {
        self.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Bytes occupied by the live window.
    pub fn used_bytes(&self) -> usize {
        self.size
    }

    /// Records reachable through the index.
    pub fn live_entries(&self) -> usize {
        self.index.len()
    }

    pub fn stats(&self) -> ShardStats {
        self.stats
    }

    // == Lookup ==
    /// Binary searches the key's chunk, then scans equal hashes comparing keys in the ring.
    fn locate(&self, key: &[u8], hash16: u16, chunk: u8) -> Option<Located> {
        let start = self.index.lower_bound(chunk, hash16);
        let candidates = self.index.chunk(chunk)[start..]
            .iter()
            .take_while(|e| e.hash16 == hash16);

        for (i, entry) in candidates.enumerate() {
            if entry.key_len as usize != key.len() {
                continue;
            }
            let offset = entry.offset as usize;
            if self.ring.matches(self.ring.skip(offset, HEADER_SIZE), key) {
                return Some(Located {
                    chunk,
                    pos: start + i,
                    offset,
                    header: self.read_header(offset),
                });
            }
        }
        None
    }

    fn read_header(&self, offset: usize) -> RecordHeader {
        let mut buf = [0u8; HEADER_SIZE];
        self.ring.read(offset, &mut buf);
        RecordHeader::decode(&buf)
    }

    // == Mutation Helpers ==
    fn rewrite_in_place(&mut self, found: &Located, value: &[u8], expire_at: u32, now: u32) {
        let header = RecordHeader {
            accessed_at: now,
            expire_at,
            value_len: value.len() as u32,
            tombstone: false,
            ..found.header
        };
        let pos = self.ring.write(found.offset, &header.encode());
        self.ring
            .write(self.ring.skip(pos, header.key_len as usize), value);
        self.total = self.total - u64::from(found.header.accessed_at) + u64::from(now);
    }

    fn tombstone(&mut self, found: &Located) {
        self.ring
            .write_byte(self.ring.skip(found.offset, TOMBSTONE_OFFSET), 1);
        self.index.remove(found.chunk, found.pos);
    }

    fn append(
        &mut self,
        key: &[u8],
        value: &[u8],
        hash16: u16,
        chunk: u8,
        expire_at: u32,
        now: u32,
    ) {
        let offset = self.ring.skip(self.begin, self.size);
        let header = RecordHeader {
            accessed_at: now,
            expire_at,
            hash16,
            key_len: key.len() as u16,
            value_len: value.len() as u32,
            value_cap: (value.len() + SPARE_BYTES) as u32,
            tombstone: false,
            chunk,
        };

        let pos = self.ring.write(offset, &header.encode());
        let pos = self.ring.write(pos, key);
        self.ring.write(pos, value);

        self.size += header.encoded_len();
        self.count += 1;
        self.total += u64::from(now);
        self.index.insert(
            chunk,
            IndexEntry {
                hash16,
                key_len: header.key_len,
                offset: offset as u32,
            },
        );
    }

    // == Reclaim ==
    /// Frees head records until `needed` bytes are available at the tail.
    ///
    /// Tombstoned, expired and idle records are reclaimed; others move to the
    /// tail. After `MAX_CONSECUTIVE_KEEPS` moves in a row the head is evicted
    /// regardless, so the loop always terminates.
    fn reclaim(&mut self, needed: usize, now: u32) {
        let mut keeps = 0;

        while self.ring.capacity() - self.size < needed {
            let header = self.read_header(self.begin);

            if header.tombstone {
                self.stats.tombstones_reclaimed += 1;
            } else if header.is_expired(now) {
                self.stats.expirations += 1;
                self.unindex_head(&header);
            } else if self.is_idle(&header) {
                self.stats.evictions += 1;
                self.unindex_head(&header);
            } else if keeps >= MAX_CONSECUTIVE_KEEPS {
                trace!("Forcing eviction after {} consecutive keeps", keeps);
                self.stats.evictions += 1;
                self.stats.forced_evictions += 1;
                self.unindex_head(&header);
            } else {
                self.relocate_head(&header);
                keeps += 1;
                continue;
            }

            self.release_head(&header);
            keeps = 0;
        }
    }

    /// Below-average recency, weighted by the number of records.
    fn is_idle(&self, header: &RecordHeader) -> bool {
        u64::from(header.accessed_at) * self.count <= self.total
    }

    fn unindex_head(&mut self, header: &RecordHeader) {
        if let Some(pos) = self
            .index
            .position_of(header.chunk, header.hash16, self.begin as u32)
        {
            self.index.remove(header.chunk, pos);
        }
    }

    fn release_head(&mut self, header: &RecordHeader) {
        let len = header.encoded_len();
        self.begin = self.ring.skip(self.begin, len);
        self.size -= len;
        self.count -= 1;
        self.total -= u64::from(header.accessed_at);
    }

    /// Moves the head record to the tail; the window size is unchanged.
    fn relocate_head(&mut self, header: &RecordHeader) {
        let len = header.encoded_len();
        let old = self.begin;
        let tail = self.ring.skip(self.begin, self.size);

        self.ring.copy_within(old, tail, len);
        self.begin = self.ring.skip(old, len);
        self.index
            .update_offset(header.chunk, header.hash16, old as u32, tail as u32);
        self.stats.relocations += 1;
    }

    // == Test Helpers ==
    /// Offset of the indexed record for `key`.
    #[cfg(test)]
    pub(crate) fn offset_of(&self, key: &[u8], hash: u32) -> Option<usize> {
        let (hash16, chunk) = secondary_hash(hash);
        self.locate(key, hash16, chunk).map(|found| found.offset)
    }

    /// Walks the window and checks it against the counters and the index.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let mut pos = self.begin;
        let mut walked = 0;
        let mut count = 0u64;
        let mut total = 0u64;
        let mut live = 0;

        while walked < self.size {
            let header = self.read_header(pos);
            let len = header.encoded_len();
            assert!(len <= self.ring.capacity() / 2, "record at {} too large", pos);
            assert!(header.value_len <= header.value_cap);
            assert_eq!(header.chunk, header.hash16 as u8);

            let indexed = self
                .index
                .position_of(header.chunk, header.hash16, pos as u32)
                .is_some();
            assert_eq!(indexed, !header.tombstone, "index mismatch at {}", pos);
            if indexed {
                live += 1;
            }

            count += 1;
            total += u64::from(header.accessed_at);
            walked += len;
            pos = self.ring.skip(pos, len);
        }

        assert_eq!(walked, self.size, "window does not end on a record boundary");
        assert_eq!(count, self.count);
        assert_eq!(total, self.total);
        assert_eq!(live, self.index.len());

        for chunk in 0..=u8::MAX {
            let entries = self.index.chunk(chunk);
            assert!(entries.windows(2).all(|w| w[0].hash16 <= w[1].hash16));
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::hash_key;

    fn bucket(capacity: usize) -> Bucket {
        Bucket::new(capacity, 4)
    }

    fn set(b: &mut Bucket, key: &str, value: &[u8], now: u32) -> bool {
        b.set_at(key.as_bytes(), value, hash_key(key.as_bytes()), 0, now)
    }

    fn get(b: &mut Bucket, key: &str, now: u32) -> Option<Vec<u8>> {
        b.get_at(key.as_bytes(), hash_key(key.as_bytes()), now)
    }

    #[test]
    fn test_bucket_new() {
        let b = bucket(1024);
        assert_eq!(b.capacity(), 1024);
        assert!(b.is_empty());
        assert_eq!(b.used_bytes(), 0);
        b.assert_consistent();
    }

    #[test]
    fn test_set_and_get() {
        let mut b = bucket(1024);
        assert!(set(&mut b, "key1", b"value1", 10));

        assert_eq!(get(&mut b, "key1", 11), Some(b"value1".to_vec()));
        assert_eq!(b.len(), 1);
        assert_eq!(b.used_bytes(), record::encoded_len(4, 6));
        b.assert_consistent();
    }

    #[test]
    fn test_get_nonexistent() {
        let mut b = bucket(1024);
        assert_eq!(get(&mut b, "missing", 1), None);
        assert_eq!(b.stats().misses, 1);
    }

    #[test]
    fn test_get_refreshes_access_time() {
        let mut b = bucket(1024);
        set(&mut b, "a", b"1", 10);
        set(&mut b, "b", b"2", 10);

        get(&mut b, "a", 50);

        assert_eq!(b.total, 60);
        b.assert_consistent();
    }

    #[test]
    fn test_in_place_update() {
        let mut b = bucket(1024);
        let hash = hash_key(b"key");
        set(&mut b, "key", b"0123456789", 1);
        let offset = b.offset_of(b"key", hash);
        let used = b.used_bytes();

        // Up to the original length plus spare fits the old slot
        let bigger = vec![b'z'; 10 + SPARE_BYTES];
        assert!(set(&mut b, "key", &bigger, 2));

        assert_eq!(get(&mut b, "key", 3), Some(bigger));
        assert_eq!(b.offset_of(b"key", hash), offset);
        assert_eq!(b.len(), 1);
        assert_eq!(b.used_bytes(), used);
        b.assert_consistent();

        assert!(set(&mut b, "key", b"tiny", 4));
        assert_eq!(get(&mut b, "key", 5), Some(b"tiny".to_vec()));
        assert_eq!(b.offset_of(b"key", hash), offset);
    }

    #[test]
    fn test_grow_path_appends_new_record() {
        let mut b = bucket(1024);
        let hash = hash_key(b"key");
        set(&mut b, "key", b"small", 1);
        let offset = b.offset_of(b"key", hash);

        let large = vec![b'L'; 200];
        assert!(set(&mut b, "key", &large, 2));

        assert_eq!(get(&mut b, "key", 3), Some(large));
        assert_ne!(b.offset_of(b"key", hash), offset);
        // Old slot stays behind as a tombstone
        assert_eq!(b.len(), 2);
        assert_eq!(b.live_entries(), 1);
        b.assert_consistent();
    }

    #[test]
    fn test_expired_record_misses_but_stays() {
        let mut b = bucket(1024);
        let hash = hash_key(b"session");
        b.set_at(b"session", b"token", hash, 105, 100);

        assert_eq!(b.get_at(b"session", hash, 105), Some(b"token".to_vec()));
        assert_eq!(b.get_at(b"session", hash, 106), None);

        // Lazy expiry: still in the window and the index
        assert_eq!(b.len(), 1);
        assert_eq!(b.live_entries(), 1);
        b.assert_consistent();
    }

    #[test]
    fn test_expired_record_reclaimed_under_pressure() {
        let mut b = bucket(1024);
        let hash = hash_key(b"old");
        b.set_at(b"old", &[1u8; 200], hash, 20, 10);

        // Fill the rest so the next set must reclaim from the head
        for i in 0..4 {
            set(&mut b, &format!("fill{}", i), &[2u8; 200], 30 + i);
        }

        assert_eq!(b.stats().expirations, 1);
        assert_eq!(b.get_at(b"old", hash, 40), None);
        b.assert_consistent();
    }

    #[test]
    fn test_delete() {
        let mut b = bucket(1024);
        set(&mut b, "key1", b"value1", 1);

        assert!(b.del(b"key1", hash_key(b"key1")));
        assert_eq!(get(&mut b, "key1", 2), None);
        assert_eq!(b.live_entries(), 0);
        // Tombstone waits for a later set to reclaim it
        assert_eq!(b.len(), 1);
        b.assert_consistent();

        assert!(!b.del(b"key1", hash_key(b"key1")));
    }

    #[test]
    fn test_delete_scenario_small_shard() {
        let mut b = bucket(1024);
        let key = "xxxxxxxxxxxxxxx";
        set(&mut b, key, &[7u8; 34], 1);
        b.del(key.as_bytes(), hash_key(key.as_bytes()));

        assert_eq!(get(&mut b, key, 2), None);
    }

    #[test]
    fn test_oversized_record_dropped() {
        let mut b = bucket(1024);
        let value = vec![0u8; 512];

        assert!(!set(&mut b, "big", &value, 1));
        assert_eq!(get(&mut b, "big", 2), None);
        assert!(b.is_empty());
        assert_eq!(b.stats().dropped, 1);
    }

    #[test]
    fn test_oversized_set_keeps_previous_value() {
        let mut b = bucket(1024);
        set(&mut b, "key", b"old", 1);

        assert!(!set(&mut b, "key", &[0u8; 600], 2));
        assert_eq!(get(&mut b, "key", 3), Some(b"old".to_vec()));
        assert_eq!(b.stats().dropped, 1);
        assert_eq!(b.len(), 1);
        b.assert_consistent();
    }

    #[test]
    fn test_size_limit_counts_header_and_spare() {
        let mut b = bucket(1024);
        // key + value alone fit in half the ring, the encoded record does not
        let value = vec![1u8; 512 - 10 - 3];
        assert_eq!(3 + value.len(), 1024 / 2 - 10);

        assert!(!set(&mut b, "key", &value, 1));
        assert_eq!(get(&mut b, "key", 2), None);
        assert_eq!(b.stats().dropped, 1);
    }

    #[test]
    #[should_panic(expected = "shard capacity must be nonzero")]
    fn test_zero_capacity_rejected() {
        Bucket::new(0, 4);
    }

    #[test]
    fn test_largest_accepted_record() {
        let mut b = bucket(1024);
        let value_len = 512 - record::encoded_len(3, 0);

        assert!(set(&mut b, "max", &vec![9u8; value_len], 1));
        assert_eq!(b.used_bytes(), 512);
        assert!(!set(&mut b, "max", &vec![9u8; value_len + 1 + SPARE_BYTES], 2));
    }

    #[test]
    fn test_collisions_share_chunk() {
        let mut b = bucket(4096);
        let hash = 0x00AB_CD00;
        let keys: Vec<String> = (0..20).map(|i| format!("collide-{}", i)).collect();

        for (i, key) in keys.iter().enumerate() {
            assert!(b.set_at(key.as_bytes(), key.as_bytes(), hash, 0, i as u32 + 1));
        }
        // All twenty land in one chunk, forcing the index to grow
        assert!(b.index.chunk_capacity() >= 20);

        for key in keys.iter().step_by(2) {
            assert!(b.del(key.as_bytes(), hash));
        }

        for (i, key) in keys.iter().enumerate() {
            let got = b.get_at(key.as_bytes(), hash, 100);
            if i % 2 == 0 {
                assert_eq!(got, None, "{} should be deleted", key);
            } else {
                assert_eq!(got.as_deref(), Some(key.as_bytes()));
            }
        }
        b.assert_consistent();
    }

    #[test]
    fn test_recency_biased_eviction() {
        let mut b = bucket(1024);
        set(&mut b, "hot", b"keep-me!", 0);

        for now in 1..200u32 {
            let key = format!("k{:03}", now);
            assert!(set(&mut b, &key, b"filler!!", now));
            assert_eq!(get(&mut b, "hot", now), Some(b"keep-me!".to_vec()));
            b.assert_consistent();
        }

        assert_eq!(get(&mut b, "k001", 200), None);
        assert_eq!(get(&mut b, "k199", 200), Some(b"filler!!".to_vec()));
        assert!(b.stats().evictions > 0);
        assert!(b.stats().relocations > 0);
        assert_eq!(b.stats().forced_evictions, 0);
    }

    #[test]
    fn test_forced_eviction_after_consecutive_keeps() {
        let mut b = bucket(1024);
        for key in ["h1", "h2", "h3", "h4", "h5"] {
            set(&mut b, key, &[1u8; 10], 1);
        }
        for i in 0..10 {
            set(&mut b, &format!("c{}", i), &[2u8; 10], 1);
        }
        for key in ["h1", "h2", "h3", "h4", "h5"] {
            get(&mut b, key, 100);
        }
        assert_eq!(b.used_bytes(), 15 * record::encoded_len(2, 10));

        // Needs a few more bytes than the free tail holds
        assert!(set(&mut b, "new", &[3u8; 240], 100));

        let stats = b.stats();
        assert_eq!(stats.relocations, 4);
        assert_eq!(stats.forced_evictions, 1);
        assert_eq!(get(&mut b, "h5", 101), None);
        for key in ["h1", "h2", "h3", "h4", "c0", "c9", "new"] {
            assert!(get(&mut b, key, 101).is_some(), "{} should survive", key);
        }
        b.assert_consistent();
    }

    #[test]
    fn test_tombstones_reclaimed_first() {
        let mut b = bucket(1024);
        for i in 0..4 {
            set(&mut b, &format!("t{}", i), &[0u8; 200], 1);
        }
        for i in 0..4 {
            let key = format!("t{}", i);
            b.del(key.as_bytes(), hash_key(key.as_bytes()));
        }

        assert!(set(&mut b, "fresh", &[1u8; 200], 2));
        assert!(b.stats().tombstones_reclaimed >= 1);
        assert_eq!(b.stats().evictions, 0);
        b.assert_consistent();
    }

    #[test]
    fn test_wraparound_keeps_records_readable() {
        let mut b = bucket(256);
        for now in 0..100u32 {
            let key = format!("w{}", now % 7);
            let value = vec![now as u8; (now as usize * 13) % 60];
            assert!(set(&mut b, &key, &value, now));
            assert_eq!(get(&mut b, &key, now), Some(value));
            b.assert_consistent();
        }
    }
}
