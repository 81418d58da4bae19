//! Record Module
//!
//! Fixed-layout header codec for records stored in a shard's ring buffer, and
//! the coarse clock used for access and expiry timestamps.
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       4     accessed_at (seconds since base epoch)
//! 4       4     expire_at (seconds since base epoch, 0 = never)
//! 8       2     hash16
//! 10      2     key_len
//! 12      4     value_len
//! 16      4     value_cap (value_len plus spare at allocation time)
//! 20      1     tombstone
//! 21      1     chunk
//! ```
//!
//! All integers are little-endian. The header is followed by `key_len` key
//! bytes and `value_cap` value bytes.

use std::time::Duration;

use chrono::Utc;

/// Encoded header size in bytes.
pub const HEADER_SIZE: usize = 22;

/// Extra value bytes reserved so a record can grow in place.
pub const SPARE_BYTES: usize = 16;

pub(crate) const ACCESSED_AT_OFFSET: usize = 0;
pub(crate) const TOMBSTONE_OFFSET: usize = 20;

/// Base epoch for timestamps (2024-01-01 00:00:00 UTC).
const BASE_EPOCH: i64 = 1_704_067_200;

// == Record Header ==
/// Decoded form of a record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Last access time
    pub accessed_at: u32,
    /// Expiry time, 0 = never expires
    pub expire_at: u32,
    /// Secondary hash the record is indexed under
    pub hash16: u16,
    /// Key length in bytes
    pub key_len: u16,
    /// Logical value length in bytes
    pub value_len: u32,
    /// Value bytes allocated in the ring, spare included
    pub value_cap: u32,
    /// Set once the record is deleted or superseded
    pub tombstone: bool,
    /// Index chunk holding the record's entry
    pub chunk: u8,
}

impl RecordHeader {
    // == Encode ==
    /// Serializes the header into its fixed 22-byte layout.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.accessed_at.to_le_bytes());
        buf[4..8].copy_from_slice(&self.expire_at.to_le_bytes());
        buf[8..10].copy_from_slice(&self.hash16.to_le_bytes());
        buf[10..12].copy_from_slice(&self.key_len.to_le_bytes());
        buf[12..16].copy_from_slice(&self.value_len.to_le_bytes());
        buf[16..20].copy_from_slice(&self.value_cap.to_le_bytes());
        buf[TOMBSTONE_OFFSET] = u8::from(self.tombstone);
        buf[21] = self.chunk;
        buf
    }

    // == Decode ==
    /// Parses a header previously produced by [`RecordHeader::encode`].
    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Self {
        Self {
            accessed_at: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            expire_at: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            hash16: u16::from_le_bytes([buf[8], buf[9]]),
            key_len: u16::from_le_bytes([buf[10], buf[11]]),
            value_len: u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]),
            value_cap: u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]),
            tombstone: buf[TOMBSTONE_OFFSET] != 0,
            chunk: buf[21],
        }
    }

    /// Total bytes the record occupies in the ring.
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.key_len as usize + self.value_cap as usize
    }

    // == Is Expired ==
    /// Returns true once `now` is past a nonzero expiry.
    pub fn is_expired(&self, now: u32) -> bool {
        self.expire_at != 0 && now > self.expire_at
    }
}

/// Bytes a fresh record with these lengths occupies, spare included.
pub fn encoded_len(key_len: usize, value_len: usize) -> usize {
    HEADER_SIZE + key_len + value_len + SPARE_BYTES
}

// == Clock ==
/// Current time in whole seconds since the base epoch.
pub fn now_secs() -> u32 {
    let secs = Utc::now().timestamp().saturating_sub(BASE_EPOCH);
    secs.clamp(0, u32::MAX as i64) as u32
}

/// Expiry timestamp for a TTL starting at `now`; a zero TTL never expires.
///
/// Sub-second TTLs round up to a full second so a nonzero TTL never maps to
/// the "never expires" sentinel.
pub fn expire_at(now: u32, ttl: Duration) -> u32 {
    if ttl.is_zero() {
        return 0;
    }
    let mut secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 {
        secs += 1;
    }
    let secs = u32::try_from(secs).unwrap_or(u32::MAX);
    now.saturating_add(secs).max(1)
}
