// Single-slot match table and match extension for the block encoder.
//
// The table maps a multiplicative hash of the 4-byte fingerprint at a
// position to the most recent position that produced the same hash. There is
// no chaining: a colliding insert overwrites the slot. Stored values carry
// HASH_CKOFFSET so that 0 means "empty bucket".

/// Multiplier for the 32-bit fingerprint hash.
pub const HASH_MULT_32: u32 = 0x1e35_a7bd;

/// Offset added to stored positions so 0 means "empty bucket".
pub const HASH_CKOFFSET: u32 = 1;

/// Smallest table (log2).
pub const MIN_TABLE_BITS: u32 = 8;

/// Largest table (log2). 16K slots of u32 is 64 KiB.
pub const MAX_TABLE_BITS: u32 = 14;

/// Read the 4-byte little-endian fingerprint at `pos`.
#[inline(always)]
pub fn load_u32(src: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([src[pos], src[pos + 1], src[pos + 2], src[pos + 3]])
}

// ---------------------------------------------------------------------------
// MatchTable
// ---------------------------------------------------------------------------

/// Hash table from fingerprint hash to last-seen position.
///
/// The backing allocation is kept across `reset` calls so one table can
/// serve every fragment of every block a stream encodes.
pub struct MatchTable {
    /// Bucket array: `slots[bucket] = pos + HASH_CKOFFSET` or 0 (empty).
    slots: Vec<u32>,
    /// `32 - log2(active size)`.
    shift: u32,
    /// Number of buckets in use for the current fragment.
    active: usize,
}

impl MatchTable {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            shift: 32 - MIN_TABLE_BITS,
            active: 0,
        }
    }

    /// Size and clear the table for a fragment of `input_len` bytes.
    ///
    /// The bucket count is the smallest power of two covering the input,
    /// clamped to `[2^MIN_TABLE_BITS, 2^MAX_TABLE_BITS]`.
    pub fn reset(&mut self, input_len: usize) {
        let mut bits = MIN_TABLE_BITS;
        while bits < MAX_TABLE_BITS && (1usize << bits) < input_len {
            bits += 1;
        }
        let size = 1usize << bits;
        if self.slots.len() < size {
            self.slots.resize(size, 0);
        }
        self.slots[..size].fill(0);
        self.active = size;
        self.shift = 32 - bits;
    }

    /// Bucket index for a fingerprint.
    #[inline(always)]
    pub fn bucket(&self, fingerprint: u32) -> usize {
        (fingerprint.wrapping_mul(HASH_MULT_32) >> self.shift) as usize
    }

    /// Store `pos` for `fingerprint`, returning the previous occupant.
    #[inline(always)]
    pub fn replace(&mut self, fingerprint: u32, pos: usize) -> Option<usize> {
        let bucket = self.bucket(fingerprint);
        let old = std::mem::replace(&mut self.slots[bucket], pos as u32 + HASH_CKOFFSET);
        old.checked_sub(HASH_CKOFFSET).map(|p| p as usize)
    }

    /// Store `pos` for `fingerprint`, discarding the previous occupant.
    #[inline(always)]
    pub fn insert(&mut self, fingerprint: u32, pos: usize) {
        let bucket = self.bucket(fingerprint);
        self.slots[bucket] = pos as u32 + HASH_CKOFFSET;
    }

    /// Bucket count in use.
    pub fn size(&self) -> usize {
        self.active
    }
}

impl Default for MatchTable {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Match extension
// ---------------------------------------------------------------------------

/// Extend a match forward.
///
/// Returns the largest `k <= src.len()` such that `src[i..i + (k - j)]` equals
/// `src[j..k]`. Requires `i < j <= src.len()`.
///
/// Compares 8 bytes at a time and finishes the tail byte-by-byte; the result
/// is identical to [`extend_match_scalar`].
#[inline]
pub fn extend_match(src: &[u8], mut i: usize, mut j: usize) -> usize {
    debug_assert!(i < j && j <= src.len());
    while j + 8 <= src.len() {
        let diff = load_u64(src, i) ^ load_u64(src, j);
        if diff != 0 {
            return j + (diff.trailing_zeros() / 8) as usize;
        }
        i += 8;
        j += 8;
    }
    extend_match_scalar(src, i, j)
}

#[inline(always)]
fn load_u64(src: &[u8], pos: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&src[pos..pos + 8]);
    u64::from_le_bytes(word)
}

/// Byte-by-byte reference implementation of [`extend_match`].
#[inline]
pub fn extend_match_scalar(src: &[u8], mut i: usize, mut j: usize) -> usize {
    while j < src.len() && src[i] == src[j] {
        i += 1;
        j += 1;
    }
    j
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_sizes_are_clamped() {
        let mut t = MatchTable::new();
        t.reset(0);
        assert_eq!(t.size(), 1 << MIN_TABLE_BITS);
        t.reset(300);
        assert_eq!(t.size(), 512);
        t.reset(1 << 12);
        assert_eq!(t.size(), 1 << 12);
        t.reset(1 << 20);
        assert_eq!(t.size(), 1 << MAX_TABLE_BITS);
    }

    #[test]
    fn buckets_stay_in_range() {
        let mut t = MatchTable::new();
        for len in [10usize, 1000, 70_000] {
            t.reset(len);
            for fp in [0u32, 1, 0xdead_beef, u32::MAX] {
                assert!(t.bucket(fp) < t.size());
            }
        }
    }

    #[test]
    fn replace_returns_previous_position() {
        let mut t = MatchTable::new();
        t.reset(1024);
        assert_eq!(t.replace(42, 0), None);
        assert_eq!(t.replace(42, 7), Some(0));
        assert_eq!(t.replace(42, 9), Some(7));
    }

    #[test]
    fn reset_clears_entries() {
        let mut t = MatchTable::new();
        t.reset(1024);
        t.insert(5, 100);
        t.reset(1024);
        assert_eq!(t.replace(5, 1), None);
    }

    #[test]
    fn extend_match_agrees_with_scalar() {
        let mut data: Vec<u8> = (0..200u32).map(|i| (i % 23) as u8).collect();
        data[150] = 0xff;
        for i in 0..40 {
            for j in (i + 1)..60 {
                assert_eq!(
                    extend_match(&data, i, j),
                    extend_match_scalar(&data, i, j),
                    "i={i} j={j}"
                );
            }
        }
    }

    #[test]
    fn extend_match_runs_to_end() {
        let data = vec![9u8; 37];
        assert_eq!(extend_match(&data, 0, 1), 37);
        assert_eq!(extend_match(&data, 3, 37), 37);
    }

    #[test]
    fn load_is_little_endian() {
        assert_eq!(load_u32(&[1, 2, 3, 4, 5], 1), 0x0504_0302);
    }
}
