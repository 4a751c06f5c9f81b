//! Staging buffer and word-group transactions
//!
//! Data never crosses the monitor call boundary as a byte stream. The
//! firmware owns a small staging buffer; the caller fills it (or drains it)
//! through PUSH/PULL calls that each carry exactly [`TRANSACTION_WORDS`]
//! machine words, and the bulk READ/WRITE calls move the buffer contents to
//! or from the flash.
//!
//! Because every transaction is a whole word group, every offset and size
//! handled by the channel must be a multiple of [`ALIGNMENT`]. Both numbers
//! are defined here and nowhere else.

/// Size of one machine word carried by a monitor call (64-bit)
pub const WORD_SIZE: usize = 8;

/// Words carried by a single PUSH or PULL call
pub const TRANSACTION_WORDS: usize = 4;

/// Bytes moved by one PUSH or PULL call
pub const WORD_GROUP_SIZE: usize = WORD_SIZE * TRANSACTION_WORDS;

/// Required alignment of every flash offset and size (32 bytes)
pub const ALIGNMENT: u32 = WORD_GROUP_SIZE as u32;

/// Capacity of the firmware staging buffer, and so the largest chunk a
/// single bulk READ/WRITE/ERASE call may move
pub const STAGING_BUFFER_SIZE: usize = 1024;

/// One PUSH/PULL payload
pub type WordGroup = [u64; TRANSACTION_WORDS];

/// Pack a [`WORD_GROUP_SIZE`] byte slice into machine words
///
/// The staging buffer is little-endian memory, so word `n` holds bytes
/// `8n..8n+8` in little-endian order.
///
/// # Panics
/// Panics if `bytes` is not exactly [`WORD_GROUP_SIZE`] long.
pub fn pack_words(bytes: &[u8]) -> WordGroup {
    assert_eq!(bytes.len(), WORD_GROUP_SIZE);
    let mut words = [0u64; TRANSACTION_WORDS];
    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(WORD_SIZE)) {
        let mut raw = [0u8; WORD_SIZE];
        raw.copy_from_slice(chunk);
        *word = u64::from_le_bytes(raw);
    }
    words
}

/// Unpack machine words into a [`WORD_GROUP_SIZE`] byte slice
///
/// # Panics
/// Panics if `out` is not exactly [`WORD_GROUP_SIZE`] long.
pub fn unpack_words(words: &WordGroup, out: &mut [u8]) {
    assert_eq!(out.len(), WORD_GROUP_SIZE);
    for (word, chunk) in words.iter().zip(out.chunks_exact_mut(WORD_SIZE)) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
}

/// Cursor movement rejected by the staging buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorOverrun {
    /// Cursor position at the time of the request
    pub position: usize,
    /// Buffer capacity
    pub capacity: usize,
}

/// Fixed-capacity staging buffer with a position cursor
///
/// This is the firmware side of the word-group protocol. `push` and `pull`
/// transact one [`WordGroup`] at the cursor and advance it by
/// [`WORD_GROUP_SIZE`]; `set_position` moves the cursor explicitly. Moves
/// past the end of the buffer are rejected instead of wrapping.
#[derive(Clone)]
pub struct StagingBuffer<const N: usize = STAGING_BUFFER_SIZE> {
    data: [u8; N],
    position: usize,
}

impl<const N: usize> StagingBuffer<N> {
    /// Create a zeroed staging buffer with the cursor at 0
    pub const fn new() -> Self {
        Self {
            data: [0; N],
            position: 0,
        }
    }

    /// Buffer capacity in bytes
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Current cursor position
    pub fn position(&self) -> usize {
        self.position
    }

    /// Move the cursor
    pub fn set_position(&mut self, position: usize) -> Result<(), CursorOverrun> {
        if position > N {
            return Err(self.overrun());
        }
        self.position = position;
        Ok(())
    }

    /// Store one word group at the cursor and advance
    pub fn push(&mut self, words: &WordGroup) -> Result<(), CursorOverrun> {
        let range = self.next_group()?;
        unpack_words(words, &mut self.data[range]);
        self.position += WORD_GROUP_SIZE;
        Ok(())
    }

    /// Load one word group from the cursor and advance
    pub fn pull(&mut self) -> Result<WordGroup, CursorOverrun> {
        let range = self.next_group()?;
        let words = pack_words(&self.data[range]);
        self.position += WORD_GROUP_SIZE;
        Ok(words)
    }

    /// Raw buffer contents
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Raw buffer contents, mutable
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn next_group(&self) -> Result<core::ops::Range<usize>, CursorOverrun> {
        let end = self.position + WORD_GROUP_SIZE;
        if end > N {
            return Err(self.overrun());
        }
        Ok(self.position..end)
    }

    fn overrun(&self) -> CursorOverrun {
        CursorOverrun {
            position: self.position,
            capacity: N,
        }
    }
}

impl<const N: usize> Default for StagingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> core::fmt::Debug for StagingBuffer<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StagingBuffer")
            .field("capacity", &N)
            .field("position", &self.position)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_matches_transaction_width() {
        assert_eq!(ALIGNMENT, 32);
        assert_eq!(STAGING_BUFFER_SIZE % WORD_GROUP_SIZE, 0);
    }

    #[test]
    fn test_pack_words_is_little_endian() {
        let mut bytes = [0u8; WORD_GROUP_SIZE];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        let words = pack_words(&bytes);
        assert_eq!(words[0], 0x0706_0504_0302_0100);
        assert_eq!(words[3], 0x1F1E_1D1C_1B1A_1918);

        let mut out = [0u8; WORD_GROUP_SIZE];
        unpack_words(&words, &mut out);
        assert_eq!(out, bytes);
    }

    #[test]
    fn test_push_pull_advance_cursor() {
        let mut buf: StagingBuffer<64> = StagingBuffer::new();
        buf.push(&[1, 2, 3, 4]).unwrap();
        assert_eq!(buf.position(), 32);
        buf.push(&[5, 6, 7, 8]).unwrap();
        assert_eq!(buf.position(), 64);

        buf.set_position(0).unwrap();
        assert_eq!(buf.pull().unwrap(), [1, 2, 3, 4]);
        assert_eq!(buf.pull().unwrap(), [5, 6, 7, 8]);
    }

    #[test]
    fn test_overrun_is_rejected() {
        let mut buf: StagingBuffer<32> = StagingBuffer::new();
        buf.push(&[0; 4]).unwrap();
        assert_eq!(
            buf.push(&[0; 4]),
            Err(CursorOverrun {
                position: 32,
                capacity: 32
            })
        );
        assert!(buf.pull().is_err());
        assert!(buf.set_position(33).is_err());
        assert_eq!(buf.position(), 32);
    }
}
