//! Client-side stream size ceiling.

/// Tracks how many bytes the source has supplied and decides whether the
/// next chunk may still be sent.
///
/// A ceiling of `0` means unlimited. Otherwise the first chunk that would
/// push the running total past the ceiling is dropped and streaming ends
/// at the preceding chunk boundary. The daemon may still enforce a lower
/// limit of its own.
#[derive(Debug, Clone)]
pub struct SizeGuard {
    ceiling: u64,
    supplied: u64,
    sent: u64,
    truncated: bool,
}

impl SizeGuard {
    /// Creates a guard with the given ceiling in bytes.
    pub fn new(ceiling: u64) -> Self {
        Self {
            ceiling,
            supplied: 0,
            sent: 0,
            truncated: false,
        }
    }

    /// Creates a guard that never truncates.
    pub fn unlimited() -> Self {
        Self::new(0)
    }

    /// Accounts for a chunk of `len` bytes read from the source.
    ///
    /// Returns `true` if the chunk should be sent.
    pub fn admit(&mut self, len: usize) -> bool {
        if self.truncated {
            return false;
        }
        self.supplied += len as u64;
        if self.ceiling != 0 && self.supplied > self.ceiling {
            self.truncated = true;
            return false;
        }
        self.sent += len as u64;
        true
    }

    /// Returns the configured ceiling (`0` = unlimited).
    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }

    /// Returns `true` if no ceiling is configured.
    pub fn is_unlimited(&self) -> bool {
        self.ceiling == 0
    }

    /// Bytes read from the source so far, including a refused chunk.
    pub fn supplied(&self) -> u64 {
        self.supplied
    }

    /// Bytes admitted for sending.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Returns `true` once a chunk has been refused.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl Default for SizeGuard {
    fn default() -> Self {
        Self::unlimited()
    }
}
