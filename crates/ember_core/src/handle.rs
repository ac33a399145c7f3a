//! # Generational Keys
//!
//! Keys are lightweight identifiers consisting of:
//! - An index into slot storage
//! - A generation counter for safe reuse

/// Stable reference to a slot in a [`SlotDirectory`](crate::SlotDirectory).
///
/// The key is split into two parts:
/// - Lower 32 bits: Index into slot storage
/// - Upper 32 bits: Generation counter for detecting stale references
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SlotKey(u64);

impl SlotKey {
    /// Creates a new key from index and generation.
    ///
    /// # Arguments
    ///
    /// * `index` - The index into slot storage (0 to 2^32-1)
    /// * `generation` - The generation counter (0 to 2^32-1)
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the index portion of the key.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation portion of the key.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Null/invalid key.
    pub const NULL: Self = Self(u64::MAX);

    /// Checks if this key is null/invalid.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }
}

impl Default for SlotKey {
    fn default() -> Self {
        Self::NULL
    }
}
