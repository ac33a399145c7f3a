//! # EMBER Core
//!
//! Foundation data structures shared across the engine:
//! - Generational keys (`SlotKey`) for stable references into storage that
//!   swap-deletes and reuses slots
//! - A growable slot directory (`SlotDirectory`) with O(1) allocate/free
//!
//! ## Architecture Rules
//!
//! 1. **No raw pointers across subsystems** - External references are keys,
//!    never addresses into resizable arrays
//! 2. **Stale keys never alias** - Freeing a slot bumps its generation, so a
//!    key held past its lifetime resolves to nothing instead of to whatever
//!    reused the slot
//! 3. **O(1) everything** - Allocation pops a free list, freeing pushes it
//!
//! ## Example
//!
//! ```rust,ignore
//! use ember_core::SlotDirectory;
//!
//! let mut directory: SlotDirectory<u32> = SlotDirectory::new();
//! let key = directory.insert(7);
//! assert_eq!(directory.get(key), Some(&7));
//! directory.remove(key);
//! assert_eq!(directory.get(key), None);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod handle;
pub mod slot;

pub use handle::SlotKey;
pub use slot::SlotDirectory;
