//! Scoped temporary storage with guaranteed secure deletion.
//!
//! Every temp allocation is owned by the scope that created it. Dropping the
//! scope overwrites file contents with random bytes before unlinking, on all
//! exit paths including panics and cancellation. Files are created with
//! owner-only permissions; directories with 0700.

pub mod temp;

pub use temp::{SecureTempDir, SecureTempFile};
