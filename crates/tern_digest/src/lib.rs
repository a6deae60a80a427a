//! Content fingerprinting for asset folders.
//!
//! A folder's fingerprint is derived from the sorted set of
//! (relative path, file digest) pairs inside it, so two folders with the
//! same paths and bytes fingerprint identically regardless of timestamps,
//! and any change to the file set or to any file's bytes changes the
//! fingerprint. MD5 is used for change detection only, not security.

mod cache;
mod digest;

pub use cache::DigestCache;
pub use digest::{file_md5, folder_md5};
