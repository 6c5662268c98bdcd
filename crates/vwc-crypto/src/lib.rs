//! Content hashing for the virtual working copy.
//!
//! Provides domain-separated BLAKE3 hashing. The blob domain is the content
//! identity of every tracked entry; it is computed over the entry's bytes
//! only, so a symlink hashes the same whether it was materialized as a real
//! link or as a quasi-symlink file.

pub mod hasher;

pub use hasher::ContentHasher;
