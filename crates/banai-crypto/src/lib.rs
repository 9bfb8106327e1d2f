//! Banai Crypto - Content hashing for the Banai script host.
//!
//! This crate provides:
//! - MD5, SHA-1 and SHA-256 digests over buffers, readers and files
//! - Chunked streaming so large files are never loaded whole
//! - Hex encoding of digests
//!
//! # Example
//!
//! ```
//! use banai_crypto::{HashAlgorithm, hash_bytes};
//!
//! let digest = hash_bytes(HashAlgorithm::Sha256, b"important data");
//! println!("sha256: {}", digest.to_hex());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod hash;

pub use error::{HashError, HashResult};
pub use hash::{CHUNK_SIZE, Digest, HashAlgorithm, hash_bytes, hash_file, hash_reader};
