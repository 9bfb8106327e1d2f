//! Prelude module - commonly used types for convenient import.
//!
//! Use `use banai_crypto::prelude::*;` to import all essential types.

pub use crate::{Digest, HashAlgorithm, HashError, HashResult};
pub use crate::{hash_bytes, hash_file, hash_reader};
