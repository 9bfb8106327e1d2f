//! Content hashing with MD5, SHA-1 and SHA-256.
//!
//! Files and readers are consumed in fixed-size chunks so arbitrarily large
//! inputs never have to be held in memory.

use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::Digest as _;

use crate::error::{HashError, HashResult};

/// Chunk size used when streaming readers and files.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// MD5 (128-bit). Integrity checks only, not collision resistant.
    Md5,
    /// SHA-1 (160-bit).
    Sha1,
    /// SHA-256 (256-bit).
    Sha256,
}

impl HashAlgorithm {
    /// Lower-case algorithm name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }

    /// Digest length in bytes.
    #[must_use]
    pub const fn digest_len(self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha1 => 20,
            Self::Sha256 => 32,
        }
    }

    fn hasher(self) -> Hasher {
        match self {
            Self::Md5 => Hasher::Md5(md5::Md5::new()),
            Self::Sha1 => Hasher::Sha1(sha1::Sha1::new()),
            Self::Sha256 => Hasher::Sha256(sha2::Sha256::new()),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha1" | "sha-1" => Ok(Self::Sha1),
            "sha256" | "sha-256" => Ok(Self::Sha256),
            other => Err(HashError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

enum Hasher {
    Md5(md5::Md5),
    Sha1(sha1::Sha1),
    Sha256(sha2::Sha256),
}

impl Hasher {
    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(h) => h.update(data),
            Self::Sha1(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
        }
    }

    fn finalize(self) -> Vec<u8> {
        match self {
            Self::Md5(h) => h.finalize().to_vec(),
            Self::Sha1(h) => h.finalize().to_vec(),
            Self::Sha256(h) => h.finalize().to_vec(),
        }
    }
}

/// A computed digest together with the algorithm that produced it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    algorithm: HashAlgorithm,
    bytes: Vec<u8>,
}

impl Digest {
    /// Algorithm used.
    #[must_use]
    pub const fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lower-case hex encoding.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({}:{})", self.algorithm, self.to_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Digest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Hash an in-memory buffer.
#[must_use]
pub fn hash_bytes(algorithm: HashAlgorithm, data: &[u8]) -> Digest {
    let mut hasher = algorithm.hasher();
    hasher.update(data);
    Digest {
        algorithm,
        bytes: hasher.finalize(),
    }
}

/// Hash everything a reader yields, [`CHUNK_SIZE`] bytes at a time.
///
/// # Errors
///
/// Returns [`HashError::Io`] if the reader fails.
pub fn hash_reader<R: Read>(algorithm: HashAlgorithm, reader: R) -> HashResult<Digest> {
    stream(algorithm, reader, Path::new(""))
}

/// Hash a file on disk without loading it fully into memory.
///
/// # Errors
///
/// Returns [`HashError::NotFound`] if the file does not exist,
/// [`HashError::NotAFile`] if the path is a directory or special file, and
/// [`HashError::Io`] on read failure.
pub fn hash_file(algorithm: HashAlgorithm, path: &Path) -> HashResult<Digest> {
    let metadata = std::fs::metadata(path).map_err(|e| io_error(path, e))?;
    if !metadata.is_file() {
        return Err(HashError::NotAFile(path.to_path_buf()));
    }
    let file = File::open(path).map_err(|e| io_error(path, e))?;
    stream(algorithm, file, path)
}

fn stream<R: Read>(algorithm: HashAlgorithm, mut reader: R, path: &Path) -> HashResult<Digest> {
    let mut hasher = algorithm.hasher();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::Interrupted => {},
            Err(e) => return Err(io_error(path, e)),
        }
    }
    Ok(Digest {
        algorithm,
        bytes: hasher.finalize(),
    })
}

fn io_error(path: &Path, source: std::io::Error) -> HashError {
    if source.kind() == ErrorKind::NotFound {
        HashError::NotFound(path.to_path_buf())
    } else {
        HashError::Io {
            path: PathBuf::from(path),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_line123_vectors() {
        assert_eq!(
            hash_bytes(HashAlgorithm::Md5, b"line123").to_hex(),
            "562357d95918fbcb430b27bdca4d0677"
        );
        assert_eq!(
            hash_bytes(HashAlgorithm::Sha1, b"line123").to_hex(),
            "d9707a4c860e3be64fb99aa5f2830b0d126844f9"
        );
        assert_eq!(
            hash_bytes(HashAlgorithm::Sha256, b"line123").to_hex(),
            "3b065a37be3ce1e7a03fce4bddbe426d9308e9861f872a552813d0ea0a87af3d"
        );
    }

    #[test]
    fn test_published_abc_vectors() {
        assert_eq!(
            hash_bytes(HashAlgorithm::Md5, b"abc").to_hex(),
            "900150983cd24fb0d6963f7d28e17f72"
        );
        assert_eq!(
            hash_bytes(HashAlgorithm::Sha1, b"abc").to_hex(),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            hash_bytes(HashAlgorithm::Sha256, b"abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_digest_len() {
        for alg in [HashAlgorithm::Md5, HashAlgorithm::Sha1, HashAlgorithm::Sha256] {
            assert_eq!(hash_bytes(alg, b"x").as_bytes().len(), alg.digest_len());
        }
    }

    #[test]
    fn test_reader_matches_bytes_across_chunks() {
        // Larger than one chunk so the streaming loop runs several times.
        let data = vec![7u8; CHUNK_SIZE * 3 + 17];
        let streamed = hash_reader(HashAlgorithm::Sha256, data.as_slice()).unwrap();
        assert_eq!(streamed, hash_bytes(HashAlgorithm::Sha256, &data));
    }

    #[test]
    fn test_hash_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"line123").unwrap();
        let digest = hash_file(HashAlgorithm::Md5, f.path()).unwrap();
        assert_eq!(digest.to_hex(), "562357d95918fbcb430b27bdca4d0677");
    }

    #[test]
    fn test_hash_file_missing() {
        let result = hash_file(HashAlgorithm::Sha1, Path::new("/tmp/banai_missing_98431.bin"));
        assert!(matches!(result, Err(HashError::NotFound(_))));
    }

    #[test]
    fn test_hash_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = hash_file(HashAlgorithm::Sha1, dir.path());
        assert!(matches!(result, Err(HashError::NotAFile(_))));
    }

    #[test]
    fn test_algorithm_from_str() {
        assert_eq!("SHA256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert_eq!("sha-1".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha1);
        assert!("crc32".parse::<HashAlgorithm>().is_err());
    }

    #[test]
    fn test_serde_as_hex() {
        let digest = hash_bytes(HashAlgorithm::Md5, b"line123");
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, "\"562357d95918fbcb430b27bdca4d0677\"");
    }
}
