//! Content hashing primitives for manifests
//!
//! Two 256-bit algorithms are supported. SHA-256 is the default and keeps
//! manifests compatible with `sha256sum -c`; BLAKE3 is faster on large trees.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::str::FromStr;

/// Files at or above this size are hashed through a memory map
pub const MMAP_THRESHOLD: u64 = 4 * 1024 * 1024;

/// Hash algorithm used for every entry of a manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-256
    #[default]
    Sha256,
    /// BLAKE3 (256-bit output)
    Blake3,
}

impl HashAlgorithm {
    /// Stable tag written into manifest file names and CLI output
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Blake3 => "blake3",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(Self::Sha256),
            "blake3" | "b3" => Ok(Self::Blake3),
            other => Err(format!("unknown hash algorithm '{}' (expected sha256 or blake3)", other)),
        }
    }
}

/// A 256-bit content digest
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Create a hash from raw bytes
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering (64 chars)
    pub fn to_hex(&self) -> String {
        const HEX_CHARS: &[u8] = b"0123456789abcdef";
        let mut hex = String::with_capacity(64);
        for &byte in &self.0 {
            hex.push(HEX_CHARS[(byte >> 4) as usize] as char);
            hex.push(HEX_CHARS[(byte & 0xf) as usize] as char);
        }
        hex
    }

    /// Parse a 64-char hex string
    pub fn from_hex(hex: &str) -> Result<Self, String> {
        if hex.len() != 64 {
            return Err(format!("expected 64 hex characters, got {}", hex.len()));
        }

        let raw = hex.as_bytes();
        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let high = nibble(raw[i * 2])?;
            let low = nibble(raw[i * 2 + 1])?;
            *byte = (high << 4) | low;
        }
        Ok(Self(bytes))
    }
}

fn nibble(c: u8) -> Result<u8, String> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(format!("invalid hex character '{}'", c as char)),
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Incremental hasher over either algorithm
pub enum IncrementalHasher {
    Sha256(Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl IncrementalHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            HashAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Blake3(h) => {
                h.update(data);
            }
        }
    }

    pub fn finalize(self) -> ContentHash {
        match self {
            Self::Sha256(h) => {
                let mut bytes = [0u8; 32];
                bytes.copy_from_slice(&h.finalize());
                ContentHash::from_bytes(bytes)
            }
            Self::Blake3(h) => ContentHash::from_bytes(*h.finalize().as_bytes()),
        }
    }
}

/// Hash a byte slice
pub fn hash_bytes(algorithm: HashAlgorithm, data: &[u8]) -> ContentHash {
    let mut hasher = IncrementalHasher::new(algorithm);
    hasher.update(data);
    hasher.finalize()
}

/// Hash a file, picking streaming or mmap by size
pub fn hash_path(algorithm: HashAlgorithm, path: &Path) -> io::Result<ContentHash> {
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    if len >= MMAP_THRESHOLD {
        hash_file_mmap(algorithm, file)
    } else {
        hash_file(algorithm, file)
    }
}

/// Hash an open file with buffered streaming reads
pub fn hash_file(algorithm: HashAlgorithm, file: File) -> io::Result<ContentHash> {
    let mut reader = BufReader::new(file);
    let mut hasher = IncrementalHasher::new(algorithm);

    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize())
}

/// Hash an open file through a read-only memory map
pub fn hash_file_mmap(algorithm: HashAlgorithm, file: File) -> io::Result<ContentHash> {
    use memmap2::Mmap;

    // SAFETY: the map is read-only and dropped before returning. Concurrent
    // truncation by another process is the accepted filesystem race.
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(hash_bytes(algorithm, &mmap))
}
