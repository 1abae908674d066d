// Digest utilities for archives and downloads

use anyhow::Result;
use sha2::{Digest, Sha256, Sha512};
use std::fs;
use std::path::Path;

/// Hash algorithm types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    /// Get the algorithm prefix for formatted output
    pub fn prefix(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix.to_ascii_lowercase().as_str() {
            "sha256" => Some(HashAlgorithm::Sha256),
            "sha512" => Some(HashAlgorithm::Sha512),
            _ => None,
        }
    }

    pub fn hasher(&self) -> Hasher {
        match self {
            HashAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
            HashAlgorithm::Sha512 => Hasher::Sha512(Sha512::new()),
        }
    }
}

/// Incremental hasher, fed chunk by chunk while a download streams in
pub enum Hasher {
    Sha256(Sha256),
    Sha512(Sha512),
}

impl Hasher {
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Sha256(h) => h.update(data),
            Hasher::Sha512(h) => h.update(data),
        }
    }

    /// Finish and return the formatted digest (`algorithm:hex`)
    pub fn finish(self) -> String {
        match self {
            Hasher::Sha256(h) => format_hash(&hex::encode(h.finalize()), HashAlgorithm::Sha256),
            Hasher::Sha512(h) => format_hash(&hex::encode(h.finalize()), HashAlgorithm::Sha512),
        }
    }
}

/// Compute hash of data and return formatted string (e.g., "sha256:abc123...")
pub fn compute_hash(data: &[u8], algorithm: HashAlgorithm) -> String {
    let mut hasher = algorithm.hasher();
    hasher.update(data);
    hasher.finish()
}

/// Format an existing hash with algorithm prefix
pub fn format_hash(hash: &str, algorithm: HashAlgorithm) -> String {
    format!("{}:{}", algorithm.prefix(), hash)
}

/// Split a formatted digest into its algorithm and lowercase hex part
pub fn parse_hash(formatted: &str) -> Result<(HashAlgorithm, String)> {
    let (prefix, hex_part) = formatted
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("Invalid hash format: {}", formatted))?;

    let algorithm = HashAlgorithm::from_prefix(prefix)
        .ok_or_else(|| anyhow::anyhow!("Unsupported hash algorithm: {}", prefix))?;

    Ok((algorithm, hex_part.to_ascii_lowercase()))
}

/// Hash a file on disk
pub fn hash_file(path: &Path, algorithm: HashAlgorithm) -> Result<String> {
    let data = fs::read(path)?;
    Ok(compute_hash(&data, algorithm))
}
