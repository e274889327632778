//! Integrity values: registry SRI strings and descriptor hash suffixes.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use std::fmt;
use std::str::FromStr;

use crate::SpecError;

/// Hash algorithms accepted in integrity values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HashAlgorithm {
    /// SHA-224
    Sha224,
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

impl HashAlgorithm {
    /// Lowercase algorithm name (`sha512`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Digest `bytes` with this algorithm.
    pub fn digest(self, bytes: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha224 => Sha224::digest(bytes).to_vec(),
            Self::Sha256 => Sha256::digest(bytes).to_vec(),
            Self::Sha384 => Sha384::digest(bytes).to_vec(),
            Self::Sha512 => Sha512::digest(bytes).to_vec(),
        }
    }

    fn digest_len(self) -> usize {
        match self {
            Self::Sha224 => 28,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha224" => Ok(Self::Sha224),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            other => Err(SpecError::InvalidIntegrity(format!(
                "unsupported hash algorithm '{other}'"
            ))),
        }
    }
}

/// An expected content digest for a package-manager archive.
///
/// Two textual forms are understood:
///
/// - the descriptor suffix form `sha512.<hex>` (what appears after `+` in
///   a `packageManager` field), which is also the [`Display`](fmt::Display) form;
/// - the Subresource Integrity form `sha512-<base64>` used by registry
///   metadata (`dist.integrity`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Integrity {
    algorithm: HashAlgorithm,
    digest: Vec<u8>,
}

/// Returned by [`Integrity::verify`] when the bytes do not match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityMismatch {
    /// The expected value, in suffix form.
    pub expected: String,
    /// The digest actually computed, in suffix form.
    pub actual: String,
}

impl Integrity {
    /// Compute the integrity of `bytes` with the given algorithm.
    pub fn compute(algorithm: HashAlgorithm, bytes: &[u8]) -> Self {
        Self {
            algorithm,
            digest: algorithm.digest(bytes),
        }
    }

    /// Parse the descriptor suffix form `algo.hex`.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::InvalidIntegrity`] for an unknown algorithm,
    /// invalid hex, or a digest of the wrong length.
    pub fn parse_suffix(s: &str) -> Result<Self, SpecError> {
        let (algo, hex_digest) = s
            .split_once('.')
            .ok_or_else(|| SpecError::InvalidIntegrity(format!("expected <algo>.<hex>, got '{s}'")))?;
        let algorithm: HashAlgorithm = algo.parse()?;
        let digest = hex::decode(hex_digest)
            .map_err(|e| SpecError::InvalidIntegrity(format!("invalid hex digest: {e}")))?;
        Self::from_digest(algorithm, digest)
    }

    /// Parse a Subresource Integrity string (`sha512-<base64>`).
    ///
    /// SRI values may list several space-separated hashes; the strongest
    /// supported one is kept.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::InvalidIntegrity`] if no entry is usable.
    pub fn parse_sri(s: &str) -> Result<Self, SpecError> {
        let mut best: Option<Self> = None;
        for token in s.split_whitespace() {
            let Some((algo, b64)) = token.split_once('-') else {
                continue;
            };
            let Ok(algorithm) = algo.parse::<HashAlgorithm>() else {
                continue;
            };
            let Ok(digest) = STANDARD.decode(b64) else {
                continue;
            };
            if let Ok(candidate) = Self::from_digest(algorithm, digest) {
                if best.as_ref().is_none_or(|b| candidate.algorithm > b.algorithm) {
                    best = Some(candidate);
                }
            }
        }
        best.ok_or_else(|| SpecError::InvalidIntegrity(format!("no usable hash in '{s}'")))
    }

    /// Wrap an already computed digest.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::InvalidIntegrity`] if the digest length does not
    /// fit the algorithm.
    pub fn from_digest(algorithm: HashAlgorithm, digest: Vec<u8>) -> Result<Self, SpecError> {
        if digest.len() != algorithm.digest_len() {
            return Err(SpecError::InvalidIntegrity(format!(
                "{} digest must be {} bytes, got {}",
                algorithm.as_str(),
                algorithm.digest_len(),
                digest.len()
            )));
        }
        Ok(Self { algorithm, digest })
    }

    /// The algorithm this value was computed with.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Check `bytes` against this value.
    ///
    /// # Errors
    ///
    /// Returns the expected and actual values when they differ.
    pub fn verify(&self, bytes: &[u8]) -> Result<(), IntegrityMismatch> {
        let actual = Self::compute(self.algorithm, bytes);
        if actual.digest == self.digest {
            Ok(())
        } else {
            Err(IntegrityMismatch {
                expected: self.to_string(),
                actual: actual.to_string(),
            })
        }
    }
}

impl fmt::Display for Integrity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.algorithm.as_str(), hex::encode(&self.digest))
    }
}

impl FromStr for Integrity {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_suffix(s)
    }
}

impl Serialize for Integrity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Integrity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse_suffix(&s).map_err(serde::de::Error::custom)
    }
}
