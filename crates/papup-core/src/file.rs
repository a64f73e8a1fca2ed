//! Source file identity.
//!
//! A [`SourceFile`] is created once at ingestion and immutable thereafter:
//! the SHA-256 digest is computed over the raw bytes exactly once and never
//! recomputed. Two identities coexist on purpose: the 4-character ident is
//! what a human types and what QR fragments carry; the 16-byte uuid is what
//! the binary page headers store.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Wire format version carried in the file header JSON.
pub const FORMAT_VERSION: &str = "0.1";

/// Human-typeable ident length.
pub const IDENT_LEN: usize = 4;

/// Raw bytes per QR data fragment.
pub const DEFAULT_PART_SIZE: usize = 128;

const IDENT_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a random 4-character upper-alphanumeric ident.
///
/// Assumed unique for the session; collision handling is a caller policy.
#[must_use]
pub fn random_ident() -> String {
    let mut rng = rand::thread_rng();
    (0..IDENT_LEN)
        .map(|_| IDENT_CHARSET[rng.gen_range(0..IDENT_CHARSET.len())] as char)
        .collect()
}

/// Immutable identity of one input file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    data: Vec<u8>,
    ident: String,
    uuid: Uuid,
    sha256: [u8; 32],
    name: String,
    mime: String,
    description: String,
    created_at: DateTime<Utc>,
    part_size: usize,
}

impl SourceFile {
    /// Ingest raw bytes under a display name.
    ///
    /// Digest, ident, uuid, and timestamp are fixed here, once.
    #[must_use]
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        let sha256: [u8; 32] = Sha256::digest(&data).into();
        Self {
            data,
            ident: random_ident(),
            uuid: Uuid::new_v4(),
            sha256,
            name: name.into(),
            mime: String::new(),
            description: String::new(),
            created_at: Utc::now(),
            part_size: DEFAULT_PART_SIZE,
        }
    }

    /// Replace the random ident with a fixed one.
    #[must_use]
    pub fn with_ident(mut self, ident: impl Into<String>) -> Self {
        self.ident = ident.into();
        self
    }

    /// Set the MIME hint.
    #[must_use]
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = mime.into();
        self
    }

    /// Set the free-text description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// The raw bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Raw byte length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The 4-character ident used by QR fragments.
    #[must_use]
    pub fn ident(&self) -> &str {
        &self.ident
    }

    /// The 16-byte id used by page headers.
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// SHA-256 over the raw bytes.
    #[must_use]
    pub const fn digest(&self) -> &[u8; 32] {
        &self.sha256
    }

    /// SHA-256 as lower-case hex.
    #[must_use]
    pub fn digest_hex(&self) -> String {
        hex::encode(self.sha256)
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// MIME hint, empty if unknown.
    #[must_use]
    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// Free-text description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Ingestion timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Raw bytes per data fragment.
    #[must_use]
    pub const fn part_size(&self) -> usize {
        self.part_size
    }

    /// Number of data fragments for this file.
    #[must_use]
    pub fn part_count(&self) -> u32 {
        #[allow(clippy::cast_possible_truncation)]
        {
            self.data.len().div_ceil(self.part_size) as u32
        }
    }

    /// The `n`-th raw chunk, 1-based; the last chunk may be short.
    ///
    /// # Panics
    ///
    /// Panics if `n` is 0 or greater than [`Self::part_count`].
    #[must_use]
    pub fn part(&self, n: u32) -> &[u8] {
        assert!(n >= 1 && n <= self.part_count());
        let start = (n as usize - 1) * self.part_size;
        let end = (start + self.part_size).min(self.data.len());
        &self.data[start..end]
    }

    /// Iterate raw chunks in order.
    pub fn parts(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks(self.part_size)
    }

    /// The metadata record shipped as JSON.
    #[must_use]
    pub fn header(&self) -> FileHeader {
        FileHeader {
            version: FORMAT_VERSION.to_string(),
            id: self.ident.clone(),
            size: self.data.len() as u64,
            parts: self.part_count(),
            sha256: self.digest_hex(),
            name: self.name.clone(),
            description: self.description.clone(),
            mime: self.mime.clone(),
        }
    }
}

/// File metadata wire record.
///
/// Exact JSON field set:
/// `{"version","id","size","parts","sha256","name","description","mime"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHeader {
    /// Format version, currently `"0.1"`.
    pub version: String,
    /// 4-character file ident.
    pub id: String,
    /// Raw byte length.
    pub size: u64,
    /// Data fragment count.
    pub parts: u32,
    /// SHA-256 of the raw bytes, 64 hex chars.
    pub sha256: String,
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// MIME hint, empty if unknown.
    pub mime: String,
}

impl FileHeader {
    /// Serialize to the JSON wire form.
    ///
    /// # Panics
    ///
    /// Panics only if JSON serialization of a plain string/integer struct
    /// fails, which it cannot.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("file header serializes to JSON")
    }

    /// Parse the JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns the JSON error for malformed or mistyped input.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
