//! Fragment reconstructor.
//!
//! Ingests fragments of unknown order and origin, detects duplicates and
//! conflicts, and reassembles the original bytes once every sequence number
//! has been observed. Ingestion is idempotent and commutative: the same
//! multiset of fragments yields the same terminal state in any order.
//!
//! The aggregation policy is first-write-wins. The first fragment seen for a
//! (file, kind) fixes the declared total; the first content stored for a
//! sequence number is never overwritten. Disagreements are reported and
//! logged, never merged.
//!
//! Multiple scan sources may ingest concurrently: per-file state sits behind
//! its own lock inside a shared registry, so unrelated file ids proceed
//! independently and there is no global lock across ingestion.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};

use crate::error::ScanError;
use crate::file::FileHeader;
use crate::fragment::{Fragment, FragmentKind};

/// Result of ingesting one fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// New content stored.
    Stored,
    /// Sequence number already held identical content; no-op.
    Duplicate,
    /// Fragment declared a total disagreeing with the first-seen total.
    /// The fragment was discarded.
    ConflictingCount {
        /// The file id.
        file_id: String,
        /// The fragment kind.
        kind: FragmentKind,
        /// Total fixed by the first fragment seen.
        declared: u32,
        /// Total reported by the discarded fragment.
        reported: u32,
    },
    /// Sequence number already held different content. The first write was
    /// kept and the fragment discarded.
    ConflictingContent {
        /// The file id.
        file_id: String,
        /// The fragment kind.
        kind: FragmentKind,
        /// The contested 1-based sequence number.
        seq: u32,
    },
    /// Not a usable fragment: unparseable text, an out-of-range sequence
    /// number, or the reserved redundancy kind.
    Ignored,
}

/// Aggregation state for one fragment kind of one file.
#[derive(Debug, Default)]
struct KindState {
    /// Fixed by the first fragment seen, immutable thereafter.
    total: Option<u32>,
    /// Sequence number to content, first write wins.
    parts: BTreeMap<u32, String>,
}

impl KindState {
    fn ingest(&mut self, file_id: &str, kind: FragmentKind, fragment: &Fragment) -> IngestOutcome {
        if fragment.seq == 0 || fragment.total == 0 || fragment.seq > fragment.total {
            tracing::debug!(
                file_id,
                %kind,
                seq = fragment.seq,
                total = fragment.total,
                "ignoring fragment with out-of-range counters"
            );
            return IngestOutcome::Ignored;
        }

        let declared = *self.total.get_or_insert(fragment.total);
        if declared != fragment.total {
            tracing::warn!(
                file_id,
                %kind,
                declared,
                reported = fragment.total,
                "conflicting fragment count, discarding"
            );
            return IngestOutcome::ConflictingCount {
                file_id: file_id.to_string(),
                kind,
                declared,
                reported: fragment.total,
            };
        }

        if let Some(existing) = self.parts.get(&fragment.seq) {
            if *existing == fragment.content {
                return IngestOutcome::Duplicate;
            }
            tracing::warn!(
                file_id,
                %kind,
                seq = fragment.seq,
                "conflicting fragment content, keeping first-seen"
            );
            return IngestOutcome::ConflictingContent {
                file_id: file_id.to_string(),
                kind,
                seq: fragment.seq,
            };
        }

        self.parts.insert(fragment.seq, fragment.content.clone());
        IngestOutcome::Stored
    }

    fn missing(&self) -> Vec<u32> {
        match self.total {
            Some(total) => (1..=total).filter(|n| !self.parts.contains_key(n)).collect(),
            None => Vec::new(),
        }
    }

    fn is_complete(&self) -> bool {
        self.total.is_some() && self.missing().is_empty()
    }
}

/// Aggregation state for one file id.
#[derive(Debug, Default)]
struct FileState {
    data: KindState,
    metadata: KindState,
}

/// Concurrent fragment aggregator across file ids.
#[derive(Debug, Default)]
pub struct Scanner {
    files: RwLock<HashMap<String, Arc<Mutex<FileState>>>>,
}

impl Scanner {
    /// Create an empty scanner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state_for(&self, file_id: &str) -> Arc<Mutex<FileState>> {
        if let Some(state) = self.files.read().get(file_id) {
            return Arc::clone(state);
        }
        let mut files = self.files.write();
        Arc::clone(files.entry(file_id.to_string()).or_default())
    }

    fn existing_state(&self, file_id: &str) -> Result<Arc<Mutex<FileState>>, ScanError> {
        self.files
            .read()
            .get(file_id)
            .map(Arc::clone)
            .ok_or_else(|| ScanError::UnknownFile {
                file_id: file_id.to_string(),
            })
    }

    /// Ingest one line of scanned text.
    ///
    /// Unparseable text is [`IngestOutcome::Ignored`]; everything else is
    /// delegated to [`Self::ingest`].
    pub fn ingest_text(&self, text: &str) -> IngestOutcome {
        match Fragment::parse(text) {
            Some(fragment) => self.ingest(&fragment),
            None => IngestOutcome::Ignored,
        }
    }

    /// Ingest one parsed fragment.
    ///
    /// Idempotent and commutative. State for an unseen file id is created
    /// lazily; the reserved redundancy kind is accepted but not aggregated.
    pub fn ingest(&self, fragment: &Fragment) -> IngestOutcome {
        if fragment.kind == FragmentKind::Redundancy {
            tracing::debug!(
                file_id = %fragment.file_id,
                "redundancy fragments are reserved, ignoring"
            );
            return IngestOutcome::Ignored;
        }

        let state = self.state_for(&fragment.file_id);
        let mut state = state.lock();
        let kind_state = match fragment.kind {
            FragmentKind::Data => &mut state.data,
            FragmentKind::Metadata | FragmentKind::Redundancy => &mut state.metadata,
        };
        kind_state.ingest(&fragment.file_id, fragment.kind, fragment)
    }

    /// Every file id with aggregation state, in no particular order.
    #[must_use]
    pub fn file_ids(&self) -> Vec<String> {
        self.files.read().keys().cloned().collect()
    }

    /// Whether every sequence number `1..=total` of `kind` has been observed.
    ///
    /// False while the total is still unknown.
    #[must_use]
    pub fn is_complete(&self, file_id: &str, kind: FragmentKind) -> bool {
        let Ok(state) = self.existing_state(file_id) else {
            return false;
        };
        let state = state.lock();
        match kind {
            FragmentKind::Data => state.data.is_complete(),
            FragmentKind::Metadata => state.metadata.is_complete(),
            FragmentKind::Redundancy => false,
        }
    }

    /// Reassemble the original bytes from the data fragments.
    ///
    /// Concatenates content in ascending sequence order and hex-decodes the
    /// result.
    ///
    /// # Errors
    ///
    /// - [`ScanError::UnknownFile`] if no fragments were seen for this id.
    /// - [`ScanError::Incomplete`] listing the missing sequence numbers
    ///   (empty while the total itself is still unknown).
    /// - [`ScanError::InvalidHex`] naming the first undecodable fragment.
    pub fn reconstruct(&self, file_id: &str) -> Result<Vec<u8>, ScanError> {
        let state = self.existing_state(file_id)?;
        let state = state.lock();
        if !state.data.is_complete() {
            return Err(ScanError::Incomplete {
                file_id: file_id.to_string(),
                kind: FragmentKind::Data,
                missing: state.data.missing(),
            });
        }

        let mut data = Vec::new();
        for (seq, content) in &state.data.parts {
            let chunk = hex::decode(content).map_err(|_| ScanError::InvalidHex {
                file_id: file_id.to_string(),
                seq: *seq,
            })?;
            data.extend_from_slice(&chunk);
        }
        Ok(data)
    }

    /// Reassemble and parse the metadata fragments into a [`FileHeader`].
    ///
    /// # Errors
    ///
    /// - [`ScanError::UnknownFile`] / [`ScanError::Incomplete`] as for
    ///   [`Self::reconstruct`].
    /// - [`ScanError::InvalidMetadata`] if the reassembled text is not a
    ///   valid file header.
    pub fn reconstruct_metadata(&self, file_id: &str) -> Result<FileHeader, ScanError> {
        let state = self.existing_state(file_id)?;
        let state = state.lock();
        if !state.metadata.is_complete() {
            return Err(ScanError::Incomplete {
                file_id: file_id.to_string(),
                kind: FragmentKind::Metadata,
                missing: state.metadata.missing(),
            });
        }

        let json: String = state
            .metadata
            .parts
            .values()
            .map(String::as_str)
            .collect();
        FileHeader::from_json(&json).map_err(|e| ScanError::InvalidMetadata {
            file_id: file_id.to_string(),
            reason: e.to_string(),
        })
    }

    /// Reconstruct the data and verify it against the reconstructed
    /// metadata's declared size and SHA-256 digest.
    ///
    /// # Errors
    ///
    /// All of [`Self::reconstruct`] and [`Self::reconstruct_metadata`], plus
    /// [`ScanError::SizeMismatch`] and [`ScanError::DigestMismatch`] when the
    /// reassembled bytes disagree with the metadata.
    pub fn verify(&self, file_id: &str) -> Result<Vec<u8>, ScanError> {
        let header = self.reconstruct_metadata(file_id)?;
        let data = self.reconstruct(file_id)?;

        if data.len() as u64 != header.size {
            return Err(ScanError::SizeMismatch {
                file_id: file_id.to_string(),
                declared: header.size,
                actual: data.len() as u64,
            });
        }
        let computed = hex::encode(Sha256::digest(&data));
        if !computed.eq_ignore_ascii_case(&header.sha256) {
            return Err(ScanError::DigestMismatch {
                file_id: file_id.to_string(),
                declared: header.sha256,
                computed,
            });
        }
        Ok(data)
    }
}
