//! Fragment protocol: tagged text units for QR-code transport.
//!
//! The image-free fallback transport. Each fragment is one self-describing
//! line: `PUD:<file_id>:<n>/<total>:<HEX>` for data,
//! `PUM:<file_id>:<n>/<total>:<json-substring>` for metadata. `PUR:` is
//! reserved for redundancy fragments; the parser accepts it, the encoder
//! never emits it. Sequence numbers are 1-based. Text that does not match
//! the grammar is not an error: scanners see arbitrary unrelated symbols.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::file::SourceFile;

/// Fragment classification by prefix tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FragmentKind {
    /// `PUD:`, a hex-encoded raw data chunk.
    Data,
    /// `PUM:`, a slice of the JSON file header.
    Metadata,
    /// `PUR:`, reserved for parity fragments, currently never produced.
    Redundancy,
}

impl FragmentKind {
    /// The three-letter wire prefix.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Data => "PUD",
            Self::Metadata => "PUM",
            Self::Redundancy => "PUR",
        }
    }
}

impl fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// One independently transportable tagged text unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Classification tag.
    pub kind: FragmentKind,
    /// The 4-character file ident this fragment belongs to.
    pub file_id: String,
    /// 1-based sequence number.
    pub seq: u32,
    /// Declared total fragment count for this (file, kind).
    pub total: u32,
    /// Payload: upper-case hex for data, raw text for metadata.
    pub content: String,
}

impl Fragment {
    /// The full wire line: `<KIND>:<id>:<n>/<total>:<content>`.
    #[must_use]
    pub fn encode(&self) -> String {
        format!("{}:{}", self.title(), self.content)
    }

    /// The caption without content: `<KIND>:<id>:<n>/<total>`.
    ///
    /// Printed next to each QR symbol so a human can tell fragments apart
    /// without scanning them.
    #[must_use]
    pub fn title(&self) -> String {
        format!(
            "{}:{}:{}/{}",
            self.kind.prefix(),
            self.file_id,
            self.seq,
            self.total
        )
    }

    /// Parse one line of scanned text.
    ///
    /// Returns `None` for anything that is not a well-formed fragment: wrong
    /// prefix, malformed counters, or non-hex content in a data fragment.
    /// Ignoring is deliberate; the scan stream is full of unrelated symbols.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| {
            Regex::new(r"^(PUD|PUM|PUR):([0-9A-Z]+):([0-9]+)/([0-9]+):(.+)$")
                .expect("fragment pattern compiles")
        });

        let captures = pattern.captures(text)?;
        let kind = match captures.get(1)?.as_str() {
            "PUD" => FragmentKind::Data,
            "PUM" => FragmentKind::Metadata,
            _ => FragmentKind::Redundancy,
        };
        let seq: u32 = captures.get(3)?.as_str().parse().ok()?;
        let total: u32 = captures.get(4)?.as_str().parse().ok()?;
        let content = captures.get(5)?.as_str();

        if kind == FragmentKind::Data && !is_upper_hex(content) {
            return None;
        }

        Some(Self {
            kind,
            file_id: captures.get(2)?.as_str().to_string(),
            seq,
            total,
            content: content.to_string(),
        })
    }
}

fn is_upper_hex(text: &str) -> bool {
    !text.is_empty()
        && text
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b))
}

/// Data fragments for a file: one per raw chunk, hex-encoded upper-case.
#[must_use]
pub fn data_fragments(file: &SourceFile) -> Vec<Fragment> {
    let total = file.part_count();
    file.parts()
        .enumerate()
        .map(|(index, chunk)| Fragment {
            kind: FragmentKind::Data,
            file_id: file.ident().to_string(),
            #[allow(clippy::cast_possible_truncation)]
            seq: index as u32 + 1,
            total,
            content: hex::encode_upper(chunk),
        })
        .collect()
}

/// Metadata fragments for a file.
///
/// The file header is JSON-serialized once, then sliced into part-sized
/// substrings (by character, so multi-byte names survive the cut), each
/// wrapped with its own index/total.
#[must_use]
pub fn metadata_fragments(file: &SourceFile) -> Vec<Fragment> {
    let json = file.header().to_json();
    let chars: Vec<char> = json.chars().collect();
    let slices: Vec<String> = chars
        .chunks(file.part_size())
        .map(|chunk| chunk.iter().collect())
        .collect();

    #[allow(clippy::cast_possible_truncation)]
    let total = slices.len() as u32;
    slices
        .into_iter()
        .enumerate()
        .map(|(index, content)| Fragment {
            kind: FragmentKind::Metadata,
            file_id: file.ident().to_string(),
            #[allow(clippy::cast_possible_truncation)]
            seq: index as u32 + 1,
            total,
            content,
        })
        .collect()
}
