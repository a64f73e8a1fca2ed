//! Error types for every codec stage.
//!
//! Each stage gets its own error enum, and every user-visible failure carries
//! the identity of the offending unit (block index, codeword index, fragment
//! sequence number) so a caller can request a rescan of exactly that region.
//! Nothing in this crate retries internally.

use thiserror::Error;

use crate::fragment::FragmentKind;

/// Block codec errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    /// Payload handed to the encoder has the wrong length.
    #[error("block payload must be exactly {expected} bytes, got {actual}")]
    InvalidPayloadLength {
        /// Required payload length.
        expected: usize,
        /// Length actually provided.
        actual: usize,
    },

    /// CRC32 recheck failed after bit extraction.
    #[error("block crc mismatch: stored {stored:08X}, computed {computed:08X}")]
    CorruptBlock {
        /// CRC stored in the block trailer.
        stored: u32,
        /// CRC computed over the extracted payload.
        computed: u32,
    },
}

/// Redundancy (Reed-Solomon) codec errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FecError {
    /// Redundancy code not in the recognized level table.
    #[error("unrecognized redundancy code {code}")]
    UnknownRedundancyCode {
        /// The raw code byte.
        code: u8,
    },

    /// Codeword stream length is not a multiple of the codeword size.
    #[error("codeword stream of {len} bytes is not a multiple of {codeword_len}")]
    TruncatedStream {
        /// Stream length in bytes.
        len: usize,
        /// Expected codeword length (n).
        codeword_len: usize,
    },

    /// Error count in one codeword exceeds the correction capacity.
    ///
    /// Sibling codewords are decoded independently; this reports the first
    /// codeword that failed.
    #[error("uncorrectable codeword at index {codeword_index}")]
    UncorrectableBlock {
        /// Zero-based index of the failed codeword within the stream.
        codeword_index: usize,
    },

    /// Recorded pad length is impossible for the given parameters.
    #[error("pad length {pad} exceeds message length {k}")]
    InvalidPadLength {
        /// Recorded pad byte count.
        pad: usize,
        /// Message length (k) of the code.
        k: usize,
    },
}

/// Payload packer/unpacker errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    /// Compression code not in the recognized stage table.
    #[error("unrecognized compression code {code}")]
    UnknownCompressionCode {
        /// The raw code byte.
        code: u8,
    },

    /// Encryption code not in the recognized stage table.
    #[error("unrecognized encryption code {code}")]
    UnknownEncryptionCode {
        /// The raw code byte.
        code: u8,
    },

    /// A metadata section exceeds its 2-byte length prefix.
    #[error("metadata section of {len} bytes exceeds maximum {max}")]
    MetadataTooLarge {
        /// Section length in bytes.
        len: usize,
        /// Maximum expressible length.
        max: usize,
    },

    /// Payload header failed Reed-Solomon decoding or validation.
    ///
    /// The header carries the geometry needed to read everything after it,
    /// so this is fatal for the whole payload.
    #[error("payload header is corrupt beyond correction")]
    CorruptHeader,

    /// Payload stream is shorter than its framing requires.
    #[error("payload truncated: need at least {expected} bytes, got {actual}")]
    Truncated {
        /// Minimum length required by the framing.
        expected: usize,
        /// Length actually available.
        actual: usize,
    },

    /// Compression stage failed.
    #[error("compression stage failed: {reason}")]
    Compression {
        /// Description from the underlying codec.
        reason: String,
    },

    /// Redundancy stage failed.
    #[error(transparent)]
    Fec(#[from] FecError),
}

/// Page layout and page header errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    /// Grid cannot hold the reserved cell plus at least one data block.
    #[error("page grid {cols}x{rows} is too small")]
    InvalidGrid {
        /// Requested column count.
        cols: u16,
        /// Requested row count.
        rows: u16,
    },

    /// Page header failed Reed-Solomon decoding.
    #[error("page header for page is corrupt beyond correction")]
    CorruptHeader,

    /// Page header does not start with the expected ident tag.
    #[error("page header ident tag mismatch")]
    BadIdentTag,

    /// Page header declares an unsupported format version.
    #[error("unsupported page format version {version}")]
    UnsupportedVersion {
        /// Version byte from the header.
        version: u8,
    },

    /// A block on the page failed its CRC recheck.
    ///
    /// Other blocks decode independently; the index tells a human which grid
    /// cell to rescan.
    #[error("corrupt block at page index {index}: {source}")]
    CorruptBlock {
        /// Zero-based block index within the page (cell 0 is reserved).
        index: usize,
        /// The underlying block error.
        source: BlockError,
    },
}

/// Fragment reconstruction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    /// No fragments have been seen for this file id.
    #[error("no fragments ingested for file id {file_id}")]
    UnknownFile {
        /// The requested file id.
        file_id: String,
    },

    /// Reconstruction requested before all sequence numbers are present.
    ///
    /// Recoverable: ingest more fragments and retry.
    #[error("incomplete {kind} fragment set for {file_id}: missing {missing:?}")]
    Incomplete {
        /// The file id being reconstructed.
        file_id: String,
        /// Which fragment kind is incomplete.
        kind: FragmentKind,
        /// Missing 1-based sequence numbers.
        missing: Vec<u32>,
    },

    /// A data fragment's content is not valid hexadecimal.
    #[error("invalid hex in data fragment {seq} of {file_id}")]
    InvalidHex {
        /// The file id.
        file_id: String,
        /// 1-based sequence number of the bad fragment.
        seq: u32,
    },

    /// Reassembled metadata is not a valid file header.
    #[error("invalid metadata for {file_id}: {reason}")]
    InvalidMetadata {
        /// The file id.
        file_id: String,
        /// Description of the JSON failure.
        reason: String,
    },

    /// Reconstructed bytes do not match the digest declared in the metadata.
    #[error("digest mismatch for {file_id}: declared {declared}, computed {computed}")]
    DigestMismatch {
        /// The file id.
        file_id: String,
        /// Digest declared in the metadata, hex.
        declared: String,
        /// Digest computed over the reconstructed bytes, hex.
        computed: String,
    },

    /// Reconstructed byte count does not match the size declared in the metadata.
    #[error("size mismatch for {file_id}: declared {declared}, got {actual}")]
    SizeMismatch {
        /// The file id.
        file_id: String,
        /// Size declared in the metadata.
        declared: u64,
        /// Size actually reconstructed.
        actual: u64,
    },
}
