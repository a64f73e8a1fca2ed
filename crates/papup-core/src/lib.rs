//! Paper-backup codec: files to printable pages and back.
//!
//! Encodes arbitrary files into CRC-protected 32x32 bitmap blocks arranged
//! on printable pages, plus textual fragments suitable for QR codes, and
//! reconstructs the original bytes from incomplete, out-of-order scans.
//!
//! # Pipeline
//!
//! Encoding runs data through compression, encryption, and Reed-Solomon
//! redundancy, prepends a heavily protected payload header, then cuts the
//! result into pages of bitmap blocks:
//!
//! - Every block is 124 payload bytes plus a CRC32, rendered as a 32x32
//!   black-and-white bitmap.
//! - Each page reserves its first block for a page header carrying the file
//!   uuid, page numbering, and grid geometry, protected by RS(64,34).
//! - The payload header (RS(32,14)) records the packed body length and the
//!   compression/encryption/redundancy codes needed to invert the pipeline.
//!
//! Body redundancy is configurable from none up to RS(255,127); every
//! codeword independently survives up to half its parity in corrupted
//! symbols, so damage is localized rather than fatal.
//!
//! # Fragments
//!
//! Alongside bitmap pages, files export as self-describing text lines
//! (`PUD:<id>:<n>/<total>:<hex>` for data, `PUM:...` for the JSON file
//! header). [`Scanner`] aggregates such lines from any number of sources in
//! any order, resolves duplicates and conflicts first-write-wins, and
//! verifies the reassembled bytes against the declared SHA-256 digest.

#![forbid(unsafe_code)]

mod block;
mod error;
mod fec;
mod file;
mod fragment;
mod page;
mod payload;
mod scan;

pub use block::{
    block_chunks, decode_block, encode_block, BlockBitmap, BLOCK_BYTES, BLOCK_PAYLOAD, BLOCK_SIDE,
    CRC_BYTES, FILL_BYTE,
};
pub use error::{BlockError, FecError, PageError, PayloadError, ScanError};
pub use fec::{
    decode_codeword, encode_codeword, rs_decode, rs_encode, uncorrectable_codewords,
    RedundancyLevel, CODEWORD_LEN,
};
pub use file::{random_ident, FileHeader, SourceFile, DEFAULT_PART_SIZE, FORMAT_VERSION, IDENT_LEN};
pub use fragment::{data_fragments, metadata_fragments, Fragment, FragmentKind};
pub use page::{
    corrupt_blocks, cut_pages, decode_page, render_document, LayoutConfig, Page, PageGrid,
    PageHeader, PageRender,
    PAGE_HEADER_LEN, PAGE_HEADER_RAW, PAGE_IDENT, PAGE_VERSION,
};
pub use payload::{
    pack, unpack, Compression, Encryption, PayloadConfig, PayloadHeader, Unpacked,
    MAX_METADATA_LEN, PAYLOAD_HEADER_LEN, PAYLOAD_HEADER_RAW,
};
pub use scan::{IngestOutcome, Scanner};
