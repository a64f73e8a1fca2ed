//! Page layout engine.
//!
//! Partitions a packed payload into printable pages, each a grid of
//! CRC-protected blocks with its own RS-protected page header. The first
//! page uses a smaller grid than subsequent pages because its rendering
//! reserves vertical space for the human-readable title block.
//!
//! The cut is greedy with no backtracking, and page headers are generated in
//! a second pass, once every page's byte range (and therefore the total page
//! count) is known.

// Allow truncation casts - block counts are bounded by the u16 grid geometry
#![allow(clippy::cast_possible_truncation)]

use uuid::Uuid;

use crate::block::{self, BLOCK_PAYLOAD, BlockBitmap};
use crate::error::{PageError, PayloadError};
use crate::fec;
use crate::file::SourceFile;
use crate::payload::{self, PayloadConfig};

/// Raw page header length before RS protection.
pub const PAGE_HEADER_RAW: usize = 34;

/// Encoded page header length: RS(64,34), ~47% parity.
///
/// Deliberately very high redundancy; this one codeword alone determines how
/// to read the rest of the page.
pub const PAGE_HEADER_LEN: usize = 64;

/// Ident tag opening every page header.
pub const PAGE_IDENT: &[u8; 5] = b"PAPUP";

/// Page format version byte.
pub const PAGE_VERSION: u8 = 0x01;

/// A page's block grid.
///
/// One grid cell (index 0) is reserved for a visual mark drawn over it and
/// never carries data, so `usable_blocks = cols * rows - 1`. That reservation
/// is a format invariant; all capacity arithmetic goes through
/// [`PageGrid::usable_blocks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageGrid {
    /// Blocks per row.
    pub cols: u16,
    /// Rows in the full grid.
    pub rows: u16,
}

impl PageGrid {
    /// Grid for the first page, shortened to leave room for the title block.
    pub const FIRST: Self = Self { cols: 16, rows: 20 };

    /// Grid for every subsequent page.
    pub const LATER: Self = Self { cols: 16, rows: 24 };

    /// Build a validated grid.
    ///
    /// A grid needs at least two cells: one for the reserved mark and one
    /// carrying the header codeword plus data.
    ///
    /// # Errors
    ///
    /// Returns [`PageError::InvalidGrid`] for anything smaller.
    pub const fn new(cols: u16, rows: u16) -> Result<Self, PageError> {
        if cols as usize * rows as usize >= 2 {
            Ok(Self { cols, rows })
        } else {
            Err(PageError::InvalidGrid { cols, rows })
        }
    }

    /// Data-carrying block count: the full grid minus the reserved cell.
    ///
    /// # Panics
    ///
    /// Panics on a grid of fewer than two cells; [`Self::new`] rejects those
    /// up front.
    #[must_use]
    pub const fn usable_blocks(self) -> usize {
        let cells = self.cols as usize * self.rows as usize;
        assert!(cells >= 2, "page grid needs at least two cells");
        cells - 1
    }

    /// Payload bytes this grid can hold after its page header.
    ///
    /// # Panics
    ///
    /// As [`Self::usable_blocks`].
    #[must_use]
    pub const fn data_capacity(self) -> usize {
        BLOCK_PAYLOAD * self.usable_blocks() - PAGE_HEADER_LEN
    }
}

/// Grid choice for a layout run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutConfig {
    /// Grid for page 1.
    pub first: PageGrid,
    /// Grid for pages 2..n.
    pub later: PageGrid,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            first: PageGrid::FIRST,
            later: PageGrid::LATER,
        }
    }
}

/// Page identity, 34 raw bytes on the wire.
///
/// Big-endian layout: 5-byte ident tag, version byte, 16-byte file id,
/// u32 page number (0-based), u32 total pages, u16 block count, u16 columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    /// File identity shared by every page of one printout.
    pub file_id: Uuid,
    /// 0-based page number; displayed 1-based.
    pub page_number: u32,
    /// Total page count for the file.
    pub total_pages: u32,
    /// Blocks actually rendered on this page, header codeword included.
    pub block_count: u16,
    /// Grid column count.
    pub cols: u16,
}

impl PageHeader {
    /// Serialize to the 34-byte raw form.
    #[must_use]
    pub fn to_raw(self) -> [u8; PAGE_HEADER_RAW] {
        let mut raw = [0u8; PAGE_HEADER_RAW];
        raw[..5].copy_from_slice(PAGE_IDENT);
        raw[5] = PAGE_VERSION;
        raw[6..22].copy_from_slice(self.file_id.as_bytes());
        raw[22..26].copy_from_slice(&self.page_number.to_be_bytes());
        raw[26..30].copy_from_slice(&self.total_pages.to_be_bytes());
        raw[30..32].copy_from_slice(&self.block_count.to_be_bytes());
        raw[32..34].copy_from_slice(&self.cols.to_be_bytes());
        raw
    }

    /// Encode to the RS(64,34)-protected wire form.
    #[must_use]
    pub fn encode(self) -> Vec<u8> {
        fec::encode_codeword(&self.to_raw(), PAGE_HEADER_LEN)
    }

    /// Decode and error-correct the 64-byte wire form.
    ///
    /// # Errors
    ///
    /// - [`PageError::CorruptHeader`] if the codeword has the wrong length or
    ///   is beyond correction.
    /// - [`PageError::BadIdentTag`] if the corrected bytes do not open with
    ///   the ident tag.
    /// - [`PageError::UnsupportedVersion`] for an unknown version byte.
    pub fn decode(codeword: &[u8]) -> Result<Self, PageError> {
        if codeword.len() != PAGE_HEADER_LEN {
            return Err(PageError::CorruptHeader);
        }
        let raw = fec::decode_codeword(codeword, PAGE_HEADER_RAW)
            .map_err(|_| PageError::CorruptHeader)?;

        if &raw[..5] != PAGE_IDENT {
            return Err(PageError::BadIdentTag);
        }
        if raw[5] != PAGE_VERSION {
            return Err(PageError::UnsupportedVersion { version: raw[5] });
        }

        let mut id = [0u8; 16];
        id.copy_from_slice(&raw[6..22]);
        Ok(Self {
            file_id: Uuid::from_bytes(id),
            page_number: u32::from_be_bytes([raw[22], raw[23], raw[24], raw[25]]),
            total_pages: u32::from_be_bytes([raw[26], raw[27], raw[28], raw[29]]),
            block_count: u16::from_be_bytes([raw[30], raw[31]]),
            cols: u16::from_be_bytes([raw[32], raw[33]]),
        })
    }
}

/// One printable page: identity plus its slice of the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// The page's identity header.
    pub header: PageHeader,
    /// The grid this page was cut for.
    pub grid: PageGrid,
    /// This page's contiguous payload slice.
    pub data: Vec<u8>,
}

impl Page {
    /// Blocks rendered on this page: the header codeword plus the data,
    /// chunked into block payloads. Matches `header.block_count`.
    #[must_use]
    pub fn block_payloads(&self) -> Vec<[u8; BLOCK_PAYLOAD]> {
        let mut body = self.header.encode();
        body.extend_from_slice(&self.data);
        block::block_chunks(&body)
    }

    /// Rasterize every block on this page.
    ///
    /// # Panics
    ///
    /// Panics only if [`block::block_chunks`] stops producing exact
    /// [`BLOCK_PAYLOAD`]-sized chunks, which would be an internal invariant
    /// violation.
    #[must_use]
    pub fn bitmaps(&self) -> Vec<BlockBitmap> {
        self.block_payloads()
            .iter()
            .map(|chunk| block::encode_block(chunk).expect("block chunks are BLOCK_PAYLOAD bytes"))
            .collect()
    }

    /// Grid rows actually used, including the reserved cell's row.
    #[must_use]
    pub fn actual_rows(&self) -> u16 {
        (u32::from(self.header.block_count) + 1).div_ceil(u32::from(self.cols())) as u16
    }

    /// Grid column count.
    #[must_use]
    pub const fn cols(&self) -> u16 {
        self.grid.cols
    }

    /// The page legend printed above the block grid.
    #[must_use]
    pub fn legend_lines(&self) -> Vec<String> {
        vec![
            "PAPUP file printout v0.1 - page header and blocks carry Reed-Solomon parity"
                .to_string(),
            format!(
                "ID: {} - Page: {}/{} - Blocks: {} - Columns: {}",
                self.header.file_id,
                self.header.page_number + 1,
                self.header.total_pages,
                self.header.block_count,
                self.cols(),
            ),
        ]
    }
}

/// Cut a packed payload into pages.
///
/// First pass assigns byte ranges greedily: one page on the first grid, then
/// pages on the later grid until the payload is consumed. Second pass fills
/// in each [`PageHeader`], now that the total page count is known. A payload
/// always yields at least one page.
#[must_use]
pub fn cut_pages(payload: &[u8], file_id: Uuid, layout: &LayoutConfig) -> Vec<Page> {
    let mut slices: Vec<(PageGrid, &[u8])> = Vec::new();
    let mut pos = 0usize;

    let first_take = payload.len().min(layout.first.data_capacity());
    slices.push((layout.first, &payload[..first_take]));
    pos += first_take;

    while pos < payload.len() {
        let take = (payload.len() - pos).min(layout.later.data_capacity());
        slices.push((layout.later, &payload[pos..pos + take]));
        pos += take;
    }

    let total_pages = slices.len() as u32;
    slices
        .into_iter()
        .enumerate()
        .map(|(number, (grid, data))| {
            let block_count = (PAGE_HEADER_LEN + data.len()).div_ceil(BLOCK_PAYLOAD) as u16;
            Page {
                header: PageHeader {
                    file_id,
                    page_number: number as u32,
                    total_pages,
                    block_count,
                    cols: grid.cols,
                },
                grid,
                data: data.to_vec(),
            }
        })
        .collect()
}

/// Decode one scanned page from its block bitmaps.
///
/// Every block is CRC-checked independently; one corrupt block does not stop
/// the rest from decoding, and the error names the grid cell so a human can
/// rescan exactly that region. The returned data runs to the final block
/// boundary, fill bytes included; the payload header's declared body length
/// bounds the concatenation when the pages are unpacked.
///
/// # Errors
///
/// - [`PageError::CorruptBlock`] for the first block whose CRC recheck
///   failed, with its 0-based index on the page.
/// - Header errors from [`PageHeader::decode`] once all blocks are clean.
pub fn decode_page(bitmaps: &[BlockBitmap]) -> Result<(PageHeader, Vec<u8>), PageError> {
    let mut body = Vec::with_capacity(bitmaps.len() * BLOCK_PAYLOAD);
    let mut first_error = None;
    for (index, bitmap) in bitmaps.iter().enumerate() {
        match block::decode_block(bitmap) {
            Ok(payload) => body.extend_from_slice(&payload),
            Err(source) => {
                if first_error.is_none() {
                    first_error = Some(PageError::CorruptBlock { index, source });
                }
                body.extend_from_slice(&[0u8; BLOCK_PAYLOAD]);
            }
        }
    }
    if let Some(error) = first_error {
        return Err(error);
    }
    if body.len() < PAGE_HEADER_LEN {
        return Err(PageError::CorruptHeader);
    }
    let header = PageHeader::decode(&body[..PAGE_HEADER_LEN])?;
    Ok((header, body.split_off(PAGE_HEADER_LEN)))
}

/// CRC-failed block indices on a page, for rescan reporting.
#[must_use]
pub fn corrupt_blocks(bitmaps: &[BlockBitmap]) -> Vec<usize> {
    bitmaps
        .iter()
        .enumerate()
        .filter(|(_, bitmap)| block::decode_block(bitmap).is_err())
        .map(|(index, _)| index)
        .collect()
}

/// Everything the external renderer needs for one page.
///
/// The core hands over plain data (legend strings, bitmaps, geometry) and
/// never touches pixel coordinates, fonts, or margins. The branding mark over
/// the reserved grid cell is likewise the renderer's job.
#[derive(Debug, Clone)]
pub struct PageRender {
    /// Legend lines, printed above the grid in order.
    pub legend: Vec<String>,
    /// Block bitmaps in grid order, starting at cell 1 (cell 0 is reserved).
    pub bitmaps: Vec<BlockBitmap>,
    /// Grid columns.
    pub cols: u16,
    /// Grid rows actually used.
    pub rows: u16,
}

/// Encode a source file into renderable pages: pack, cut, rasterize.
///
/// The file's JSON header travels as the payload's clear metadata section,
/// so a recovered payload identifies itself without the printed legend. The
/// first page's legend carries the file identity a human needs to match
/// paper to file; later pages carry the short form.
///
/// # Errors
///
/// Returns [`PayloadError`] if packing fails.
pub fn render_document(
    file: &SourceFile,
    config: &PayloadConfig,
    layout: &LayoutConfig,
) -> Result<Vec<PageRender>, PayloadError> {
    let metadata = file.header().to_json();
    let packed = payload::pack(file.data(), metadata.as_bytes(), &[], config)?;
    let pages = cut_pages(&packed, file.uuid(), layout);

    Ok(pages
        .iter()
        .map(|page| {
            let mut legend = page.legend_lines();
            if page.header.page_number == 0 {
                legend.push(format!("sha256: {}", file.digest_hex()));
                legend.push(format!(
                    "size: {} B    name: {}    mime: {}",
                    file.len(),
                    file.name(),
                    file.mime(),
                ));
                if !file.description().is_empty() {
                    legend.push(format!("description: {}", file.description()));
                }
            }
            PageRender {
                legend,
                bitmaps: page.bitmaps(),
                cols: page.cols(),
                rows: page.actual_rows(),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::decode_block;

    fn test_id() -> Uuid {
        Uuid::from_bytes([7u8; 16])
    }

    #[test]
    fn grid_capacity_arithmetic() {
        // 16×20 grid: 319 usable blocks, 124 bytes each, minus the header slot.
        assert_eq!(PageGrid::FIRST.usable_blocks(), 319);
        assert_eq!(PageGrid::FIRST.data_capacity(), 319 * 124 - 64);
        assert_eq!(PageGrid::LATER.usable_blocks(), 383);
        assert_eq!(PageGrid::LATER.data_capacity(), 383 * 124 - 64);
    }

    #[test]
    fn degenerate_grids_rejected() {
        assert_eq!(
            PageGrid::new(0, 24).unwrap_err(),
            PageError::InvalidGrid { cols: 0, rows: 24 }
        );
        assert_eq!(
            PageGrid::new(1, 1).unwrap_err(),
            PageError::InvalidGrid { cols: 1, rows: 1 }
        );

        // One reserved cell plus one data block is the minimum.
        let grid = PageGrid::new(2, 1).unwrap();
        assert_eq!(grid.usable_blocks(), 1);
        assert_eq!(grid.data_capacity(), 124 - 64);
        assert_eq!(PageGrid::new(16, 20).unwrap(), PageGrid::FIRST);
    }

    #[test]
    #[should_panic(expected = "at least two cells")]
    fn degenerate_grid_capacity_panics() {
        let _ = PageGrid { cols: 0, rows: 24 }.usable_blocks();
    }

    #[test]
    fn header_wire_roundtrip() {
        let header = PageHeader {
            file_id: test_id(),
            page_number: 3,
            total_pages: 9,
            block_count: 200,
            cols: 16,
        };
        let encoded = header.encode();
        assert_eq!(encoded.len(), PAGE_HEADER_LEN);
        assert_eq!(PageHeader::decode(&encoded).unwrap(), header);
    }

    #[test]
    fn header_survives_symbol_errors() {
        let header = PageHeader {
            file_id: test_id(),
            page_number: 0,
            total_pages: 1,
            block_count: 5,
            cols: 16,
        };
        let mut encoded = header.encode();
        // RS(64,34) corrects up to 15 symbol errors.
        for i in 0..15 {
            encoded[i * 4] ^= 0xFF;
        }
        assert_eq!(PageHeader::decode(&encoded).unwrap(), header);
    }

    #[test]
    fn header_rejects_wrong_ident_tag() {
        let header = PageHeader {
            file_id: test_id(),
            page_number: 0,
            total_pages: 1,
            block_count: 1,
            cols: 16,
        };
        let mut raw = header.to_raw();
        raw[..5].copy_from_slice(b"WRONG");
        let encoded = fec::encode_codeword(&raw, PAGE_HEADER_LEN);
        assert_eq!(
            PageHeader::decode(&encoded).unwrap_err(),
            PageError::BadIdentTag
        );
    }

    #[test]
    fn header_rejects_unknown_version() {
        let header = PageHeader {
            file_id: test_id(),
            page_number: 0,
            total_pages: 1,
            block_count: 1,
            cols: 16,
        };
        let mut raw = header.to_raw();
        raw[5] = 0x7F;
        let encoded = fec::encode_codeword(&raw, PAGE_HEADER_LEN);
        assert_eq!(
            PageHeader::decode(&encoded).unwrap_err(),
            PageError::UnsupportedVersion { version: 0x7F }
        );
    }

    #[test]
    fn single_page_cut() {
        let payload = vec![0xEEu8; 1000];
        let pages = cut_pages(&payload, test_id(), &LayoutConfig::default());
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].data, payload);
        assert_eq!(pages[0].header.total_pages, 1);
        // ceil((64 + 1000) / 124) = 9 blocks.
        assert_eq!(pages[0].header.block_count, 9);
    }

    #[test]
    fn cut_covers_payload_exactly_once() {
        let layout = LayoutConfig::default();
        // Three pages: first grid full, later grid full, remainder.
        let len = layout.first.data_capacity() + layout.later.data_capacity() + 500;
        let payload: Vec<u8> = (0..len).map(|i| (i % 256) as u8).collect();

        let pages = cut_pages(&payload, test_id(), &layout);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].data.len(), layout.first.data_capacity());
        assert_eq!(pages[1].data.len(), layout.later.data_capacity());
        assert_eq!(pages[2].data.len(), 500);

        let mut rejoined = Vec::new();
        for page in &pages {
            assert_eq!(page.header.total_pages, 3);
            rejoined.extend_from_slice(&page.data);
        }
        assert_eq!(rejoined, payload);
    }

    #[test]
    fn page_boundary_exact_fit() {
        let layout = LayoutConfig::default();
        let payload = vec![1u8; layout.first.data_capacity()];
        let pages = cut_pages(&payload, test_id(), &layout);
        assert_eq!(pages.len(), 1);

        let payload = vec![1u8; layout.first.data_capacity() + 1];
        let pages = cut_pages(&payload, test_id(), &layout);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].data.len(), 1);
    }

    #[test]
    fn block_count_invariant_holds() {
        let layout = LayoutConfig::default();
        for len in [0usize, 1, 59, 60, 61, 124, 1000, 39_492] {
            let payload = vec![0u8; len];
            for page in cut_pages(&payload, test_id(), &layout) {
                let expected = (PAGE_HEADER_LEN + page.data.len()).div_ceil(BLOCK_PAYLOAD);
                assert_eq!(usize::from(page.header.block_count), expected, "len {len}");
                assert!(usize::from(page.header.block_count) <= page.grid.usable_blocks());
                assert_eq!(page.block_payloads().len(), expected);
            }
        }
    }

    #[test]
    fn page_blocks_decode_back_to_body() {
        let payload = vec![0x5Au8; 300];
        let pages = cut_pages(&payload, test_id(), &LayoutConfig::default());
        let page = &pages[0];

        let mut body = Vec::new();
        for bitmap in page.bitmaps() {
            body.extend_from_slice(&decode_block(&bitmap).unwrap());
        }
        // Header codeword first, then the data, then fill.
        assert_eq!(PageHeader::decode(&body[..PAGE_HEADER_LEN]).unwrap(), page.header);
        assert_eq!(&body[PAGE_HEADER_LEN..PAGE_HEADER_LEN + 300], &payload[..]);
    }

    #[test]
    fn decode_page_roundtrip() {
        let payload: Vec<u8> = (0..2000u32).map(|i| (i * 7 % 256) as u8).collect();
        let pages = cut_pages(&payload, test_id(), &LayoutConfig::default());
        let page = &pages[0];

        let (header, data) = decode_page(&page.bitmaps()).unwrap();
        assert_eq!(header, page.header);
        // Data runs to the block boundary; the fill tail is alternating bits.
        assert_eq!(&data[..payload.len()], &payload[..]);
        assert!(data[payload.len()..].iter().all(|&b| b == crate::block::FILL_BYTE));
    }

    #[test]
    fn decode_page_reports_corrupt_cell() {
        let payload = vec![0x33u8; 1000];
        let pages = cut_pages(&payload, test_id(), &LayoutConfig::default());
        let mut bitmaps = pages[0].bitmaps();
        bitmaps[3].flip_pixel(10, 10);
        bitmaps[6].flip_pixel(0, 31);

        match decode_page(&bitmaps) {
            Err(PageError::CorruptBlock { index: 3, .. }) => {}
            other => panic!("expected block 3 reported first, got {other:?}"),
        }
        assert_eq!(corrupt_blocks(&bitmaps), vec![3, 6]);
    }

    #[test]
    fn legend_is_one_based() {
        let payload = vec![0u8; 50_000];
        let pages = cut_pages(&payload, test_id(), &LayoutConfig::default());
        assert!(pages.len() > 1);
        let legend = pages[1].legend_lines();
        assert!(legend[1].contains("Page: 2/"));
    }
}
