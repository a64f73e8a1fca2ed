//! Block codec: fixed-size CRC-protected printable bit grids.
//!
//! A block carries 124 payload bytes plus a big-endian CRC32 trailer, for 128
//! bytes total, rasterized as 1024 bits into a 32×32 monochrome bitmap. The
//! CRC makes any single-bit or burst corruption within one block detectable
//! on rescan; correction is the redundancy codec's job, one layer down.

use crate::error::BlockError;

/// Side length of the square block bitmap, in pixels.
pub const BLOCK_SIDE: usize = 32;

/// Bytes carried by one block before the CRC trailer.
pub const BLOCK_PAYLOAD: usize = 124;

/// CRC32 trailer length in bytes.
pub const CRC_BYTES: usize = 4;

/// Total bytes mapped onto one block bitmap.
pub const BLOCK_BYTES: usize = BLOCK_PAYLOAD + CRC_BYTES;

/// Pad byte for short trailing chunks.
///
/// 0x55 alternates bits, so padded regions are visually distinguishable from
/// a corrupted scan.
pub const FILL_BYTE: u8 = 0x55;

/// A 32×32 monochrome bitmap, row-major, `true` = foreground (dark) pixel.
#[derive(Clone, PartialEq, Eq)]
pub struct BlockBitmap {
    pixels: [bool; BLOCK_SIDE * BLOCK_SIDE],
}

impl BlockBitmap {
    /// An all-background bitmap.
    #[must_use]
    pub const fn blank() -> Self {
        Self {
            pixels: [false; BLOCK_SIDE * BLOCK_SIDE],
        }
    }

    /// Pixel at `(x, y)`; `true` is dark.
    ///
    /// # Panics
    ///
    /// Panics if `x` or `y` is outside the 32×32 grid.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        assert!(x < BLOCK_SIDE && y < BLOCK_SIDE);
        self.pixels[y * BLOCK_SIDE + x]
    }

    /// Set the pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `x` or `y` is outside the 32×32 grid.
    pub fn set_pixel(&mut self, x: usize, y: usize, dark: bool) {
        assert!(x < BLOCK_SIDE && y < BLOCK_SIDE);
        self.pixels[y * BLOCK_SIDE + x] = dark;
    }

    /// Flip one pixel. Test and corruption-simulation helper.
    pub fn flip_pixel(&mut self, x: usize, y: usize) {
        let dark = self.pixel(x, y);
        self.set_pixel(x, y, !dark);
    }

    /// Iterate rows top to bottom, each row a slice of 32 pixels.
    pub fn rows(&self) -> impl Iterator<Item = &[bool]> {
        self.pixels.chunks_exact(BLOCK_SIDE)
    }
}

impl std::fmt::Debug for BlockBitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dark = self.pixels.iter().filter(|p| **p).count();
        f.debug_struct("BlockBitmap")
            .field("side", &BLOCK_SIDE)
            .field("dark_pixels", &dark)
            .finish()
    }
}

/// Encode a 124-byte payload into a CRC-protected block bitmap.
///
/// The CRC32 is computed over the payload and appended big-endian; the
/// resulting 128 bytes are laid out most-significant-bit first, row-major,
/// one bit per pixel.
///
/// # Errors
///
/// Returns [`BlockError::InvalidPayloadLength`] if `payload` is not exactly
/// [`BLOCK_PAYLOAD`] bytes.
pub fn encode_block(payload: &[u8]) -> Result<BlockBitmap, BlockError> {
    if payload.len() != BLOCK_PAYLOAD {
        return Err(BlockError::InvalidPayloadLength {
            expected: BLOCK_PAYLOAD,
            actual: payload.len(),
        });
    }

    let mut raw = [0u8; BLOCK_BYTES];
    raw[..BLOCK_PAYLOAD].copy_from_slice(payload);
    let crc = crc32fast::hash(payload);
    raw[BLOCK_PAYLOAD..].copy_from_slice(&crc.to_be_bytes());

    let mut bitmap = BlockBitmap::blank();
    for (n, byte) in raw.iter().enumerate() {
        let y = n / (BLOCK_SIDE / 8);
        let x0 = (n % (BLOCK_SIDE / 8)) * 8;
        for bit in 0..8 {
            if byte & (0x80 >> bit) != 0 {
                bitmap.set_pixel(x0 + bit, y, true);
            }
        }
    }
    Ok(bitmap)
}

/// Decode a block bitmap back into its 124-byte payload.
///
/// Extracts the 1024 bits, recomputes CRC32 over the first 124 bytes, and
/// compares against the trailer. The caller decides whether a failure means
/// requesting a rescan; nothing is retried here.
///
/// # Errors
///
/// Returns [`BlockError::CorruptBlock`] on CRC mismatch.
pub fn decode_block(bitmap: &BlockBitmap) -> Result<[u8; BLOCK_PAYLOAD], BlockError> {
    let mut raw = [0u8; BLOCK_BYTES];
    for (n, byte) in raw.iter_mut().enumerate() {
        let y = n / (BLOCK_SIDE / 8);
        let x0 = (n % (BLOCK_SIDE / 8)) * 8;
        for bit in 0..8 {
            if bitmap.pixel(x0 + bit, y) {
                *byte |= 0x80 >> bit;
            }
        }
    }

    let mut payload = [0u8; BLOCK_PAYLOAD];
    payload.copy_from_slice(&raw[..BLOCK_PAYLOAD]);
    let computed = crc32fast::hash(&payload);
    let stored = u32::from_be_bytes([
        raw[BLOCK_PAYLOAD],
        raw[BLOCK_PAYLOAD + 1],
        raw[BLOCK_PAYLOAD + 2],
        raw[BLOCK_PAYLOAD + 3],
    ]);
    if computed != stored {
        return Err(BlockError::CorruptBlock { stored, computed });
    }
    Ok(payload)
}

/// Split `data` into 124-byte chunks, padding the last with [`FILL_BYTE`].
///
/// Every returned chunk is exactly [`BLOCK_PAYLOAD`] bytes; empty input
/// yields no chunks.
#[must_use]
pub fn block_chunks(data: &[u8]) -> Vec<[u8; BLOCK_PAYLOAD]> {
    data.chunks(BLOCK_PAYLOAD)
        .map(|chunk| {
            let mut out = [FILL_BYTE; BLOCK_PAYLOAD];
            out[..chunk.len()].copy_from_slice(chunk);
            out
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> [u8; BLOCK_PAYLOAD] {
        let mut payload = [0u8; BLOCK_PAYLOAD];
        for (i, b) in payload.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        payload
    }

    #[test]
    fn encode_rejects_wrong_length() {
        let result = encode_block(&[0u8; 100]);
        assert_eq!(
            result.unwrap_err(),
            BlockError::InvalidPayloadLength {
                expected: 124,
                actual: 100,
            }
        );

        let result = encode_block(&[0u8; 128]);
        assert!(matches!(
            result,
            Err(BlockError::InvalidPayloadLength { actual: 128, .. })
        ));
    }

    #[test]
    fn roundtrip_intact_block() {
        let payload = sample_payload();
        let bitmap = encode_block(&payload).unwrap();
        let decoded = decode_block(&bitmap).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn bit_order_msb_first() {
        // First payload byte 0x80 lights only pixel (0, 0).
        let mut payload = [0u8; BLOCK_PAYLOAD];
        payload[0] = 0x80;
        let bitmap = encode_block(&payload).unwrap();
        assert!(bitmap.pixel(0, 0));
        assert!(!bitmap.pixel(1, 0));

        // Byte 4 is the start of row 1 (4 bytes per 32-pixel row).
        let mut payload = [0u8; BLOCK_PAYLOAD];
        payload[4] = 0x01;
        let bitmap = encode_block(&payload).unwrap();
        assert!(bitmap.pixel(7, 1));
    }

    #[test]
    fn any_single_bit_flip_is_detected() {
        let payload = sample_payload();
        let clean = encode_block(&payload).unwrap();

        // Exhaustive over all 1024 bit positions, payload and trailer alike.
        for y in 0..BLOCK_SIDE {
            for x in 0..BLOCK_SIDE {
                let mut corrupted = clean.clone();
                corrupted.flip_pixel(x, y);
                let result = decode_block(&corrupted);
                assert!(
                    matches!(result, Err(BlockError::CorruptBlock { .. })),
                    "flip at ({x}, {y}) went undetected"
                );
            }
        }
    }

    #[test]
    fn block_chunks_pad_last() {
        let data = vec![1u8; BLOCK_PAYLOAD + 10];
        let chunks = block_chunks(&data);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], [1u8; BLOCK_PAYLOAD]);
        assert!(chunks[1][..10].iter().all(|b| *b == 1));
        assert!(chunks[1][10..].iter().all(|b| *b == FILL_BYTE));
    }

    #[test]
    fn block_chunks_exact_multiple_has_no_pad_chunk() {
        let data = vec![7u8; BLOCK_PAYLOAD * 3];
        let chunks = block_chunks(&data);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.iter().all(|b| *b == 7)));
    }

    #[test]
    fn block_chunks_empty_input() {
        assert!(block_chunks(&[]).is_empty());
    }
}
