//! Redundancy codec: Reed-Solomon over GF(256).
//!
//! Wraps the generic RS primitive into a byte-stream codec: the encoder
//! splits data into k-byte chunks, pads the last with [`FILL_BYTE`], and
//! emits n-byte codewords; the decoder corrects up to ⌊(n−k)/2⌋ symbol
//! errors per codeword and strips the recorded pad. Every codeword is
//! processed independently, including the final one.
//!
//! Headers elsewhere in the format always use a higher redundancy ratio
//! than body data (RS(32,14) and RS(64,34) versus the body levels below),
//! because header loss is catastrophic: the header carries the geometry
//! needed to even locate the body.

// Allow truncation casts - pad lengths are bounded by k < 255
#![allow(clippy::cast_possible_truncation)]

use reed_solomon::{Decoder, Encoder};
use serde::{Deserialize, Serialize};

use crate::block::FILL_BYTE;
use crate::error::FecError;

/// Codeword length shared by all body redundancy levels.
pub const CODEWORD_LEN: usize = 255;

/// Recognized body redundancy levels, named by parity byte count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RedundancyLevel {
    /// Code 0: no redundancy, data passes through unchanged.
    None,
    /// Code 1: RS(255,247), ~3% parity.
    Parity8,
    /// Code 2: RS(255,239), ~6% parity.
    Parity16,
    /// Code 3: RS(255,223), ~12.5% parity.
    Parity32,
    /// Code 4: RS(255,191), ~25% parity.
    Parity64,
    /// Code 5: RS(255,127), ~50% parity.
    Parity128,
}

impl RedundancyLevel {
    /// The numeric code stored in the payload header.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Parity8 => 1,
            Self::Parity16 => 2,
            Self::Parity32 => 3,
            Self::Parity64 => 4,
            Self::Parity128 => 5,
        }
    }

    /// Look up a level by its header code.
    ///
    /// # Errors
    ///
    /// Returns [`FecError::UnknownRedundancyCode`] for codes outside the
    /// recognized table.
    pub const fn from_code(code: u8) -> Result<Self, FecError> {
        match code {
            0 => Ok(Self::None),
            1 => Ok(Self::Parity8),
            2 => Ok(Self::Parity16),
            3 => Ok(Self::Parity32),
            4 => Ok(Self::Parity64),
            5 => Ok(Self::Parity128),
            code => Err(FecError::UnknownRedundancyCode { code }),
        }
    }

    /// Message length k, or `None` for the pass-through level.
    #[must_use]
    pub const fn message_len(self) -> Option<usize> {
        match self {
            Self::None => None,
            Self::Parity8 => Some(247),
            Self::Parity16 => Some(239),
            Self::Parity32 => Some(223),
            Self::Parity64 => Some(191),
            Self::Parity128 => Some(127),
        }
    }

    /// Symbol errors correctable per codeword: ⌊(n−k)/2⌋.
    #[must_use]
    pub const fn correctable_symbols(self) -> usize {
        match self.message_len() {
            Some(k) => (CODEWORD_LEN - k) / 2,
            None => 0,
        }
    }
}

/// Encode one message shorter than `n` into a single `n`-byte codeword.
///
/// Used for the RS-protected payload and page headers, which fix their own
/// (n, k) independent of the body level.
///
/// # Panics
///
/// Panics if `message.len() >= n` or `n > 255`; header geometries are
/// compile-time constants, so this is a programming error, not input error.
#[must_use]
pub fn encode_codeword(message: &[u8], n: usize) -> Vec<u8> {
    assert!(n <= 255 && message.len() < n);
    let ecc = n - message.len();
    Encoder::new(ecc).encode(message).to_vec()
}

/// Decode a single `n`-byte codeword back to its `k`-byte message,
/// correcting up to ⌊(n−k)/2⌋ symbol errors.
///
/// # Errors
///
/// Returns [`FecError::UncorrectableBlock`] (index 0) if the error count
/// exceeds the correction capacity.
pub fn decode_codeword(codeword: &[u8], k: usize) -> Result<Vec<u8>, FecError> {
    let ecc = codeword.len() - k;
    let buffer = Decoder::new(ecc)
        .correct(codeword, None)
        .map_err(|_| FecError::UncorrectableBlock { codeword_index: 0 })?;
    Ok(buffer.data().to_vec())
}

/// Encode a byte stream at the given redundancy level.
///
/// Splits `data` into k-byte chunks, right-pads the final short chunk with
/// [`FILL_BYTE`], and concatenates the resulting 255-byte codewords. Returns
/// the encoded stream and the pad length the decoder must strip.
///
/// [`RedundancyLevel::None`] passes the data through unchanged with pad 0.
#[must_use]
pub fn rs_encode(data: &[u8], level: RedundancyLevel) -> (Vec<u8>, u8) {
    let Some(k) = level.message_len() else {
        return (data.to_vec(), 0);
    };

    let encoder = Encoder::new(CODEWORD_LEN - k);
    let mut out = Vec::with_capacity(data.len().div_ceil(k) * CODEWORD_LEN);
    let mut pad = 0u8;
    for chunk in data.chunks(k) {
        if chunk.len() < k {
            // Only the final chunk can be short.
            pad = (k - chunk.len()) as u8;
            let mut padded = vec![FILL_BYTE; k];
            padded[..chunk.len()].copy_from_slice(chunk);
            out.extend_from_slice(&encoder.encode(&padded));
        } else {
            out.extend_from_slice(&encoder.encode(chunk));
        }
    }
    (out, pad)
}

/// Decode a stream of 255-byte codewords at the given redundancy level.
///
/// Each codeword is corrected independently; a single uncorrectable codeword
/// does not abort its siblings, but the first failure is the one surfaced.
/// Trailing pad bytes are stripped using the recorded `pad` length.
///
/// # Errors
///
/// - [`FecError::TruncatedStream`] if the stream length is not a whole
///   number of codewords.
/// - [`FecError::InvalidPadLength`] if `pad` is impossible for the level.
/// - [`FecError::UncorrectableBlock`] with the index of the first codeword
///   whose error count exceeds ⌊(n−k)/2⌋.
pub fn rs_decode(data: &[u8], level: RedundancyLevel, pad: u8) -> Result<Vec<u8>, FecError> {
    let Some(k) = level.message_len() else {
        if pad != 0 {
            return Err(FecError::InvalidPadLength {
                pad: pad as usize,
                k: 0,
            });
        }
        return Ok(data.to_vec());
    };

    if data.len() % CODEWORD_LEN != 0 {
        return Err(FecError::TruncatedStream {
            len: data.len(),
            codeword_len: CODEWORD_LEN,
        });
    }
    if pad as usize >= k || (data.is_empty() && pad != 0) {
        return Err(FecError::InvalidPadLength {
            pad: pad as usize,
            k,
        });
    }

    let decoder = Decoder::new(CODEWORD_LEN - k);
    let mut out = Vec::with_capacity(data.len() / CODEWORD_LEN * k);
    let mut first_failure = None;
    for (codeword_index, codeword) in data.chunks_exact(CODEWORD_LEN).enumerate() {
        match decoder.correct(codeword, None) {
            Ok(buffer) => out.extend_from_slice(buffer.data()),
            Err(_) => {
                // Siblings still decode; remember the earliest failure.
                if first_failure.is_none() {
                    first_failure = Some(FecError::UncorrectableBlock { codeword_index });
                }
                out.extend_from_slice(&codeword[..k]);
            }
        }
    }
    if let Some(err) = first_failure {
        return Err(err);
    }

    out.truncate(out.len() - pad as usize);
    Ok(out)
}

/// Scan a codeword stream and report every uncorrectable codeword index.
///
/// Companion to [`rs_decode`] for callers that want the full rescan list
/// rather than just the first failure.
///
/// # Errors
///
/// Returns [`FecError::TruncatedStream`] if the stream length is not a whole
/// number of codewords.
pub fn uncorrectable_codewords(
    data: &[u8],
    level: RedundancyLevel,
) -> Result<Vec<usize>, FecError> {
    let Some(k) = level.message_len() else {
        return Ok(Vec::new());
    };
    if data.len() % CODEWORD_LEN != 0 {
        return Err(FecError::TruncatedStream {
            len: data.len(),
            codeword_len: CODEWORD_LEN,
        });
    }

    let decoder = Decoder::new(CODEWORD_LEN - k);
    Ok(data
        .chunks_exact(CODEWORD_LEN)
        .enumerate()
        .filter(|(_, codeword)| decoder.correct(codeword, None).is_err())
        .map(|(index, _)| index)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_codes_roundtrip() {
        for code in 0..=5 {
            let level = RedundancyLevel::from_code(code).unwrap();
            assert_eq!(level.code(), code);
        }
        assert!(matches!(
            RedundancyLevel::from_code(6),
            Err(FecError::UnknownRedundancyCode { code: 6 })
        ));
    }

    #[test]
    fn correction_capacity_table() {
        assert_eq!(RedundancyLevel::None.correctable_symbols(), 0);
        assert_eq!(RedundancyLevel::Parity8.correctable_symbols(), 4);
        assert_eq!(RedundancyLevel::Parity16.correctable_symbols(), 8);
        assert_eq!(RedundancyLevel::Parity32.correctable_symbols(), 16);
        assert_eq!(RedundancyLevel::Parity64.correctable_symbols(), 32);
        assert_eq!(RedundancyLevel::Parity128.correctable_symbols(), 64);
    }

    #[test]
    fn passthrough_level() {
        let data = b"hello paper".to_vec();
        let (encoded, pad) = rs_encode(&data, RedundancyLevel::None);
        assert_eq!(encoded, data);
        assert_eq!(pad, 0);
        assert_eq!(rs_decode(&encoded, RedundancyLevel::None, 0).unwrap(), data);
    }

    #[test]
    fn roundtrip_with_padding() {
        // 300 bytes at k=223: one full chunk plus a 77-byte tail, pad 146.
        let data: Vec<u8> = (0..300u16).map(|i| (i % 256) as u8).collect();
        let (encoded, pad) = rs_encode(&data, RedundancyLevel::Parity32);
        assert_eq!(encoded.len(), 2 * CODEWORD_LEN);
        assert_eq!(pad, 146);

        let decoded = rs_decode(&encoded, RedundancyLevel::Parity32, pad).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn roundtrip_exact_multiple_has_zero_pad() {
        let data = vec![0xA7u8; 223 * 3];
        let (encoded, pad) = rs_encode(&data, RedundancyLevel::Parity32);
        assert_eq!(pad, 0);
        assert_eq!(encoded.len(), 3 * CODEWORD_LEN);
        assert_eq!(
            rs_decode(&encoded, RedundancyLevel::Parity32, 0).unwrap(),
            data
        );
    }

    #[test]
    fn final_codeword_is_decoded() {
        // Two codewords; the second must survive decoding intact.
        let data: Vec<u8> = (0..(223 + 100)).map(|i| (i * 7 % 256) as u8).collect();
        let (encoded, pad) = rs_encode(&data, RedundancyLevel::Parity32);
        let decoded = rs_decode(&encoded, RedundancyLevel::Parity32, pad).unwrap();
        assert_eq!(decoded.len(), data.len());
        assert_eq!(decoded[223..], data[223..]);
    }

    #[test]
    fn corrects_up_to_capacity() {
        let data = vec![0x42u8; 223];
        let (mut encoded, pad) = rs_encode(&data, RedundancyLevel::Parity32);

        // Flip 16 symbols, the exact correction bound for RS(255,223).
        for i in 0..16 {
            encoded[i * 13] ^= 0xFF;
        }
        let decoded = rs_decode(&encoded, RedundancyLevel::Parity32, pad).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn fails_deterministically_beyond_capacity() {
        let data = vec![0x42u8; 223];
        let (mut encoded, pad) = rs_encode(&data, RedundancyLevel::Parity32);

        for i in 0..17 {
            encoded[i * 13] ^= 0xFF;
        }
        let result = rs_decode(&encoded, RedundancyLevel::Parity32, pad);
        assert!(matches!(
            result,
            Err(FecError::UncorrectableBlock { codeword_index: 0 })
        ));
    }

    #[test]
    fn failure_reports_first_codeword_index() {
        let data = vec![0u8; 223 * 3];
        let (mut encoded, pad) = rs_encode(&data, RedundancyLevel::Parity32);

        // Destroy the middle codeword only.
        for byte in &mut encoded[CODEWORD_LEN..CODEWORD_LEN + 40] {
            *byte ^= 0x5A;
        }
        let result = rs_decode(&encoded, RedundancyLevel::Parity32, pad);
        assert_eq!(
            result.unwrap_err(),
            FecError::UncorrectableBlock { codeword_index: 1 }
        );

        let bad = uncorrectable_codewords(&encoded, RedundancyLevel::Parity32).unwrap();
        assert_eq!(bad, vec![1]);
    }

    #[test]
    fn truncated_stream_rejected() {
        let result = rs_decode(&[0u8; 100], RedundancyLevel::Parity32, 0);
        assert_eq!(
            result.unwrap_err(),
            FecError::TruncatedStream {
                len: 100,
                codeword_len: CODEWORD_LEN,
            }
        );
    }

    #[test]
    fn invalid_pad_rejected() {
        let data = vec![0u8; 223];
        let (encoded, _) = rs_encode(&data, RedundancyLevel::Parity32);
        let result = rs_decode(&encoded, RedundancyLevel::Parity32, 223);
        assert!(matches!(result, Err(FecError::InvalidPadLength { .. })));
    }

    #[test]
    fn header_codeword_roundtrip() {
        let message = [0xABu8; 34];
        let codeword = encode_codeword(&message, 64);
        assert_eq!(codeword.len(), 64);

        let mut corrupted = codeword.clone();
        // RS(64,34) corrects up to 15 symbol errors.
        for i in 0..15 {
            corrupted[i * 4] ^= 0xFF;
        }
        let decoded = decode_codeword(&corrupted, 34).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn empty_input() {
        let (encoded, pad) = rs_encode(&[], RedundancyLevel::Parity64);
        assert!(encoded.is_empty());
        assert_eq!(pad, 0);
        assert_eq!(
            rs_decode(&encoded, RedundancyLevel::Parity64, 0).unwrap(),
            Vec::<u8>::new()
        );
    }
}
