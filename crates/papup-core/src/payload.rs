//! Payload packer and unpacker.
//!
//! Stacks the optional metadata sections, the compression stage, the
//! (reserved) encryption stage, and the redundancy codec into one
//! self-describing byte stream, prefixed by an RS-protected payload header.
//! The header records enough to invert every later stage deterministically,
//! and carries a stronger redundancy ratio (RS(32,14), ~56% parity) than any
//! body level.
//!
//! Pack order, outermost last: encrypted-metadata section, clear-metadata
//! section, compression, encryption, redundancy, header. Unpack reverses
//! exactly.

use std::io::Read;

use bzip2::read::{BzDecoder, BzEncoder};
use serde::{Deserialize, Serialize};

use crate::error::PayloadError;
use crate::fec::{self, RedundancyLevel};

/// Raw payload header length: u64 size + three (code, pad) byte pairs.
pub const PAYLOAD_HEADER_RAW: usize = 14;

/// Encoded payload header length after RS(32,14) protection.
pub const PAYLOAD_HEADER_LEN: usize = 32;

/// Largest metadata section expressible by the 2-byte length prefix.
pub const MAX_METADATA_LEN: usize = u16::MAX as usize;

/// Compression stage selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Compression {
    /// Code 0: no compression.
    None,
    /// Code 1: bzip2 at maximum effort.
    Bzip2,
}

impl Compression {
    /// The numeric code stored in the payload header.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Bzip2 => 1,
        }
    }

    /// Look up a stage by its header code.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::UnknownCompressionCode`] for unrecognized codes.
    pub const fn from_code(code: u8) -> Result<Self, PayloadError> {
        match code {
            0 => Ok(Self::None),
            1 => Ok(Self::Bzip2),
            code => Err(PayloadError::UnknownCompressionCode { code }),
        }
    }

    fn apply(self, data: &[u8]) -> Result<Vec<u8>, PayloadError> {
        match self {
            Self::None => Ok(data.to_vec()),
            Self::Bzip2 => {
                let mut encoder = BzEncoder::new(data, bzip2::Compression::best());
                let mut out = Vec::new();
                encoder
                    .read_to_end(&mut out)
                    .map_err(|e| PayloadError::Compression {
                        reason: e.to_string(),
                    })?;
                Ok(out)
            }
        }
    }

    fn invert(self, data: &[u8]) -> Result<Vec<u8>, PayloadError> {
        match self {
            Self::None => Ok(data.to_vec()),
            Self::Bzip2 => {
                let mut decoder = BzDecoder::new(data);
                let mut out = Vec::new();
                decoder
                    .read_to_end(&mut out)
                    .map_err(|e| PayloadError::Compression {
                        reason: e.to_string(),
                    })?;
                Ok(out)
            }
        }
    }
}

/// Encryption stage selector.
///
/// Reserved hook: only the no-op stage is defined, and the pack path requires
/// code 0. The header field keeps its slot so a future scheme can be added
/// without reframing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Encryption {
    /// Code 0: no encryption.
    None,
}

impl Encryption {
    /// The numeric code stored in the payload header.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::None => 0,
        }
    }

    /// Look up a stage by its header code.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::UnknownEncryptionCode`] for unrecognized codes.
    pub const fn from_code(code: u8) -> Result<Self, PayloadError> {
        match code {
            0 => Ok(Self::None),
            code => Err(PayloadError::UnknownEncryptionCode { code }),
        }
    }
}

/// Stage selection for one pack operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadConfig {
    /// Body redundancy level.
    pub redundancy: RedundancyLevel,
    /// Compression stage.
    pub compression: Compression,
    /// Encryption stage (reserved, must be the no-op).
    pub encryption: Encryption,
}

impl Default for PayloadConfig {
    /// Bzip2 plus RS(255,191), the combination the printed format was
    /// designed around.
    fn default() -> Self {
        Self {
            redundancy: RedundancyLevel::Parity64,
            compression: Compression::Bzip2,
            encryption: Encryption::None,
        }
    }
}

/// The payload header record, 14 raw bytes on the wire.
///
/// Big-endian layout: u64 packed body size, then (code, pad) byte pairs for
/// redundancy, encryption, and compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadHeader {
    /// Packed body length in bytes, after every stage was applied.
    ///
    /// Bounds the stream exactly: a page reassembly appends block fill past
    /// the body end, and this field is what lets the unpacker cut it off.
    pub total_size: u64,
    /// Redundancy level code.
    pub redundancy_code: u8,
    /// Pad bytes the redundancy decoder must strip.
    pub redundancy_pad: u8,
    /// Encryption stage code.
    pub encryption_code: u8,
    /// Pad bytes the encryption stage must strip.
    pub encryption_pad: u8,
    /// Compression stage code.
    pub compression_code: u8,
    /// Pad bytes the compression stage must strip.
    pub compression_pad: u8,
}

impl PayloadHeader {
    /// Serialize to the 14-byte raw form.
    #[must_use]
    pub fn to_raw(self) -> [u8; PAYLOAD_HEADER_RAW] {
        let mut raw = [0u8; PAYLOAD_HEADER_RAW];
        raw[..8].copy_from_slice(&self.total_size.to_be_bytes());
        raw[8] = self.redundancy_code;
        raw[9] = self.redundancy_pad;
        raw[10] = self.encryption_code;
        raw[11] = self.encryption_pad;
        raw[12] = self.compression_code;
        raw[13] = self.compression_pad;
        raw
    }

    fn from_raw(raw: &[u8]) -> Self {
        let mut size = [0u8; 8];
        size.copy_from_slice(&raw[..8]);
        Self {
            total_size: u64::from_be_bytes(size),
            redundancy_code: raw[8],
            redundancy_pad: raw[9],
            encryption_code: raw[10],
            encryption_pad: raw[11],
            compression_code: raw[12],
            compression_pad: raw[13],
        }
    }

    /// Encode to the RS(32,14)-protected wire form.
    #[must_use]
    pub fn encode(self) -> Vec<u8> {
        fec::encode_codeword(&self.to_raw(), PAYLOAD_HEADER_LEN)
    }

    /// Decode and error-correct the 32-byte wire form.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::CorruptHeader`] if the codeword has the wrong
    /// length or more symbol errors than RS(32,14) can correct.
    pub fn decode(codeword: &[u8]) -> Result<Self, PayloadError> {
        if codeword.len() != PAYLOAD_HEADER_LEN {
            return Err(PayloadError::CorruptHeader);
        }
        let raw = fec::decode_codeword(codeword, PAYLOAD_HEADER_RAW)
            .map_err(|_| PayloadError::CorruptHeader)?;
        Ok(Self::from_raw(&raw))
    }
}

/// Result of unpacking a payload stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unpacked {
    /// The original raw data.
    pub data: Vec<u8>,
    /// Clear metadata section, empty if the packer supplied none.
    pub clear_metadata: Vec<u8>,
    /// Encrypted metadata section, empty if the packer supplied none.
    pub encrypted_metadata: Vec<u8>,
    /// The validated payload header.
    pub header: PayloadHeader,
}

fn prefixed(section: &[u8]) -> Result<Vec<u8>, PayloadError> {
    if section.len() > MAX_METADATA_LEN {
        return Err(PayloadError::MetadataTooLarge {
            len: section.len(),
            max: MAX_METADATA_LEN,
        });
    }
    #[allow(clippy::cast_possible_truncation)]
    let len = section.len() as u16;
    let mut out = Vec::with_capacity(2 + section.len());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(section);
    Ok(out)
}

fn split_prefixed(data: &[u8]) -> Result<(Vec<u8>, &[u8]), PayloadError> {
    if data.len() < 2 {
        return Err(PayloadError::Truncated {
            expected: 2,
            actual: data.len(),
        });
    }
    let len = usize::from(u16::from_be_bytes([data[0], data[1]]));
    if data.len() < 2 + len {
        return Err(PayloadError::Truncated {
            expected: 2 + len,
            actual: data.len(),
        });
    }
    Ok((data[2..2 + len].to_vec(), &data[2 + len..]))
}

/// Pack raw data and its metadata sections into a payload stream.
///
/// Both metadata sections are always length-prefixed, even when empty, so
/// the unpack side needs no presence flags.
///
/// # Errors
///
/// Returns [`PayloadError::MetadataTooLarge`] if a metadata section exceeds
/// 65535 bytes, or [`PayloadError::Compression`] if the compression stage
/// fails.
pub fn pack(
    data: &[u8],
    clear_metadata: &[u8],
    encrypted_metadata: &[u8],
    config: &PayloadConfig,
) -> Result<Vec<u8>, PayloadError> {
    let mut body = prefixed(clear_metadata)?;
    body.extend_from_slice(&prefixed(encrypted_metadata)?);
    body.extend_from_slice(data);

    let body = config.compression.apply(&body)?;
    // Encryption stage: the no-op is the only defined scheme.
    let (body, redundancy_pad) = fec::rs_encode(&body, config.redundancy);

    let header = PayloadHeader {
        total_size: body.len() as u64,
        redundancy_code: config.redundancy.code(),
        redundancy_pad,
        encryption_code: config.encryption.code(),
        encryption_pad: 0,
        compression_code: config.compression.code(),
        compression_pad: 0,
    };

    let mut out = header.encode();
    out.extend_from_slice(&body);
    Ok(out)
}

/// Unpack a payload stream back into its raw data and metadata sections.
///
/// Reverses the pack order exactly: header, redundancy, encryption,
/// compression, then the two metadata sections. Bytes past the
/// header-declared body length are ignored, so a stream reassembled from
/// page blocks (which carries trailing block fill) unpacks as-is.
///
/// # Errors
///
/// - [`PayloadError::Truncated`] if the stream is shorter than the header
///   plus its declared body.
/// - [`PayloadError::CorruptHeader`] if the header codeword is beyond
///   correction.
/// - [`PayloadError::UnknownCompressionCode`] /
///   [`PayloadError::UnknownEncryptionCode`] / [`PayloadError::Fec`] for
///   unrecognized stage codes.
pub fn unpack(payload: &[u8]) -> Result<Unpacked, PayloadError> {
    if payload.len() < PAYLOAD_HEADER_LEN {
        return Err(PayloadError::Truncated {
            expected: PAYLOAD_HEADER_LEN,
            actual: payload.len(),
        });
    }
    let header = PayloadHeader::decode(&payload[..PAYLOAD_HEADER_LEN])?;

    let redundancy = RedundancyLevel::from_code(header.redundancy_code)?;
    let _encryption = Encryption::from_code(header.encryption_code)?;
    let compression = Compression::from_code(header.compression_code)?;

    let Ok(body_len) = usize::try_from(header.total_size) else {
        return Err(PayloadError::CorruptHeader);
    };
    if payload.len() - PAYLOAD_HEADER_LEN < body_len {
        return Err(PayloadError::Truncated {
            expected: PAYLOAD_HEADER_LEN.saturating_add(body_len),
            actual: payload.len(),
        });
    }

    let body = fec::rs_decode(
        &payload[PAYLOAD_HEADER_LEN..PAYLOAD_HEADER_LEN + body_len],
        redundancy,
        header.redundancy_pad,
    )?;
    // Encryption stage: no-op for code 0.
    let body = compression.invert(&body)?;

    let (clear_metadata, rest) = split_prefixed(&body)?;
    let (encrypted_metadata, data) = split_prefixed(rest)?;

    Ok(Unpacked {
        data: data.to_vec(),
        clear_metadata,
        encrypted_metadata,
        header,
    })
}
