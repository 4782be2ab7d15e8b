//! Checksummed bincode frames.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tessera_common::utils::error::{Error, Result, StorageError};

const LEN_BYTES: usize = 4;
const CRC_BYTES: usize = 4;

/// Serializes `value` into a single length-prefixed, checksummed frame.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized or exceeds 4 GiB.
pub fn encode_frame<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let data = bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| Error::Serialization(e.to_string()))?;
    let len = u32::try_from(data.len())
        .map_err(|_| Error::Serialization(format!("frame of {} bytes is too large", data.len())))?;

    let mut frame = Vec::with_capacity(LEN_BYTES + data.len() + CRC_BYTES);
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&data);
    frame.extend_from_slice(&crc32fast::hash(&data).to_le_bytes());
    Ok(frame)
}

/// Decodes a frame produced by [`encode_frame`].
///
/// The frame must span `bytes` exactly.
///
/// # Errors
///
/// Returns [`StorageError::Corruption`] for truncated frames, length or
/// checksum mismatches, and trailing bytes; [`Error::Serialization`] if the
/// payload does not decode as `T`.
pub fn decode_frame<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    if bytes.len() < LEN_BYTES + CRC_BYTES {
        return Err(corruption(format!("frame of {} bytes is truncated", bytes.len())));
    }
    let len = u32::from_le_bytes(word(&bytes[..LEN_BYTES])) as usize;
    let body = &bytes[LEN_BYTES..];
    if body.len() != len + CRC_BYTES {
        return Err(corruption(format!(
            "frame declares {len} payload bytes but holds {}",
            body.len() - CRC_BYTES
        )));
    }

    let (data, trailer) = body.split_at(len);
    let stored = u32::from_le_bytes(word(trailer));
    let computed = crc32fast::hash(data);
    if stored != computed {
        return Err(corruption(format!(
            "checksum mismatch (stored {stored:#010x}, computed {computed:#010x})"
        )));
    }

    let (value, consumed): (T, usize) =
        bincode::serde::decode_from_slice(data, bincode::config::standard())
            .map_err(|e| Error::Serialization(e.to_string()))?;
    if consumed != data.len() {
        return Err(corruption(format!(
            "{} unread payload bytes",
            data.len() - consumed
        )));
    }
    Ok(value)
}

fn word(bytes: &[u8]) -> [u8; 4] {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    buf
}

fn corruption(reason: String) -> Error {
    Error::Storage(StorageError::Corruption(reason))
}
