//! Framed storage for document bodies.
//!
//! Bodies are never inlined in the cache state. Each one lives under its own
//! store key with a binary header containing magic bytes, format version and
//! a checksum, so a truncated or foreign file reads back as a miss.

use serde::{Deserialize, Serialize};
use strata_common::{ContentHash, Hasher};

use crate::error::CacheError;

/// Store key prefix under which all document bodies live.
pub const DOCUMENTS_PREFIX: &str = "documents/";

/// Magic bytes identifying a Strata document.
const DOCUMENT_MAGIC: [u8; 4] = *b"STRA";

/// Current document format version. Increment on breaking changes to the
/// header or payload layout.
const DOCUMENT_FORMAT_VERSION: u32 = 1;

/// Header prepended to every stored document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DocumentHeader {
    magic: [u8; 4],
    format_version: u32,
    checksum: ContentHash,
}

/// Returns the store key for the body of `path` at `hash`.
///
/// The key depends on both the output path and its hash, so two paths with
/// identical bodies still own separate documents.
pub fn document_key(path: &str, hash: &ContentHash) -> String {
    let mut hasher = Hasher::new();
    hasher.update(path).update("\0").update(hash.to_string());
    format!("{DOCUMENTS_PREFIX}{}", hasher.digest())
}

/// Frames `body` for storage.
pub fn encode_document(body: &[u8]) -> Result<Vec<u8>, CacheError> {
    let header = DocumentHeader {
        magic: DOCUMENT_MAGIC,
        format_version: DOCUMENT_FORMAT_VERSION,
        checksum: ContentHash::from_bytes(body),
    };

    let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
        .map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;

    // 4-byte header length (little-endian) + header + payload
    let header_len = header_bytes.len() as u32;
    let mut output = Vec::with_capacity(4 + header_bytes.len() + body.len());
    output.extend_from_slice(&header_len.to_le_bytes());
    output.extend_from_slice(&header_bytes);
    output.extend_from_slice(body);
    Ok(output)
}

/// Validates a framed document and returns its payload.
///
/// Returns `None` if the header is truncated or unreadable, the magic or
/// format version doesn't match, or the checksum doesn't verify.
pub fn decode_document(raw: &[u8]) -> Option<Vec<u8>> {
    if raw.len() < 4 {
        return None;
    }

    let header_len = u32::from_le_bytes(raw[..4].try_into().ok()?) as usize;
    let payload_start = 4usize.checked_add(header_len)?;
    if raw.len() < payload_start {
        return None;
    }

    let (header, _): (DocumentHeader, usize) =
        bincode::serde::decode_from_slice(&raw[4..payload_start], bincode::config::standard())
            .ok()?;

    if header.magic != DOCUMENT_MAGIC || header.format_version != DOCUMENT_FORMAT_VERSION {
        return None;
    }

    let payload = &raw[payload_start..];
    if ContentHash::from_bytes(payload) != header.checksum {
        return None;
    }

    Some(payload.to_vec())
}
