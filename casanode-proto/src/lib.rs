//! Casanode BLE wire protocol - chunk framing, integrity tags and status codes
//!
//! Attribute payloads larger than one ATT transfer are moved as a cycle:
//! a 4-byte little-endian length prefix followed by chunks of at most
//! [`CHUNK_SIZE`] bytes. There are no sequence numbers, ordering is the
//! order of successive reads or writes.

pub mod ble;

use sha2::{Digest, Sha256};

/// Size of the length prefix that opens every chunked cycle
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Maximum payload bytes per chunk (conservative minimum ATT MTU minus header)
pub const CHUNK_SIZE: usize = 20;

/// Payload returned by a chunked read when nothing could be prepared
pub const ERROR_SENTINEL: &[u8] = b"error";

// Status codes shared by all action attributes
pub const STATUS_NOT_STARTED: &str = "0";
pub const STATUS_IN_PROGRESS: &str = "1";
pub const STATUS_SUCCESS: &str = "2";
pub const STATUS_ERROR: &str = "-1";

// check-port terminal codes
pub const PORT_OPEN: &str = "2";
pub const PORT_CLOSED: &str = "3";

/// Encode the length prefix for a payload
pub fn encode_length(len: u32) -> [u8; LENGTH_PREFIX_SIZE] {
    len.to_le_bytes()
}

/// Decode a length prefix. Returns `None` unless `data` is exactly 4 bytes.
pub fn decode_length(data: &[u8]) -> Option<u32> {
    let bytes: [u8; LENGTH_PREFIX_SIZE] = data.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

/// Split a payload into the full sequence of transfers for one cycle:
/// the length prefix first, then the chunks.
pub fn frame(payload: &[u8]) -> Vec<Vec<u8>> {
    let mut frames = Vec::with_capacity(1 + payload.len().div_ceil(CHUNK_SIZE));
    frames.push(encode_length(payload.len() as u32).to_vec());
    frames.extend(payload.chunks(CHUNK_SIZE).map(|c| c.to_vec()));
    frames
}

/// Render a list of boolean flags as a string of `0`/`1` digits
pub fn flags(values: &[bool]) -> String {
    values.iter().map(|v| if *v { '1' } else { '0' }).collect()
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("payload has no separator between secret and tag")]
    MissingSeparator,
    #[error("integrity tag does not match secret")]
    Mismatch,
}

/// Lowercase hex SHA-256 of a secret
pub fn tag(secret: &str) -> String {
    data_encoding::HEXLOWER.encode(&Sha256::digest(secret.as_bytes()))
}

/// Append the integrity tag: `"<secret> <sha256-hex(secret)>"`
pub fn seal(secret: &str) -> String {
    format!("{secret} {}", tag(secret))
}

/// Split a sealed payload on its last space and verify the tag.
///
/// The secret may itself contain spaces (mnemonic words), the tag never does.
pub fn open(sealed: &str) -> Result<&str, IntegrityError> {
    let (secret, received) = sealed
        .rsplit_once(' ')
        .ok_or(IntegrityError::MissingSeparator)?;
    if tag(secret) == received {
        Ok(secret)
    } else {
        Err(IntegrityError::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_prefix_is_little_endian() {
        assert_eq!(encode_length(0x0102_0304), [0x04, 0x03, 0x02, 0x01]);
        assert_eq!(decode_length(&[0x04, 0x03, 0x02, 0x01]), Some(0x0102_0304));
    }

    #[test]
    fn decode_length_requires_exactly_four_bytes() {
        assert_eq!(decode_length(&[1, 0, 0]), None);
        assert_eq!(decode_length(&[1, 0, 0, 0, 0]), None);
        assert_eq!(decode_length(b""), None);
    }

    #[test]
    fn frame_splits_into_twenty_byte_chunks() {
        let payload: Vec<u8> = (0..45).collect();
        let frames = frame(&payload);
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0], vec![45, 0, 0, 0]);
        assert_eq!(frames[1].len(), 20);
        assert_eq!(frames[2].len(), 20);
        assert_eq!(frames[3], (40..45).collect::<Vec<u8>>());
    }

    #[test]
    fn frame_of_empty_payload_is_header_only() {
        assert_eq!(frame(b""), vec![vec![0, 0, 0, 0]]);
    }

    #[test]
    fn flags_render_digits() {
        assert_eq!(flags(&[true, false, true]), "101");
        assert_eq!(flags(&[]), "");
    }

    #[test]
    fn tag_matches_known_digest() {
        assert_eq!(
            tag("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn open_accepts_secret_with_spaces() {
        let words = "abandon ability able about above absent";
        let sealed = seal(words);
        assert_eq!(open(&sealed), Ok(words));
    }

    #[test]
    fn open_rejects_wrong_tag() {
        let sealed = format!("word1 word2 {}", tag("word1 word3"));
        assert_eq!(open(&sealed), Err(IntegrityError::Mismatch));
    }

    #[test]
    fn open_rejects_missing_separator() {
        assert_eq!(open("nospace"), Err(IntegrityError::MissingSeparator));
    }
}
