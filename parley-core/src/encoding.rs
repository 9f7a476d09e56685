//! Identifier encoding for messaging-bus channels.
//!
//! The Base62 codec interprets a string's UTF-8 bytes as one big-endian
//! unsigned integer and converts it to a 62-symbol alphabet, so the mapping
//! is deterministic and reversible. It is used to obscure and compactly
//! represent a visitor UUID inside a public customer-service channel id.

use num_bigint::BigUint;
use uuid::Uuid;

use crate::error::ParleyError;

const BASE62_ALPHABET: &[u8; 62] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Two-party channel requiring symmetric session-id derivation.
pub const CHANNEL_TYPE_PERSONAL: u8 = 1;
/// Broadcast channel for all staff of a project.
pub const CHANNEL_TYPE_PROJECT_STAFF: u8 = 249;
/// Channel backing a visitor's support conversation.
pub const CHANNEL_TYPE_CUSTOMER_SERVICE: u8 = 251;

pub const VISITOR_CHANNEL_SUFFIX: &str = "-vtr";
pub const PROJECT_STAFF_CHANNEL_SUFFIX: &str = "-prj";
pub const STAFF_UID_SUFFIX: &str = "-staff";

/// Encode a channel identifier using Base62.
///
/// The empty string encodes to `"0"`.
pub fn encode_channel_id(raw: &str) -> String {
    let mut n = BigUint::from_bytes_be(raw.as_bytes());
    if n.bits() == 0 {
        return "0".to_string();
    }
    let base = BigUint::from(62u32);
    let mut digits = Vec::new();
    while n.bits() != 0 {
        let rem = &n % &base;
        let idx = rem.to_u32_digits().first().copied().unwrap_or(0) as usize;
        digits.push(BASE62_ALPHABET[idx] as char);
        n = n / &base;
    }
    digits.iter().rev().collect()
}

/// Decode a Base62-encoded channel identifier back to its original string.
///
/// Fails on characters outside the alphabet and on values whose byte
/// representation is not valid UTF-8.
pub fn decode_channel_id(encoded: &str) -> Result<String, ParleyError> {
    let base = BigUint::from(62u32);
    let mut n = BigUint::from(0u32);
    for ch in encoded.trim().bytes() {
        let idx = BASE62_ALPHABET
            .iter()
            .position(|&c| c == ch)
            .ok_or_else(|| {
                ParleyError::Format(format!("invalid base62 character: {}", ch as char))
            })?;
        n = n * &base + BigUint::from(idx as u32);
    }
    if n.bits() == 0 {
        return Ok(String::new());
    }
    String::from_utf8(n.to_bytes_be())
        .map_err(|_| ParleyError::Format(format!("base62 value is not valid UTF-8: {encoded}")))
}

/// Customer-service channel id for a visitor: `{visitor_uuid}-vtr`.
pub fn build_visitor_channel_id(visitor_id: Uuid) -> String {
    format!("{visitor_id}{VISITOR_CHANNEL_SUFFIX}")
}

/// Staff broadcast channel id for a project: `{project_uuid}-prj`.
pub fn build_project_staff_channel_id(project_id: Uuid) -> String {
    format!("{project_id}{PROJECT_STAFF_CHANNEL_SUFFIX}")
}

/// Bus actor uid for a staff member: `{staff_uuid}-staff`.
pub fn build_staff_uid(staff_id: Uuid) -> String {
    format!("{staff_id}{STAFF_UID_SUFFIX}")
}

/// Extract the visitor UUID from a customer-service channel id.
pub fn parse_visitor_channel_id(channel_id: &str) -> Result<Uuid, ParleyError> {
    let body = channel_id
        .strip_suffix(VISITOR_CHANNEL_SUFFIX)
        .ok_or_else(|| ParleyError::Format(format!("invalid visitor channel id: {channel_id}")))?;
    Uuid::parse_str(body)
        .map_err(|_| ParleyError::Format(format!("invalid visitor channel id: {channel_id}")))
}

/// Deterministic session id for a conversation.
///
/// Personal channels order the two participant uids by CRC32 checksum,
/// falling back to lexicographic comparison on checksum collision, so both
/// sides derive the same `{first}@{second}` id without coordination. This
/// matches the bus's internal session-id derivation. Other channel types
/// use `{to_uid}@{channel_type}`.
pub fn session_id(from_uid: &str, to_uid: &str, channel_type: u8) -> String {
    if channel_type == CHANNEL_TYPE_PERSONAL {
        let from_hash = crc32fast::hash(from_uid.as_bytes());
        let to_hash = crc32fast::hash(to_uid.as_bytes());

        if from_hash > to_hash || (from_hash == to_hash && from_uid > to_uid) {
            return format!("{from_uid}@{to_uid}");
        }
        return format!("{to_uid}@{from_uid}");
    }

    format!("{to_uid}@{channel_type}")
}
