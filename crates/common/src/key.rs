//! Key normalisation
//!
//! Keys embed their entity class (`flight-<num>`, `car-<loc>`, `room-<loc>`,
//! `customer-<id>`) and are compared byte-for-byte after lowercasing.

/// Trim and lowercase a raw key
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Split a normalised key into its class prefix and suffix
pub fn split_key(key: &str) -> Option<(&str, &str)> {
    let (prefix, suffix) = key.split_once('-')?;
    if prefix.is_empty() || suffix.is_empty() {
        return None;
    }
    Some((prefix, suffix))
}
