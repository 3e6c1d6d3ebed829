use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};

/// Validates cached data integrity using SHA-256 checksums
///
/// Cached records are stored as a JSON envelope holding the serialized value and
/// its checksum. On retrieval the checksum is recomputed; a mismatch or a
/// payload that no longer parses is reported as corrupted so the caller can
/// treat the entry as a miss and reload from the store.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ValidatedCacheEntry {
    /// The actual cached data (JSON string)
    pub data: String,
    /// SHA-256 checksum of the data (hex encoded)
    pub checksum: String,
}

impl ValidatedCacheEntry {
    /// Creates a new validated cache entry with computed checksum
    pub fn new(data: String) -> Self {
        let checksum = Self::compute_checksum(&data);
        Self { data, checksum }
    }

    /// Serializes `value` and wraps it into a sealed envelope string.
    pub fn seal<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
        let data = serde_json::to_string(value)?;
        serde_json::to_string(&Self::new(data))
    }

    /// Opens an envelope produced by [`ValidatedCacheEntry::seal`].
    ///
    /// Returns `None` if the envelope is corrupted or invalid JSON.
    pub fn open<T: DeserializeOwned>(serialized: &str) -> Option<T> {
        let data = Self::deserialize_and_validate(serialized)?;
        match serde_json::from_str(&data) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Cache validation failed: payload does not parse: {}", e);
                None
            }
        }
    }

    /// Computes SHA-256 checksum of the data
    fn compute_checksum(data: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Validates the integrity of the cached data
    ///
    /// Returns true if the checksum matches, false if tampered
    pub fn is_valid(&self) -> bool {
        let computed = Self::compute_checksum(&self.data);
        computed == self.checksum
    }

    /// Deserializes and validates a cache entry
    ///
    /// Returns Some(data) if valid, None if corrupted or invalid JSON
    pub fn deserialize_and_validate(serialized: &str) -> Option<String> {
        let entry: ValidatedCacheEntry = match serde_json::from_str(serialized) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Cache validation failed: envelope does not parse: {}", e);
                return None;
            }
        };

        if entry.is_valid() {
            Some(entry.data)
        } else {
            // Checksum mismatch - cache poisoned
            tracing::warn!(
                "Cache validation failed: checksum mismatch. Expected: {}, Data length: {}",
                entry.checksum,
                entry.data.len()
            );
            None
        }
    }
}
