//! Artifact file helpers: checksum verification and anonymized log ids.

use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Short, stable id for text we must not log verbatim (prompts, generated text).
pub fn anon_id(text: &str) -> String {
    let mut full = sha256_hex(text.as_bytes());
    full.truncate(12);
    full
}

/// Read an artifact and, when a checksum is given, verify it before returning the bytes.
pub fn read_verified(path: &Path, expected_sha256: Option<&str>) -> Result<Vec<u8>, String> {
    let bytes = fs::read(path).map_err(|e| format!("reading {}: {e}", path.display()))?;
    if let Some(expected) = expected_sha256 {
        let actual = sha256_hex(&bytes);
        if !actual.eq_ignore_ascii_case(expected.trim()) {
            return Err(format!(
                "checksum mismatch for {}: expected {}, got {}",
                path.display(),
                expected.trim(),
                actual
            ));
        }
    }
    Ok(bytes)
}
